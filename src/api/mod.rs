//! HTTP surface (Axum router + handler wiring).
//!
//! - `routes.rs`: HTTP handlers, one per endpoint
//! - `errors.rs`: consistent JSON error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use chrono::{DateTime, Utc};
use tower::ServiceBuilder;

use crate::config::Config;
use crate::engine::{CachePolicy, FreshnessCache};
use crate::query::QueryDispatcher;
use crate::store::loader::{LoadConfig, RecordLoader};
use crate::store::RecordWriter;

pub mod errors;
pub mod routes;

/// Shared state behind every handler.
pub struct AppState {
    pub cache: Arc<FreshnessCache>,
    pub dispatcher: QueryDispatcher,
    pub writer: RecordWriter,
    pub loader: Arc<RecordLoader>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn from_config(config: &Config) -> Self {
        let load_config = LoadConfig::from(&config.store);
        let loader = Arc::new(RecordLoader::new(load_config.clone()));
        let cache = Arc::new(FreshnessCache::new(
            Arc::clone(&loader),
            CachePolicy::from(&config.engine),
        ));
        Self {
            dispatcher: QueryDispatcher::new(Arc::clone(&cache)),
            writer: RecordWriter::new(load_config),
            cache,
            loader,
            started_at: Utc::now(),
        }
    }
}

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/stats", get(routes::get_stats))
        .route(
            "/records/:kind",
            get(routes::get_records).post(routes::post_record),
        )
        .route("/query/:text", get(routes::get_query))
        .layer(ServiceBuilder::new().layer(Extension(state)))
}
