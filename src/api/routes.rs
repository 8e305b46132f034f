//! HTTP routes and handlers.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use tracing::info;

use crate::api::errors::{engine_error_to_response, parse_entity_kind};
use crate::api::AppState;
use crate::engine::QueryKey;
use crate::models::EntityKind;

/// `GET /records/{kind}`: current snapshot slice for one kind plus the
/// record listing behind it.
pub async fn get_records(
    Extension(state): Extension<Arc<AppState>>,
    Path(kind): Path<String>,
) -> axum::response::Response {
    let kind = match parse_entity_kind(&kind) {
        Ok(kind) => kind,
        Err(resp) => return resp,
    };

    let view = match state.cache.get(QueryKey::Kind(kind)).await {
        Ok(view) => view,
        Err(err) => return engine_error_to_response(err),
    };

    let snapshot = &view.view.snapshot;
    let stats = match kind {
        EntityKind::Driver => json!(snapshot.drivers),
        EntityKind::Shipment => json!(snapshot.shipments),
        EntityKind::Invoice => json!(snapshot.invoices),
        EntityKind::Vehicle => json!(snapshot.vehicles),
    };

    Json(json!({
        "kind": kind.to_string(),
        "stats": stats,
        "records": view.view.records.of_kind(kind),
        "live_timestamp": snapshot.computed_at,
        "stale": view.stale,
    }))
    .into_response()
}

/// `POST /records/{kind}`: persist a new record and invalidate the cache.
pub async fn post_record(
    Extension(state): Extension<Arc<AppState>>,
    Path(kind): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> axum::response::Response {
    let kind = match parse_entity_kind(&kind) {
        Ok(kind) => kind,
        Err(resp) => return resp,
    };

    let (record, path) = match state.writer.write(kind, body) {
        Ok(written) => written,
        Err(err) => return engine_error_to_response(err),
    };

    state.cache.invalidate().await;
    info!(%kind, id = %record.id, "record created via mutation endpoint");

    (
        StatusCode::CREATED,
        Json(json!({
            "record": record,
            "file": path,
        })),
    )
        .into_response()
}

/// `GET /stats`: the full snapshot across all kinds.
pub async fn get_stats(Extension(state): Extension<Arc<AppState>>) -> axum::response::Response {
    let view = match state.cache.get(QueryKey::Stats).await {
        Ok(view) => view,
        Err(err) => return engine_error_to_response(err),
    };

    let snapshot = &view.view.snapshot;
    Json(json!({
        "snapshot": snapshot,
        "total_records": snapshot.total_records(),
        "stale": view.stale,
    }))
    .into_response()
}

/// `GET /query/{text}`: structured answer to a free-text question.
pub async fn get_query(
    Extension(state): Extension<Arc<AppState>>,
    Path(text): Path<String>,
) -> axum::response::Response {
    match state.dispatcher.answer(&text).await {
        Ok(answer) => Json(answer).into_response(),
        Err(err) => engine_error_to_response(err),
    }
}

/// `GET /health`: process status and tracked file count.
pub async fn health(Extension(state): Extension<Arc<AppState>>) -> axum::response::Response {
    let loader = Arc::clone(&state.loader);
    let tracked = tokio::task::spawn_blocking(move || loader.tracked_files().len())
        .await
        .unwrap_or(0);

    Json(json!({
        "status": "ok",
        "tracked_files": tracked,
        "started_at": state.started_at,
    }))
    .into_response()
}
