//! FleetPulse - fleet record ingestion and aggregation engine.
//!
//! The library exposes the full pipeline (loader, normalizer,
//! aggregator, freshness cache, query dispatcher, mutation writer) and
//! the Axum router so integration tests can drive the same surface the
//! binary serves.

pub mod api;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod normalize;
pub mod query;
pub mod store;
pub mod watch;
