//! Derived-state computation and freshness caching.
//!
//! `aggregator` turns the current record set into an immutable snapshot;
//! `cache` memoizes those snapshots per query key under a TTL contract.

pub mod aggregator;
pub mod cache;

pub use cache::{CachePolicy, CacheView, ComputedView, FreshnessCache, QueryKey};
