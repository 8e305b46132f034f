//! Periodic directory watch with debounced cache invalidation.
//!
//! Queries never glob the data directory themselves. A background task
//! fingerprints the tracked files on a fixed interval and invalidates
//! the freshness cache once when the fingerprint changes, so I/O cost
//! follows the scan interval rather than query volume.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::engine::FreshnessCache;
use crate::store::loader::RecordLoader;

/// Name, size and mtime of every tracked file, sorted by name.
type Fingerprint = Vec<(PathBuf, u64, SystemTime)>;

fn fingerprint(loader: &RecordLoader) -> Fingerprint {
    loader.tracked_files()
}

/// Spawn the watch loop. The returned handle is aborted on shutdown;
/// the task holds no state worth draining.
pub fn spawn_watcher(
    loader: Arc<RecordLoader>,
    cache: Arc<FreshnessCache>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last = fingerprint(&loader);
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it, the baseline above
        // already covers it.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let scan_loader = Arc::clone(&loader);
            let current = match tokio::task::spawn_blocking(move || fingerprint(&scan_loader)).await
            {
                Ok(fp) => fp,
                Err(err) => {
                    warn!("watch scan failed: {err}");
                    continue;
                }
            };
            if current != last {
                debug!(
                    files = current.len(),
                    "data directory changed, invalidating cache"
                );
                cache.invalidate().await;
                last = current;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{CachePolicy, QueryKey};
    use crate::store::loader::LoadConfig;
    use std::fs;
    use tempfile::TempDir;

    fn loader_for(dir: &TempDir) -> Arc<RecordLoader> {
        Arc::new(RecordLoader::new(LoadConfig {
            data_dir: dir.path().to_path_buf(),
            ..LoadConfig::default()
        }))
    }

    #[test]
    fn test_fingerprint_reflects_new_files() {
        let dir = TempDir::new().unwrap();
        let loader = loader_for(&dir);

        let before = fingerprint(&loader);
        fs::write(dir.path().join("drivers.json"), r#"{"driver_id": "D-1"}"#).unwrap();
        let after = fingerprint(&loader);

        assert_ne!(before, after);
        assert_eq!(after.len(), 1);
    }

    #[test]
    fn test_fingerprint_stable_without_changes() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("drivers.json"), r#"{"driver_id": "D-1"}"#).unwrap();
        let loader = loader_for(&dir);

        assert_eq!(fingerprint(&loader), fingerprint(&loader));
    }

    #[tokio::test]
    async fn test_watcher_invalidates_on_new_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("drivers.json"), r#"{"driver_id": "D-1"}"#).unwrap();

        let loader = loader_for(&dir);
        let cache = Arc::new(FreshnessCache::new(
            Arc::clone(&loader),
            CachePolicy::default(),
        ));

        let first = cache.get(QueryKey::Stats).await.unwrap();
        assert_eq!(first.view.snapshot.drivers.count, 1);

        let handle = spawn_watcher(
            Arc::clone(&loader),
            Arc::clone(&cache),
            Duration::from_millis(10),
        );

        fs::write(dir.path().join("drivers_b.json"), r#"{"driver_id": "D-2"}"#).unwrap();
        // A few intervals is plenty for the fingerprint to change.
        tokio::time::sleep(Duration::from_millis(100)).await;

        let second = cache.get(QueryKey::Stats).await.unwrap();
        assert_eq!(second.view.snapshot.drivers.count, 2);

        handle.abort();
    }
}
