//! Record discovery and tolerant loading from the stream directory.
//!
//! A scan never fails as a whole: one malformed, oversized, or
//! unreadable file degrades coverage (counted and logged), not
//! availability. Re-running the loader over an unchanged directory
//! reconstructs the same record set.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

use crate::models::{EntityKind, RecordSet};
use crate::normalize;

/// Configuration for loading the stream directory.
#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// Directory holding the append-only record files.
    pub data_dir: PathBuf,
    /// File-name prefixes per entity kind (e.g. "drivers" matches
    /// `drivers.json` and `drivers_*.json`).
    pub driver_prefix: String,
    pub shipment_prefix: String,
    pub invoice_prefix: String,
    pub vehicle_prefix: String,
    /// Files above this size are skipped.
    pub max_file_size: u64,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/streams"),
            driver_prefix: "drivers".to_string(),
            shipment_prefix: "shipments".to_string(),
            invoice_prefix: "invoices".to_string(),
            vehicle_prefix: "vehicles".to_string(),
            max_file_size: 1024 * 1024, // 1MB
        }
    }
}

impl LoadConfig {
    /// The file-name prefix for one kind.
    pub fn prefix(&self, kind: EntityKind) -> &str {
        match kind {
            EntityKind::Driver => &self.driver_prefix,
            EntityKind::Shipment => &self.shipment_prefix,
            EntityKind::Invoice => &self.invoice_prefix,
            EntityKind::Vehicle => &self.vehicle_prefix,
        }
    }
}

impl From<&crate::config::StoreConfig> for LoadConfig {
    fn from(config: &crate::config::StoreConfig) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            driver_prefix: config.driver_prefix.clone(),
            shipment_prefix: config.shipment_prefix.clone(),
            invoice_prefix: config.invoice_prefix.clone(),
            vehicle_prefix: config.vehicle_prefix.clone(),
            max_file_size: config.max_file_size,
        }
    }
}

/// Result of one full directory scan.
#[derive(Debug, Clone, Default)]
pub struct LoadOutcome {
    /// All successfully normalized records, last-write-wins per id.
    pub records: RecordSet,
    /// Files that contributed at least one record.
    pub files_read: usize,
    /// Files skipped due to read/parse/normalize failure or size.
    pub files_skipped: usize,
}

/// Loads the current record set from the watched directory.
pub struct RecordLoader {
    config: LoadConfig,
}

impl RecordLoader {
    pub fn new(config: LoadConfig) -> Self {
        Self { config }
    }

    /// Scan the directory and rebuild the record set.
    ///
    /// Read-only and infallible by contract: a missing directory or a
    /// failing file yields a smaller set, never an error.
    pub fn load(&self) -> LoadOutcome {
        let mut outcome = LoadOutcome::default();

        for (path, kind) in self.matching_files() {
            self.load_file(&path, kind, &mut outcome);
        }

        debug!(
            files_read = outcome.files_read,
            files_skipped = outcome.files_skipped,
            records = outcome.records.total(),
            "directory scan complete"
        );

        outcome
    }

    /// Files currently tracked by the loader, with their metadata.
    /// Used by the directory watcher to fingerprint the directory and
    /// by the health endpoint to report the tracked-file count.
    pub fn tracked_files(&self) -> Vec<(PathBuf, u64, SystemTime)> {
        let mut files: Vec<(PathBuf, u64, SystemTime)> = self
            .matching_files()
            .into_iter()
            .filter_map(|(path, _)| {
                let meta = fs::metadata(&path).ok()?;
                let mtime = meta.modified().ok()?;
                Some((path, meta.len(), mtime))
            })
            .collect();

        files.sort();
        files
    }

    /// Every `.json` file in the data dir matching a kind prefix.
    fn matching_files(&self) -> Vec<(PathBuf, EntityKind)> {
        let entries = match fs::read_dir(&self.config.data_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    "cannot read data directory {}: {}",
                    self.config.data_dir.display(),
                    e
                );
                return Vec::new();
            }
        };

        let mut files = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(kind) = self.kind_for(&name) {
                files.push((path, kind));
            }
        }

        // Deterministic processing order regardless of readdir order.
        files.sort();
        files
    }

    /// Match a file name against the per-kind prefixes.
    fn kind_for(&self, file_name: &str) -> Option<EntityKind> {
        if !file_name.ends_with(".json") || file_name.starts_with('.') {
            return None;
        }
        EntityKind::ALL
            .into_iter()
            .find(|kind| file_name.starts_with(self.config.prefix(*kind)))
    }

    /// Load one file into the outcome, skipping on any failure.
    fn load_file(&self, path: &Path, kind: EntityKind, outcome: &mut LoadOutcome) {
        let meta = match fs::metadata(path) {
            Ok(meta) => meta,
            Err(e) => {
                warn!("skipping {}: {}", path.display(), e);
                outcome.files_skipped += 1;
                return;
            }
        };

        if meta.len() > self.config.max_file_size {
            warn!(
                "skipping {}: {} bytes exceeds limit",
                path.display(),
                meta.len()
            );
            outcome.files_skipped += 1;
            return;
        }

        let mtime: DateTime<Utc> = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        // Transient read errors (e.g. a concurrent writer) skip the file;
        // the next scan will pick it up.
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!("skipping {}: {}", path.display(), e);
                outcome.files_skipped += 1;
                return;
            }
        };

        let value: Value = match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(e) => {
                warn!("skipping {}: invalid JSON: {}", path.display(), e);
                outcome.files_skipped += 1;
                return;
            }
        };

        // A file is either a single object or an array of objects.
        let items: Vec<&Value> = match &value {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };

        let mut loaded = 0usize;
        for item in items {
            match normalize::normalize(kind, item, path, mtime) {
                Ok(record) => {
                    outcome.records.insert(record);
                    loaded += 1;
                }
                Err(e) => {
                    warn!("rejecting entry in {}: {}", path.display(), e);
                }
            }
        }

        if loaded > 0 {
            outcome.files_read += 1;
        } else {
            outcome.files_skipped += 1;
        }
    }
}
