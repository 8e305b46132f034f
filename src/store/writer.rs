//! Append-only record mutations.
//!
//! Every mutation becomes one new file in the watched directory. Writes
//! go to a temp file in the same directory and are renamed into place,
//! so a concurrent scan never observes a half-written file. Existing
//! files are never overwritten.

use chrono::Utc;
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use tracing::info;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::{EntityKind, Record};
use crate::normalize;
use crate::store::loader::LoadConfig;

/// Writes new records into the watched directory.
pub struct RecordWriter {
    config: LoadConfig,
}

impl RecordWriter {
    pub fn new(config: LoadConfig) -> Self {
        Self { config }
    }

    /// Persist a (possibly partial) record body as a new stream file.
    ///
    /// Fills in a fresh identity and an ingestion timestamp when the
    /// caller omits them, validates the body through the normalizer,
    /// and returns the canonical record plus the path written.
    pub fn write(&self, kind: EntityKind, body: Value) -> EngineResult<(Record, PathBuf)> {
        let mut obj = match body {
            Value::Object(obj) => obj,
            other => {
                return Err(EngineError::malformed(format!(
                    "{} record body must be a JSON object, got {}",
                    kind,
                    json_type(&other)
                )))
            }
        };

        let token = Uuid::new_v4().simple().to_string();

        let has_identity = [kind.identity_field(), "id"]
            .iter()
            .any(|key| matches!(obj.get(*key), Some(Value::String(s)) if !s.is_empty()));
        if !has_identity {
            obj.insert(
                kind.identity_field().to_string(),
                Value::String(format!("{}-{}", kind.id_prefix(), &token[..8])),
            );
        }

        let now = Utc::now();
        if !obj.contains_key("timestamp") && !obj.contains_key("ingested_at") {
            obj.insert("timestamp".to_string(), Value::String(now.to_rfc3339()));
        }

        let raw = Value::Object(obj);
        let file_name = format!("{}_{}.json", self.config.prefix(kind), token);
        let path = self.config.data_dir.join(&file_name);

        // Validate before touching the filesystem; a body the loader
        // would reject must not land in the stream.
        let record = normalize::normalize(kind, &raw, &path, now)?;

        fs::create_dir_all(&self.config.data_dir).map_err(|e| {
            EngineError::write_failure(format!(
                "cannot create {}: {}",
                self.config.data_dir.display(),
                e
            ))
        })?;

        let mut tmp = NamedTempFile::new_in(&self.config.data_dir)
            .map_err(|e| EngineError::write_failure(format!("cannot create temp file: {}", e)))?;

        let content = serde_json::to_string_pretty(&raw)
            .map_err(|e| EngineError::write_failure(format!("cannot serialize record: {}", e)))?;
        tmp.write_all(content.as_bytes())
            .map_err(|e| EngineError::write_failure(format!("cannot write record: {}", e)))?;

        // Fresh uuid file names make collisions practically impossible,
        // but the store is append-only, so refuse to clobber regardless.
        tmp.persist_noclobber(&path)
            .map_err(|e| EngineError::write_failure(format!("cannot persist record file: {}", e)))?;

        info!("wrote {} record {} to {}", kind, record.id, path.display());
        Ok((record, path))
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordBody;
    use crate::store::loader::RecordLoader;
    use serde_json::json;
    use tempfile::TempDir;

    fn config_for(dir: &TempDir) -> LoadConfig {
        LoadConfig {
            data_dir: dir.path().to_path_buf(),
            ..LoadConfig::default()
        }
    }

    #[test]
    fn test_write_assigns_identity_and_is_loadable() {
        let dir = TempDir::new().unwrap();
        let writer = RecordWriter::new(config_for(&dir));

        let (record, path) = writer
            .write(EntityKind::Driver, json!({ "safety_score": 1.5, "incidents": 5 }))
            .unwrap();

        assert!(record.id.starts_with("D-"));
        assert!(path.exists());

        let outcome = RecordLoader::new(config_for(&dir)).load();
        assert_eq!(outcome.records.count(EntityKind::Driver), 1);
        let loaded = outcome.records.of_kind(EntityKind::Driver);
        assert_eq!(loaded[0].id, record.id);
        match loaded[0].body {
            RecordBody::Driver { safety_score, .. } => assert_eq!(safety_score, 1.5),
            _ => panic!("expected driver body"),
        }
    }

    #[test]
    fn test_write_keeps_caller_identity() {
        let dir = TempDir::new().unwrap();
        let writer = RecordWriter::new(config_for(&dir));

        let (record, _) = writer
            .write(EntityKind::Invoice, json!({ "invoice_id": "INV-777", "amount": 100 }))
            .unwrap();
        assert_eq!(record.id, "INV-777");
    }

    #[test]
    fn test_each_write_creates_a_new_file() {
        let dir = TempDir::new().unwrap();
        let writer = RecordWriter::new(config_for(&dir));

        let (_, first) = writer.write(EntityKind::Driver, json!({})).unwrap();
        let (_, second) = writer.write(EntityKind::Driver, json!({})).unwrap();
        assert_ne!(first, second);
        assert!(first.exists() && second.exists());
    }

    #[test]
    fn test_non_object_body_is_malformed() {
        let dir = TempDir::new().unwrap();
        let writer = RecordWriter::new(config_for(&dir));

        let err = writer.write(EntityKind::Driver, json!([1, 2])).unwrap_err();
        assert!(matches!(err, EngineError::MalformedRecord(_)));
        // Nothing may be left behind in the stream directory.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_unwritable_directory_surfaces_write_failure() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("streams");
        fs::create_dir(&sub).unwrap();
        fs::set_permissions(&sub, fs::Permissions::from_mode(0o555)).unwrap();

        let writer = RecordWriter::new(LoadConfig {
            data_dir: sub.clone(),
            ..LoadConfig::default()
        });
        let err = writer.write(EntityKind::Driver, json!({})).unwrap_err();
        assert!(matches!(err, EngineError::WriteFailure(_)));

        fs::set_permissions(&sub, fs::Permissions::from_mode(0o755)).unwrap();
    }
}
