//! Private key-value preferences
//!
//! One JSON object per store, kept at `<files_dir>/shared_prefs/<name>.json`.
//! Reads never fail: a missing or unreadable store behaves as empty.

use crate::{Result, ServiceError};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

pub struct Preferences {
    path: PathBuf,
    values: Map<String, Value>,
}

impl Preferences {
    pub fn open(files_dir: &Path, name: &str) -> Self {
        let path = files_dir.join("shared_prefs").join(format!("{name}.json"));
        let values = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<Map<String, Value>>(&raw) {
                Ok(values) => values,
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "Discarding corrupt preferences");
                    Map::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "Cannot read preferences");
                Map::new()
            }
        };
        Self { path, values }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_i64(&self, key: &str, default: i64) -> i64 {
        self.values
            .get(key)
            .and_then(Value::as_i64)
            .unwrap_or(default)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn edit(&mut self) -> Editor<'_> {
        Editor {
            prefs: self,
            pending: Vec::new(),
        }
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ServiceError::io(parent, e))?;
        }
        let raw = serde_json::to_string_pretty(&self.values)
            .map_err(|e| ServiceError::json(&self.path, e))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, raw).map_err(|e| ServiceError::io(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| ServiceError::io(&self.path, e))
    }
}

/// Batched writes, committed by [`Editor::apply`].
pub struct Editor<'a> {
    prefs: &'a mut Preferences,
    pending: Vec<(String, Value)>,
}

impl Editor<'_> {
    pub fn put_i64(mut self, key: &str, value: i64) -> Self {
        self.pending.push((key.to_string(), Value::from(value)));
        self
    }

    pub fn apply(self) -> Result<()> {
        for (key, value) in self.pending {
            self.prefs.values.insert(key, value);
        }
        self.prefs.persist()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LAST_UPDATE_TIME;

    #[test]
    fn test_missing_store_reads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = Preferences::open(dir.path(), "PREFS");
        assert_eq!(prefs.get_i64(LAST_UPDATE_TIME, 0), 0);
        assert!(!prefs.contains(LAST_UPDATE_TIME));
    }

    #[test]
    fn test_apply_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let mut prefs = Preferences::open(dir.path(), "PREFS");
        prefs
            .edit()
            .put_i64(LAST_UPDATE_TIME, 1_700_000_000)
            .apply()
            .unwrap();

        let reopened = Preferences::open(dir.path(), "PREFS");
        assert_eq!(reopened.get_i64(LAST_UPDATE_TIME, 0), 1_700_000_000);
        assert!(reopened.path().ends_with("shared_prefs/PREFS.json"));
    }

    #[test]
    fn test_corrupt_store_behaves_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let prefs_dir = dir.path().join("shared_prefs");
        std::fs::create_dir_all(&prefs_dir).unwrap();
        std::fs::write(prefs_dir.join("PREFS.json"), "{ not json").unwrap();

        let prefs = Preferences::open(dir.path(), "PREFS");
        assert_eq!(prefs.get_i64(LAST_UPDATE_TIME, 7), 7);
    }
}
