//! Settings management

use crate::{Result, ServiceError, PREFS_NAME};
use nodekit_core::Backpressure;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Host settings. Every field has a default, so partial files are fine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub storage: StorageSettings,
    pub assets: AssetSettings,
    pub runtime: RuntimeSettings,
    pub network: NetworkSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// App-private writable directory.
    pub files_dir: PathBuf,
    pub prefs_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetSettings {
    /// Directory holding the read-only bundled assets.
    pub bundle_dir: PathBuf,
    /// Asset folder copied into `files_dir`, and its name there.
    pub project: String,
    pub entry: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    pub callback_capacity: usize,
    pub backpressure: Backpressure,
    pub tick_interval_ms: u64,
    /// Stop the counter after this many ticks. `None` runs until release.
    pub tick_limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    pub probe_url: String,
    pub timeout_ms: Option<u64>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            files_dir: PathBuf::from("nodekit-data"),
            prefs_name: PREFS_NAME.to_string(),
        }
    }
}

impl Default for AssetSettings {
    fn default() -> Self {
        Self {
            bundle_dir: PathBuf::from("assets"),
            project: "deps".to_string(),
            entry: "main.js".to_string(),
        }
    }
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            callback_capacity: 64,
            backpressure: Backpressure::Block,
            tick_interval_ms: 1000,
            tick_limit: None,
        }
    }
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            probe_url: "http://localhost:3000/".to_string(),
            timeout_ms: None,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| ServiceError::io(path, e))?;
        let settings = serde_json::from_str(&raw).map_err(|e| ServiceError::json(path, e))?;
        tracing::debug!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }

    /// Load `path` if given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Where the bundled project lives once deployed.
    pub fn project_dir(&self) -> PathBuf {
        self.storage.files_dir.join(&self.assets.project)
    }

    pub fn entry_script(&self) -> PathBuf {
        self.project_dir().join(&self.assets.entry)
    }

    /// Command line handed to the runtime: `node <project>/<entry>`.
    pub fn node_args(&self) -> Vec<String> {
        vec![
            "node".to_string(),
            self.entry_script().to_string_lossy().into_owned(),
        ]
    }
}

impl RuntimeSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl NetworkSettings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_platform_layout() {
        let settings = Settings::default();
        assert_eq!(settings.storage.prefs_name, "PREFS");
        assert_eq!(settings.network.probe_url, "http://localhost:3000/");
        assert_eq!(
            settings.node_args(),
            vec![
                "node".to_string(),
                Path::new("nodekit-data")
                    .join("deps")
                    .join("main.js")
                    .to_string_lossy()
                    .into_owned(),
            ]
        );
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodekit.json");
        std::fs::write(
            &path,
            r#"{ "runtime": { "tick_limit": 3, "backpressure": "drop_newest" } }"#,
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.runtime.tick_limit, Some(3));
        assert_eq!(settings.runtime.backpressure, Backpressure::DropNewest);
        assert_eq!(settings.runtime.callback_capacity, 64);
        assert_eq!(settings.assets.project, "deps");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ServiceError::Io { .. }));
    }
}
