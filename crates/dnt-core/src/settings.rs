//! Persisted user settings.
//!
//! A flat JSON document that survives process restarts. The core only reads
//! the background-task trigger selection; the remaining keys are carried for
//! the host.

use crate::error::{DntError, DntResult};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "dnt";
const SETTINGS_FILE: &str = "settings.json";

/// User settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Mirror action logs into a file under the data directory.
    #[serde(default)]
    pub file_logging: bool,
    /// Check for a newer release on startup.
    #[serde(default)]
    pub startup_update_check: bool,
    /// Index of the selected self-task trigger (0 = at logon).
    #[serde(default)]
    pub background_task_trigger: i32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            file_logging: false,
            startup_update_check: false,
            background_task_trigger: 0,
        }
    }
}

/// Loads and saves [`Settings`] at a fixed path.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<config dir>/dnt/settings.json`.
    pub fn default_location() -> DntResult<Self> {
        let base = dirs::config_dir()
            .ok_or_else(|| DntError::settings("Could not resolve the user config directory"))?;
        Ok(Self::new(base.join(APP_DIR).join(SETTINGS_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read settings; a missing file yields defaults.
    pub fn load(&self) -> DntResult<Settings> {
        if !self.path.exists() {
            debug!("No settings at {}, using defaults", self.path.display());
            return Ok(Settings::default());
        }
        let raw = fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(Settings::default());
        }
        serde_json::from_str(&raw).map_err(|e| {
            DntError::settings(format!(
                "Failed to parse settings at {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    /// Write settings via a temp file and rename.
    pub fn save(&self, settings: &Settings) -> DntResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(settings)
            .map_err(|e| DntError::settings(format!("Failed to serialize settings: {}", e)))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        info!("Settings saved to {}", self.path.display());
        Ok(())
    }

    /// Load, apply `f`, save, and return the updated settings.
    pub fn update<F>(&self, f: F) -> DntResult<Settings>
    where
        F: FnOnce(&mut Settings),
    {
        let mut settings = self.load()?;
        f(&mut settings);
        self.save(&settings)?;
        Ok(settings)
    }
}

/// Directory for log files: `<data dir>/dnt`.
pub fn data_dir() -> DntResult<PathBuf> {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR))
        .ok_or_else(|| DntError::settings("Could not resolve the local data directory"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DntErrorKind;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"));
        assert_eq!(store.load().unwrap(), Settings::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("nested").join("settings.json"));
        let settings = Settings {
            file_logging: true,
            startup_update_check: false,
            background_task_trigger: 2,
        };
        store.save(&settings).unwrap();
        assert_eq!(store.load().unwrap(), settings);
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"backgroundTaskTrigger": 1}"#).unwrap();
        let settings = SettingsStore::new(&path).load().unwrap();
        assert_eq!(settings.background_task_trigger, 1);
        assert!(!settings.file_logging);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = SettingsStore::new(&path).load().unwrap_err();
        assert_eq!(err.kind, DntErrorKind::Settings);
    }

    #[test]
    fn test_update() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"));
        let updated = store.update(|s| s.file_logging = true).unwrap();
        assert!(updated.file_logging);
        assert!(store.load().unwrap().file_logging);
    }
}
