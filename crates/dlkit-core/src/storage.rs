//! Settings persistence (`settings.json` in the data directory)

use crate::error::DlkitError;
use dlkit_types::Settings;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

const SETTINGS_FILE: &str = "settings.json";

/// Default data directory, `<platform data dir>/dlkit`
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dlkit")
}

/// Loads and saves [`Settings`]
#[derive(Debug, Clone)]
pub struct SettingsStore {
    data_dir: PathBuf,
}

impl SettingsStore {
    /// Create a store, creating the data directory if needed
    pub async fn new(data_dir: impl Into<PathBuf>) -> Result<Self, DlkitError> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir).await?;
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn path(&self) -> PathBuf {
        self.data_dir.join(SETTINGS_FILE)
    }

    /// Load settings; a missing file yields defaults
    pub async fn load(&self) -> Result<Settings, DlkitError> {
        let path = self.path();
        if !path.exists() {
            debug!("No settings at {:?}, using defaults", path);
            return Ok(Settings::default());
        }

        let content = fs::read_to_string(&path).await?;
        let settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    pub async fn save(&self, settings: &Settings) -> Result<(), DlkitError> {
        let content = serde_json::to_string_pretty(settings)?;
        fs::write(self.path(), content).await?;
        debug!("Settings saved to {:?}", self.path());
        Ok(())
    }

    /// Overwrite the stored settings with defaults
    pub async fn reset(&self) -> Result<Settings, DlkitError> {
        let settings = Settings::default();
        self.save(&settings).await?;
        Ok(settings)
    }
}

/// Read one setting by key; nested keys use dots (`notification.display_mode`)
pub fn get_setting(settings: &Settings, key: &str) -> Result<Value, DlkitError> {
    let value = serde_json::to_value(settings)?;
    value
        .pointer(&json_pointer(key))
        .cloned()
        .ok_or_else(|| DlkitError::InvalidOperation(format!("unknown setting `{}`", key)))
}

/// Return `settings` with `key` set to `raw`
///
/// `raw` is parsed as JSON first, so `5`, `true` and `null` keep their types;
/// anything else is taken as a string.
pub fn set_setting(settings: &Settings, key: &str, raw: &str) -> Result<Settings, DlkitError> {
    let mut value = serde_json::to_value(settings)?;
    let slot = value
        .pointer_mut(&json_pointer(key))
        .ok_or_else(|| DlkitError::InvalidOperation(format!("unknown setting `{}`", key)))?;
    *slot = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));

    serde_json::from_value(value)
        .map_err(|e| DlkitError::InvalidOperation(format!("invalid value for `{}`: {}", key, e)))
}

fn json_pointer(key: &str) -> String {
    format!("/{}", key.replace('.', "/"))
}
