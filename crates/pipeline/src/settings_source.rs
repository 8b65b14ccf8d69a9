//! Where normalization settings come from.
//!
//! Settings are read fresh for every submission so an edit to the settings
//! file applies to the next drawing without a restart. The settings JSON
//! file is the single authoritative source; submissions cannot override it.

use std::path::PathBuf;

use async_trait::async_trait;
use doodlewall_core::settings::NormalizeSettings;

#[async_trait]
pub trait SettingsSource: Send + Sync {
    /// Current settings. Never fails: unreadable sources yield defaults.
    async fn current(&self) -> NormalizeSettings;
}

/// Reads `resize_width` / `resize_height` / `image_quality` from a JSON
/// file on every call.
pub struct JsonFileSettings {
    path: PathBuf,
}

impl JsonFileSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SettingsSource for JsonFileSettings {
    async fn current(&self) -> NormalizeSettings {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Settings file unreadable, using defaults"
                );
                return NormalizeSettings::default();
            }
        };

        let settings: NormalizeSettings = match serde_json::from_str(&text) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Settings file is not valid JSON, using defaults"
                );
                return NormalizeSettings::default();
            }
        };

        if let Err(e) = settings.validate() {
            tracing::warn!(error = %e, "Settings out of range, using defaults");
            return NormalizeSettings::default();
        }
        settings
    }
}

/// A constant settings source.
pub struct FixedSettings(pub NormalizeSettings);

#[async_trait]
impl SettingsSource for FixedSettings {
    async fn current(&self) -> NormalizeSettings {
        self.0
    }
}
