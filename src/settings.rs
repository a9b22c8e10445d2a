use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::alerts::AlertThresholds;
use crate::source::SourceMode;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum ColorMode {
    Light,
    #[default]
    Dark,
}

impl ColorMode {
    pub fn toggled(self) -> Self {
        match self {
            ColorMode::Light => ColorMode::Dark,
            ColorMode::Dark => ColorMode::Light,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct UserSettings {
    color_mode: ColorMode,
    source_mode: SourceMode,
    alert_thresholds: AlertThresholds,
}

/// User preferences persisted as JSON in the app data directory.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Settings at {} unreadable ({err}); using defaults", path.display());
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, UserSettings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, UserSettings> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn color_mode(&self) -> ColorMode {
        self.read().color_mode
    }

    pub fn toggle_color_mode(&self) -> Result<ColorMode> {
        let mut guard = self.write();
        guard.color_mode = guard.color_mode.toggled();
        self.persist(&guard)?;
        Ok(guard.color_mode)
    }

    pub fn source_mode(&self) -> SourceMode {
        self.read().source_mode
    }

    pub fn set_source_mode(&self, mode: SourceMode) -> Result<()> {
        let mut guard = self.write();
        guard.source_mode = mode;
        self.persist(&guard)
    }

    pub fn alert_thresholds(&self) -> AlertThresholds {
        self.read().alert_thresholds
    }

    pub fn set_alert_thresholds(&self, thresholds: AlertThresholds) -> Result<()> {
        thresholds.validate()?;
        let mut guard = self.write();
        guard.alert_thresholds = thresholds;
        self.persist(&guard)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        assert_eq!(store.color_mode(), ColorMode::Dark);
        assert_eq!(store.source_mode(), SourceMode::Cloud);
        assert_eq!(store.alert_thresholds(), AlertThresholds::default());
    }

    #[test]
    fn changes_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let store = SettingsStore::new(path.clone()).unwrap();
        assert_eq!(store.toggle_color_mode().unwrap(), ColorMode::Light);
        store.set_source_mode(SourceMode::Local).unwrap();

        let reloaded = SettingsStore::new(path).unwrap();
        assert_eq!(reloaded.color_mode(), ColorMode::Light);
        assert_eq!(reloaded.source_mode(), SourceMode::Local);
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").unwrap();

        let store = SettingsStore::new(path).unwrap();
        assert_eq!(store.color_mode(), ColorMode::Dark);
    }

    #[test]
    fn invalid_thresholds_are_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        let bad = AlertThresholds {
            temperature_min: 40.0,
            ..AlertThresholds::default()
        };
        assert!(store.set_alert_thresholds(bad).is_err());
        assert_eq!(store.alert_thresholds(), AlertThresholds::default());
    }
}
