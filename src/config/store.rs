//! Settings persistence and the single mutation path
//!
//! `SettingsStore` caches the validated settings and is owned by the
//! controller. All writes go through `update`/`reset` so every persisted
//! document has passed validation.

use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::config::merge::{deep_merge, validate};
use crate::config::settings::Settings;
use crate::constants::paths;

/// Default settings file location (`~/.config/keypet/settings.json`)
pub fn default_settings_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(paths::APP_DIR);
    path.push(paths::SETTINGS_FILE);
    path
}

/// Read and validate settings; missing or unreadable files yield defaults
pub fn load_settings(path: &Path) -> Settings {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "No settings file found, using defaults");
            return Settings::default();
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to read settings file, using defaults");
            return Settings::default();
        }
    };

    match serde_json::from_str::<Value>(&contents) {
        Ok(value) => {
            info!(path = %path.display(), "Loaded settings");
            validate(&value)
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to parse settings file, using defaults");
            Settings::default()
        }
    }
}

/// Write settings as pretty-printed JSON, replacing the file atomically
pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create settings directory {}", parent.display()))?;
    }

    let json = serde_json::to_string_pretty(settings).context("Failed to serialize settings to JSON")?;

    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, json)
        .with_context(|| format!("Failed to write settings to {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("Failed to move settings into place at {}", path.display()))?;

    info!(path = %path.display(), "Saved settings");
    Ok(())
}

/// Cached, validated settings backed by a JSON file
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    cache: Option<Settings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path, cache: None }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current settings, loading from disk on first access
    pub fn get_all(&mut self) -> Settings {
        self.cached().clone()
    }

    fn cached(&mut self) -> &Settings {
        let path = &self.path;
        self.cache.get_or_insert_with(|| load_settings(path))
    }

    /// Deep-merge `partial` into the current settings, validate and persist.
    ///
    /// If the write fails the previous settings stay in effect.
    pub fn update(&mut self, partial: &Value) -> Result<Settings> {
        let mut document = serde_json::to_value(self.cached())
            .context("Failed to serialize current settings")?;
        if !partial.is_object() {
            warn!(partial = %partial, "Ignoring non-object settings update");
        } else {
            deep_merge(&mut document, partial);
        }

        let settings = validate(&document);
        save_settings(&self.path, &settings)
            .context("Failed to persist updated settings")?;
        self.cache = Some(settings.clone());
        Ok(settings)
    }

    /// Replace cache and file with the hardcoded defaults
    pub fn reset(&mut self) -> Result<Settings> {
        let defaults = Settings::default();
        self.cache = Some(defaults.clone());
        save_settings(&self.path, &defaults).context("Failed to persist default settings")?;
        info!("Settings reset to defaults");
        Ok(defaults)
    }

    /// Restore default position and scale, keeping everything else
    pub fn reset_position(&mut self) -> Result<Settings> {
        let defaults = Settings::default();
        self.update(&json!({
            "position": defaults.position,
            "size": defaults.size,
        }))
    }

    /// Pin the overlay at explicit coordinates (free mode)
    pub fn set_free_position(&mut self, x: i32, y: i32) -> Result<Settings> {
        self.update(&json!({"position": {"mode": "free", "x": x, "y": y}}))
    }

    /// Drop the cache so the next read goes back to disk
    #[cfg(test)]
    pub fn invalidate(&mut self) {
        self.cache = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::{PositionMode, Preset};

    fn temp_settings_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("keypet-test-{}-{}", std::process::id(), name));
        let _ = fs::remove_dir_all(&dir);
        dir.join(paths::SETTINGS_FILE)
    }

    #[test]
    fn test_get_all_missing_file_returns_defaults() {
        let mut store = SettingsStore::new(temp_settings_path("missing"));
        assert_eq!(store.get_all(), Settings::default());
    }

    #[test]
    fn test_get_all_corrupt_file_returns_defaults() {
        let path = temp_settings_path("corrupt");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();

        let mut store = SettingsStore::new(path);
        assert_eq!(store.get_all(), Settings::default());
    }

    #[test]
    fn test_partial_file_merged_with_defaults() {
        let path = temp_settings_path("partial");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, r#"{"window": {"width": 200}, "locked": true}"#).unwrap();

        let settings = load_settings(&path);
        assert_eq!(settings.window.width, 200);
        assert_eq!(settings.window.height, 128);
        assert!(settings.locked);
    }

    #[test]
    fn test_update_merges_instead_of_replacing() {
        let mut store = SettingsStore::new(temp_settings_path("merge"));
        let before = store.get_all();

        store.update(&json!({"opacity": 0.5})).unwrap();
        let after = store.get_all();

        assert_eq!(after.opacity, 0.5);
        let mut expected = before;
        expected.opacity = 0.5;
        assert_eq!(after, expected);
    }

    #[test]
    fn test_update_persists_to_disk() {
        let path = temp_settings_path("persist");
        let mut store = SettingsStore::new(path.clone());
        store.update(&json!({"window": {"paddingFromEdge": 4}})).unwrap();

        store.invalidate();
        assert_eq!(store.get_all().window.padding_from_edge, 4);
        assert_eq!(load_settings(&path).window.padding_from_edge, 4);
    }

    #[test]
    fn test_update_then_reset_returns_defaults() {
        let mut store = SettingsStore::new(temp_settings_path("reset"));
        store.update(&json!({"position": {"mode": "free", "x": 10, "y": 20}})).unwrap();
        assert_eq!(store.get_all().position.mode, PositionMode::Free);

        store.reset().unwrap();
        let settings = store.get_all();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.position.mode, PositionMode::Preset);
        assert_eq!(settings.position.preset, Preset::BottomCenter);

        store.invalidate();
        assert_eq!(store.get_all(), Settings::default());
    }

    #[test]
    fn test_update_failure_keeps_previous_settings() {
        // A directory where the settings file should be makes the rename fail
        let path = temp_settings_path("unwritable");
        fs::create_dir_all(&path).unwrap();

        let mut store = SettingsStore::new(path);
        let before = store.get_all();
        assert!(store.update(&json!({"opacity": 0.3})).is_err());
        assert_eq!(store.get_all(), before);
    }

    #[test]
    fn test_save_load_roundtrip_matches_validate() {
        let path = temp_settings_path("roundtrip");
        let mut settings = Settings::default();
        settings.size.scale = 1.75;
        settings.position.mode = PositionMode::Free;
        settings.position.x = -12;
        settings.character_packs.custom.hit_both = Some("both.png".to_string());

        save_settings(&path, &settings).unwrap();
        let loaded = load_settings(&path);
        assert_eq!(loaded, validate(&serde_json::to_value(&settings).unwrap()));
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_reset_position_keeps_other_fields() {
        let mut store = SettingsStore::new(temp_settings_path("reset-position"));
        store
            .update(&json!({"position": {"mode": "free", "x": 5, "y": 6}, "size": {"scale": 2.0}, "opacity": 0.4}))
            .unwrap();

        let settings = store.reset_position().unwrap();
        assert_eq!(settings.position, Settings::default().position);
        assert_eq!(settings.size, Settings::default().size);
        assert_eq!(settings.opacity, 0.4);
    }

    #[test]
    fn test_set_free_position() {
        let mut store = SettingsStore::new(temp_settings_path("free"));
        let settings = store.set_free_position(300, -20).unwrap();
        assert_eq!(settings.position.mode, PositionMode::Free);
        assert_eq!((settings.position.x, settings.position.y), (300, -20));
    }
}
