//! Application settings
//!
//! Persisted as YAML at `~/.config/dmlink/settings.yaml` (platform config
//! dir). The console tables themselves are CSV files in `data_dir`.

use anyhow::{Context, Result};
use dmlink_midi::{DisplayMode, MIDI_LOG_FILE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings for the dmlink binary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Layout used for stereo pairs
    pub stereo_display_mode: DisplayMode,
    /// Last opened input port (full name as reported by the driver)
    pub midi_in_port: Option<String>,
    /// Last opened output port
    pub midi_out_port: Option<String>,
    /// Re-open the remembered ports on startup
    pub remember_ports: bool,
    /// Directory holding the CSV tables
    pub data_dir: PathBuf,
    /// MIDI monitor log file, relative paths resolve against `data_dir`
    pub midi_log_file: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            stereo_display_mode: DisplayMode::default(),
            midi_in_port: None,
            midi_out_port: None,
            remember_ports: true,
            data_dir: PathBuf::from("."),
            midi_log_file: PathBuf::from(MIDI_LOG_FILE),
        }
    }
}

impl Settings {
    /// Absolute or data-dir relative path of the monitor log
    pub fn midi_log_path(&self) -> PathBuf {
        if self.midi_log_file.is_absolute() {
            self.midi_log_file.clone()
        } else {
            self.data_dir.join(&self.midi_log_file)
        }
    }
}

/// Get the default settings file path
///
/// Returns `~/.config/dmlink/settings.yaml` (or platform equivalent)
pub fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join("dmlink")
        .join("settings.yaml")
}

/// Load settings from a YAML file
///
/// A missing file yields defaults. An unreadable or invalid file is logged
/// and also yields defaults.
pub fn load_settings(path: &Path) -> Settings {
    log::info!("load_settings: Loading from {:?}", path);

    if !path.exists() {
        log::info!("load_settings: Settings file doesn't exist, using defaults");
        return Settings::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<Settings>(&contents) {
            Ok(settings) => {
                log::info!(
                    "load_settings: Loaded settings - display mode: {}, data dir: {:?}",
                    settings.stereo_display_mode,
                    settings.data_dir
                );
                settings
            }
            Err(e) => {
                log::warn!("load_settings: Failed to parse settings: {}, using defaults", e);
                Settings::default()
            }
        },
        Err(e) => {
            log::warn!(
                "load_settings: Failed to read settings file: {}, using defaults",
                e
            );
            Settings::default()
        }
    }
}

/// Save settings to a YAML file, creating parent directories
pub fn save_settings(settings: &Settings, path: &Path) -> Result<()> {
    log::info!("save_settings: Saving to {:?}", path);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create settings directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(settings).context("Failed to serialize settings to YAML")?;

    std::fs::write(path, yaml)
        .with_context(|| format!("Failed to write settings file: {:?}", path))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.stereo_display_mode, DisplayMode::LinkedPair);
        assert!(settings.remember_ports);
        assert_eq!(settings.midi_log_path(), PathBuf::from(".").join(MIDI_LOG_FILE));
    }

    #[test]
    fn test_yaml_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.yaml");

        let settings = Settings {
            stereo_display_mode: DisplayMode::WideCombined,
            midi_in_port: Some("DM-4800:DM-4800 MIDI 1 28:0".to_string()),
            midi_out_port: None,
            remember_ports: false,
            data_dir: PathBuf::from("/srv/dm4800"),
            midi_log_file: PathBuf::from("/var/log/dm.txt"),
        };
        save_settings(&settings, &path).unwrap();

        assert_eq!(load_settings(&path), settings);
        assert_eq!(settings.midi_log_path(), PathBuf::from("/var/log/dm.txt"));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let settings: Settings = serde_yaml::from_str("stereo_display_mode: wide_combined\n").unwrap();
        assert_eq!(settings.stereo_display_mode, DisplayMode::WideCombined);
        assert!(settings.remember_ports);
        assert_eq!(settings.midi_in_port, None);
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(&path, "stereo_display_mode: [not, a, mode]").unwrap();
        assert_eq!(load_settings(&path), Settings::default());

        assert_eq!(load_settings(&dir.path().join("absent.yaml")), Settings::default());
    }
}
