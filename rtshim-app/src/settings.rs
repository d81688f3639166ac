//! Persistent demo settings (JSON file in the user data directory).

use std::fs;
use std::path::{Path, PathBuf};

use rtshim_core::{shim::error_channel::MIN_ERROR_CAPACITY, ShimConfig};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Shim rings are clamped to this many frames.
const MAX_RING_FRAMES: usize = 1 << 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    pub preferred_output_device: Option<String>,
    pub left_hz: f32,
    pub right_hz: f32,
    pub amplitude: f32,
    pub seconds: f32,
    pub shim: ShimConfig,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            preferred_output_device: None,
            left_hz: 100.0,
            right_hz: 150.0,
            amplitude: 0.5,
            seconds: 5.0,
            shim: ShimConfig::playback(2),
        }
    }
}

impl AppSettings {
    pub fn normalize(&mut self) {
        self.left_hz = normalize_frequency(self.left_hz, 100.0);
        self.right_hz = normalize_frequency(self.right_hz, 150.0);
        self.amplitude = if self.amplitude.is_finite() {
            self.amplitude.clamp(0.0, 1.0)
        } else {
            0.5
        };
        self.seconds = if self.seconds.is_finite() {
            self.seconds.clamp(0.1, 3600.0)
        } else {
            5.0
        };
        self.preferred_output_device = self
            .preferred_output_device
            .as_ref()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        // the demo is a stereo, playback-only stream
        self.shim.input_channels = 0;
        self.shim.output_channels = 2;
        self.shim.output_capacity = self.shim.output_capacity.clamp(64, MAX_RING_FRAMES);
        self.shim.error_capacity = self.shim.error_capacity.max(MIN_ERROR_CAPACITY);
        self.shim.sync = false;
    }
}

fn normalize_frequency(raw: f32, fallback: f32) -> f32 {
    if raw.is_finite() {
        raw.clamp(1.0, 20_000.0)
    } else {
        fallback
    }
}

pub fn default_settings_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rtshim")
            .join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".config")
            })
            .join("rtshim")
            .join("settings.json")
    }
}

/// Load and normalize settings. A missing file yields defaults; a malformed
/// one is reported and also yields defaults.
pub fn load_settings(path: &Path) -> AppSettings {
    let mut settings = match fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str::<AppSettings>(&raw).unwrap_or_else(|e| {
            warn!(path = %path.display(), "ignoring malformed settings: {e}");
            AppSettings::default()
        }),
        Err(_) => AppSettings::default(),
    };
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("rtshim-settings-{}-{name}", std::process::id()))
            .join("settings.json")
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let settings: AppSettings =
            serde_json::from_str(r#"{ "leftHz": 440.0, "shim": { "outputCapacity": 1024 } }"#)
                .unwrap();
        assert_eq!(settings.left_hz, 440.0);
        assert_eq!(settings.right_hz, 150.0);
        assert_eq!(settings.shim.output_capacity, 1024);
        assert_eq!(settings.shim.error_capacity, ShimConfig::default().error_capacity);
    }

    #[test]
    fn normalize_clamps_and_forces_playback_layout() {
        let mut settings = AppSettings {
            preferred_output_device: Some("   ".into()),
            left_hz: f32::NAN,
            right_hz: 90_000.0,
            amplitude: 3.0,
            seconds: 0.0,
            shim: ShimConfig {
                input_channels: 2,
                output_channels: 6,
                error_capacity: 1,
                sync: true,
                ..ShimConfig::default()
            },
        };
        settings.normalize();

        assert_eq!(settings.preferred_output_device, None);
        assert_eq!(settings.left_hz, 100.0);
        assert_eq!(settings.right_hz, 20_000.0);
        assert_eq!(settings.amplitude, 1.0);
        assert_eq!(settings.seconds, 0.1);
        assert_eq!(settings.shim.input_channels, 0);
        assert_eq!(settings.shim.output_channels, 2);
        assert_eq!(settings.shim.error_capacity, MIN_ERROR_CAPACITY);
        assert!(!settings.shim.sync);
        assert!(settings.shim.validate().is_ok());
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let path = temp_path("malformed");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();

        let settings = load_settings(&path);
        assert_eq!(settings.left_hz, 100.0);
        assert_eq!(settings.shim.output_channels, 2);

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn saved_settings_load_back() {
        let path = temp_path("saved");
        let settings = AppSettings {
            right_hz: 220.0,
            preferred_output_device: Some("Studio Monitors".into()),
            ..AppSettings::default()
        };
        save_settings(&path, &settings).unwrap();

        let loaded = load_settings(&path);
        assert_eq!(loaded.right_hz, 220.0);
        assert_eq!(loaded.preferred_output_device.as_deref(), Some("Studio Monitors"));

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
