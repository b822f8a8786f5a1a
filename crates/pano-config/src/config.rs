//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::bake::BakeOptions;
use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Capture guidance settings.
    pub capture: CaptureConfig,
    /// Compositor settings.
    pub bake: BakeOptions,
    /// Export bridge settings.
    pub export: ExportConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Capture guidance configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CaptureConfig {
    /// Angular radius within which a target is considered at all.
    pub primary_threshold_deg: f32,
    /// Tighter radius used to decide alignment.
    pub tight_threshold_deg: f32,
    /// Tight overlap above which the camera counts as aligned.
    pub aligned_overlap: f32,
    /// How long alignment must hold on one target before capture triggers.
    pub dwell_ms: u64,
    /// Session finishes once this many photos exist.
    pub total_photos: usize,
    /// Distance from the optical center at which points are placed.
    pub sampling_radius: f32,
    /// Camera pitch window (degrees either side of level) that seeds the first target.
    pub seed_pitch_window_deg: f32,
    /// Also require the camera roll to match the target before dwelling.
    pub require_roll_alignment: bool,
    /// Roll tolerance used when `require_roll_alignment` is set.
    pub roll_tolerance_deg: f32,
    /// Roll beyond which the operator is told the device is tilted.
    pub max_tilt_deg: f32,
}

/// Export bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExportConfig {
    /// Directory encoded panoramas are written to.
    pub output_dir: PathBuf,
    /// File name of the encoded panorama.
    pub file_name: String,
    /// Mirror the buffer along X before encoding.
    pub flip_horizontal: bool,
    /// Mirror the buffer along Y before encoding.
    pub flip_vertical: bool,
    /// Horizontal column rotation applied before encoding, degrees.
    pub yaw_offset_deg: f32,
    /// How long to wait for the encoder to report ready.
    pub ready_timeout_ms: u64,
    /// How long a single encode request may take.
    pub request_timeout_ms: u64,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Write the per-photo accumulation weights alongside the panorama.
    pub dump_weights: bool,
}

// --- Default implementations ---

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            primary_threshold_deg: 10.0,
            tight_threshold_deg: 3.0,
            aligned_overlap: 0.99,
            dwell_ms: 800,
            total_photos: 29,
            sampling_radius: 2.0,
            seed_pitch_window_deg: 1.0,
            require_roll_alignment: false,
            roll_tolerance_deg: 5.0,
            max_tilt_deg: 20.0,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            file_name: "panorama.png".to_string(),
            flip_horizontal: false,
            flip_vertical: false,
            yaw_offset_deg: 0.0,
            ready_timeout_ms: 10_000,
            request_timeout_ms: 120_000,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            dump_weights: false,
        }
    }
}

/// Platform config directory for this application, if the platform has one.
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("pano-stitch"))
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let ron_str =
            ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new().depth_limit(3))
                .unwrap();
        assert!(ron_str.contains("width: 4096"));
        assert!(ron_str.contains("total_photos: 29"));
        assert!(ron_str.contains("dwell_ms: 800"));
    }

    #[test]
    fn test_missing_section_uses_default() {
        let ron_str = "(capture: (), debug: ())";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config.bake, BakeOptions::default());
        assert_eq!(config.export, ExportConfig::default());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let ron_str = "(bake: (width: 1024, gamma: 2.0))";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config.bake.width, 1024);
        assert_eq!(config.bake.gamma, 2.0);
        assert_eq!(config.bake.center_bias, 1.1);
    }

    #[test]
    fn test_extra_field_ignored() {
        let result: Result<Config, _> = ron::from_str("(future_setting: true)");
        assert!(result.is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.capture.dwell_ms = 1200;
        config.export.flip_horizontal = true;
        config.bake.yaw_deg = 90.0;

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(dir.path().join("config.ron").exists());
    }

    #[test]
    fn test_reload_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let mut modified = config.clone();
        modified.capture.primary_threshold_deg = 12.0;
        modified.save(dir.path()).unwrap();

        let result = config.reload(dir.path()).unwrap();
        assert_eq!(result.unwrap().capture.primary_threshold_deg, 12.0);
    }

    #[test]
    fn test_reload_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();
        assert!(config.reload(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_invalid_ron_produces_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.ron"), "{{not valid}}").unwrap();
        assert!(matches!(
            Config::load_or_create(dir.path()),
            Err(ConfigError::ParseError(_))
        ));
    }
}
