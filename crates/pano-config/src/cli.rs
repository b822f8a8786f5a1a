//! Command-line overrides shared by the pano binaries.

use std::path::PathBuf;

use clap::Args;

use crate::Config;

/// Global command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Args, Debug, Clone, Default)]
pub struct CliArgs {
    /// Panorama width in pixels. Height follows at 2:1.
    #[arg(long, global = true)]
    pub width: Option<u32>,

    /// Panorama height in pixels (overrides the 2:1 default).
    #[arg(long, global = true)]
    pub height: Option<u32>,

    /// Final yaw correction in degrees.
    #[arg(long, global = true, allow_negative_numbers = true)]
    pub yaw: Option<f32>,

    /// Directory the encoded panorama is written to.
    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(w) = args.width {
            self.bake.width = w;
            self.bake.height = (w / 2).max(1);
        }
        if let Some(h) = args.height {
            self.bake.height = h;
        }
        if let Some(yaw) = args.yaw {
            self.bake.yaw_deg = yaw;
        }
        if let Some(ref dir) = args.output_dir {
            self.export.output_dir = dir.clone();
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            width: Some(1024),
            output_dir: Some(PathBuf::from("/tmp/pano")),
            ..Default::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.bake.width, 1024);
        assert_eq!(config.bake.height, 512);
        assert_eq!(config.export.output_dir, PathBuf::from("/tmp/pano"));
        // Non-overridden fields retain defaults
        assert_eq!(config.debug.log_level, "info");
    }

    #[test]
    fn test_explicit_height_wins() {
        let mut config = Config::default();
        let args = CliArgs {
            width: Some(1000),
            height: Some(300),
            ..Default::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!((config.bake.width, config.bake.height), (1000, 300));
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, original);
    }
}
