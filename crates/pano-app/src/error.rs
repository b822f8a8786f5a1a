//! Top-level error type for the `pano` binary.

use std::path::PathBuf;

use pano_bake::BakeError;
use pano_capture::CaptureError;
use pano_config::ConfigError;
use pano_export::ExportError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to read manifest {path}: {source}")]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse manifest {path}: {source}")]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },

    #[error("image I/O failed for {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Bake(#[from] BakeError),

    #[error("bake did not finish within {0} s")]
    BakeTimeout(u64),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("simulation stalled: {0}")]
    Simulation(String),

    #[error("failed to serialize photo poses: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
