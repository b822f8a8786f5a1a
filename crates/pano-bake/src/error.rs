use pano_config::ConfigError;

/// Why a bake produced no panorama.
#[derive(Debug, thiserror::Error)]
pub enum BakeError {
    /// None of the supplied photos carries pixel data.
    #[error("no photo with pixel data to bake")]
    NoInput,

    #[error("invalid bake options: {0}")]
    InvalidOptions(#[from] ConfigError),

    /// No compatible GPU adapter found.
    #[error("no compatible GPU adapter found")]
    NoAdapter,

    /// Failed to request GPU device.
    #[error("failed to request GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    /// A texture or buffer would exceed what the device supports.
    #[error("{what} needs {requested}, device limit is {limit}")]
    ResourceLimit {
        what: &'static str,
        requested: u64,
        limit: u64,
    },

    /// wgpu rejected a shader, pipeline, resource or submission.
    #[error("GPU error: {0}")]
    Gpu(String),

    /// Mapping the output buffer back to the CPU failed.
    #[error("readback failed: {0}")]
    Readback(String),

    /// A newer bake superseded this one.
    #[error("bake superseded by a newer request")]
    Cancelled,
}
