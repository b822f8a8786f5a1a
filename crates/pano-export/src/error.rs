//! Export bridge error types.

/// Why an export request failed. Each variant rejects only the request it
/// belongs to; other in-flight requests are unaffected.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The encoder did not report ready within the handshake timeout.
    #[error("encoder not ready after {timeout_ms} ms")]
    NotReady { timeout_ms: u64 },

    /// The encoder did not answer this request in time.
    #[error("request {request_id} timed out after {timeout_ms} ms")]
    RequestTimeout { request_id: u64, timeout_ms: u64 },

    /// Width or height is zero.
    #[error("invalid frame {width}x{height}")]
    InvalidFrame { width: u32, height: u32 },

    /// The encoder rejected the frame.
    #[error("request {request_id} failed: {message}")]
    Encode { request_id: u64, message: String },

    /// The encoder task is gone.
    #[error("export bridge closed")]
    BridgeClosed,

    /// Failed to write the encoded file.
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
