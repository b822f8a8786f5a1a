/// Image acquisition failures. Retryable by re-aiming.
#[derive(Debug, thiserror::Error)]
pub enum AcquisitionError {
    #[error("camera failed to take picture: {0}")]
    Camera(String),

    #[error("failed to resize captured image: {0}")]
    Resize(String),

    #[error("acquisition cancelled")]
    Cancelled,
}

/// Errors surfaced by a capture session.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    #[error("a capture is already in flight")]
    Busy,

    #[error("capture session is complete")]
    Finished,

    #[error("no photos to undo")]
    NothingToUndo,
}
