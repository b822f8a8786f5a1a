use std::future::Future;

use glam::Quat;

use crate::error::AcquisitionError;
use crate::intrinsics::PhotoMetadata;
use crate::photo::ImageHandle;

/// Output of one camera acquisition.
#[derive(Debug, Clone)]
pub struct AcquiredImage {
    pub image: ImageHandle,
    pub metadata: PhotoMetadata,
    pub uri: Option<String>,
}

/// Camera capture plus resize, run off the frame loop.
pub trait ImageAcquirer: Send + Sync {
    fn acquire(
        &self,
        orientation: Quat,
    ) -> impl Future<Output = Result<AcquiredImage, AcquisitionError>> + Send;
}
