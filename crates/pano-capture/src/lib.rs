//! Capture guidance: target selection, dwell gating, and the per-session
//! state machine that turns aligned camera poses into photo records.
//!
//! The session is driven once per rendered frame with the live camera pose.
//! Image acquisition is asynchronous and owned by the host; the session only
//! hands out a [`CaptureTicket`] and records the result when it comes back.

mod acquire;
mod dwell;
mod error;
mod intrinsics;
mod lock;
mod photo;
mod session;
mod target;
mod tilt;

pub use acquire::{AcquiredImage, ImageAcquirer};
pub use dwell::DwellGate;
pub use error::{AcquisitionError, CaptureError};
pub use intrinsics::{FALLBACK_FOV, FieldOfView, PhotoMetadata, SensorSize, estimate_fov};
pub use lock::{CaptureGuard, CaptureLock};
pub use photo::{ImageHandle, PhotoPoint, PhotoTransport};
pub use session::{CameraFrame, CaptureSession, CaptureTicket, FrameReport, GuidanceState};
pub use target::{
    AlignmentThresholds, TargetPoint, TargetSelection, overlap_score, select_target,
    select_target_by_orientation,
};
pub use tilt::{
    TiltDirection, TiltInfo, TiltSeverity, is_roll_aligned, roll_alignment_score, roll_degrees,
};
