//! Drive a capture session end to end with a scripted camera.

use std::time::{Duration, Instant};

use glam::Quat;
use pano_capture::{CameraFrame, CaptureSession, GuidanceState, ImageAcquirer, PhotoPoint};
use pano_config::CaptureConfig;

use crate::error::AppError;

/// Simulated time between frames.
const FRAME_INTERVAL: Duration = Duration::from_millis(50);

/// Aims the camera at the first selectable target, holds still until the
/// dwell fires, acquires, and repeats until the session completes.
///
/// `start` is the pose before the grid exists; it must be near level so the
/// session seeds its first target.
pub async fn run_capture<A: ImageAcquirer>(
    config: &CaptureConfig,
    acquirer: &A,
    start: Quat,
) -> Result<Vec<PhotoPoint>, AppError> {
    let mut session = CaptureSession::new(config.clone());
    let dwell_frames = (config.dwell_ms / FRAME_INTERVAL.as_millis() as u64) as usize + 2;
    // Room for every photo to fail once and be re-aimed.
    let frame_budget = 2 * (config.total_photos + 1) * (dwell_frames + 4);
    let mut now = Instant::now();
    let mut camera = start;

    for _ in 0..frame_budget {
        let report = session.update(&CameraFrame {
            orientation: camera,
            now,
        });
        now += FRAME_INTERVAL;

        if report.state == GuidanceState::Complete {
            break;
        }
        if report.tilt.excessive {
            tracing::warn!(roll_deg = report.tilt.roll_degrees, "Camera tilted");
        }

        if let Some(ticket) = report.trigger {
            let target = ticket.target;
            let (ticket, result) = ticket.acquire(acquirer).await;
            match session.complete_capture(ticket, result) {
                Ok(photo) => tracing::info!(
                    point = %photo.captured_point_id,
                    sequence = photo.sequence_index,
                    "Simulated capture"
                ),
                Err(e) => tracing::warn!(point = %target, error = %e, "Simulated capture failed"),
            }
            continue;
        }

        // Re-aim at the next open target once the current one is taken.
        if let Some(next) = session
            .targets()
            .iter()
            .find(|t| t.allow_capture_next && !t.captured)
        {
            camera = next.orientation;
        }
    }

    if !session.is_complete() {
        return Err(AppError::Simulation(format!(
            "{} of {} photos after {frame_budget} frames",
            session.photos().len(),
            config.total_photos
        )));
    }
    Ok(session.into_photos())
}
