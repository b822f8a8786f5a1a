//! Per-session capture state machine.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use glam::Quat;
use pano_config::CaptureConfig;
use pano_grid::{FORWARD, PointId, SphereGrid};
use tracing::{debug, info, warn};

use crate::acquire::{AcquiredImage, ImageAcquirer};
use crate::dwell::DwellGate;
use crate::error::{AcquisitionError, CaptureError};
use crate::lock::{CaptureGuard, CaptureLock};
use crate::photo::PhotoPoint;
use crate::target::{AlignmentThresholds, TargetPoint, TargetSelection, select_target};
use crate::tilt::{TiltInfo, is_roll_aligned};

/// Live camera pose for one frame.
#[derive(Debug, Clone, Copy)]
pub struct CameraFrame {
    pub orientation: Quat,
    pub now: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuidanceState {
    /// No actionable target yet.
    Idle,
    /// Targets exist but the camera is not aligned with any.
    Targeting,
    /// Aligned, waiting out the dwell.
    Dwelling,
    /// An acquisition is in flight.
    Capturing,
    /// Photo total reached or the operator stopped.
    Complete,
}

/// Permission to acquire one photo. Holds the capture lock until dropped or
/// handed back through [`CaptureSession::complete_capture`].
#[derive(Debug)]
pub struct CaptureTicket {
    pub target: PointId,
    /// Camera pose when the dwell completed.
    pub camera_orientation: Quat,
    pub sequence_index: usize,
    _guard: CaptureGuard,
}

impl CaptureTicket {
    /// Run the acquirer for this ticket. The lock stays held throughout.
    pub async fn acquire<A: ImageAcquirer + ?Sized>(
        self,
        acquirer: &A,
    ) -> (CaptureTicket, Result<AcquiredImage, AcquisitionError>) {
        let result = acquirer.acquire(self.camera_orientation).await;
        (self, result)
    }
}

/// Per-frame guidance output.
#[derive(Debug)]
pub struct FrameReport {
    pub state: GuidanceState,
    pub selection: Option<TargetSelection>,
    pub dwell_progress: f32,
    pub tilt: TiltInfo,
    /// Set on the frame the dwell completes.
    pub trigger: Option<CaptureTicket>,
}

/// Drives one capture session from live poses to an ordered photo set.
///
/// The grid is created by the first successful capture, using that photo's
/// orientation as the reference, and discarded when undo empties the photo
/// set.
pub struct CaptureSession {
    config: CaptureConfig,
    thresholds: AlignmentThresholds,
    grid: Option<SphereGrid>,
    photos: Vec<PhotoPoint>,
    targets: Vec<TargetPoint>,
    dwell: DwellGate,
    lock: CaptureLock,
    state: GuidanceState,
    seeded: bool,
    stopped: bool,
}

impl CaptureSession {
    pub fn new(config: CaptureConfig) -> Self {
        Self::with_lock(config, CaptureLock::new())
    }

    /// Session sharing `lock` with other sessions.
    pub fn with_lock(config: CaptureConfig, lock: CaptureLock) -> Self {
        Self {
            thresholds: AlignmentThresholds::from(&config),
            dwell: DwellGate::new(Duration::from_millis(config.dwell_ms)),
            config,
            grid: None,
            photos: Vec::new(),
            targets: Vec::new(),
            lock,
            state: GuidanceState::Idle,
            seeded: false,
            stopped: false,
        }
    }

    pub fn state(&self) -> GuidanceState {
        self.state
    }

    pub fn photos(&self) -> &[PhotoPoint] {
        &self.photos
    }

    /// Consume the session, yielding the ordered photo set.
    pub fn into_photos(self) -> Vec<PhotoPoint> {
        self.photos
    }

    pub fn targets(&self) -> &[TargetPoint] {
        &self.targets
    }

    pub fn grid(&self) -> Option<&SphereGrid> {
        self.grid.as_ref()
    }

    pub fn lock(&self) -> &CaptureLock {
        &self.lock
    }

    pub fn is_complete(&self) -> bool {
        self.stopped || self.photos.len() >= self.config.total_photos
    }

    /// Operator stop. Further frames report `Complete`.
    pub fn stop(&mut self) {
        self.stopped = true;
        self.dwell.reset();
        self.state = GuidanceState::Complete;
        info!(photos = self.photos.len(), "capture session stopped");
    }

    /// Evaluate one frame.
    pub fn update(&mut self, frame: &CameraFrame) -> FrameReport {
        let tilt = TiltInfo::from_orientation(frame.orientation, self.config.max_tilt_deg);
        if self.is_complete() {
            self.state = GuidanceState::Complete;
            return FrameReport {
                state: self.state,
                selection: None,
                dwell_progress: 0.0,
                tilt,
                trigger: None,
            };
        }

        self.maybe_seed(frame.orientation);
        let selection = select_target(frame.orientation * FORWARD, &self.targets, &self.thresholds);

        if self.lock.is_held() {
            self.dwell.reset();
            self.state = GuidanceState::Capturing;
            return FrameReport {
                state: self.state,
                selection,
                dwell_progress: 0.0,
                tilt,
                trigger: None,
            };
        }

        let aligned = selection
            .filter(|s| s.is_aligned && self.roll_ok(frame.orientation, s))
            .map(|s| s.id);
        let dwelled = self.dwell.observe(aligned, frame.now);
        let dwell_progress = self.dwell.progress(frame.now);

        let trigger = match (dwelled, aligned) {
            (true, Some(target)) => self.issue_ticket(target, frame.orientation),
            _ => None,
        };

        self.state = if trigger.is_some() {
            GuidanceState::Capturing
        } else if aligned.is_some() {
            GuidanceState::Dwelling
        } else if self.targets.iter().any(|t| !t.captured) {
            GuidanceState::Targeting
        } else {
            GuidanceState::Idle
        };

        FrameReport {
            state: self.state,
            selection,
            dwell_progress,
            tilt,
            trigger,
        }
    }

    fn roll_ok(&self, camera: Quat, selection: &TargetSelection) -> bool {
        if !self.config.require_roll_alignment {
            return true;
        }
        self.targets.get(selection.index).is_some_and(|t| {
            is_roll_aligned(camera, t.orientation, self.config.roll_tolerance_deg)
        })
    }

    /// Before any grid exists, a near-level camera gets a single ad-hoc
    /// target straight ahead so the first photo can be taken.
    fn maybe_seed(&mut self, orientation: Quat) {
        if self.seeded || self.grid.is_some() || !self.photos.is_empty() {
            return;
        }
        let forward = orientation * FORWARD;
        let pitch = forward.y.clamp(-1.0, 1.0).asin().to_degrees();
        if pitch.abs() > self.config.seed_pitch_window_deg {
            return;
        }
        self.targets = vec![TargetPoint {
            id: PointId::SEED,
            position: forward * self.config.sampling_radius,
            orientation,
            captured: false,
            allow_capture_next: true,
        }];
        self.seeded = true;
        info!(pitch_deg = pitch, "seeded first capture target");
    }

    fn issue_ticket(&mut self, target: PointId, camera: Quat) -> Option<CaptureTicket> {
        let Some(guard) = self.lock.try_acquire() else {
            debug!(point = %target, "capture already in flight, ignoring trigger");
            return None;
        };
        self.dwell.reset();
        info!(point = %target, sequence = self.photos.len(), "capture triggered");
        Some(CaptureTicket {
            target,
            camera_orientation: camera,
            sequence_index: self.photos.len(),
            _guard: guard,
        })
    }

    /// Record the outcome of an acquisition. The capture lock is released on
    /// every path.
    pub fn complete_capture(
        &mut self,
        ticket: CaptureTicket,
        result: Result<AcquiredImage, AcquisitionError>,
    ) -> Result<&PhotoPoint, CaptureError> {
        let CaptureTicket {
            target,
            camera_orientation,
            _guard,
            ..
        } = ticket;
        self.dwell.reset();

        let acquired = match result {
            Ok(acquired) => acquired,
            Err(err) => {
                warn!(point = %target, error = %err, "capture failed");
                self.state = GuidanceState::Targeting;
                return Err(err.into());
            }
        };
        if self.photos.len() >= self.config.total_photos {
            return Err(CaptureError::Finished);
        }

        let point_id = match self.grid.as_mut() {
            Some(grid) => {
                grid.mark_captured(&target);
                target
            }
            None => {
                self.grid = Some(SphereGrid::generate(
                    camera_orientation,
                    self.config.sampling_radius,
                ));
                info!("generated capture grid from first photo");
                PointId::SEED
            }
        };

        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let sequence_index = self.photos.len();
        let mut photo = PhotoPoint::new(
            camera_orientation,
            self.config.sampling_radius,
            Some(acquired.image),
            acquired.metadata,
            point_id,
            sequence_index,
            timestamp_ms,
        );
        photo.local_uri = acquired.uri;
        self.photos.push(photo);
        self.refresh_targets();

        self.state = if self.is_complete() {
            info!(photos = self.photos.len(), "capture session complete");
            GuidanceState::Complete
        } else {
            GuidanceState::Targeting
        };
        info!(point = %point_id, photos = self.photos.len(), "photo recorded");
        Ok(&self.photos[sequence_index])
    }

    /// Remove the most recent photo and revert its point.
    pub fn undo_last_capture(&mut self) -> Result<PhotoPoint, CaptureError> {
        if self.lock.is_held() {
            return Err(CaptureError::Busy);
        }
        let photo = self.photos.pop().ok_or(CaptureError::NothingToUndo)?;
        self.dwell.reset();

        if self.photos.is_empty() {
            self.grid = None;
            self.targets.clear();
            self.seeded = false;
            self.state = GuidanceState::Idle;
            info!("undo emptied the photo set, grid discarded");
        } else {
            if let Some(grid) = self.grid.as_mut() {
                grid.mark_uncaptured(&photo.captured_point_id);
            }
            self.refresh_targets();
            self.state = GuidanceState::Targeting;
            info!(point = %photo.captured_point_id, photos = self.photos.len(), "undid capture");
        }
        Ok(photo)
    }

    fn refresh_targets(&mut self) {
        if let Some(grid) = &self.grid {
            self.targets = TargetPoint::collect(grid);
            debug!(
                targets = self.targets.len(),
                available = self.targets.iter().filter(|t| t.allow_capture_next).count(),
                "refreshed targets"
            );
        }
    }
}
