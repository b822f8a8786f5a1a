//! Continuous-alignment timer.

use std::time::{Duration, Instant};

use pano_grid::PointId;

/// Tracks how long the camera has stayed aligned with one target.
///
/// Losing alignment or switching targets resets the timer; there is no
/// partial credit.
#[derive(Debug, Clone)]
pub struct DwellGate {
    duration: Duration,
    current: Option<(PointId, Instant)>,
}

impl DwellGate {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            current: None,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Record this frame's alignment. Returns true once the dwell is complete.
    pub fn observe(&mut self, aligned_target: Option<PointId>, now: Instant) -> bool {
        match (aligned_target, self.current) {
            (None, _) => {
                self.current = None;
                false
            }
            (Some(id), Some((current, since))) if id == current => {
                now.saturating_duration_since(since) >= self.duration
            }
            (Some(id), _) => {
                self.current = Some((id, now));
                self.duration.is_zero()
            }
        }
    }

    /// Fraction of the dwell completed, in `[0, 1]`.
    pub fn progress(&self, now: Instant) -> f32 {
        match self.current {
            None => 0.0,
            Some(_) if self.duration.is_zero() => 1.0,
            Some((_, since)) => {
                let elapsed = now.saturating_duration_since(since).as_secs_f32();
                (elapsed / self.duration.as_secs_f32()).min(1.0)
            }
        }
    }

    /// Target currently being dwelt on.
    pub fn target(&self) -> Option<PointId> {
        self.current.map(|(id, _)| id)
    }

    pub fn reset(&mut self) {
        self.current = None;
    }
}
