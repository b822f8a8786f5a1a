//! Camera roll about the viewing axis, for operator feedback.

use glam::{Quat, Vec3};
use pano_grid::FORWARD;

/// Forward vectors closer than this to vertical have no defined roll.
const VERTICAL_LIMIT: f32 = 0.99;

/// Signed roll in degrees, 0 when the camera's right vector is horizontal.
///
/// Positive when the camera is turned counter-clockwise about its forward
/// axis. Looking straight up or down the horizon is undefined and 0 is
/// returned.
pub fn roll_degrees(orientation: Quat) -> f32 {
    let forward = orientation * FORWARD;
    if forward.y.abs() > VERTICAL_LIMIT {
        return 0.0;
    }
    let level_right = forward.cross(Vec3::Y).normalize();
    let right = orientation * Vec3::X;
    let right = (right - forward * right.dot(forward)).normalize();

    let angle = right.dot(level_right).clamp(-1.0, 1.0).acos().to_degrees();
    if right.cross(level_right).dot(forward) > 0.0 {
        angle
    } else {
        -angle
    }
}

fn wrapped_difference(current: f32, target: f32) -> f32 {
    let diff = (current - target).abs() % 360.0;
    diff.min(360.0 - diff)
}

/// Whether two orientations have rolls within `tolerance_deg` of each other.
pub fn is_roll_aligned(current: Quat, target: Quat, tolerance_deg: f32) -> bool {
    wrapped_difference(roll_degrees(current), roll_degrees(target)) <= tolerance_deg
}

/// 1 at identical roll, falling linearly to 0 at `max_difference_deg`.
pub fn roll_alignment_score(current: Quat, target: Quat, max_difference_deg: f32) -> f32 {
    let diff = wrapped_difference(roll_degrees(current), roll_degrees(target));
    (1.0 - diff / max_difference_deg).max(0.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiltDirection {
    Clockwise,
    CounterClockwise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TiltSeverity {
    Slight,
    Moderate,
    Severe,
}

/// Roll summary reported every frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TiltInfo {
    pub roll_degrees: f32,
    /// `|roll|` exceeds the configured maximum.
    pub excessive: bool,
    /// Way to turn the device to level it.
    pub direction: TiltDirection,
    pub severity: TiltSeverity,
}

impl TiltInfo {
    pub fn from_orientation(orientation: Quat, max_tilt_deg: f32) -> Self {
        let roll = roll_degrees(orientation);
        let magnitude = roll.abs();
        Self {
            roll_degrees: roll,
            excessive: magnitude > max_tilt_deg,
            direction: if roll > 0.0 {
                TiltDirection::Clockwise
            } else {
                TiltDirection::CounterClockwise
            },
            severity: if magnitude > 30.0 {
                TiltSeverity::Severe
            } else if magnitude > 15.0 {
                TiltSeverity::Moderate
            } else {
                TiltSeverity::Slight
            },
        }
    }
}
