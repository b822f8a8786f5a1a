//! Externally visible targets and nearest-target selection.

use glam::{Quat, Vec3};
use pano_config::CaptureConfig;
use pano_grid::{CapturePoint, FORWARD, PointId, SphereGrid};

/// Read-only projection of a capture point for the guidance UI.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetPoint {
    pub id: PointId,
    pub position: Vec3,
    pub orientation: Quat,
    pub captured: bool,
    /// Selectable right now.
    pub allow_capture_next: bool,
}

impl TargetPoint {
    pub fn from_point(point: &CapturePoint, selectable: bool) -> Self {
        Self {
            id: point.id,
            position: point.position,
            orientation: point.orientation,
            captured: point.captured,
            allow_capture_next: selectable,
        }
    }

    /// Captured points plus currently selectable ones, in grid order.
    pub fn collect(grid: &SphereGrid) -> Vec<TargetPoint> {
        grid.points()
            .filter_map(|p| {
                let selectable = grid.is_selectable(p);
                (p.captured || selectable).then(|| TargetPoint::from_point(p, selectable))
            })
            .collect()
    }
}

/// Angular gates for target selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignmentThresholds {
    /// Targets further than this from the camera forward are ignored.
    pub primary_deg: f32,
    /// Radius used to measure alignment.
    pub tight_deg: f32,
    /// Tight overlap that counts as aligned.
    pub aligned_overlap: f32,
}

impl Default for AlignmentThresholds {
    fn default() -> Self {
        Self {
            primary_deg: 10.0,
            tight_deg: 3.0,
            aligned_overlap: 0.99,
        }
    }
}

impl From<&CaptureConfig> for AlignmentThresholds {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            primary_deg: config.primary_threshold_deg,
            tight_deg: config.tight_threshold_deg,
            aligned_overlap: config.aligned_overlap,
        }
    }
}

/// Result of [`select_target`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetSelection {
    /// Index into the target slice.
    pub index: usize,
    pub id: PointId,
    /// Primary overlap in `[0, 1]`; 1 when pointing straight at the target.
    pub overlap: f32,
    pub is_aligned: bool,
}

/// `(cos_angle - cos(threshold)) / (1 - cos(threshold))`, clamped to `[0, 1]`.
pub fn overlap_score(cos_angle: f32, threshold_deg: f32) -> f32 {
    let cos_threshold = threshold_deg.to_radians().cos();
    ((cos_angle - cos_threshold) / (1.0 - cos_threshold)).clamp(0.0, 1.0)
}

/// Pick the uncaptured target the camera overlaps most.
///
/// Ties go to the earliest target in slice order.
pub fn select_target(
    camera_forward: Vec3,
    targets: &[TargetPoint],
    thresholds: &AlignmentThresholds,
) -> Option<TargetSelection> {
    let forward = camera_forward.normalize_or_zero();
    let cos_primary = thresholds.primary_deg.to_radians().cos();

    let mut best: Option<TargetSelection> = None;
    for (index, target) in targets.iter().enumerate() {
        if target.captured {
            continue;
        }
        let alignment = forward.dot(target.position.normalize_or_zero());
        if alignment <= cos_primary {
            continue;
        }
        let overlap = overlap_score(alignment, thresholds.primary_deg);
        if overlap > best.map_or(0.0, |b| b.overlap) {
            best = Some(TargetSelection {
                index,
                id: target.id,
                overlap,
                is_aligned: overlap_score(alignment, thresholds.tight_deg)
                    > thresholds.aligned_overlap,
            });
        }
    }
    best
}

/// Variant of [`select_target`] that blends pointing direction (70%) with the
/// similarity of the target's own forward vector (30%).
pub fn select_target_by_orientation(
    camera: Quat,
    targets: &[TargetPoint],
    thresholds: &AlignmentThresholds,
) -> Option<TargetSelection> {
    let forward = camera * FORWARD;
    let cos_primary = thresholds.primary_deg.to_radians().cos();

    let mut best: Option<TargetSelection> = None;
    for (index, target) in targets.iter().enumerate() {
        if target.captured {
            continue;
        }
        let direction = forward.dot(target.position.normalize_or_zero());
        if direction <= cos_primary {
            continue;
        }
        let orientation = forward.dot(target.orientation * FORWARD);
        let combined = direction * 0.7 + orientation * 0.3;
        let overlap = overlap_score(combined, thresholds.primary_deg);
        if overlap > best.map_or(0.0, |b| b.overlap) {
            best = Some(TargetSelection {
                index,
                id: target.id,
                overlap,
                is_aligned: overlap_score(combined, thresholds.tight_deg)
                    > thresholds.aligned_overlap,
            });
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use pano_grid::{Band, generate_grid};

    fn target(id: PointId, dir: Vec3, captured: bool) -> TargetPoint {
        TargetPoint {
            id,
            position: dir.normalize() * 2.0,
            orientation: Quat::from_rotation_arc(FORWARD, dir.normalize()),
            captured,
            allow_capture_next: !captured,
        }
    }

    fn yawed(deg: f32) -> Vec3 {
        Quat::from_rotation_y(deg.to_radians()) * FORWARD
    }

    #[test]
    fn test_overlap_endpoints() {
        assert!((overlap_score(1.0, 10.0) - 1.0).abs() < 1e-6);
        assert!(overlap_score(10f32.to_radians().cos(), 10.0).abs() < 1e-5);
        assert_eq!(overlap_score(0.0, 10.0), 0.0);
    }

    #[test]
    fn test_overlap_monotonic_toward_target() {
        let mut previous = -1.0;
        for step in (0..=20).rev() {
            let angle = step as f32 * 0.5;
            let score = overlap_score(angle.to_radians().cos(), 10.0);
            assert!(score >= previous, "angle {angle}");
            previous = score;
        }
        assert!((previous - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_picks_closest_uncaptured() {
        let targets = vec![
            target(PointId::new(Band::Middle, 0), yawed(0.0), true),
            target(PointId::new(Band::Middle, 1), yawed(6.0), false),
            target(PointId::new(Band::Middle, 2), yawed(2.0), false),
        ];
        let sel = select_target(FORWARD, &targets, &AlignmentThresholds::default()).unwrap();
        assert_eq!(sel.index, 2);
        assert_eq!(sel.id, PointId::new(Band::Middle, 2));
        assert!(!sel.is_aligned);
    }

    #[test]
    fn test_never_returns_captured() {
        let targets = vec![target(PointId::SEED, FORWARD, true)];
        assert!(select_target(FORWARD, &targets, &AlignmentThresholds::default()).is_none());
    }

    #[test]
    fn test_outside_primary_threshold_ignored() {
        let targets = vec![target(PointId::new(Band::Middle, 1), yawed(12.0), false)];
        assert!(select_target(FORWARD, &targets, &AlignmentThresholds::default()).is_none());
    }

    #[test]
    fn test_aligned_only_when_nearly_exact() {
        let targets = vec![target(PointId::new(Band::Middle, 1), yawed(0.1), false)];
        let sel = select_target(FORWARD, &targets, &AlignmentThresholds::default()).unwrap();
        assert!(sel.is_aligned);

        let targets = vec![target(PointId::new(Band::Middle, 1), yawed(1.0), false)];
        let sel = select_target(FORWARD, &targets, &AlignmentThresholds::default()).unwrap();
        assert!(!sel.is_aligned);
        assert!(sel.overlap > 0.9);
    }

    #[test]
    fn test_tie_goes_to_first() {
        let (s, c) = 3f32.to_radians().sin_cos();
        let targets = vec![
            target(PointId::new(Band::Middle, 1), Vec3::new(s, 0.0, -c), false),
            target(PointId::new(Band::Middle, 2), Vec3::new(-s, 0.0, -c), false),
        ];
        let sel = select_target(FORWARD, &targets, &AlignmentThresholds::default()).unwrap();
        assert_eq!(sel.index, 0);
    }

    #[test]
    fn test_orientation_variant_prefers_matching_pose() {
        let dir = yawed(2.0);
        let mut aligned = target(PointId::new(Band::Middle, 1), dir, false);
        aligned.orientation = Quat::from_rotation_y(2f32.to_radians());
        let sel = select_target_by_orientation(
            Quat::from_rotation_y(2f32.to_radians()),
            &[aligned],
            &AlignmentThresholds::default(),
        )
        .unwrap();
        assert!(sel.is_aligned);
        assert!((sel.overlap - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_collect_from_fresh_grid() {
        let grid = generate_grid(Quat::IDENTITY);
        let targets = TargetPoint::collect(&grid);
        let captured: Vec<_> = targets.iter().filter(|t| t.captured).collect();
        assert_eq!(captured.len(), 1);
        assert!(!captured[0].allow_capture_next);
        assert!(
            targets
                .iter()
                .filter(|t| !t.captured)
                .all(|t| t.allow_capture_next)
        );
        assert!(targets.iter().any(|t| t.id == PointId::new(Band::Middle, 1)));
        assert!(targets.iter().any(|t| t.id == PointId::new(Band::Middle, 10)));
    }
}
