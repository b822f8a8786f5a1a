//! Grid construction and the captured/selectable queries.

use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, TAU};
use std::ops::Range;

use glam::Quat;
use rustc_hash::FxHashMap;

use crate::band::{Band, PointId};
use crate::point::CapturePoint;

/// Distance from the optical center at which capture points are placed.
pub const DEFAULT_SAMPLING_RADIUS: f32 = 2.0;

/// All capture points, grouped by band, with O(1) id lookup.
#[derive(Clone, Debug)]
pub struct SphereGrid {
    reference: Quat,
    /// Points stored band by band in `Band::ALL` order.
    points: Vec<CapturePoint>,
    bands: [Range<usize>; 5],
    index: FxHashMap<PointId, usize>,
}

/// Build a grid around `reference` at the default sampling radius.
#[must_use]
pub fn generate_grid(reference: Quat) -> SphereGrid {
    SphereGrid::generate(reference, DEFAULT_SAMPLING_RADIUS)
}

fn band_slot(band: Band) -> usize {
    match band {
        Band::Middle => 0,
        Band::Upper => 1,
        Band::Lower => 2,
        Band::North => 3,
        Band::South => 4,
    }
}

/// Orientation of point `index` in `band`, relative to the reference.
fn local_orientation(band: Band, index: usize) -> Quat {
    let count = band.count() as f32;
    let spin = |n: f32| Quat::from_rotation_y(TAU * index as f32 / n);
    match band {
        Band::Middle => spin(count),
        Band::Upper => spin(count) * Quat::from_rotation_x(FRAC_PI_4),
        Band::Lower => spin(count) * Quat::from_rotation_x(-FRAC_PI_4),
        Band::North => Quat::from_rotation_x(FRAC_PI_2),
        Band::South => Quat::from_rotation_x(-FRAC_PI_2),
    }
}

/// Index in an 8-point ring nearest in azimuth to middle-ring point `i`.
fn nearest_ring_index(i: usize) -> usize {
    let middle = Band::Middle.count() as f32;
    let ring = Band::Upper.count();
    ((i as f32 / middle * ring as f32).round() as usize) % ring
}

impl SphereGrid {
    /// Build the full 29-point graph. Deterministic for a given reference.
    ///
    /// Only `middle:0` starts captured, so its ring neighbors and its
    /// vertical children are the first selectable points.
    #[must_use]
    pub fn generate(reference: Quat, radius: f32) -> Self {
        let reference = reference.normalize();
        let mut points = Vec::with_capacity(29);
        let mut bands: [Range<usize>; 5] = Default::default();

        for band in Band::ALL {
            let start = points.len();
            for i in 0..band.count() {
                let id = PointId::new(band, i as u8);
                let orientation = (reference * local_orientation(band, i)).normalize();
                points.push(CapturePoint::new(id, orientation, radius));
            }
            bands[band_slot(band)] = start..points.len();
        }

        let index = points
            .iter()
            .enumerate()
            .map(|(slot, p)| (p.id, slot))
            .collect();

        let mut grid = Self {
            reference,
            points,
            bands,
            index,
        };
        grid.link_rings();
        grid.link_vertical();
        grid.link_poles();
        if let Some(seed) = grid.get_mut(&PointId::SEED) {
            seed.captured = true;
        }

        tracing::debug!(points = grid.len(), "generated sphere grid");
        grid
    }

    /// Ring neighbors wrap and unlock each other.
    fn link_rings(&mut self) {
        for band in [Band::Middle, Band::Upper, Band::Lower] {
            let n = band.count();
            for i in 0..n {
                let left = PointId::new(band, ((i + n - 1) % n) as u8);
                let right = PointId::new(band, ((i + 1) % n) as u8);
                if let Some(p) = self.get_mut(&PointId::new(band, i as u8)) {
                    for side in [left, right] {
                        p.add_neighbor(side);
                        p.add_unlock_parent(side);
                    }
                }
            }
        }
    }

    /// Middle points link up and down to the nearest-azimuth ring point.
    /// The link is symmetric for adjacency but only unlocks the child.
    fn link_vertical(&mut self) {
        for i in 0..Band::Middle.count() {
            let parent = PointId::new(Band::Middle, i as u8);
            let j = nearest_ring_index(i) as u8;
            for child in [PointId::new(Band::Upper, j), PointId::new(Band::Lower, j)] {
                self.link(parent, child);
                if let Some(c) = self.get_mut(&child) {
                    c.add_unlock_parent(parent);
                }
            }
        }
    }

    /// Every upper point unlocks north, every lower point unlocks south.
    fn link_poles(&mut self) {
        for (ring, pole) in [(Band::Upper, Band::North), (Band::Lower, Band::South)] {
            let pole = PointId::new(pole, 0);
            for j in 0..ring.count() {
                let parent = PointId::new(ring, j as u8);
                self.link(parent, pole);
                if let Some(p) = self.get_mut(&pole) {
                    p.add_unlock_parent(parent);
                }
            }
        }
    }

    fn link(&mut self, a: PointId, b: PointId) {
        if let Some(p) = self.get_mut(&a) {
            p.add_neighbor(b);
        }
        if let Some(p) = self.get_mut(&b) {
            p.add_neighbor(a);
        }
    }

    /// Orientation the grid was built around.
    pub fn reference(&self) -> Quat {
        self.reference
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, id: &PointId) -> Option<&CapturePoint> {
        self.index.get(id).map(|&slot| &self.points[slot])
    }

    fn get_mut(&mut self, id: &PointId) -> Option<&mut CapturePoint> {
        self.index.get(id).map(|&slot| &mut self.points[slot])
    }

    /// Points of one band in index order.
    pub fn band(&self, band: Band) -> &[CapturePoint] {
        &self.points[self.bands[band_slot(band)].clone()]
    }

    /// All points, band by band.
    pub fn points(&self) -> impl Iterator<Item = &CapturePoint> + '_ {
        self.points.iter()
    }

    /// Uncaptured, with at least one captured unlock parent.
    pub fn is_selectable(&self, point: &CapturePoint) -> bool {
        !point.captured
            && point
                .unlock_parents
                .iter()
                .any(|parent| self.get(parent).is_some_and(|p| p.captured))
    }

    /// Currently selectable points in grid order.
    pub fn selectable_points(&self) -> impl Iterator<Item = &CapturePoint> + '_ {
        self.points.iter().filter(|p| self.is_selectable(p))
    }

    pub fn captured_points(&self) -> impl Iterator<Item = &CapturePoint> + '_ {
        self.points.iter().filter(|p| p.captured)
    }

    pub fn captured_count(&self) -> usize {
        self.captured_points().count()
    }

    /// Mark `id` captured. Unknown ids are logged and ignored.
    ///
    /// Returns whether a point with this id exists.
    pub fn mark_captured(&mut self, id: &PointId) -> bool {
        self.set_captured(id, true)
    }

    /// Revert `id` to uncaptured. Unknown ids are logged and ignored.
    pub fn mark_uncaptured(&mut self, id: &PointId) -> bool {
        self.set_captured(id, false)
    }

    fn set_captured(&mut self, id: &PointId, captured: bool) -> bool {
        match self.get_mut(id) {
            Some(point) => {
                point.captured = captured;
                true
            }
            None => {
                tracing::warn!(point = %id, captured, "ignoring update for unknown capture point");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn id(band: Band, index: u8) -> PointId {
        PointId::new(band, index)
    }

    #[test]
    fn test_grid_has_29_points_and_one_captured() {
        for reference in [
            Quat::IDENTITY,
            Quat::from_rotation_y(1.3),
            Quat::from_euler(glam::EulerRot::XYZ, 0.4, -2.0, 0.7),
        ] {
            let grid = generate_grid(reference);
            assert_eq!(grid.len(), 29);
            assert_eq!(grid.captured_count(), 1);
            assert!(grid.get(&PointId::SEED).unwrap().captured);
            for band in Band::ALL {
                assert_eq!(grid.band(band).len(), band.count());
                assert!(grid.band(band).iter().all(|p| p.id.band == band));
            }
        }
    }

    #[test]
    fn test_every_point_reachable_by_id() {
        let grid = generate_grid(Quat::IDENTITY);
        for p in grid.points() {
            assert_eq!(grid.get(&p.id).map(|q| q.id), Some(p.id));
        }
    }

    #[test]
    fn test_rings_have_two_horizontal_neighbors() {
        let grid = generate_grid(Quat::IDENTITY);
        for band in [Band::Middle, Band::Upper, Band::Lower] {
            for p in grid.band(band) {
                assert_eq!(p.ring_neighbors().count(), 2, "{}", p.id);
            }
        }
        for pole in [Band::North, Band::South] {
            assert_eq!(grid.band(pole)[0].ring_neighbors().count(), 0);
        }
        let m0 = grid.get(&id(Band::Middle, 0)).unwrap();
        assert!(m0.neighbors.contains(&id(Band::Middle, 10)));
        assert!(m0.neighbors.contains(&id(Band::Middle, 1)));
    }

    #[test]
    fn test_neighbors_symmetric_and_unlocks_subset() {
        let grid = generate_grid(Quat::from_rotation_z(0.3));
        for p in grid.points() {
            for n in &p.neighbors {
                assert!(
                    grid.get(n).unwrap().neighbors.contains(&p.id),
                    "{} -> {} not symmetric",
                    p.id,
                    n
                );
            }
            for parent in &p.unlock_parents {
                assert!(p.neighbors.contains(parent), "{} parent {}", p.id, parent);
            }
        }
    }

    #[test]
    fn test_vertical_unlock_is_one_directional() {
        let grid = generate_grid(Quat::IDENTITY);
        let m3 = grid.get(&id(Band::Middle, 3)).unwrap();
        // round(3 / 11 * 8) = 2
        assert!(m3.neighbors.contains(&id(Band::Upper, 2)));
        assert!(m3.neighbors.contains(&id(Band::Lower, 2)));
        assert!(!m3.unlock_parents.contains(&id(Band::Upper, 2)));

        let u2 = grid.get(&id(Band::Upper, 2)).unwrap();
        assert!(u2.unlock_parents.contains(&id(Band::Middle, 3)));
    }

    #[test]
    fn test_every_ring_point_has_a_middle_parent() {
        let grid = generate_grid(Quat::IDENTITY);
        for band in [Band::Upper, Band::Lower] {
            for p in grid.band(band) {
                assert!(
                    p.unlock_parents.iter().any(|u| u.band == Band::Middle),
                    "{} unreachable from the middle ring",
                    p.id
                );
            }
        }
    }

    #[test]
    fn test_poles_unlocked_by_whole_ring() {
        let grid = generate_grid(Quat::IDENTITY);
        let north = grid.get(&id(Band::North, 0)).unwrap();
        let south = grid.get(&id(Band::South, 0)).unwrap();
        assert_eq!(north.unlock_parents.len(), 8);
        assert!(north.unlock_parents.iter().all(|p| p.band == Band::Upper));
        assert!(south.unlock_parents.iter().all(|p| p.band == Band::Lower));
    }

    #[test]
    fn test_directions_follow_bands() {
        let grid = generate_grid(Quat::IDENTITY);
        let m0 = grid.get(&id(Band::Middle, 0)).unwrap();
        assert!(m0.direction.abs_diff_eq(Vec3::NEG_Z, 1e-5));
        assert!((m0.position.length() - DEFAULT_SAMPLING_RADIUS).abs() < 1e-5);

        let north = grid.get(&id(Band::North, 0)).unwrap();
        assert!(north.direction.abs_diff_eq(Vec3::Y, 1e-5));
        let south = grid.get(&id(Band::South, 0)).unwrap();
        assert!(south.direction.abs_diff_eq(Vec3::NEG_Y, 1e-5));

        for p in grid.band(Band::Upper) {
            assert!((p.direction.y - FRAC_PI_4.sin()).abs() < 1e-5);
        }
        for p in grid.band(Band::Middle) {
            assert!(p.direction.y.abs() < 1e-5);
        }
    }

    #[test]
    fn test_reference_rotates_whole_grid() {
        let reference = Quat::from_rotation_y(0.8);
        let base = generate_grid(Quat::IDENTITY);
        let rotated = generate_grid(reference);
        for (a, b) in base.points().zip(rotated.points()) {
            assert!((reference * a.direction).abs_diff_eq(b.direction, 1e-5));
        }
    }

    #[test]
    fn test_scenario_seed_unlocks_ring_neighbors() {
        let mut grid = generate_grid(Quat::IDENTITY);
        let selectable: Vec<PointId> = grid.selectable_points().map(|p| p.id).collect();
        // The seed also unlocks its own vertical children.
        assert_eq!(
            selectable,
            vec![
                id(Band::Middle, 1),
                id(Band::Middle, 10),
                id(Band::Upper, 0),
                id(Band::Lower, 0),
            ]
        );

        // Capturing middle:1 unlocks upper/lower at round(8/11) = 1.
        assert!(grid.mark_captured(&id(Band::Middle, 1)));
        let u1 = grid.get(&id(Band::Upper, 1)).unwrap();
        let l1 = grid.get(&id(Band::Lower, 1)).unwrap();
        assert!(grid.is_selectable(u1));
        assert!(grid.is_selectable(l1));
        assert!(grid.is_selectable(grid.get(&id(Band::Middle, 2)).unwrap()));

        // middle:10 maps to round(80/11) % 8 = 7.
        grid.mark_captured(&id(Band::Middle, 10));
        assert!(grid.is_selectable(grid.get(&id(Band::Upper, 7)).unwrap()));
    }

    #[test]
    fn test_selectable_requires_captured_parent() {
        let mut grid = generate_grid(Quat::IDENTITY);
        let north = id(Band::North, 0);
        assert!(!grid.is_selectable(grid.get(&north).unwrap()));
        grid.mark_captured(&id(Band::Upper, 4));
        assert!(grid.is_selectable(grid.get(&north).unwrap()));
        grid.mark_uncaptured(&id(Band::Upper, 4));
        assert!(!grid.is_selectable(grid.get(&north).unwrap()));
    }

    #[test]
    fn test_captured_point_not_selectable() {
        let mut grid = generate_grid(Quat::IDENTITY);
        grid.mark_captured(&id(Band::Middle, 1));
        assert!(!grid.is_selectable(grid.get(&id(Band::Middle, 1)).unwrap()));
        assert!(grid.selectable_points().all(|p| !p.captured));
    }

    #[test]
    fn test_unknown_id_is_noop() {
        let mut grid = generate_grid(Quat::IDENTITY);
        let bogus = id(Band::Upper, 9);
        assert!(!grid.mark_captured(&bogus));
        assert!(!grid.mark_uncaptured(&bogus));
        assert_eq!(grid.captured_count(), 1);
    }

    #[test]
    fn test_deterministic() {
        let reference = Quat::from_rotation_x(0.2);
        let a = generate_grid(reference);
        let b = generate_grid(reference);
        for (p, q) in a.points().zip(b.points()) {
            assert_eq!(p, q);
        }
    }
}
