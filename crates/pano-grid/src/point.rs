use glam::{Quat, Vec3};

use crate::band::PointId;

/// Camera-space viewing direction. Cameras look down -Z.
pub const FORWARD: Vec3 = Vec3::NEG_Z;

/// A node of the capture graph.
#[derive(Clone, Debug, PartialEq)]
pub struct CapturePoint {
    pub id: PointId,
    /// Target camera pose for this point.
    pub orientation: Quat,
    /// Unit viewing direction of `orientation`.
    pub direction: Vec3,
    /// `direction` scaled by the sampling radius.
    pub position: Vec3,
    pub captured: bool,
    /// Symmetric adjacency.
    pub neighbors: Vec<PointId>,
    /// Points whose capture makes this one selectable.
    pub unlock_parents: Vec<PointId>,
}

impl CapturePoint {
    pub(crate) fn new(id: PointId, orientation: Quat, radius: f32) -> Self {
        let direction = (orientation * FORWARD).normalize();
        Self {
            id,
            orientation,
            direction,
            position: direction * radius,
            captured: false,
            neighbors: Vec::new(),
            unlock_parents: Vec::new(),
        }
    }

    pub(crate) fn add_neighbor(&mut self, id: PointId) {
        if id != self.id && !self.neighbors.contains(&id) {
            self.neighbors.push(id);
        }
    }

    pub(crate) fn add_unlock_parent(&mut self, id: PointId) {
        if id != self.id && !self.unlock_parents.contains(&id) {
            self.unlock_parents.push(id);
        }
    }

    /// Neighbors that share this point's band.
    pub fn ring_neighbors(&self) -> impl Iterator<Item = &PointId> + '_ {
        let band = self.id.band;
        self.neighbors.iter().filter(move |n| n.band == band)
    }
}
