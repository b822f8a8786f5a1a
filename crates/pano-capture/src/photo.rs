//! Captured photo records.

use std::sync::Arc;

use glam::{EulerRot, Quat, Vec3};
use image::RgbaImage;
use pano_grid::{FORWARD, PointId};
use serde::{Deserialize, Serialize};

use crate::intrinsics::{FieldOfView, PhotoMetadata, estimate_fov};

/// Shared, immutable pixel data of one photo. Row 0 is the top of the image.
pub type ImageHandle = Arc<RgbaImage>;

/// One captured photo. Immutable once created.
#[derive(Debug, Clone)]
pub struct PhotoPoint {
    /// Point on the sampling sphere the camera was aimed at.
    pub position: Vec3,
    pub direction: Vec3,
    pub orientation: Quat,
    pub image: Option<ImageHandle>,
    pub local_uri: Option<String>,
    pub metadata: PhotoMetadata,
    pub fov: FieldOfView,
    pub captured_point_id: PointId,
    pub sequence_index: usize,
    /// Unique key, `"<unix millis>-index-<sequence>"`.
    pub key: String,
}

impl PhotoPoint {
    /// Build a record from a camera pose and its acquired image.
    pub fn new(
        orientation: Quat,
        radius: f32,
        image: Option<ImageHandle>,
        metadata: PhotoMetadata,
        captured_point_id: PointId,
        sequence_index: usize,
        timestamp_ms: u128,
    ) -> Self {
        let orientation = orientation.normalize();
        let direction = orientation * FORWARD;
        Self {
            position: direction * radius,
            direction,
            orientation,
            image,
            local_uri: None,
            fov: estimate_fov(&metadata),
            metadata,
            captured_point_id,
            sequence_index,
            key: format!("{timestamp_ms}-index-{sequence_index}"),
        }
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.local_uri = Some(uri.into());
        self
    }

    /// XYZ Euler angles in radians.
    pub fn euler_angles(&self) -> [f32; 3] {
        let (x, y, z) = self.orientation.to_euler(EulerRot::XYZ);
        [x, y, z]
    }

    pub fn has_pixels(&self) -> bool {
        self.image
            .as_ref()
            .is_some_and(|img| img.width() > 0 && img.height() > 0)
    }

    pub fn transport(&self) -> PhotoTransport {
        let q = self.orientation;
        PhotoTransport {
            key: self.key.clone(),
            point_id: self.captured_point_id.to_string(),
            quat: [q.x, q.y, q.z, q.w],
            euler: self.euler_angles(),
            uri: self.local_uri.clone(),
        }
    }
}

/// Photo metadata handed to external stitching and backend services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoTransport {
    pub key: String,
    pub point_id: String,
    /// `[x, y, z, w]`.
    pub quat: [f32; 4],
    /// XYZ Euler angles, radians.
    pub euler: [f32; 3],
    pub uri: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pano_grid::Band;

    fn photo(orientation: Quat) -> PhotoPoint {
        PhotoPoint::new(
            orientation,
            2.0,
            None,
            PhotoMetadata::default(),
            PointId::new(Band::Upper, 3),
            4,
            1_700_000_000_123,
        )
    }

    #[test]
    fn test_key_format() {
        assert_eq!(photo(Quat::IDENTITY).key, "1700000000123-index-4");
    }

    #[test]
    fn test_position_along_forward() {
        let p = photo(Quat::from_rotation_x(0.5));
        assert!((p.position - p.direction * 2.0).length() < 1e-6);
        assert!((p.direction.y - 0.5_f32.sin()).abs() < 1e-5);
    }

    #[test]
    fn test_euler_roundtrips_orientation() {
        let q = Quat::from_euler(EulerRot::XYZ, 0.3, -0.4, 0.1);
        let [x, y, z] = photo(q).euler_angles();
        let back = Quat::from_euler(EulerRot::XYZ, x, y, z);
        assert!(back.dot(q).abs() > 1.0 - 1e-5);
    }

    #[test]
    fn test_transport_serializes() {
        let t = photo(Quat::IDENTITY).with_uri("file:///tmp/4.jpg").transport();
        assert_eq!(t.point_id, "upper:3");
        assert_eq!(t.quat, [0.0, 0.0, 0.0, 1.0]);
        let text = ron::to_string(&t).unwrap();
        assert!(text.contains("upper:3"));
        assert!(text.contains("file:///tmp/4.jpg"));
    }

    #[test]
    fn test_without_image_has_no_pixels() {
        assert!(!photo(Quat::IDENTITY).has_pixels());
        let mut p = photo(Quat::IDENTITY);
        p.image = Some(Arc::new(RgbaImage::new(4, 2)));
        assert!(p.has_pixels());
    }
}
