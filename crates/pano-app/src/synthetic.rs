//! A camera that photographs a procedural environment instead of the world.

use std::sync::Arc;

use glam::{Quat, Vec3};
use image::{Rgba, RgbaImage};
use pano_capture::{AcquiredImage, AcquisitionError, ImageAcquirer, PhotoMetadata, estimate_fov};

/// Renders pinhole photos of [`environment`] at the requested pose.
#[derive(Debug, Clone)]
pub struct SyntheticCamera {
    pub width: u32,
    pub height: u32,
    pub metadata: PhotoMetadata,
}

impl SyntheticCamera {
    /// A landscape phone camera at `width` pixels, 4:3.
    pub fn new(width: u32) -> Self {
        let height = (width * 3 / 4).max(1);
        Self {
            width,
            height,
            metadata: PhotoMetadata {
                focal_length_mm: Some(4.25),
                orientation_tag: 1,
                width_px: width,
                height_px: height,
                ..PhotoMetadata::default()
            },
        }
    }

    /// Render synchronously. The projection matches the one the compositor
    /// inverts: camera looks down -Z, +X right, +Y up, row 0 at the top.
    pub fn render(&self, orientation: Quat) -> RgbaImage {
        let (tan_x, tan_y) = estimate_fov(&self.metadata).tan_half();
        let (w, h) = (self.width as f32, self.height as f32);
        RgbaImage::from_fn(self.width, self.height, |px, py| {
            let x = ((px as f32 + 0.5) / w * 2.0 - 1.0) * tan_x;
            let y = (1.0 - (py as f32 + 0.5) / h * 2.0) * tan_y;
            let world = orientation * Vec3::new(x, y, -1.0).normalize();
            let [r, g, b] = environment(world);
            Rgba([r, g, b, 255])
        })
    }
}

impl ImageAcquirer for SyntheticCamera {
    async fn acquire(&self, orientation: Quat) -> Result<AcquiredImage, AcquisitionError> {
        let camera = self.clone();
        let image = tokio::task::spawn_blocking(move || camera.render(orientation))
            .await
            .map_err(|e| AcquisitionError::Camera(e.to_string()))?;
        Ok(AcquiredImage {
            image: Arc::new(image),
            metadata: self.metadata.clone(),
            uri: None,
        })
    }
}

/// Sky above the horizon, ground below, with longitude stripes and a sun so
/// seams and orientation errors are visible.
pub fn environment(d: Vec3) -> [u8; 3] {
    let d = d.normalize_or_zero();
    let sun = Vec3::new(0.3, 0.6, -0.74).normalize();
    if d.dot(sun) > 0.995 {
        return [255, 244, 214];
    }
    let lon = d.z.atan2(d.x);
    let stripe = ((lon / std::f32::consts::TAU * 24.0).rem_euclid(1.0) < 0.5) as u8;
    if d.y >= 0.0 {
        let t = d.y;
        let r = (120.0 - 80.0 * t) as u8;
        let g = (170.0 - 60.0 * t) as u8;
        [r, g, 235 - 20 * stripe]
    } else {
        let t = -d.y;
        let base = (110.0 - 50.0 * t) as u8;
        [base + 30 * stripe, base, (base / 2).saturating_sub(10 * stripe)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pano_grid::FORWARD;

    #[test]
    fn test_center_pixel_sees_forward() {
        let camera = SyntheticCamera::new(64);
        let orientation = Quat::from_rotation_y(1.0) * Quat::from_rotation_x(0.2);
        let image = camera.render(orientation);
        // 64x48: the four pixels around the center straddle the optical axis.
        let center = image.get_pixel(32, 24);
        let expected = environment(orientation * FORWARD);
        for c in 0..3 {
            assert!((center[c] as i32 - expected[c] as i32).abs() <= 20);
        }
    }

    #[test]
    fn test_up_is_sky_down_is_ground() {
        let camera = SyntheticCamera::new(32);
        let image = camera.render(Quat::IDENTITY);
        let top = image.get_pixel(16, 0);
        let bottom = image.get_pixel(16, 23);
        assert!(top[2] > 200, "{top:?}");
        assert!(bottom[2] < 100, "{bottom:?}");
    }

    #[tokio::test]
    async fn test_acquire_reports_metadata() {
        let camera = SyntheticCamera::new(40);
        let acquired = camera.acquire(Quat::IDENTITY).await.unwrap();
        assert_eq!(acquired.image.dimensions(), (40, 30));
        assert_eq!(acquired.metadata.width_px, 40);
        assert_eq!(acquired.metadata.focal_length_mm, Some(4.25));
    }
}
