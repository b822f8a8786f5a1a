//! Field of view from photo metadata.

use serde::{Deserialize, Serialize};

/// Physical sensor dimensions in millimetres, landscape orientation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorSize {
    pub width_mm: f32,
    pub height_mm: f32,
}

impl Default for SensorSize {
    /// A 1/1.7" class phone sensor.
    fn default() -> Self {
        Self {
            width_mm: 7.6,
            height_mm: 5.7,
        }
    }
}

/// Per-photo capture metadata, EXIF conventions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotoMetadata {
    pub focal_length_mm: Option<f32>,
    /// EXIF orientation tag, 1..=8. Tags 5..=8 are portrait.
    pub orientation_tag: u8,
    pub width_px: u32,
    pub height_px: u32,
    pub sensor: SensorSize,
}

impl Default for PhotoMetadata {
    fn default() -> Self {
        Self {
            focal_length_mm: None,
            orientation_tag: 1,
            width_px: 0,
            height_px: 0,
            sensor: SensorSize::default(),
        }
    }
}

impl PhotoMetadata {
    pub fn is_portrait(&self) -> bool {
        (5..=8).contains(&self.orientation_tag)
    }
}

/// Horizontal and vertical field of view, radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldOfView {
    pub x: f32,
    pub y: f32,
}

impl FieldOfView {
    pub fn from_degrees(x: f32, y: f32) -> Self {
        Self {
            x: x.to_radians(),
            y: y.to_radians(),
        }
    }

    /// `tan(fov / 2)` per axis.
    pub fn tan_half(&self) -> (f32, f32) {
        ((self.x * 0.5).tan(), (self.y * 0.5).tan())
    }
}

/// Used when a photo carries no usable focal length.
pub const FALLBACK_FOV: FieldOfView = FieldOfView {
    x: std::f32::consts::FRAC_PI_3,
    y: std::f32::consts::FRAC_PI_4,
};

/// `fov = 2 * atan(sensor / (2 * focal))`, with the sensor axes swapped for
/// portrait orientation tags.
pub fn estimate_fov(meta: &PhotoMetadata) -> FieldOfView {
    let focal = match meta.focal_length_mm {
        Some(f) if f.is_finite() && f > 0.0 => f,
        _ => return FALLBACK_FOV,
    };
    let SensorSize {
        width_mm,
        height_mm,
    } = meta.sensor;
    let (dim_x, dim_y) = if meta.is_portrait() {
        (height_mm, width_mm)
    } else {
        (width_mm, height_mm)
    };
    FieldOfView {
        x: 2.0 * (dim_x / (2.0 * focal)).atan(),
        y: 2.0 * (dim_y / (2.0 * focal)).atan(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(focal: Option<f32>, tag: u8) -> PhotoMetadata {
        PhotoMetadata {
            focal_length_mm: focal,
            orientation_tag: tag,
            width_px: 4032,
            height_px: 3024,
            ..Default::default()
        }
    }

    #[test]
    fn test_landscape_uses_width_for_x() {
        let fov = estimate_fov(&meta(Some(5.23), 1));
        let expected_x = 2.0 * (7.6_f32 / (2.0 * 5.23)).atan();
        let expected_y = 2.0 * (5.7_f32 / (2.0 * 5.23)).atan();
        assert!((fov.x - expected_x).abs() < 1e-6);
        assert!((fov.y - expected_y).abs() < 1e-6);
        assert!(fov.x > fov.y);
    }

    #[test]
    fn test_portrait_swaps_axes() {
        let landscape = estimate_fov(&meta(Some(5.23), 1));
        for tag in 5..=8 {
            let portrait = estimate_fov(&meta(Some(5.23), tag));
            assert!((portrait.x - landscape.y).abs() < 1e-6, "tag {tag}");
            assert!((portrait.y - landscape.x).abs() < 1e-6, "tag {tag}");
        }
    }

    #[test]
    fn test_missing_focal_length_falls_back() {
        assert_eq!(estimate_fov(&meta(None, 6)), FALLBACK_FOV);
        assert_eq!(estimate_fov(&meta(Some(0.0), 1)), FALLBACK_FOV);
        assert!((FALLBACK_FOV.x.to_degrees() - 60.0).abs() < 1e-4);
        assert!((FALLBACK_FOV.y.to_degrees() - 45.0).abs() < 1e-4);
    }

    #[test]
    fn test_longer_lens_narrows_fov() {
        let wide = estimate_fov(&meta(Some(4.0), 1));
        let tele = estimate_fov(&meta(Some(8.0), 1));
        assert!(tele.x < wide.x);
        assert!(tele.y < wide.y);
    }
}
