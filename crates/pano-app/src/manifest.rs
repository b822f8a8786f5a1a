//! RON photo manifests for offline bakes.
//!
//! ```ron
//! (
//!     photos: [
//!         (
//!             image: "front.jpg",
//!             orientation: (0.0, 0.0, 0.0, 1.0),
//!             metadata: (focal_length_mm: Some(4.25), orientation_tag: 1),
//!             point: Some("middle:0"),
//!         ),
//!     ],
//! )
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use glam::Quat;
use pano_capture::{PhotoMetadata, PhotoPoint};
use pano_grid::PointId;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Manifest {
    pub photos: Vec<ManifestPhoto>,
}

/// One photo: where its pixels are and how the camera was posed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManifestPhoto {
    /// Relative paths resolve against the manifest's directory.
    pub image: PathBuf,
    /// Camera orientation as `(x, y, z, w)`.
    pub orientation: (f32, f32, f32, f32),
    #[serde(default)]
    pub metadata: PhotoMetadata,
    /// Grid point the photo was captured for, if known.
    #[serde(default)]
    pub point: Option<String>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let contents = std::fs::read_to_string(path).map_err(|source| AppError::ManifestRead {
            path: path.to_path_buf(),
            source,
        })?;
        ron::from_str(&contents).map_err(|source| AppError::ManifestParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Decode every image and build photo records in manifest order.
    ///
    /// Missing metadata dimensions are filled from the decoded image.
    pub fn into_photos(self, base_dir: &Path) -> Result<Vec<PhotoPoint>, AppError> {
        let mut photos = Vec::with_capacity(self.photos.len());
        for (index, entry) in self.photos.into_iter().enumerate() {
            let path = if entry.image.is_absolute() {
                entry.image.clone()
            } else {
                base_dir.join(&entry.image)
            };
            let image = image::open(&path)
                .map_err(|source| AppError::Image {
                    path: path.clone(),
                    source,
                })?
                .to_rgba8();

            let mut metadata = entry.metadata;
            if metadata.width_px == 0 || metadata.height_px == 0 {
                metadata.width_px = image.width();
                metadata.height_px = image.height();
            }
            let point = match entry.point.as_deref().map(str::parse::<PointId>) {
                Some(Ok(id)) => id,
                Some(Err(e)) => {
                    tracing::warn!(index, error = %e, "Ignoring unknown point id in manifest");
                    PointId::SEED
                }
                None => PointId::SEED,
            };
            let (x, y, z, w) = entry.orientation;
            let photo = PhotoPoint::new(
                Quat::from_xyzw(x, y, z, w),
                pano_grid::DEFAULT_SAMPLING_RADIUS,
                Some(Arc::new(image)),
                metadata,
                point,
                index,
                0,
            )
            .with_uri(path.display().to_string());
            tracing::debug!(
                index,
                uri = %path.display(),
                fov_x_deg = photo.fov.x.to_degrees(),
                fov_y_deg = photo.fov.y.to_degrees(),
                "Loaded photo"
            );
            photos.push(photo);
        }
        Ok(photos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_load_manifest_and_photos() {
        let dir = tempfile::tempdir().unwrap();
        RgbaImage::from_pixel(8, 6, Rgba([10, 20, 30, 255]))
            .save(dir.path().join("a.png"))
            .unwrap();
        let manifest_path = dir.path().join("photos.ron");
        std::fs::write(
            &manifest_path,
            r#"(
                photos: [
                    (
                        image: "a.png",
                        orientation: (0.0, 0.0, 0.0, 1.0),
                        metadata: (focal_length_mm: Some(4.25)),
                        point: Some("middle:3"),
                    ),
                    (
                        image: "a.png",
                        orientation: (0.0, 0.7071068, 0.0, 0.7071068),
                        point: Some("nowhere:9"),
                    ),
                ],
            )"#,
        )
        .unwrap();

        let manifest = Manifest::load(&manifest_path).unwrap();
        assert_eq!(manifest.photos.len(), 2);
        let photos = manifest.into_photos(dir.path()).unwrap();
        assert_eq!(photos[0].metadata.width_px, 8);
        assert_eq!(photos[0].captured_point_id.to_string(), "middle:3");
        assert_eq!(photos[1].captured_point_id, PointId::SEED);
        assert_eq!(photos[1].sequence_index, 1);
        assert!(photos.iter().all(|p| p.has_pixels()));
        // A 90 degree yaw turns -Z toward -X.
        assert!((photos[1].direction.x + 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_missing_image_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Manifest {
            photos: vec![ManifestPhoto {
                image: PathBuf::from("missing.jpg"),
                orientation: (0.0, 0.0, 0.0, 1.0),
                metadata: PhotoMetadata::default(),
                point: None,
            }],
        };
        let result = manifest.into_photos(dir.path());
        assert!(matches!(result, Err(AppError::Image { .. })));
    }

    #[test]
    fn test_parse_error_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.ron");
        std::fs::write(&path, "(photos: [").unwrap();
        let err = Manifest::load(&path).unwrap_err();
        assert!(err.to_string().contains("broken.ron"));
    }
}
