//! Debug view of where each photo's accumulation weight lands.

use std::path::Path;

use image::{GrayImage, Luma};
use pano_bake::sphere::texel_direction;
use pano_bake::{PhotoProjection, PhotoSource, texel_weights};
use pano_config::BakeOptions;

use crate::error::AppError;

/// Total accumulation weight per output texel, row-major, top row first.
pub fn weight_sums(sources: &[PhotoSource], options: &BakeOptions) -> Vec<f32> {
    let (width, height) = (options.width, options.height);
    let projections: Vec<PhotoProjection> = sources
        .iter()
        .map(|s| PhotoProjection::new(s.orientation, s.fov, options))
        .collect();
    let mut sums = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height {
        for x in 0..width {
            let d = texel_direction(x, y, width, height);
            let total: f32 = projections
                .iter()
                .filter_map(|p| texel_weights(d, p, options))
                .map(|w| w.accum)
                .sum();
            sums.push(total);
        }
    }
    sums
}

/// Log-scaled grayscale image of [`weight_sums`]; black where no photo reaches.
pub fn coverage_image(sources: &[PhotoSource], options: &BakeOptions) -> GrayImage {
    let sums = weight_sums(sources, options);
    let max = sums.iter().copied().fold(0.0_f32, f32::max);
    let scale = if max > 0.0 { 1.0 / max.ln_1p() } else { 0.0 };
    GrayImage::from_fn(options.width, options.height, |x, y| {
        let sum = sums[(y * options.width + x) as usize];
        Luma([(sum.ln_1p() * scale * 255.0).round().clamp(0.0, 255.0) as u8])
    })
}

pub fn write_coverage(
    sources: &[PhotoSource],
    options: &BakeOptions,
    path: &Path,
) -> Result<(), AppError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    coverage_image(sources, options)
        .save(path)
        .map_err(|source| AppError::Image {
            path: path.to_path_buf(),
            source,
        })?;
    tracing::info!(path = %path.display(), "Wrote coverage map");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;
    use image::{Rgba, RgbaImage};
    use pano_capture::{PhotoMetadata, PhotoPoint};
    use pano_grid::PointId;
    use std::sync::Arc;

    fn source() -> PhotoSource {
        let photo = PhotoPoint::new(
            Quat::IDENTITY,
            2.0,
            Some(Arc::new(RgbaImage::from_pixel(8, 6, Rgba([1, 2, 3, 255])))),
            PhotoMetadata::default(),
            PointId::SEED,
            0,
            0,
        );
        PhotoSource::from_photo(&photo).unwrap()
    }

    #[test]
    fn test_coverage_front_and_back() {
        let options = BakeOptions::default().with_width(64);
        let image = coverage_image(&[source()], &options);
        // -Z is column W/4 on the equator; +Z is 3W/4.
        assert!(image.get_pixel(16, 16)[0] > 0);
        assert_eq!(image.get_pixel(48, 16)[0], 0);
    }

    #[test]
    fn test_write_coverage_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("debug").join("coverage.png");
        let options = BakeOptions::default().with_width(32);
        write_coverage(&[source()], &options, &path).unwrap();
        let reloaded = image::open(&path).unwrap();
        assert_eq!((reloaded.width(), reloaded.height()), (32, 16));
    }
}
