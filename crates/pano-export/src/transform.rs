//! Pixel-level orientation fixes applied to an RGBA8 frame before encoding.

use pano_config::ExportConfig;

const BYTES_PER_PIXEL: usize = 4;

/// Orientation fixes for one request.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExportOptions {
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
    pub yaw_offset_deg: f32,
}

impl From<&ExportConfig> for ExportOptions {
    fn from(config: &ExportConfig) -> Self {
        Self {
            flip_horizontal: config.flip_horizontal,
            flip_vertical: config.flip_vertical,
            yaw_offset_deg: config.yaw_offset_deg,
        }
    }
}

/// What [`apply_transform`] did to a frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformReport {
    /// `(expected, actual)` buffer length when they differed.
    pub length_mismatch: Option<(usize, usize)>,
    pub flipped: bool,
    /// Columns moved from the left edge to the right edge.
    pub shift_px: u32,
}

/// Columns a yaw offset rotates the panorama by: `round(W * (yaw mod 360) / 360)`,
/// reduced modulo `W` so a full turn is a no-op.
pub fn yaw_shift_columns(width: u32, yaw_offset_deg: f32) -> u32 {
    if width == 0 || !yaw_offset_deg.is_finite() {
        return 0;
    }
    let normalized = yaw_offset_deg.rem_euclid(360.0) as f64;
    let shift = (normalized / 360.0 * width as f64).round() as u32;
    shift % width
}

/// Mirror along X and/or Y.
pub fn flip(pixels: &mut [u8], width: u32, height: u32, horizontal: bool, vertical: bool) {
    let row_len = width as usize * BYTES_PER_PIXEL;
    let rows = height as usize;
    if horizontal {
        for row in pixels.chunks_exact_mut(row_len).take(rows) {
            let w = width as usize;
            for x in 0..w / 2 {
                let (a, b) = (x * BYTES_PER_PIXEL, (w - 1 - x) * BYTES_PER_PIXEL);
                for c in 0..BYTES_PER_PIXEL {
                    row.swap(a + c, b + c);
                }
            }
        }
    }
    if vertical {
        for y in 0..rows / 2 {
            let (top, bottom) = pixels.split_at_mut((rows - 1 - y) * row_len);
            top[y * row_len..(y + 1) * row_len].swap_with_slice(&mut bottom[..row_len]);
        }
    }
}

/// Wraparound column rotation: columns `[shift, W)` move to the left edge and
/// `[0, shift)` follow them on the right.
pub fn shift_columns(pixels: &mut [u8], width: u32, height: u32, shift_px: u32) {
    if shift_px == 0 || shift_px >= width {
        return;
    }
    let row_len = width as usize * BYTES_PER_PIXEL;
    for row in pixels.chunks_exact_mut(row_len).take(height as usize) {
        row.rotate_left(shift_px as usize * BYTES_PER_PIXEL);
    }
}

/// Flip then yaw-shift `pixels` in place.
///
/// A buffer whose length is not `width * height * 4` is truncated or padded
/// with transparent black to that length and reported; it never panics.
pub fn apply_transform(
    pixels: &mut Vec<u8>,
    width: u32,
    height: u32,
    options: &ExportOptions,
) -> TransformReport {
    let expected = width as usize * height as usize * BYTES_PER_PIXEL;
    let mut report = TransformReport::default();
    if pixels.len() != expected {
        report.length_mismatch = Some((expected, pixels.len()));
        pixels.resize(expected, 0);
    }

    if options.flip_horizontal || options.flip_vertical {
        flip(
            pixels,
            width,
            height,
            options.flip_horizontal,
            options.flip_vertical,
        );
        report.flipped = true;
    }

    report.shift_px = yaw_shift_columns(width, options.yaw_offset_deg);
    shift_columns(pixels, width, height, report.shift_px);
    report
}
