//! The baked equirectangular image.

use image::RgbaImage;
use pano_config::OutputEncoding;

use crate::color::{linear_to_srgb, to_u8};

#[derive(Debug, Clone, PartialEq)]
pub enum PanoramaPixels {
    /// RGBA8, sRGB encoded.
    Srgb8(Vec<u8>),
    /// RGBA, linear light.
    Linear(Vec<f32>),
}

/// Row-major RGBA panorama, row 0 at the top (latitude +90 degrees).
#[derive(Debug, Clone, PartialEq)]
pub struct Panorama {
    pub width: u32,
    pub height: u32,
    pub pixels: PanoramaPixels,
}

impl Panorama {
    /// Store `[0, 1]` or linear texels in the requested encoding.
    ///
    /// For [`OutputEncoding::Srgb8`] the texels must already be display
    /// encoded; they are only rounded to bytes here.
    pub fn from_texels(
        width: u32,
        height: u32,
        texels: &[[f32; 4]],
        encoding: OutputEncoding,
    ) -> Self {
        let pixels = match encoding {
            OutputEncoding::Srgb8 => {
                PanoramaPixels::Srgb8(texels.iter().flatten().map(|&c| to_u8(c)).collect())
            }
            OutputEncoding::LinearHdr => {
                PanoramaPixels::Linear(texels.iter().flatten().copied().collect())
            }
        };
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn encoding(&self) -> OutputEncoding {
        match self.pixels {
            PanoramaPixels::Srgb8(_) => OutputEncoding::Srgb8,
            PanoramaPixels::Linear(_) => OutputEncoding::LinearHdr,
        }
    }

    /// RGBA of texel `(x, y)` as floats, in the panorama's own encoding.
    pub fn texel(&self, x: u32, y: u32) -> [f32; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        match &self.pixels {
            PanoramaPixels::Srgb8(bytes) => std::array::from_fn(|c| bytes[i + c] as f32 / 255.0),
            PanoramaPixels::Linear(values) => std::array::from_fn(|c| values[i + c]),
        }
    }

    /// RGBA8 sRGB bytes. Linear panoramas are clamped and encoded.
    pub fn to_rgba8(&self) -> Vec<u8> {
        match &self.pixels {
            PanoramaPixels::Srgb8(bytes) => bytes.clone(),
            PanoramaPixels::Linear(values) => values
                .chunks_exact(4)
                .flat_map(|t| {
                    [
                        to_u8(linear_to_srgb(t[0])),
                        to_u8(linear_to_srgb(t[1])),
                        to_u8(linear_to_srgb(t[2])),
                        to_u8(t[3]),
                    ]
                })
                .collect(),
        }
    }

    pub fn to_image(&self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.to_rgba8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_srgb_texels_round_to_bytes() {
        let pano = Panorama::from_texels(1, 1, &[[1.0, 0.5, 0.0, 1.0]], OutputEncoding::Srgb8);
        assert_eq!(pano.pixels, PanoramaPixels::Srgb8(vec![255, 128, 0, 255]));
        assert_eq!(pano.encoding(), OutputEncoding::Srgb8);
    }

    #[test]
    fn test_linear_converts_for_display() {
        let texels = [[1.0, 0.0, 4.0, 1.0], [0.2159, 0.2159, 0.2159, 0.0]];
        let pano = Panorama::from_texels(2, 1, &texels, OutputEncoding::LinearHdr);
        assert_eq!(pano.texel(0, 0)[2], 4.0);
        let bytes = pano.to_rgba8();
        assert_eq!(&bytes[..4], &[255, 0, 255, 255]);
        assert_eq!(bytes[4], 128);
        assert_eq!(bytes[7], 0);
        assert_eq!(pano.to_image().unwrap().dimensions(), (2, 1));
    }
}
