//! Photo pixels prepared for compositing.

use glam::{Quat, Vec3};
use image::RgbaImage;
use pano_capture::{FieldOfView, ImageHandle, PhotoPoint};

use crate::color::{linear_to_srgb, srgb_to_linear, to_u8};

/// Mip level the low-frequency band is read from.
pub const LOW_PASS_LEVEL: usize = 2;

/// Linear-light RGB raster, row 0 at the top.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearImage {
    width: u32,
    height: u32,
    pixels: Vec<[f32; 3]>,
}

impl LinearImage {
    pub fn new(width: u32, height: u32, pixels: Vec<[f32; 3]>) -> Self {
        debug_assert_eq!(pixels.len(), width as usize * height as usize);
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Decode an sRGB image. Alpha is ignored.
    pub fn from_srgb(image: &RgbaImage) -> Self {
        let pixels = image
            .pixels()
            .map(|p| {
                [
                    srgb_to_linear(p[0] as f32 / 255.0),
                    srgb_to_linear(p[1] as f32 / 255.0),
                    srgb_to_linear(p[2] as f32 / 255.0),
                ]
            })
            .collect();
        Self::new(image.width(), image.height(), pixels)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> [f32; 3] {
        self.pixels[y as usize * self.width as usize + x as usize]
    }

    /// Encode back to opaque RGBA8 sRGB bytes.
    pub fn to_srgb8(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|p| {
                [
                    to_u8(linear_to_srgb(p[0])),
                    to_u8(linear_to_srgb(p[1])),
                    to_u8(linear_to_srgb(p[2])),
                    255,
                ]
            })
            .collect()
    }

    /// 2x2 box filter down to `max(1, size / 2)` per axis.
    pub fn downsample_half(&self) -> Self {
        let width = (self.width / 2).max(1);
        let height = (self.height / 2).max(1);
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            let y0 = (y * 2).min(self.height - 1);
            let y1 = (y * 2 + 1).min(self.height - 1);
            for x in 0..width {
                let x0 = (x * 2).min(self.width - 1);
                let x1 = (x * 2 + 1).min(self.width - 1);
                let mut sum = [0.0; 3];
                for p in [
                    self.pixel(x0, y0),
                    self.pixel(x1, y0),
                    self.pixel(x0, y1),
                    self.pixel(x1, y1),
                ] {
                    for c in 0..3 {
                        sum[c] += p[c] * 0.25;
                    }
                }
                pixels.push(sum);
            }
        }
        Self::new(width, height, pixels)
    }

    /// Bilinear sample with edge clamping. `v` is measured from the bottom.
    pub fn sample(&self, u: f32, v: f32) -> [f32; 3] {
        let fx = u * self.width as f32 - 0.5;
        let fy = (1.0 - v) * self.height as f32 - 0.5;
        let x0 = fx.floor();
        let y0 = fy.floor();
        let tx = fx - x0;
        let ty = fy - y0;

        let max_x = self.width as i64 - 1;
        let max_y = self.height as i64 - 1;
        let clamp_x = |x: f32| (x as i64).clamp(0, max_x) as u32;
        let clamp_y = |y: f32| (y as i64).clamp(0, max_y) as u32;
        let (xa, xb) = (clamp_x(x0), clamp_x(x0 + 1.0));
        let (ya, yb) = (clamp_y(y0), clamp_y(y0 + 1.0));

        let a = self.pixel(xa, ya);
        let b = self.pixel(xb, ya);
        let c = self.pixel(xa, yb);
        let d = self.pixel(xb, yb);
        let mut out = [0.0; 3];
        for i in 0..3 {
            let top = a[i] + (b[i] - a[i]) * tx;
            let bottom = c[i] + (d[i] - c[i]) * tx;
            out[i] = top + (bottom - top) * ty;
        }
        out
    }
}

/// One photo ready for compositing: pose, intrinsics and decoded pixels.
#[derive(Debug, Clone)]
pub struct PhotoSource {
    pub orientation: Quat,
    pub direction: Vec3,
    pub fov: FieldOfView,
    pub sequence_index: usize,
    pub image: ImageHandle,
}

impl PhotoSource {
    /// `None` for photos without pixel data.
    pub fn from_photo(photo: &PhotoPoint) -> Option<Self> {
        if !photo.has_pixels() {
            return None;
        }
        let image = photo.image.clone()?;
        Some(Self {
            orientation: photo.orientation,
            direction: photo.direction,
            fov: photo.fov,
            sequence_index: photo.sequence_index,
            image,
        })
    }

    /// Sources for every photo that has pixels, in capture order.
    pub fn collect(photos: &[PhotoPoint]) -> Vec<Self> {
        photos.iter().filter_map(Self::from_photo).collect()
    }

    /// Linear full-resolution image and its low-pass level.
    pub fn decode(&self) -> (LinearImage, LinearImage) {
        let mut chain = self.mip_chain();
        let low = chain.pop().unwrap_or_else(|| LinearImage::from_srgb(&self.image));
        let full = chain.swap_remove(0);
        (full, low)
    }

    /// Levels `0..=LOW_PASS_LEVEL`, each half the size of the previous.
    pub fn mip_chain(&self) -> Vec<LinearImage> {
        let mut chain = Vec::with_capacity(LOW_PASS_LEVEL + 1);
        chain.push(LinearImage::from_srgb(&self.image));
        for level in 1..=LOW_PASS_LEVEL {
            let next = chain[level - 1].downsample_half();
            chain.push(next);
        }
        chain
    }
}
