//! Multi-threaded CPU compositor.
//!
//! Reference implementation of the four passes. Rows of the output are split
//! across scoped threads; every pass reads only the previous pass's buffer.

use pano_config::{BakeOptions, OutputEncoding};

use crate::bake::Compositor;
use crate::color::{dither_noise, linear_to_srgb, luminance, quantize};
use crate::error::BakeError;
use crate::job::BakeTicket;
use crate::panorama::Panorama;
use crate::source::PhotoSource;
use crate::sphere::{correction_rotation, direction_to_uv, texel_direction};
use crate::weights::{PhotoProjection, smoothstep, texel_weights};

/// Weighted linear RGB sum in `xyz`, weight sum in `w`.
type Accum = [f32; 4];

pub struct CpuCompositor {
    threads: usize,
}

impl Default for CpuCompositor {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuCompositor {
    /// One thread per logical CPU.
    pub fn new() -> Self {
        Self::with_threads(num_cpus::get())
    }

    pub fn with_threads(threads: usize) -> Self {
        Self {
            threads: threads.max(1),
        }
    }

    /// Run `f(x, y, texel)` over every texel, rows split across threads.
    fn par_texels<T, F>(&self, buffer: &mut [T], width: u32, f: F)
    where
        T: Send,
        F: Fn(u32, u32, &mut T) + Sync,
    {
        let row_len = width as usize;
        let rows = buffer.len() / row_len;
        let rows_per_chunk = rows.div_ceil(self.threads).max(1);
        let f = &f;
        std::thread::scope(|scope| {
            for (chunk_index, chunk) in buffer.chunks_mut(rows_per_chunk * row_len).enumerate() {
                scope.spawn(move || {
                    let first_row = chunk_index * rows_per_chunk;
                    for (i, texel) in chunk.iter_mut().enumerate() {
                        f((i % row_len) as u32, (first_row + i / row_len) as u32, texel);
                    }
                });
            }
        });
    }

    fn accumulate(&self, accum: &mut [Accum], source: &PhotoSource, options: &BakeOptions) {
        let projection = PhotoProjection::new(source.orientation, source.fov, options);
        let (full, low) = source.decode();
        let (width, height) = (options.width, options.height);
        self.par_texels(accum, width, |x, y, texel| {
            let d = texel_direction(x, y, width, height);
            let Some(w) = texel_weights(d, &projection, options) else {
                return;
            };
            let c = full.sample(w.u, w.v);
            let l = low.sample(w.u, w.v);
            for k in 0..3 {
                texel[k] += l[k] * w.low + (c[k] - l[k]) * w.high;
            }
            texel[3] += w.accum;
        });
    }

    fn normalize(&self, accum: &[Accum], options: &BakeOptions) -> Vec<[f32; 4]> {
        let mut out = vec![[0.0; 4]; accum.len()];
        let width = options.width;
        self.par_texels(&mut out, width, |x, y, texel| {
            let a = accum[y as usize * width as usize + x as usize];
            *texel = normalize_texel(a, x, y, options);
        });
        out
    }

    fn deghost(&self, src: &[[f32; 4]], options: &BakeOptions) -> Vec<[f32; 4]> {
        let mut out = vec![[0.0; 4]; src.len()];
        let (width, height) = (options.width, options.height);
        self.par_texels(&mut out, width, |x, y, texel| {
            let t = ghost_texel(src, width, height, x, y, options);
            *texel = match options.encoding {
                OutputEncoding::Srgb8 => t.map(quantize),
                OutputEncoding::LinearHdr => t,
            };
        });
        out
    }

    fn rotate(&self, src: &[[f32; 4]], options: &BakeOptions) -> Vec<[f32; 4]> {
        let source_from_output =
            correction_rotation(options.yaw_deg, options.pitch_deg, options.roll_deg).transpose();
        let mut out = vec![[0.0; 4]; src.len()];
        let (width, height) = (options.width, options.height);
        self.par_texels(&mut out, width, |x, y, texel| {
            let d = source_from_output * texel_direction(x, y, width, height);
            let (u, v) = direction_to_uv(d);
            let t = sample_wrapped(src, width, height, u, v);
            *texel = match options.encoding {
                OutputEncoding::Srgb8 => t.map(quantize),
                OutputEncoding::LinearHdr => t,
            };
        });
        out
    }
}

impl Compositor for CpuCompositor {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn composite(
        &mut self,
        sources: &[PhotoSource],
        options: &BakeOptions,
        ticket: &BakeTicket,
    ) -> Result<Panorama, BakeError> {
        let texels = options.width as usize * options.height as usize;
        let mut accum = vec![[0.0; 4]; texels];
        for source in sources {
            ticket.check()?;
            tracing::trace!(sequence = source.sequence_index, "Accumulating photo");
            self.accumulate(&mut accum, source, options);
        }

        ticket.check()?;
        let normalized = self.normalize(&accum, options);
        drop(accum);

        ticket.check()?;
        let mut result = self.deghost(&normalized, options);

        if options.has_rotation() {
            ticket.check()?;
            result = self.rotate(&result, options);
        }

        ticket.check()?;
        Ok(Panorama::from_texels(
            options.width,
            options.height,
            &result,
            options.encoding,
        ))
    }
}

/// Divide out the weight sum and encode.
pub fn normalize_texel(accum: Accum, x: u32, y: u32, options: &BakeOptions) -> [f32; 4] {
    let weight = accum[3];
    if weight <= options.epsilon {
        return match options.encoding {
            OutputEncoding::Srgb8 => options.empty_color.map(quantize),
            OutputEncoding::LinearHdr => options.empty_color,
        };
    }
    let inv = 1.0 / weight.max(options.epsilon);
    let linear = [accum[0] * inv, accum[1] * inv, accum[2] * inv];
    match options.encoding {
        OutputEncoding::Srgb8 => {
            let noise = if options.dither {
                dither_noise(x, y) / 255.0
            } else {
                0.0
            };
            [
                quantize(linear_to_srgb(linear[0]) + noise),
                quantize(linear_to_srgb(linear[1]) + noise),
                quantize(linear_to_srgb(linear[2]) + noise),
                1.0,
            ]
        }
        OutputEncoding::LinearHdr => [linear[0], linear[1], linear[2], 1.0],
    }
}

/// Pull a texel toward its 3x3 luminance median when it stands out.
///
/// Columns wrap around the seam, rows clamp at the poles.
pub fn ghost_texel(
    src: &[[f32; 4]],
    width: u32,
    height: u32,
    x: u32,
    y: u32,
    options: &BakeOptions,
) -> [f32; 4] {
    let at = |sx: u32, sy: u32| src[sy as usize * width as usize + sx as usize];
    let center = at(x, y);

    let mut samples = [[0.0_f32; 3]; 9];
    let mut lum = [0.0_f32; 9];
    let mut k = 0;
    for dy in -1_i64..=1 {
        for dx in -1_i64..=1 {
            let sx = (x as i64 + dx).rem_euclid(width as i64) as u32;
            let sy = (y as i64 + dy).clamp(0, height as i64 - 1) as u32;
            let s = at(sx, sy);
            samples[k] = [s[0], s[1], s[2]];
            lum[k] = luminance(samples[k]);
            k += 1;
        }
    }
    // Insertion sort, same order of comparisons as the shader.
    for i in 1..9 {
        let mut j = i;
        while j > 0 && lum[j] < lum[j - 1] {
            lum.swap(j, j - 1);
            samples.swap(j, j - 1);
            j -= 1;
        }
    }
    let median = samples[4];
    let diff = ((median[0] - center[0]).powi(2)
        + (median[1] - center[1]).powi(2)
        + (median[2] - center[2]).powi(2))
    .sqrt();
    let t = smoothstep(options.ghost_threshold, 2.0 * options.ghost_threshold, diff);
    let mix = options.ghost_blend * t;
    [
        center[0] + (median[0] - center[0]) * mix,
        center[1] + (median[1] - center[1]) * mix,
        center[2] + (median[2] - center[2]) * mix,
        center[3],
    ]
}

/// Bilinear sample of an equirectangular buffer, wrapping in `u` and
/// clamping in `v` (measured from the bottom).
pub fn sample_wrapped(src: &[[f32; 4]], width: u32, height: u32, u: f32, v: f32) -> [f32; 4] {
    let fx = u * width as f32 - 0.5;
    let fy = (1.0 - v) * height as f32 - 0.5;
    let x0 = fx.floor();
    let y0 = fy.floor();
    let tx = fx - x0;
    let ty = fy - y0;

    let w = width as i64;
    let max_y = height as i64 - 1;
    let xa = (x0 as i64).rem_euclid(w) as usize;
    let xb = (x0 as i64 + 1).rem_euclid(w) as usize;
    let ya = (y0 as i64).clamp(0, max_y) as usize;
    let yb = (y0 as i64 + 1).clamp(0, max_y) as usize;
    let row = width as usize;

    let a = src[ya * row + xa];
    let b = src[ya * row + xb];
    let c = src[yb * row + xa];
    let d = src[yb * row + xb];
    std::array::from_fn(|i| {
        let top = a[i] + (b[i] - a[i]) * tx;
        let bottom = c[i] + (d[i] - c[i]) * tx;
        top + (bottom - top) * ty
    })
}
