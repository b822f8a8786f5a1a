//! Offscreen wgpu compositor.
//!
//! Each photo is uploaded with a short mip chain and drawn as a fullscreen
//! triangle into two additively blended targets (weighted color, weight).
//! Normalize, deghost and rotate then ping-pong between two output-format
//! targets before the result is copied back.

mod context;
mod pipeline;
mod readback;
mod shader;

pub use context::{GpuContext, capture_errors, init_gpu_context_blocking};
pub use shader::{
    ACCUMULATE_SHADER_SOURCE, AccumParams, COMMON_SHADER_SOURCE, DEGHOST_SHADER_SOURCE,
    GhostParams, NORMALIZE_SHADER_SOURCE, NormalizeParams, ROTATE_SHADER_SOURCE, RotateParams,
};

use pano_config::{BakeOptions, OutputEncoding};
use wgpu::util::DeviceExt;

use crate::bake::Compositor;
use crate::error::BakeError;
use crate::job::BakeTicket;
use crate::panorama::{Panorama, PanoramaPixels};
use crate::source::PhotoSource;
use crate::sphere::correction_rotation;
use crate::weights::PhotoProjection;

use pipeline::{
    BakePipelines, COLOR_SUM_FORMAT, PHOTO_FORMAT, WEIGHT_SUM_FORMAT, bytes_per_texel,
    create_target, output_format, run_pass,
};
use readback::{f16_bytes_to_f32, padded_bytes_per_row, read_texture};

/// Bakes on the GPU. Pipelines are built once and reused across bakes.
pub struct GpuCompositor {
    context: GpuContext,
    pipelines: BakePipelines,
}

impl GpuCompositor {
    pub fn new(context: GpuContext) -> Result<Self, BakeError> {
        let pipelines = BakePipelines::new(&context.device)?;
        Ok(Self { context, pipelines })
    }

    /// Create a headless device and build the pipelines.
    pub fn new_blocking() -> Result<Self, BakeError> {
        Self::new(init_gpu_context_blocking()?)
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    fn check_limits(
        &self,
        sources: &[PhotoSource],
        options: &BakeOptions,
    ) -> Result<(), BakeError> {
        self.context
            .check_texture_size("panorama texture", options.width, options.height)?;
        let readback = padded_bytes_per_row(options.width, bytes_per_texel(options.encoding))
            as u64
            * options.height as u64;
        self.context.check_buffer_size("readback buffer", readback)?;
        for source in sources {
            self.context
                .check_texture_size("photo texture", source.image.width(), source.image.height())?;
        }
        Ok(())
    }

    /// Upload a photo with levels `0..=LOW_PASS_LEVEL`, as many as its size allows.
    fn upload_photo(&self, source: &PhotoSource) -> wgpu::Texture {
        let device = &self.context.device;
        let queue = &self.context.queue;
        let (width, height) = (source.image.width(), source.image.height());
        let max_levels = 32 - width.max(height).leading_zeros();
        let chain = source.mip_chain();
        let levels = (chain.len() as u32).min(max_levels);

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("pano-photo"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: levels,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: PHOTO_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        for (level, image) in chain.iter().take(levels as usize).enumerate() {
            // Level 0 goes up untouched; only the filtered levels are re-encoded.
            let encoded;
            let data: &[u8] = if level == 0 {
                source.image.as_raw()
            } else {
                encoded = image.to_srgb8();
                &encoded
            };
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: level as u32,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                data,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * image.width()),
                    rows_per_image: None,
                },
                wgpu::Extent3d {
                    width: image.width(),
                    height: image.height(),
                    depth_or_array_layers: 1,
                },
            );
        }
        texture
    }

    fn uniform_buffer(&self, contents: &[u8], label: &str) -> wgpu::Buffer {
        self.context
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            })
    }

    fn submit_pass(
        &self,
        pipeline: &wgpu::RenderPipeline,
        uniform_bind_group: &wgpu::BindGroup,
        texture_bind_group: &wgpu::BindGroup,
        targets: &[&wgpu::TextureView],
        load_op: wgpu::LoadOp<wgpu::Color>,
        label: &str,
    ) {
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some(label),
                });
        run_pass(
            &mut encoder,
            pipeline,
            uniform_bind_group,
            texture_bind_group,
            targets,
            load_op,
            label,
        );
        self.context.queue.submit(std::iter::once(encoder.finish()));
    }

    fn run_passes(
        &self,
        sources: &[PhotoSource],
        options: &BakeOptions,
        ticket: &BakeTicket,
    ) -> Result<Panorama, BakeError> {
        let device = &self.context.device;
        let (width, height) = (options.width, options.height);
        let format = output_format(options.encoding);
        let outputs = self.pipelines.output(options.encoding);

        let (_color_tex, color_view) =
            create_target(device, COLOR_SUM_FORMAT, width, height, "pano-color-sum");
        let (_weight_tex, weight_view) =
            create_target(device, WEIGHT_SUM_FORMAT, width, height, "pano-weight-sum");
        let (stage_a, stage_a_view) = create_target(device, format, width, height, "pano-stage-a");
        let (stage_b, stage_b_view) = create_target(device, format, width, height, "pano-stage-b");

        // 1. Accumulate every photo into the sum targets.
        for (i, source) in sources.iter().enumerate() {
            ticket.check()?;
            log::trace!("Accumulating photo {}", source.sequence_index);
            let projection = PhotoProjection::new(source.orientation, source.fov, options);
            let params = AccumParams::new(&projection, options);
            let params_buffer =
                self.uniform_buffer(bytemuck::cast_slice(&[params]), "pano-accum-params");
            let params_bg =
                self.pipelines
                    .uniform_bind_group(device, &params_buffer, "pano-accum-params-bg");
            let photo = self.upload_photo(source);
            let photo_view = photo.create_view(&wgpu::TextureViewDescriptor::default());
            let photo_bg = self.pipelines.photo_bind_group(device, &photo_view);
            let load_op = if i == 0 {
                wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT)
            } else {
                wgpu::LoadOp::Load
            };
            self.submit_pass(
                &self.pipelines.accumulate,
                &params_bg,
                &photo_bg,
                &[&color_view, &weight_view],
                load_op,
                "pano-accumulate",
            );
        }

        // 2. Normalize into stage A.
        ticket.check()?;
        let params = NormalizeParams::new(options);
        let buffer = self.uniform_buffer(bytemuck::cast_slice(&[params]), "pano-normalize-params");
        let params_bg = self
            .pipelines
            .uniform_bind_group(device, &buffer, "pano-normalize-params-bg");
        let sums_bg = self
            .pipelines
            .sums_bind_group(device, &color_view, &weight_view);
        self.submit_pass(
            &outputs.normalize,
            &params_bg,
            &sums_bg,
            &[&stage_a_view],
            wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
            "pano-normalize",
        );

        // 3. Deghost A -> B.
        ticket.check()?;
        let params = GhostParams::new(options);
        let buffer = self.uniform_buffer(bytemuck::cast_slice(&[params]), "pano-ghost-params");
        let params_bg = self
            .pipelines
            .uniform_bind_group(device, &buffer, "pano-ghost-params-bg");
        let source_bg = self
            .pipelines
            .single_bind_group(device, &stage_a_view, "pano-stage-a-bg");
        self.submit_pass(
            &outputs.deghost,
            &params_bg,
            &source_bg,
            &[&stage_b_view],
            wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
            "pano-deghost",
        );
        let mut result = &stage_b;

        // 4. Orientation correction B -> A.
        if options.has_rotation() {
            ticket.check()?;
            let rotation =
                correction_rotation(options.yaw_deg, options.pitch_deg, options.roll_deg);
            let params = RotateParams::new(rotation.transpose());
            let buffer = self.uniform_buffer(bytemuck::cast_slice(&[params]), "pano-rotate-params");
            let params_bg = self
                .pipelines
                .uniform_bind_group(device, &buffer, "pano-rotate-params-bg");
            let source_bg = self
                .pipelines
                .single_bind_group(device, &stage_b_view, "pano-stage-b-bg");
            self.submit_pass(
                &outputs.rotate,
                &params_bg,
                &source_bg,
                &[&stage_a_view],
                wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                "pano-rotate",
            );
            result = &stage_a;
        }

        ticket.check()?;
        let bytes = read_texture(
            device,
            &self.context.queue,
            result,
            bytes_per_texel(options.encoding),
        )?;
        let pixels = match options.encoding {
            OutputEncoding::Srgb8 => PanoramaPixels::Srgb8(bytes),
            OutputEncoding::LinearHdr => PanoramaPixels::Linear(f16_bytes_to_f32(&bytes)),
        };
        Ok(Panorama {
            width,
            height,
            pixels,
        })
    }
}

impl Compositor for GpuCompositor {
    fn name(&self) -> &'static str {
        "gpu"
    }

    /// Any wgpu error raised while baking aborts the bake with
    /// [`BakeError::Gpu`]; the intermediate targets are dropped either way.
    fn composite(
        &mut self,
        sources: &[PhotoSource],
        options: &BakeOptions,
        ticket: &BakeTicket,
    ) -> Result<Panorama, BakeError> {
        self.check_limits(sources, options)?;
        capture_errors(&self.context.device, "bake", || {
            self.run_passes(sources, options, ticket)
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bake::bake_with;
    use crate::cpu::CpuCompositor;
    use glam::Quat;
    use image::{Rgba, RgbaImage};
    use pano_capture::{PhotoMetadata, PhotoPoint};
    use pano_grid::PointId;
    use std::sync::Arc;

    /// `None` only when the machine has no usable GPU; a compositor that
    /// fails to build is a test failure.
    fn gpu() -> Option<GpuCompositor> {
        match GpuCompositor::new_blocking() {
            Ok(gpu) => Some(gpu),
            Err(BakeError::NoAdapter | BakeError::DeviceRequest(_)) => None,
            Err(e) => panic!("GPU compositor failed to build: {e}"),
        }
    }

    fn photo(orientation: Quat, image: RgbaImage, index: usize) -> PhotoPoint {
        PhotoPoint::new(
            orientation,
            2.0,
            Some(Arc::new(image)),
            PhotoMetadata::default(),
            PointId::SEED,
            index,
            0,
        )
    }

    fn options() -> BakeOptions {
        BakeOptions {
            dither: false,
            ..BakeOptions::default().with_width(128)
        }
    }

    fn scene() -> Vec<PhotoPoint> {
        let checker = RgbaImage::from_fn(48, 36, |x, y| {
            if (x / 6 + y / 6) % 2 == 0 {
                Rgba([220, 180, 40, 255])
            } else {
                Rgba([30, 60, 200, 255])
            }
        });
        vec![
            photo(Quat::IDENTITY, checker.clone(), 0),
            photo(Quat::from_rotation_y(0.6), checker.clone(), 1),
            photo(Quat::from_rotation_x(0.7), checker, 2),
        ]
    }

    #[test]
    fn test_gpu_uniform_photo() {
        let Some(mut gpu) = gpu() else {
            return;
        };
        let options = options();
        let image = RgbaImage::from_pixel(32, 24, Rgba([128, 64, 200, 255]));
        let pano = bake_with(
            &mut gpu,
            &[photo(Quat::IDENTITY, image, 0)],
            &options,
            &BakeTicket::detached(),
        )
        .unwrap();
        assert_eq!((pano.width, pano.height), (128, 64));
        // -Z is longitude -90 degrees: column 32, the equator row.
        let t = pano.texel(32, 32);
        let bytes = t.map(|c| (c * 255.0).round() as i32);
        assert!((bytes[0] - 128).abs() <= 2, "{bytes:?}");
        assert!((bytes[1] - 64).abs() <= 2, "{bytes:?}");
        assert!((bytes[2] - 200).abs() <= 2, "{bytes:?}");
        // Behind the photo nothing was drawn.
        assert_eq!(pano.texel(96, 32), [0.0; 4]);
    }

    #[test]
    fn test_gpu_matches_cpu() {
        let Some(mut gpu) = gpu() else {
            return;
        };
        for encoding in [OutputEncoding::Srgb8, OutputEncoding::LinearHdr] {
            let options = BakeOptions {
                encoding,
                yaw_deg: 30.0,
                ..options()
            };
            let photos = scene();
            let ticket = BakeTicket::detached();
            let on_gpu = bake_with(&mut gpu, &photos, &options, &ticket).unwrap();
            let on_cpu =
                bake_with(&mut CpuCompositor::with_threads(2), &photos, &options, &ticket).unwrap();

            let mut total = 0.0;
            let mut count = 0;
            for y in 0..options.height {
                for x in 0..options.width {
                    let g = on_gpu.texel(x, y);
                    let c = on_cpu.texel(x, y);
                    for k in 0..4 {
                        total += (g[k] - c[k]).abs().min(1.0);
                        count += 1;
                    }
                }
            }
            let mean = total / count as f32;
            assert!(mean < 0.03, "{encoding:?}: mean difference {mean}");
        }
    }

    #[test]
    fn test_gpu_cancelled_ticket() {
        let Some(mut gpu) = gpu() else {
            return;
        };
        let scheduler = crate::job::BakeScheduler::new();
        let stale = scheduler.issue();
        scheduler.issue();
        let result = bake_with(&mut gpu, &scene(), &options(), &stale);
        assert!(matches!(result, Err(BakeError::Cancelled)));
    }

    #[test]
    fn test_gpu_rejects_oversized_output() {
        let Some(mut gpu) = gpu() else {
            return;
        };
        let limit = gpu.context().device.limits().max_texture_dimension_2d;
        let options = BakeOptions {
            width: limit + 1,
            height: 4,
            ..options()
        };
        let photos = vec![photo(
            Quat::IDENTITY,
            RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255])),
            0,
        )];
        let result = bake_with(&mut gpu, &photos, &options, &BakeTicket::detached());
        assert!(matches!(result, Err(BakeError::ResourceLimit { .. })));
    }
}
