//! Bind group layouts, render pipelines and render targets for the four passes.

use pano_config::OutputEncoding;

use crate::error::BakeError;

use super::context::capture_errors;
use super::shader::{
    ACCUMULATE_SHADER_SOURCE, DEGHOST_SHADER_SOURCE, NORMALIZE_SHADER_SOURCE,
    ROTATE_SHADER_SOURCE, pass_source,
};

/// Weighted color sum target.
pub const COLOR_SUM_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
/// Weight sum target.
pub const WEIGHT_SUM_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R16Float;
/// Photos are uploaded display-encoded; sampling returns linear light.
pub const PHOTO_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// Target format of the normalize, deghost and rotate passes.
pub fn output_format(encoding: OutputEncoding) -> wgpu::TextureFormat {
    match encoding {
        // Values are encoded in the shader, so the target must not re-encode.
        OutputEncoding::Srgb8 => wgpu::TextureFormat::Rgba8Unorm,
        // Some adapters cannot render to Rgba32Float.
        OutputEncoding::LinearHdr => wgpu::TextureFormat::Rgba16Float,
    }
}

pub fn bytes_per_texel(encoding: OutputEncoding) -> u32 {
    match encoding {
        OutputEncoding::Srgb8 => 4,
        OutputEncoding::LinearHdr => 8,
    }
}

const ADDITIVE: wgpu::BlendComponent = wgpu::BlendComponent {
    src_factor: wgpu::BlendFactor::One,
    dst_factor: wgpu::BlendFactor::One,
    operation: wgpu::BlendOperation::Add,
};

/// Pipelines that write an output-format target.
pub struct OutputPipelines {
    pub normalize: wgpu::RenderPipeline,
    pub deghost: wgpu::RenderPipeline,
    pub rotate: wgpu::RenderPipeline,
}

/// Everything that does not depend on the photos or the output size.
pub struct BakePipelines {
    pub uniform_bgl: wgpu::BindGroupLayout,
    pub photo_bgl: wgpu::BindGroupLayout,
    pub sums_bgl: wgpu::BindGroupLayout,
    pub single_bgl: wgpu::BindGroupLayout,
    pub photo_sampler: wgpu::Sampler,
    pub accumulate: wgpu::RenderPipeline,
    srgb8: OutputPipelines,
    linear_hdr: OutputPipelines,
}

impl BakePipelines {
    /// Build every pipeline, failing with [`BakeError::Gpu`] if wgpu rejects
    /// any of them.
    pub fn new(device: &wgpu::Device) -> Result<Self, BakeError> {
        capture_errors(device, "building bake pipelines", || Self::build(device))
    }

    fn build(device: &wgpu::Device) -> Self {
        let uniform_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("pano-uniform-bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    // Shared by passes with differently sized params.
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let photo_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("pano-photo-bgl"),
            entries: &[
                texture_entry(0, true),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let sums_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("pano-sums-bgl"),
            entries: &[texture_entry(0, false), texture_entry(1, false)],
        });

        let single_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("pano-single-bgl"),
            entries: &[texture_entry(0, false)],
        });

        let accumulate_layout =
            pipeline_layout(device, &uniform_bgl, &photo_bgl, "pano-accumulate-layout");
        let normalize_layout =
            pipeline_layout(device, &uniform_bgl, &sums_bgl, "pano-normalize-layout");
        let single_layout =
            pipeline_layout(device, &uniform_bgl, &single_bgl, "pano-single-layout");

        let accumulate_shader =
            shader_module(device, ACCUMULATE_SHADER_SOURCE, "pano-accumulate-shader");
        let normalize_shader =
            shader_module(device, NORMALIZE_SHADER_SOURCE, "pano-normalize-shader");
        let deghost_shader = shader_module(device, DEGHOST_SHADER_SOURCE, "pano-deghost-shader");
        let rotate_shader = shader_module(device, ROTATE_SHADER_SOURCE, "pano-rotate-shader");

        let additive = Some(wgpu::BlendState {
            color: ADDITIVE,
            alpha: ADDITIVE,
        });
        let accumulate = create_fullscreen_pipeline(
            device,
            &accumulate_shader,
            &accumulate_layout,
            "fs_accumulate",
            &[
                Some(wgpu::ColorTargetState {
                    format: COLOR_SUM_FORMAT,
                    blend: additive,
                    write_mask: wgpu::ColorWrites::ALL,
                }),
                Some(wgpu::ColorTargetState {
                    format: WEIGHT_SUM_FORMAT,
                    blend: additive,
                    write_mask: wgpu::ColorWrites::ALL,
                }),
            ],
            "pano-accumulate",
        );

        let output_pipelines = |encoding: OutputEncoding| {
            let target = [Some(wgpu::ColorTargetState {
                format: output_format(encoding),
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })];
            OutputPipelines {
                normalize: create_fullscreen_pipeline(
                    device,
                    &normalize_shader,
                    &normalize_layout,
                    "fs_normalize",
                    &target,
                    "pano-normalize",
                ),
                deghost: create_fullscreen_pipeline(
                    device,
                    &deghost_shader,
                    &single_layout,
                    "fs_deghost",
                    &target,
                    "pano-deghost",
                ),
                rotate: create_fullscreen_pipeline(
                    device,
                    &rotate_shader,
                    &single_layout,
                    "fs_rotate",
                    &target,
                    "pano-rotate",
                ),
            }
        };
        let srgb8 = output_pipelines(OutputEncoding::Srgb8);
        let linear_hdr = output_pipelines(OutputEncoding::LinearHdr);

        let photo_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("pano-photo-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Linear,
            ..Default::default()
        });

        Self {
            uniform_bgl,
            photo_bgl,
            sums_bgl,
            single_bgl,
            photo_sampler,
            accumulate,
            srgb8,
            linear_hdr,
        }
    }

    pub fn output(&self, encoding: OutputEncoding) -> &OutputPipelines {
        match encoding {
            OutputEncoding::Srgb8 => &self.srgb8,
            OutputEncoding::LinearHdr => &self.linear_hdr,
        }
    }

    pub fn uniform_bind_group(
        &self,
        device: &wgpu::Device,
        buffer: &wgpu::Buffer,
        label: &str,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.uniform_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        })
    }

    pub fn photo_bind_group(
        &self,
        device: &wgpu::Device,
        view: &wgpu::TextureView,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("pano-photo-bg"),
            layout: &self.photo_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.photo_sampler),
                },
            ],
        })
    }

    pub fn sums_bind_group(
        &self,
        device: &wgpu::Device,
        color: &wgpu::TextureView,
        weight: &wgpu::TextureView,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("pano-sums-bg"),
            layout: &self.sums_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(color),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(weight),
                },
            ],
        })
    }

    pub fn single_bind_group(
        &self,
        device: &wgpu::Device,
        view: &wgpu::TextureView,
        label: &str,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.single_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(view),
            }],
        })
    }
}

fn texture_entry(binding: u32, filterable: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn pipeline_layout(
    device: &wgpu::Device,
    uniform_bgl: &wgpu::BindGroupLayout,
    texture_bgl: &wgpu::BindGroupLayout,
    label: &str,
) -> wgpu::PipelineLayout {
    device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[uniform_bgl, texture_bgl],
        immediate_size: 0,
    })
}

fn shader_module(device: &wgpu::Device, source: &str, label: &str) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(pass_source(source).into()),
    })
}

/// Create a fullscreen render pipeline with the given fragment entry point.
fn create_fullscreen_pipeline(
    device: &wgpu::Device,
    shader: &wgpu::ShaderModule,
    layout: &wgpu::PipelineLayout,
    fragment_entry: &str,
    targets: &[Option<wgpu::ColorTargetState>],
    label: &str,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_fullscreen"),
            buffers: &[],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(fragment_entry),
            targets,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview_mask: None,
        cache: None,
    })
}

/// Offscreen render target that later passes can read and the CPU can copy.
pub fn create_target(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
    label: &str,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

/// Record one fullscreen pass into `targets`.
pub fn run_pass(
    encoder: &mut wgpu::CommandEncoder,
    pipeline: &wgpu::RenderPipeline,
    uniform_bind_group: &wgpu::BindGroup,
    texture_bind_group: &wgpu::BindGroup,
    targets: &[&wgpu::TextureView],
    load_op: wgpu::LoadOp<wgpu::Color>,
    label: &str,
) {
    let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment<'_>>> = targets
        .iter()
        .map(|&view| {
            Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: load_op,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })
        })
        .collect();
    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &color_attachments,
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
        multiview_mask: None,
    });
    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, uniform_bind_group, &[]);
    pass.set_bind_group(1, texture_bind_group, &[]);
    pass.draw(0..3, 0..1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::init_gpu_context_blocking;

    #[test]
    fn test_output_formats() {
        assert_eq!(
            output_format(OutputEncoding::Srgb8),
            wgpu::TextureFormat::Rgba8Unorm
        );
        for encoding in [OutputEncoding::Srgb8, OutputEncoding::LinearHdr] {
            assert_eq!(
                output_format(encoding).block_copy_size(None),
                Some(bytes_per_texel(encoding)),
                "{encoding:?}"
            );
        }
    }

    #[test]
    fn test_targets_are_renderable_without_features() {
        let targets = [
            COLOR_SUM_FORMAT,
            WEIGHT_SUM_FORMAT,
            output_format(OutputEncoding::Srgb8),
            output_format(OutputEncoding::LinearHdr),
        ];
        for format in targets {
            let features = format.guaranteed_format_features(wgpu::Features::empty());
            assert!(
                features
                    .allowed_usages
                    .contains(wgpu::TextureUsages::RENDER_ATTACHMENT),
                "{format:?} is not renderable"
            );
        }
        for format in [COLOR_SUM_FORMAT, WEIGHT_SUM_FORMAT] {
            let features = format.guaranteed_format_features(wgpu::Features::empty());
            assert!(
                features
                    .flags
                    .contains(wgpu::TextureFormatFeatureFlags::BLENDABLE),
                "{format:?} cannot be blended"
            );
        }
    }

    #[test]
    fn test_pipelines_build_on_device() {
        let Ok(ctx) = init_gpu_context_blocking() else {
            return;
        };
        if let Err(e) = BakePipelines::new(&ctx.device) {
            panic!("pipelines failed to build: {e}");
        }
    }

    #[test]
    fn test_missing_entry_point_is_an_error() {
        let Ok(ctx) = init_gpu_context_blocking() else {
            return;
        };
        let device = &ctx.device;
        let result = capture_errors(device, "broken pipeline", || {
            let uniform_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("uniform"),
                entries: &[],
            });
            let single_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("single"),
                entries: &[texture_entry(0, false)],
            });
            let layout = pipeline_layout(device, &uniform_bgl, &single_bgl, "broken-layout");
            let shader = shader_module(device, ROTATE_SHADER_SOURCE, "broken-shader");
            create_fullscreen_pipeline(
                device,
                &shader,
                &layout,
                "fs_missing",
                &[Some(wgpu::ColorTargetState {
                    format: wgpu::TextureFormat::Rgba8Unorm,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                "broken",
            )
        });
        assert!(matches!(result, Err(BakeError::Gpu(_))));
    }
}
