use std::mem;
use std::num::NonZeroU64;

use super::context::SCREEN_DEPTH_FORMAT;
use super::uniforms::DrawUniformsRaw;
use crate::backend::{ProgramError, ProgramKind, TextureFormat};
use crate::renderer::Vertex;

pub(crate) const OFFSCREEN_COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub(crate) const OFFSCREEN_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

pub(crate) struct BindLayouts {
    /// group 0 of the scene programs: per-draw uniforms, dynamic offset.
    pub(crate) draw: wgpu::BindGroupLayout,
    /// Filterable color texture + sampler.
    pub(crate) diffuse: wgpu::BindGroupLayout,
    /// Depth texture + comparison sampler.
    pub(crate) shadow: wgpu::BindGroupLayout,
    /// Depth texture + non-filtering sampler.
    pub(crate) depth_display: wgpu::BindGroupLayout,
}

fn texture_layout(
    device: &wgpu::Device,
    label: &str,
    sample_type: wgpu::TextureSampleType,
    sampler: wgpu::SamplerBindingType,
) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(sampler),
                count: None,
            },
        ],
    })
}

impl BindLayouts {
    pub(crate) fn new(device: &wgpu::Device) -> Self {
        let draw = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("DrawUniformLayout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(mem::size_of::<DrawUniformsRaw>() as u64),
                },
                count: None,
            }],
        });

        Self {
            draw,
            diffuse: texture_layout(
                device,
                "DiffuseTextureLayout",
                wgpu::TextureSampleType::Float { filterable: true },
                wgpu::SamplerBindingType::Filtering,
            ),
            shadow: texture_layout(
                device,
                "ShadowMapLayout",
                wgpu::TextureSampleType::Depth,
                wgpu::SamplerBindingType::Comparison,
            ),
            depth_display: texture_layout(
                device,
                "DepthDisplayLayout",
                wgpu::TextureSampleType::Depth,
                wgpu::SamplerBindingType::NonFiltering,
            ),
        }
    }
}

/// Color and depth formats a pipeline renders into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct TargetFormats {
    pub(crate) color: wgpu::TextureFormat,
    pub(crate) depth: wgpu::TextureFormat,
}

impl TargetFormats {
    pub(crate) fn screen(surface: wgpu::TextureFormat) -> Self {
        Self {
            color: surface,
            depth: SCREEN_DEPTH_FORMAT,
        }
    }

    pub(crate) fn offscreen() -> Self {
        Self {
            color: OFFSCREEN_COLOR_FORMAT,
            depth: OFFSCREEN_DEPTH_FORMAT,
        }
    }
}

pub(crate) enum ProgramPipelines {
    /// Scene programs can draw into the window or the shadow target.
    Scene {
        screen: wgpu::RenderPipeline,
        offscreen: wgpu::RenderPipeline,
    },
    /// Screen-space quads, one entry point per texture kind.
    Quad {
        color: wgpu::RenderPipeline,
        depth: wgpu::RenderPipeline,
    },
}

impl ProgramPipelines {
    pub(crate) fn scene(&self, offscreen: bool) -> Option<&wgpu::RenderPipeline> {
        match self {
            ProgramPipelines::Scene { screen, offscreen: off } => {
                Some(if offscreen { off } else { screen })
            }
            ProgramPipelines::Quad { .. } => None,
        }
    }

    pub(crate) fn quad(&self, format: TextureFormat) -> Option<&wgpu::RenderPipeline> {
        match self {
            ProgramPipelines::Quad { color, depth } => {
                Some(if format.is_depth() { depth } else { color })
            }
            ProgramPipelines::Scene { .. } => None,
        }
    }
}

/// Compiles `source` and builds every pipeline `kind` needs.
///
/// Runs inside a validation error scope so a bad shader comes back as an
/// error instead of reaching the device's uncaptured-error handler.
pub(crate) fn build_program(
    device: &wgpu::Device,
    layouts: &BindLayouts,
    surface_format: wgpu::TextureFormat,
    kind: ProgramKind,
    source: &str,
) -> Result<ProgramPipelines, ProgramError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(kind.file_name()),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });

    let pipelines = match kind {
        ProgramKind::Lit | ProgramKind::Depth => {
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("ScenePipelineLayout"),
                bind_group_layouts: &[&layouts.draw, &layouts.diffuse, &layouts.shadow],
                push_constant_ranges: &[],
            });
            ProgramPipelines::Scene {
                screen: scene_pipeline(
                    device,
                    &layout,
                    &module,
                    kind,
                    TargetFormats::screen(surface_format),
                ),
                offscreen: scene_pipeline(
                    device,
                    &layout,
                    &module,
                    kind,
                    TargetFormats::offscreen(),
                ),
            }
        }
        ProgramKind::Quad => {
            let color_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("QuadColorPipelineLayout"),
                bind_group_layouts: &[&layouts.diffuse],
                push_constant_ranges: &[],
            });
            let depth_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("QuadDepthPipelineLayout"),
                bind_group_layouts: &[&layouts.diffuse, &layouts.depth_display],
                push_constant_ranges: &[],
            });
            ProgramPipelines::Quad {
                color: quad_pipeline(device, &color_layout, &module, "fs_color", surface_format),
                depth: quad_pipeline(device, &depth_layout, &module, "fs_depth", surface_format),
            }
        }
    };

    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => Err(ProgramError {
            kind,
            message: err.to_string(),
        }),
        None => Ok(pipelines),
    }
}

fn scene_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    kind: ProgramKind,
    formats: TargetFormats,
) -> wgpu::RenderPipeline {
    // Bias only applies to the light's depth pass.
    let bias = if kind == ProgramKind::Depth && formats == TargetFormats::offscreen() {
        wgpu::DepthBiasState {
            constant: 2,
            slope_scale: 2.0,
            clamp: 0.0,
        }
    } else {
        wgpu::DepthBiasState::default()
    };

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(kind.file_name()),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_main"),
            buffers: &[Vertex::layout()],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: formats.color,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: formats.depth,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias,
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

fn quad_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    fragment_entry: &str,
    surface_format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(fragment_entry),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_main"),
            buffers: &[],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some(fragment_entry),
            targets: &[Some(wgpu::ColorTargetState {
                format: surface_format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleStrip,
            ..Default::default()
        },
        // Quads draw over the scene regardless of its depth.
        depth_stencil: Some(wgpu::DepthStencilState {
            format: SCREEN_DEPTH_FORMAT,
            depth_write_enabled: false,
            depth_compare: wgpu::CompareFunction::Always,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}
