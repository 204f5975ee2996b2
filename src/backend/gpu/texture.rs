use super::pipeline::BindLayouts;
use crate::backend::{Filter, TextureDesc, TextureFormat};

pub(crate) fn wgpu_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::Depth32 => wgpu::TextureFormat::Depth32Float,
    }
}

/// Expands tightly packed RGB8 pixels to opaque RGBA8.
pub(crate) fn rgb_to_rgba(rgb: &[u8]) -> Vec<u8> {
    rgb.chunks_exact(3)
        .flat_map(|p| [p[0], p[1], p[2], 255])
        .collect()
}

pub(crate) struct Samplers {
    linear: wgpu::Sampler,
    nearest: wgpu::Sampler,
    comparison_linear: wgpu::Sampler,
    comparison_nearest: wgpu::Sampler,
    display: wgpu::Sampler,
}

fn filter_mode(filter: Filter) -> wgpu::FilterMode {
    match filter {
        Filter::Linear => wgpu::FilterMode::Linear,
        Filter::Nearest => wgpu::FilterMode::Nearest,
    }
}

/// Depth-comparison sampler for shadow lookups, filtered as `filter` asks.
fn comparison_descriptor(filter: Filter) -> wgpu::SamplerDescriptor<'static> {
    wgpu::SamplerDescriptor {
        label: Some(match filter {
            Filter::Linear => "ShadowSamplerLinear",
            Filter::Nearest => "ShadowSamplerNearest",
        }),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: filter_mode(filter),
        min_filter: filter_mode(filter),
        mipmap_filter: wgpu::FilterMode::Nearest,
        compare: Some(wgpu::CompareFunction::LessEqual),
        ..Default::default()
    }
}

impl Samplers {
    pub(crate) fn new(device: &wgpu::Device) -> Self {
        let linear = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("LinearSampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let nearest = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("NearestSampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let comparison_linear = device.create_sampler(&comparison_descriptor(Filter::Linear));
        let comparison_nearest = device.create_sampler(&comparison_descriptor(Filter::Nearest));
        let display = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("DepthDisplaySampler"),
            ..Default::default()
        });
        Self {
            linear,
            nearest,
            comparison_linear,
            comparison_nearest,
            display,
        }
    }

    fn for_filter(&self, filter: Filter) -> &wgpu::Sampler {
        match filter {
            Filter::Linear => &self.linear,
            Filter::Nearest => &self.nearest,
        }
    }

    fn comparison_for_filter(&self, filter: Filter) -> &wgpu::Sampler {
        match filter {
            Filter::Linear => &self.comparison_linear,
            Filter::Nearest => &self.comparison_nearest,
        }
    }
}

pub(crate) fn texture_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    view: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
    label: &str,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

pub(crate) enum TextureBindings {
    Color {
        sampled: wgpu::BindGroup,
    },
    Depth {
        /// Comparison-sampled, for shadow lookups.
        shadow: wgpu::BindGroup,
        /// Plain nearest sampling, for showing depth on screen.
        display: wgpu::BindGroup,
    },
}

pub(crate) struct GpuTexture {
    pub(crate) desc: TextureDesc,
    pub(crate) texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
    pub(crate) bindings: TextureBindings,
}

impl GpuTexture {
    pub(crate) fn new(
        device: &wgpu::Device,
        layouts: &BindLayouts,
        samplers: &Samplers,
        desc: &TextureDesc,
    ) -> Self {
        let mut usage = wgpu::TextureUsages::TEXTURE_BINDING;
        if !desc.format.is_depth() {
            usage |= wgpu::TextureUsages::COPY_DST;
        }
        if desc.attachment {
            usage |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }

        // wgpu rejects empty textures; the descriptor keeps the requested size.
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&desc.label),
            size: wgpu::Extent3d {
                width: desc.width.max(1),
                height: desc.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu_format(desc.format),
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let group = |layout: &wgpu::BindGroupLayout, sampler: &wgpu::Sampler, label: &str| {
            texture_bind_group(device, layout, &view, sampler, label)
        };

        let bindings = if desc.format.is_depth() {
            TextureBindings::Depth {
                shadow: group(
                    &layouts.shadow,
                    samplers.comparison_for_filter(desc.filter),
                    "ShadowMapBindGroup",
                ),
                display: group(
                    &layouts.depth_display,
                    &samplers.display,
                    "DepthDisplayBindGroup",
                ),
            }
        } else {
            TextureBindings::Color {
                sampled: group(
                    &layouts.diffuse,
                    samplers.for_filter(desc.filter),
                    "TextureBindGroup",
                ),
            }
        };

        Self {
            desc: desc.clone(),
            texture,
            view,
            bindings,
        }
    }

    pub(crate) fn write_rgba(&self, queue: &wgpu::Queue, rgba: &[u8]) {
        let size = wgpu::Extent3d {
            width: self.desc.width,
            height: self.desc.height,
            depth_or_array_layers: 1,
        };
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * self.desc.width),
                rows_per_image: Some(self.desc.height),
            },
            size,
        );
    }

    pub(crate) fn sampled_group(&self) -> Option<&wgpu::BindGroup> {
        match &self.bindings {
            TextureBindings::Color { sampled } => Some(sampled),
            TextureBindings::Depth { .. } => None,
        }
    }

    pub(crate) fn shadow_group(&self) -> Option<&wgpu::BindGroup> {
        match &self.bindings {
            TextureBindings::Depth { shadow, .. } => Some(shadow),
            TextureBindings::Color { .. } => None,
        }
    }

    pub(crate) fn display_group(&self) -> &wgpu::BindGroup {
        match &self.bindings {
            TextureBindings::Depth { display, .. } => display,
            TextureBindings::Color { sampled } => sampled,
        }
    }
}

/// Stand-ins bound when a sampled texture is also being rendered to.
pub(crate) struct Placeholders {
    _color: wgpu::Texture,
    _depth: wgpu::Texture,
    pub(crate) color_group: wgpu::BindGroup,
    pub(crate) shadow_group: wgpu::BindGroup,
}

impl Placeholders {
    pub(crate) fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layouts: &BindLayouts,
        samplers: &Samplers,
    ) -> Self {
        let color = GpuTexture::new(
            device,
            layouts,
            samplers,
            &TextureDesc::sampled("placeholder color", 1, 1),
        );
        color.write_rgba(queue, &[255, 255, 255, 255]);
        let depth = GpuTexture::new(
            device,
            layouts,
            samplers,
            &TextureDesc::attachment("placeholder depth", 1, TextureFormat::Depth32),
        );

        // Far plane everywhere, so shadow lookups against it come out lit.
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("PlaceholderClear"),
        });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("PlaceholderDepthClear"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        queue.submit(Some(encoder.finish()));

        let color_group = texture_bind_group(
            device,
            &layouts.diffuse,
            &color.view,
            &samplers.linear,
            "PlaceholderColorBindGroup",
        );
        let shadow_group = texture_bind_group(
            device,
            &layouts.shadow,
            &depth.view,
            samplers.comparison_for_filter(depth.desc.filter),
            "PlaceholderShadowBindGroup",
        );

        Self {
            _color: color.texture,
            _depth: depth.texture,
            color_group,
            shadow_group,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_expands_to_opaque_rgba() {
        assert_eq!(
            rgb_to_rgba(&[1, 2, 3, 4, 5, 6]),
            vec![1, 2, 3, 255, 4, 5, 6, 255]
        );
    }

    #[test]
    fn shadow_comparison_follows_the_depth_filter() {
        let depth = TextureDesc::attachment("shadow depth", 1024, TextureFormat::Depth32);
        assert_eq!(depth.filter, Filter::Nearest);

        let nearest = comparison_descriptor(depth.filter);
        assert_eq!(nearest.mag_filter, wgpu::FilterMode::Nearest);
        assert_eq!(nearest.min_filter, wgpu::FilterMode::Nearest);
        assert_eq!(nearest.compare, Some(wgpu::CompareFunction::LessEqual));

        let linear = comparison_descriptor(Filter::Linear);
        assert_eq!(linear.mag_filter, wgpu::FilterMode::Linear);
        assert_eq!(linear.min_filter, wgpu::FilterMode::Linear);
    }

    #[test]
    fn formats_map_to_wgpu() {
        assert_eq!(
            wgpu_format(TextureFormat::Depth32),
            wgpu::TextureFormat::Depth32Float
        );
        assert_eq!(
            wgpu_format(TextureFormat::Rgba8),
            wgpu::TextureFormat::Rgba8Unorm
        );
    }
}
