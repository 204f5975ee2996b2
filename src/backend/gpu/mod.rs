//! wgpu implementation of [`GraphicsBackend`].
//!
//! Calls between `begin_frame` and `end_frame` are recorded, not executed.
//! Every draw snapshots its program's uniforms into a slot of one dynamic
//! uniform buffer and appends its vertices to one shared vertex buffer; at
//! `end_frame` both buffers are uploaded and the recorded passes are encoded
//! into real render passes in order.

mod commands;
mod context;
mod pipeline;
mod texture;
mod uniforms;

use std::mem;
use std::num::NonZeroU64;
use std::sync::Arc;

use glam::Mat4;
use winit::window::Window;

use self::commands::{clamp_viewport, Command, FrameRecorder, RecordedPass};
use self::context::GpuContext;
use self::pipeline::{build_program, BindLayouts, ProgramPipelines};
use self::texture::{rgb_to_rgba, GpuTexture, Placeholders, Samplers};
use self::uniforms::{align_to, DrawUniformsRaw, ProgramUniforms};
use super::{
    check_target_completeness, check_texture_size, BackendError, GraphicsBackend, LightUniforms,
    MaterialUniforms, PassDesc, PassTarget, ProgramError, ProgramId, ProgramKind, ProgramMarker,
    Slots, TargetError, TargetId, TargetMarker, TextureDesc, TextureId, TextureMarker,
    TextureUnit, TransformUniforms, Viewport,
};
use crate::renderer::Vertex;
use crate::settings::RenderSettings;

const INITIAL_DRAW_CAPACITY: u64 = 256;
const INITIAL_VERTEX_CAPACITY: u64 = 1 << 16;

struct Program {
    kind: ProgramKind,
    pipelines: ProgramPipelines,
    uniforms: ProgramUniforms,
}

pub struct WgpuBackend {
    context: GpuContext,
    layouts: BindLayouts,
    samplers: Samplers,
    placeholders: Placeholders,
    textures: Slots<TextureMarker, GpuTexture>,
    targets: Slots<TargetMarker, (TextureId, TextureId)>,
    programs: Slots<ProgramMarker, Program>,
    uniform_stride: u64,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    vertex_buffer: wgpu::Buffer,
    recorder: FrameRecorder,
    frame: Option<wgpu::SurfaceTexture>,
    current_program: Option<ProgramId>,
    diffuse: Option<TextureId>,
    shadow: Option<TextureId>,
}

impl WgpuBackend {
    pub fn new(window: Arc<Window>, settings: &RenderSettings) -> Result<Self, BackendError> {
        let context = pollster::block_on(GpuContext::new(window, settings))?;
        let device = &context.device;

        let layouts = BindLayouts::new(device);
        let samplers = Samplers::new(device);
        let placeholders = Placeholders::new(device, &context.queue, &layouts, &samplers);

        let uniform_stride = align_to(
            mem::size_of::<DrawUniformsRaw>() as u64,
            device.limits().min_uniform_buffer_offset_alignment as u64,
        );
        let uniform_buffer = create_uniform_buffer(device, INITIAL_DRAW_CAPACITY * uniform_stride);
        let uniform_bind_group = create_uniform_bind_group(device, &layouts, &uniform_buffer);
        let vertex_buffer = create_vertex_buffer(
            device,
            INITIAL_VERTEX_CAPACITY * mem::size_of::<Vertex>() as u64,
        );

        log::info!(
            "GPU backend ready: surface {:?} {}x{}, uniform stride {} bytes",
            context.config.format,
            context.config.width,
            context.config.height,
            uniform_stride
        );

        Ok(Self {
            context,
            layouts,
            samplers,
            placeholders,
            textures: Slots::new(),
            targets: Slots::new(),
            programs: Slots::new(),
            uniform_stride,
            uniform_buffer,
            uniform_bind_group,
            vertex_buffer,
            recorder: FrameRecorder::new(uniform_stride as u32),
            frame: None,
            current_program: None,
            diffuse: None,
            shadow: None,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.context.resize(width, height);
    }

    fn program_uniforms(&mut self, program: ProgramId) -> Option<&mut ProgramUniforms> {
        let uniforms = self.programs.get_mut(program).map(|p| &mut p.uniforms);
        if uniforms.is_none() {
            log::debug!("Uniform upload to unknown program {:?}", program);
        }
        uniforms
    }

    /// Grows the shared buffers if needed and uploads this frame's data.
    fn upload_frame_data(&mut self) {
        let device = &self.context.device;

        let vertex_bytes = mem::size_of_val(self.recorder.vertices()) as u64;
        if vertex_bytes > self.vertex_buffer.size() {
            let new_size = vertex_bytes.max(self.vertex_buffer.size() * 2);
            log::info!(
                "Growing vertex buffer: {} -> {} bytes",
                self.vertex_buffer.size(),
                new_size
            );
            self.vertex_buffer = create_vertex_buffer(device, new_size);
        }

        let uniform_bytes = self.recorder.uniforms().len() as u64;
        if uniform_bytes > self.uniform_buffer.size() {
            let new_size = uniform_bytes.max(self.uniform_buffer.size() * 2);
            log::info!(
                "Growing uniform buffer: {} -> {} draws",
                self.uniform_buffer.size() / self.uniform_stride,
                new_size / self.uniform_stride
            );
            self.uniform_buffer = create_uniform_buffer(device, new_size);
            self.uniform_bind_group =
                create_uniform_bind_group(device, &self.layouts, &self.uniform_buffer);
        }

        let queue = &self.context.queue;
        if vertex_bytes > 0 {
            queue.write_buffer(
                &self.vertex_buffer,
                0,
                bytemuck::cast_slice(self.recorder.vertices()),
            );
        }
        if uniform_bytes > 0 {
            queue.write_buffer(&self.uniform_buffer, 0, self.recorder.uniforms());
        }
    }

    fn is_attachment(&self, texture: TextureId, target: PassTarget) -> bool {
        match target {
            PassTarget::Screen => false,
            PassTarget::Offscreen(id) => self
                .targets
                .get(id)
                .is_some_and(|&(depth, color)| texture == depth || texture == color),
        }
    }

    fn diffuse_group(&self, texture: Option<TextureId>, target: PassTarget) -> &wgpu::BindGroup {
        texture
            .filter(|&id| !self.is_attachment(id, target))
            .and_then(|id| self.textures.get(id))
            .and_then(GpuTexture::sampled_group)
            .unwrap_or(&self.placeholders.color_group)
    }

    fn shadow_group(&self, texture: Option<TextureId>, target: PassTarget) -> &wgpu::BindGroup {
        texture
            .filter(|&id| !self.is_attachment(id, target))
            .and_then(|id| self.textures.get(id))
            .and_then(GpuTexture::shadow_group)
            .unwrap_or(&self.placeholders.shadow_group)
    }

    fn encode_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        screen: &wgpu::TextureView,
        pass: &RecordedPass,
    ) {
        let target = pass.desc.target;
        let (color_view, depth_view, width, height) = match target {
            PassTarget::Screen => (
                screen,
                &self.context.depth.view,
                self.context.config.width,
                self.context.config.height,
            ),
            PassTarget::Offscreen(id) => {
                let attachments = self.targets.get(id).and_then(|&(depth, color)| {
                    Some((self.textures.get(depth)?, self.textures.get(color)?))
                });
                let Some((depth, color)) = attachments else {
                    log::warn!("Skipping pass into released target {:?}", id);
                    return;
                };
                (&color.view, &depth.view, color.desc.width, color.desc.height)
            }
        };
        let offscreen = matches!(target, PassTarget::Offscreen(_));

        let color_load = match pass.desc.clear {
            Some([r, g, b]) => wgpu::LoadOp::Clear(wgpu::Color {
                r: r as f64,
                g: g as f64,
                b: b as f64,
                a: 1.0,
            }),
            None => wgpu::LoadOp::Load,
        };
        let depth_load = match pass.desc.clear {
            Some(_) => wgpu::LoadOp::Clear(1.0),
            None => wgpu::LoadOp::Load,
        };

        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(if offscreen { "OffscreenPass" } else { "ScreenPass" }),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color_view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: color_load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let pass_viewport = clamp_viewport(pass.desc.viewport, width, height);

        for command in &pass.commands {
            match command {
                Command::Draw {
                    program,
                    uniform_offset,
                    vertices,
                    diffuse,
                    shadow,
                } => {
                    let Some(viewport) = pass_viewport else {
                        continue;
                    };
                    let Some(pipeline) = self
                        .programs
                        .get(*program)
                        .and_then(|p| p.pipelines.scene(offscreen))
                    else {
                        log::debug!("Skipping draw with non-scene program {:?}", program);
                        continue;
                    };
                    set_viewport(&mut rpass, viewport);
                    rpass.set_pipeline(pipeline);
                    rpass.set_bind_group(0, &self.uniform_bind_group, &[*uniform_offset]);
                    rpass.set_bind_group(1, self.diffuse_group(*diffuse, target), &[]);
                    rpass.set_bind_group(2, self.shadow_group(*shadow, target), &[]);
                    rpass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
                    rpass.draw(vertices.clone(), 0..1);
                }
                Command::Quad {
                    program,
                    texture,
                    viewport,
                } => {
                    if offscreen {
                        log::debug!("Quads are only drawn to the screen");
                        continue;
                    }
                    let Some(texture) = self.textures.get(*texture) else {
                        continue;
                    };
                    let Some(pipeline) = self
                        .programs
                        .get(*program)
                        .and_then(|p| p.pipelines.quad(texture.desc.format))
                    else {
                        log::debug!("Skipping quad with non-quad program {:?}", program);
                        continue;
                    };
                    let Some(viewport) = clamp_viewport(*viewport, width, height) else {
                        continue;
                    };
                    set_viewport(&mut rpass, viewport);
                    rpass.set_pipeline(pipeline);
                    if texture.desc.format.is_depth() {
                        rpass.set_bind_group(0, &self.placeholders.color_group, &[]);
                        rpass.set_bind_group(1, texture.display_group(), &[]);
                    } else {
                        rpass.set_bind_group(0, texture.display_group(), &[]);
                    }
                    rpass.draw(0..4, 0..1);
                }
            }
        }
    }
}

fn set_viewport(rpass: &mut wgpu::RenderPass<'_>, viewport: Viewport) {
    rpass.set_viewport(
        viewport.x as f32,
        viewport.y as f32,
        viewport.width as f32,
        viewport.height as f32,
        0.0,
        1.0,
    );
}

fn create_uniform_buffer(device: &wgpu::Device, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("DrawUniformBuffer"),
        size,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_uniform_bind_group(
    device: &wgpu::Device,
    layouts: &BindLayouts,
    buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("DrawUniformBindGroup"),
        layout: &layouts.draw,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer,
                offset: 0,
                size: NonZeroU64::new(mem::size_of::<DrawUniformsRaw>() as u64),
            }),
        }],
    })
}

fn create_vertex_buffer(device: &wgpu::Device, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("BatchVertexBuffer"),
        size,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

impl GraphicsBackend for WgpuBackend {
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId, BackendError> {
        check_texture_size(desc, self.context.device.limits().max_texture_dimension_2d)?;
        let texture = GpuTexture::new(&self.context.device, &self.layouts, &self.samplers, desc);
        Ok(self.textures.insert(texture))
    }

    fn upload_rgb(
        &mut self,
        texture: TextureId,
        width: u32,
        height: u32,
        rgb: &[u8],
    ) -> Result<(), BackendError> {
        let gpu = self
            .textures
            .get(texture)
            .ok_or(BackendError::UnknownTexture(texture))?;
        if gpu.desc.format.is_depth() {
            return Err(BackendError::NotUploadable(texture));
        }
        if gpu.desc.width != width || gpu.desc.height != height {
            return Err(BackendError::SizeMismatch {
                expected_width: gpu.desc.width,
                expected_height: gpu.desc.height,
                actual_width: width,
                actual_height: height,
            });
        }
        let expected = width as usize * height as usize * 3;
        if rgb.len() != expected {
            return Err(BackendError::PixelCount {
                expected,
                actual: rgb.len(),
            });
        }
        if expected > 0 {
            gpu.write_rgba(&self.context.queue, &rgb_to_rgba(rgb));
        }
        Ok(())
    }

    fn texture_desc(&self, texture: TextureId) -> Option<&TextureDesc> {
        self.textures.get(texture).map(|t| &t.desc)
    }

    fn destroy_texture(&mut self, texture: TextureId) -> bool {
        self.textures.remove(texture).is_some()
    }

    fn live_textures(&self) -> usize {
        self.textures.len()
    }

    fn create_target(
        &mut self,
        depth: TextureId,
        color: TextureId,
    ) -> Result<TargetId, TargetError> {
        let depth_desc = self.texture_desc(depth).ok_or(TargetError::MissingAttachment {
            role: "depth",
            texture: depth,
        })?;
        let color_desc = self.texture_desc(color).ok_or(TargetError::MissingAttachment {
            role: "color",
            texture: color,
        })?;
        check_target_completeness(depth_desc, color_desc)?;
        Ok(self.targets.insert((depth, color)))
    }

    fn destroy_target(&mut self, target: TargetId) -> bool {
        self.targets.remove(target).is_some()
    }

    fn create_program(
        &mut self,
        kind: ProgramKind,
        source: &str,
    ) -> Result<ProgramId, ProgramError> {
        let pipelines = build_program(
            &self.context.device,
            &self.layouts,
            self.context.config.format,
            kind,
            source,
        )?;
        log::debug!("Built {:?} program", kind);
        Ok(self.programs.insert(Program {
            kind,
            pipelines,
            uniforms: ProgramUniforms::default(),
        }))
    }

    fn destroy_program(&mut self, program: ProgramId) -> bool {
        if self.current_program == Some(program) {
            self.current_program = None;
        }
        self.programs
            .remove(program)
            .inspect(|p| log::debug!("Destroyed {:?} program", p.kind))
            .is_some()
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.context.config.width, self.context.config.height)
    }

    fn begin_frame(&mut self) -> Result<(), BackendError> {
        if self.frame.take().is_some() {
            log::warn!("Previous frame was never ended; dropping it");
        }
        self.recorder.clear();
        self.current_program = None;

        match self.context.surface.get_current_texture() {
            Ok(frame) => {
                self.frame = Some(frame);
                Ok(())
            }
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.context.reconfigure();
                Err(BackendError::SurfaceUnavailable(
                    "surface lost or outdated; reconfigured".into(),
                ))
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                Err(BackendError::Surface("out of memory".into()))
            }
            Err(err) => Err(BackendError::SurfaceUnavailable(err.to_string())),
        }
    }

    fn begin_pass(&mut self, pass: &PassDesc) -> Result<(), BackendError> {
        if self.frame.is_none() {
            return Err(BackendError::NoFrame);
        }
        self.recorder.begin_pass(*pass);
        Ok(())
    }

    fn use_program(&mut self, program: ProgramId) {
        self.current_program = Some(program);
    }

    fn set_transform_uniforms(&mut self, program: ProgramId, transforms: &TransformUniforms) {
        if let Some(uniforms) = self.program_uniforms(program) {
            uniforms.transforms = *transforms;
        }
    }

    fn set_light_uniforms(&mut self, program: ProgramId, light: &LightUniforms) {
        if let Some(uniforms) = self.program_uniforms(program) {
            uniforms.light = *light;
        }
    }

    fn set_material_uniforms(&mut self, program: ProgramId, material: &MaterialUniforms) {
        if let Some(uniforms) = self.program_uniforms(program) {
            uniforms.material = *material;
        }
    }

    fn set_light_view_proj(&mut self, program: ProgramId, view_proj: Mat4) {
        if let Some(uniforms) = self.program_uniforms(program) {
            uniforms.light_view_proj = view_proj;
        }
    }

    fn bind_texture(&mut self, unit: TextureUnit, texture: TextureId) {
        match unit {
            TextureUnit::Diffuse => self.diffuse = Some(texture),
            TextureUnit::Shadow => self.shadow = Some(texture),
        }
    }

    fn draw_triangles(&mut self, vertices: &[Vertex]) {
        let Some(program) = self.current_program else {
            log::debug!("Draw without a program; ignored");
            return;
        };
        let Some(raw) = self.programs.get(program).map(|p| p.uniforms.to_raw()) else {
            return;
        };
        if !self
            .recorder
            .push_draw(program, &raw, vertices, self.diffuse, self.shadow)
        {
            log::debug!(
                "Draw of {} vertices outside a pass or empty; ignored",
                vertices.len()
            );
        }
    }

    fn draw_textured_quad(&mut self, program: ProgramId, texture: TextureId, viewport: Viewport) {
        if !self.recorder.push_quad(program, texture, viewport) {
            log::debug!("Quad outside a pass; ignored");
        }
    }

    fn end_frame(&mut self) -> Result<(), BackendError> {
        let frame = self.frame.take().ok_or(BackendError::NoFrame)?;
        self.upload_frame_data();

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("FrameEncoder"),
            });

        for pass in self.recorder.passes() {
            self.encode_pass(&mut encoder, &view, pass);
        }

        self.context.queue.submit(Some(encoder.finish()));
        frame.present();
        self.recorder.clear();
        Ok(())
    }
}
