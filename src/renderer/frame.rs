use glam::{Mat4, Vec3};

use super::context::RenderContext;
use super::scene_renderer::{draw_scene, DrawStats, RenderError, ScenePass};
use crate::backend::{BackendError, GraphicsBackend, LightUniforms, PassDesc, PassTarget, Viewport};
use crate::shaders::{ProgramSet, ProgramSource};

/// Edge length of the shadow-map debug views, in pixels.
pub const DEBUG_VIEW_SIZE: u32 = 256;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    Rendered(DrawStats),
    /// Programs were unavailable; the frame was cleared and presented.
    Skipped,
}

#[derive(Clone, Copy, Debug)]
pub struct CameraMatrices {
    pub view: Mat4,
    pub proj: Mat4,
}

/// Runs the camera, shadow and debug passes once per frame.
#[derive(Debug, Default)]
pub struct FrameOrchestrator {
    last_reload_error: Option<String>,
}

impl FrameOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick<B, S>(
        &mut self,
        backend: &mut B,
        ctx: &mut RenderContext,
        source: &mut S,
        camera: CameraMatrices,
    ) -> Result<FrameOutcome, FrameError>
    where
        B: GraphicsBackend + ?Sized,
        S: ProgramSource<B> + ?Sized,
    {
        let programs = source.reload(backend);
        backend.begin_frame()?;

        let drawn = match programs {
            Ok(programs) => {
                if self.last_reload_error.take().is_some() {
                    log::info!("Shader programs rebuilt; rendering resumed");
                }
                let elapsed = ctx.timer.elapsed_seconds();
                self.draw(backend, ctx, &programs, camera, elapsed)
                    .map(FrameOutcome::Rendered)
            }
            Err(err) => {
                let message = err.to_string();
                if self.last_reload_error.as_deref() != Some(message.as_str()) {
                    log::warn!("Skipping frame: {}", message);
                    self.last_reload_error = Some(message);
                }
                clear_screen(backend, ctx.clear_color).map(|()| FrameOutcome::Skipped)
            }
        };

        backend.end_frame()?;
        ctx.timer.tick();

        let outcome = drawn?;
        if let FrameOutcome::Rendered(stats) = outcome {
            log::trace!(
                "Frame {}: {} draws, {} vertices",
                ctx.timer.frames(),
                stats.draw_calls,
                stats.vertices
            );
        }
        Ok(outcome)
    }

    /// Records the three passes for one frame with the light at `elapsed`.
    pub fn draw<B>(
        &self,
        backend: &mut B,
        ctx: &mut RenderContext,
        programs: &ProgramSet,
        camera: CameraMatrices,
        elapsed: f32,
    ) -> Result<DrawStats, FrameError>
    where
        B: GraphicsBackend + ?Sized,
    {
        let direction = ctx.light.direction(elapsed);
        let light = ctx.light.matrices(direction, &ctx.scene.bounds());
        let light_view_proj = light.view_proj();
        let (width, height) = backend.surface_size();

        backend.begin_pass(&PassDesc {
            target: PassTarget::Screen,
            viewport: Viewport::full(width, height),
            clear: Some(ctx.clear_color),
        })?;
        backend.use_program(programs.lit);
        backend.set_light_uniforms(
            programs.lit,
            &LightUniforms {
                direction,
                color: Vec3::splat(ctx.ambient_intensity),
            },
        );
        let camera_stats = draw_scene(
            backend,
            &mut ctx.recorder,
            &ScenePass {
                program: programs.lit,
                view: camera.view,
                proj: camera.proj,
                light_view_proj,
            },
            &ctx.scene,
            &ctx.textures,
            &ctx.shadow,
        )?;

        let shadow_target = ctx
            .shadow
            .pass_target()
            .ok_or(RenderError::ShadowTargetFreed)?;
        let size = ctx.shadow.size();
        backend.begin_pass(&PassDesc {
            target: shadow_target,
            viewport: Viewport::full(size, size),
            clear: Some([1.0, 1.0, 1.0]),
        })?;
        backend.use_program(programs.depth);
        let shadow_stats = draw_scene(
            backend,
            &mut ctx.recorder,
            &ScenePass {
                program: programs.depth,
                view: light.view,
                proj: light.proj,
                light_view_proj,
            },
            &ctx.scene,
            &ctx.textures,
            &ctx.shadow,
        )?;

        if ctx.debug_views {
            backend.begin_pass(&PassDesc {
                target: PassTarget::Screen,
                viewport: Viewport::full(width, height),
                clear: None,
            })?;
            let y = height.saturating_sub(DEBUG_VIEW_SIZE);
            let views = [ctx.shadow.depth_texture(), ctx.shadow.color_texture()];
            for (slot, texture) in views.into_iter().enumerate() {
                let Some(texture) = texture else { continue };
                let viewport = Viewport {
                    x: slot as u32 * DEBUG_VIEW_SIZE,
                    y,
                    width: DEBUG_VIEW_SIZE,
                    height: DEBUG_VIEW_SIZE,
                };
                backend.draw_textured_quad(programs.quad, texture, viewport);
            }
        }

        Ok(DrawStats {
            draw_calls: camera_stats.draw_calls + shadow_stats.draw_calls,
            vertices: camera_stats.vertices + shadow_stats.vertices,
        })
    }
}

fn clear_screen<B>(backend: &mut B, color: [f32; 3]) -> Result<(), FrameError>
where
    B: GraphicsBackend + ?Sized,
{
    let (width, height) = backend.surface_size();
    backend.begin_pass(&PassDesc {
        target: PassTarget::Screen,
        viewport: Viewport::full(width, height),
        clear: Some(color),
    })?;
    Ok(())
}
