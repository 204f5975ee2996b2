use super::framebuffer::ShadowTarget;
use super::light::LightModel;
use super::scene_renderer::VertexRecorder;
use super::textures::{TextureError, TextureRegistry};
use crate::backend::{GraphicsBackend, TargetError};
use crate::scene::Scene;
use crate::settings::RenderSettings;
use crate::time::FrameTimer;

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error(transparent)]
    Texture(#[from] TextureError),
    #[error(transparent)]
    Target(#[from] TargetError),
}

/// Everything a frame reads: the scene, its GPU resources and the light.
///
/// Built once after the device exists and torn down with [`free`] before the
/// device goes away.
///
/// [`free`]: RenderContext::free
pub struct RenderContext {
    pub scene: Scene,
    pub textures: TextureRegistry,
    pub shadow: ShadowTarget,
    pub light: LightModel,
    pub timer: FrameTimer,
    pub recorder: VertexRecorder,
    pub clear_color: [f32; 3],
    pub ambient_intensity: f32,
    pub debug_views: bool,
}

impl RenderContext {
    pub fn new<B>(
        backend: &mut B,
        scene: Scene,
        settings: &RenderSettings,
    ) -> Result<Self, InitError>
    where
        B: GraphicsBackend + ?Sized,
    {
        let mut textures = TextureRegistry::load(backend, &scene)?;
        let shadow = match ShadowTarget::load(backend, settings.shadow_map_size) {
            Ok(shadow) => shadow,
            Err(err) => {
                textures.free(backend);
                return Err(err.into());
            }
        };

        Ok(Self {
            scene,
            textures,
            shadow,
            light: LightModel {
                timescale: settings.light_timescale,
                distance: settings.light_distance,
                projection: settings.light_projection,
            },
            timer: FrameTimer::start(),
            recorder: VertexRecorder::new(),
            clear_color: settings.clear_color,
            ambient_intensity: settings.ambient_intensity,
            debug_views: settings.debug_views,
        })
    }

    pub fn free<B>(&mut self, backend: &mut B)
    where
        B: GraphicsBackend + ?Sized,
    {
        self.shadow.free(backend);
        self.textures.free(backend);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::BTreeMap;

    use glam::{Vec2, Vec3};
    use image::RgbImage;

    use super::*;
    use crate::backend::recording::RecordingBackend;
    use crate::scene::{DrawBatch, Material};

    pub(crate) fn single_triangle_scene(texture: Option<&str>) -> Scene {
        let mut images = BTreeMap::new();
        images.insert("stone".to_string(), RgbImage::new(4, 4));
        Scene::new(
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            vec![Vec3::Z; 3],
            vec![Vec2::ZERO; 3],
            vec![0, 1, 2],
            vec![DrawBatch {
                start_index: 0,
                nindices: 3,
                material: Material {
                    diffuse_texture: texture.map(str::to_string),
                    ..Material::default()
                },
            }],
            images,
        )
        .unwrap()
    }

    #[test]
    fn new_then_free_returns_to_baseline() {
        let mut backend = RecordingBackend::new();
        let settings = RenderSettings {
            shadow_map_size: 128,
            ..RenderSettings::default()
        };
        let mut ctx =
            RenderContext::new(&mut backend, single_triangle_scene(Some("stone")), &settings)
                .unwrap();
        assert_eq!(ctx.shadow.size(), 128);
        assert!(backend.live_textures() > 0);

        ctx.free(&mut backend);
        ctx.free(&mut backend);
        assert_eq!(backend.live_textures(), 0);
        assert_eq!(backend.live_targets(), 0);
    }

    #[test]
    fn unresolved_texture_fails_before_shadow_target() {
        let mut backend = RecordingBackend::new();
        let result = RenderContext::new(
            &mut backend,
            single_triangle_scene(Some("missing")),
            &RenderSettings::default(),
        );
        assert!(matches!(result, Err(InitError::Texture(_))));
        assert_eq!(backend.live_textures(), 0);
        assert_eq!(backend.live_targets(), 0);
    }
}
