use glam::Mat4;

use super::framebuffer::ShadowTarget;
use super::textures::TextureRegistry;
use super::vertex::Vertex;
use crate::backend::{GraphicsBackend, MaterialUniforms, ProgramId, TextureUnit, TransformUniforms};
use crate::scene::{Material, Scene};

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("no texture loaded for '{0}'")]
    UnresolvedTexture(String),
    #[error("shadow target has been freed")]
    ShadowTargetFreed,
}

/// Counts for one `draw_scene` call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrawStats {
    pub draw_calls: usize,
    pub vertices: usize,
}

/// Reusable per-batch vertex storage.
///
/// Vertices are only reachable through a [`BatchBuilder`], which empties the
/// storage when it goes out of scope, so no batch ever sees another batch's
/// vertices.
#[derive(Debug, Default)]
pub struct VertexRecorder {
    vertices: Vec<Vertex>,
}

impl VertexRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_batch(&mut self) -> BatchBuilder<'_> {
        self.vertices.clear();
        BatchBuilder {
            vertices: &mut self.vertices,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}

pub struct BatchBuilder<'a> {
    vertices: &'a mut Vec<Vertex>,
}

impl BatchBuilder<'_> {
    pub fn record(&mut self, vertex: Vertex) {
        self.vertices.push(vertex);
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Issues one draw over the recorded vertices and returns their count.
    pub fn submit<B>(self, backend: &mut B) -> usize
    where
        B: GraphicsBackend + ?Sized,
    {
        backend.draw_triangles(self.vertices);
        self.vertices.len()
    }
}

impl Drop for BatchBuilder<'_> {
    fn drop(&mut self) {
        self.vertices.clear();
    }
}

/// Program and matrices for one walk over the scene.
#[derive(Clone, Copy, Debug)]
pub struct ScenePass {
    pub program: ProgramId,
    pub view: Mat4,
    pub proj: Mat4,
    pub light_view_proj: Mat4,
}

fn material_uniforms(material: &Material) -> MaterialUniforms {
    MaterialUniforms {
        diffuse: material.diffuse,
        ambient: material.ambient,
        specular: material.specular,
        shininess: material.shininess,
    }
}

/// Draws every batch of `scene` in stored order, one draw call per batch.
pub fn draw_scene<B>(
    backend: &mut B,
    recorder: &mut VertexRecorder,
    pass: &ScenePass,
    scene: &Scene,
    textures: &TextureRegistry,
    shadow: &ShadowTarget,
) -> Result<DrawStats, RenderError>
where
    B: GraphicsBackend + ?Sized,
{
    let shadow_depth = shadow
        .depth_texture()
        .ok_or(RenderError::ShadowTargetFreed)?;

    backend.set_transform_uniforms(
        pass.program,
        &TransformUniforms {
            model: Mat4::IDENTITY,
            view: pass.view,
            proj: pass.proj,
        },
    );

    let positions = scene.positions();
    let normals = scene.normals();
    let texcoords = scene.texcoords();
    let mut stats = DrawStats::default();

    for batch in scene.batches() {
        let mut builder = recorder.begin_batch();
        for &index in &scene.indices()[batch.range()] {
            let i = index as usize;
            builder.record(Vertex::new(positions[i], normals[i], texcoords[i]));
        }

        let material = &batch.material;
        let diffuse = textures
            .resolve(material.diffuse_texture.as_deref())
            .ok_or_else(|| {
                RenderError::UnresolvedTexture(
                    material.diffuse_texture.clone().unwrap_or_default(),
                )
            })?;

        backend.set_material_uniforms(pass.program, &material_uniforms(material));
        backend.bind_texture(TextureUnit::Diffuse, diffuse);
        backend.bind_texture(TextureUnit::Shadow, shadow_depth);
        backend.set_light_view_proj(pass.program, pass.light_view_proj);

        stats.vertices += builder.submit(backend);
        stats.draw_calls += 1;
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use glam::{Vec2, Vec3};
    use image::RgbImage;

    use super::*;
    use crate::backend::recording::{Call, RecordingBackend};
    use crate::backend::{GraphicsBackend, ProgramKind};
    use crate::scene::DrawBatch;

    fn two_batch_scene(second_texture: Option<&str>) -> Scene {
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(1.0, 1.0, 1.0),
        ];
        let batches = vec![
            DrawBatch {
                start_index: 0,
                nindices: 3,
                material: Material {
                    diffuse_texture: Some("bricks".into()),
                    ..Material::default()
                },
            },
            DrawBatch {
                start_index: 3,
                nindices: 3,
                material: Material {
                    diffuse: Vec3::new(0.1, 0.2, 0.3),
                    diffuse_texture: second_texture.map(str::to_string),
                    ..Material::default()
                },
            },
        ];
        let mut images = BTreeMap::new();
        images.insert("bricks".to_string(), RgbImage::new(2, 2));
        Scene::new(
            positions,
            vec![Vec3::Z; 6],
            vec![Vec2::ZERO; 6],
            vec![0, 1, 2, 3, 4, 5],
            batches,
            images,
        )
        .unwrap()
    }

    struct Fixture {
        backend: RecordingBackend,
        textures: TextureRegistry,
        shadow: ShadowTarget,
        pass: ScenePass,
    }

    fn fixture(scene: &Scene) -> Fixture {
        let mut backend = RecordingBackend::new();
        let textures = TextureRegistry::load(&mut backend, scene).unwrap();
        let shadow = ShadowTarget::load(&mut backend, 64).unwrap();
        let program = backend.create_program(ProgramKind::Lit, "lit").unwrap();
        backend.calls.clear();
        Fixture {
            backend,
            textures,
            shadow,
            pass: ScenePass {
                program,
                view: Mat4::IDENTITY,
                proj: Mat4::IDENTITY,
                light_view_proj: Mat4::IDENTITY,
            },
        }
    }

    #[test]
    fn two_batches_draw_twice_with_one_material_and_bind_each() {
        let scene = two_batch_scene(None);
        let mut f = fixture(&scene);
        let mut recorder = VertexRecorder::new();

        let stats = draw_scene(
            &mut f.backend,
            &mut recorder,
            &f.pass,
            &scene,
            &f.textures,
            &f.shadow,
        )
        .unwrap();

        assert_eq!(stats.draw_calls, 2);
        assert!(recorder.is_empty());

        let calls = &f.backend.calls;
        assert!(matches!(calls[0], Call::SetTransforms(t) if t.model == Mat4::IDENTITY));
        let draws: Vec<usize> = calls
            .iter()
            .enumerate()
            .filter(|(_, call)| matches!(call, Call::Draw { .. }))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(draws.len(), 2);

        let mut start = 1;
        for &end in &draws {
            let span = &calls[start..end];
            let materials = span
                .iter()
                .filter(|c| matches!(c, Call::SetMaterial(_)))
                .count();
            let diffuse_binds = span
                .iter()
                .filter(|c| matches!(c, Call::Bind(TextureUnit::Diffuse, _)))
                .count();
            assert_eq!((materials, diffuse_binds), (1, 1));
            start = end + 1;
        }

        let bricks = f.textures.get("bricks").unwrap();
        assert!(calls.contains(&Call::Bind(TextureUnit::Diffuse, bricks)));
        assert!(calls.contains(&Call::Bind(
            TextureUnit::Shadow,
            f.shadow.depth_texture().unwrap()
        )));
    }

    #[test]
    fn recorded_vertices_match_batched_indices() {
        let scene = two_batch_scene(Some("bricks"));
        let mut f = fixture(&scene);
        let mut recorder = VertexRecorder::new();

        let stats = draw_scene(
            &mut f.backend,
            &mut recorder,
            &f.pass,
            &scene,
            &f.textures,
            &f.shadow,
        )
        .unwrap();

        assert_eq!(stats.vertices, scene.batched_index_count());
        assert_eq!(f.backend.draws().collect::<Vec<_>>(), vec![3, 3]);

        // Each draw sees only its own batch's vertices.
        let drawn = f.backend.drawn_positions();
        assert_eq!(drawn.len(), 2);
        assert_eq!(drawn[0], vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0]]);
        assert_eq!(drawn[1], vec![[0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [1.0, 1.0, 1.0]]);
    }

    #[test]
    fn recorder_is_empty_after_each_submitted_batch() {
        let mut backend = RecordingBackend::new();
        let mut recorder = VertexRecorder::new();

        for z in [0.0, 1.0] {
            let mut builder = recorder.begin_batch();
            for x in [0.0, 1.0, 2.0] {
                builder.record(Vertex::new(Vec3::new(x, 0.0, z), Vec3::Y, Vec2::ZERO));
            }
            assert_eq!(builder.submit(&mut backend), 3);
            assert!(recorder.is_empty());
        }
        assert_eq!(backend.drawn_positions()[1][0], [0.0, 0.0, 1.0]);
    }

    #[test]
    fn unresolved_texture_errors_and_leaves_recorder_empty() {
        let scene = two_batch_scene(Some("bricks"));
        let mut f = fixture(&scene);
        let empty = TextureRegistry::default();
        let mut recorder = VertexRecorder::new();

        let err = draw_scene(
            &mut f.backend,
            &mut recorder,
            &f.pass,
            &scene,
            &empty,
            &f.shadow,
        )
        .unwrap_err();

        assert!(matches!(err, RenderError::UnresolvedTexture(name) if name == "bricks"));
        assert!(recorder.is_empty());
        assert_eq!(f.backend.draws().count(), 0);
    }

    #[test]
    fn dropped_builder_clears_without_drawing() {
        let mut recorder = VertexRecorder::new();
        {
            let mut builder = recorder.begin_batch();
            builder.record(Vertex::new(Vec3::ZERO, Vec3::Y, Vec2::ZERO));
            assert_eq!(builder.len(), 1);
        }
        assert!(recorder.is_empty());
    }

    #[test]
    fn freed_shadow_target_is_an_error() {
        let scene = two_batch_scene(None);
        let mut f = fixture(&scene);
        f.shadow.free(&mut f.backend);
        let mut recorder = VertexRecorder::new();
        let err = draw_scene(
            &mut f.backend,
            &mut recorder,
            &f.pass,
            &scene,
            &f.textures,
            &f.shadow,
        )
        .unwrap_err();
        assert!(matches!(err, RenderError::ShadowTargetFreed));
    }
}
