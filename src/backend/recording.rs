//! In-memory backend that records every call, for renderer unit tests.

use glam::Mat4;

use super::{
    check_target_completeness, check_texture_size, BackendError, GraphicsBackend, LightUniforms,
    MaterialUniforms, PassDesc, ProgramError, ProgramId, ProgramKind, ProgramMarker, Slots,
    TargetError, TargetId, TargetMarker, TextureDesc, TextureId, TextureMarker, TextureUnit,
    TransformUniforms, Viewport,
};
use crate::renderer::Vertex;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Call {
    BeginFrame,
    BeginPass(PassDesc),
    UseProgram(ProgramId),
    SetTransforms(TransformUniforms),
    SetLight(LightUniforms),
    SetMaterial(MaterialUniforms),
    SetLightViewProj(Mat4),
    Bind(TextureUnit, TextureId),
    Draw { vertices: usize },
    Quad { texture: TextureId, viewport: Viewport },
    EndFrame,
}

pub(crate) struct RecordingBackend {
    textures: Slots<TextureMarker, TextureDesc>,
    uploads: Vec<(TextureId, u32, u32)>,
    targets: Slots<TargetMarker, (TextureId, TextureId)>,
    programs: Slots<ProgramMarker, ProgramKind>,
    pub(crate) calls: Vec<Call>,
    drawn: Vec<Vec<[f32; 3]>>,
    /// Sources containing this marker fail to compile.
    pub(crate) reject_marker: &'static str,
    pub(crate) surface: (u32, u32),
    pub(crate) max_texture_dimension: u32,
}

impl RecordingBackend {
    pub(crate) fn new() -> Self {
        Self {
            textures: Slots::new(),
            uploads: Vec::new(),
            targets: Slots::new(),
            programs: Slots::new(),
            calls: Vec::new(),
            drawn: Vec::new(),
            reject_marker: "#error",
            surface: (800, 600),
            max_texture_dimension: 8192,
        }
    }

    pub(crate) fn live_targets(&self) -> usize {
        self.targets.len()
    }

    pub(crate) fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub(crate) fn uploads(&self) -> &[(TextureId, u32, u32)] {
        &self.uploads
    }

    /// Positions handed to each draw, in draw order.
    pub(crate) fn drawn_positions(&self) -> &[Vec<[f32; 3]>] {
        &self.drawn
    }

    pub(crate) fn draws(&self) -> impl Iterator<Item = usize> + '_ {
        self.calls.iter().filter_map(|call| match call {
            Call::Draw { vertices } => Some(*vertices),
            _ => None,
        })
    }
}

impl GraphicsBackend for RecordingBackend {
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId, BackendError> {
        check_texture_size(desc, self.max_texture_dimension)?;
        Ok(self.textures.insert(desc.clone()))
    }

    fn upload_rgb(
        &mut self,
        texture: TextureId,
        width: u32,
        height: u32,
        rgb: &[u8],
    ) -> Result<(), BackendError> {
        let desc = self
            .textures
            .get(texture)
            .ok_or(BackendError::UnknownTexture(texture))?;
        if desc.format.is_depth() {
            return Err(BackendError::NotUploadable(texture));
        }
        if desc.width != width || desc.height != height {
            return Err(BackendError::SizeMismatch {
                expected_width: desc.width,
                expected_height: desc.height,
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
        self.uploads.push((texture, width, height));
        Ok(())
    }

    fn texture_desc(&self, texture: TextureId) -> Option<&TextureDesc> {
        self.textures.get(texture)
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
        let depth_desc = self
            .textures
            .get(depth)
            .ok_or(TargetError::MissingAttachment {
                role: "depth",
                texture: depth,
            })?;
        let color_desc = self
            .textures
            .get(color)
            .ok_or(TargetError::MissingAttachment {
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
        if source.contains(self.reject_marker) {
            return Err(ProgramError {
                kind,
                message: format!("rejected source for {kind:?}"),
            });
        }
        Ok(self.programs.insert(kind))
    }

    fn destroy_program(&mut self, program: ProgramId) -> bool {
        self.programs.remove(program).is_some()
    }

    fn surface_size(&self) -> (u32, u32) {
        self.surface
    }

    fn begin_frame(&mut self) -> Result<(), BackendError> {
        self.calls.push(Call::BeginFrame);
        Ok(())
    }

    fn begin_pass(&mut self, pass: &PassDesc) -> Result<(), BackendError> {
        self.calls.push(Call::BeginPass(*pass));
        Ok(())
    }

    fn use_program(&mut self, program: ProgramId) {
        self.calls.push(Call::UseProgram(program));
    }

    fn set_transform_uniforms(&mut self, _program: ProgramId, transforms: &TransformUniforms) {
        self.calls.push(Call::SetTransforms(*transforms));
    }

    fn set_light_uniforms(&mut self, _program: ProgramId, light: &LightUniforms) {
        self.calls.push(Call::SetLight(*light));
    }

    fn set_material_uniforms(&mut self, _program: ProgramId, material: &MaterialUniforms) {
        self.calls.push(Call::SetMaterial(*material));
    }

    fn set_light_view_proj(&mut self, _program: ProgramId, view_proj: Mat4) {
        self.calls.push(Call::SetLightViewProj(view_proj));
    }

    fn bind_texture(&mut self, unit: TextureUnit, texture: TextureId) {
        self.calls.push(Call::Bind(unit, texture));
    }

    fn draw_triangles(&mut self, vertices: &[Vertex]) {
        self.drawn.push(vertices.iter().map(|v| v.pos).collect());
        self.calls.push(Call::Draw {
            vertices: vertices.len(),
        });
    }

    fn draw_textured_quad(&mut self, _program: ProgramId, texture: TextureId, viewport: Viewport) {
        self.calls.push(Call::Quad { texture, viewport });
    }

    fn end_frame(&mut self) -> Result<(), BackendError> {
        self.calls.push(Call::EndFrame);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TextureFormat;

    #[test]
    fn upload_checks_size_and_format() {
        let mut backend = RecordingBackend::new();
        let color = backend
            .create_texture(&TextureDesc::sampled("c", 2, 2))
            .unwrap();
        let depth = backend
            .create_texture(&TextureDesc::attachment("d", 2, TextureFormat::Depth32))
            .unwrap();

        assert!(backend.upload_rgb(color, 2, 2, &[0; 12]).is_ok());
        assert!(matches!(
            backend.upload_rgb(color, 2, 2, &[0; 11]),
            Err(BackendError::PixelCount { expected: 12, actual: 11 })
        ));
        assert!(matches!(
            backend.upload_rgb(color, 4, 1, &[0; 12]),
            Err(BackendError::SizeMismatch { .. })
        ));
        assert!(matches!(
            backend.upload_rgb(depth, 2, 2, &[0; 12]),
            Err(BackendError::NotUploadable(_))
        ));
        assert_eq!(backend.uploads().len(), 1);
    }
}
