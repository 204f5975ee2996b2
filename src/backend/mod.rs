//! Device abstraction used by the renderer.
//!
//! The renderer drives a small immediate-mode command set (select program,
//! upload uniforms, bind textures, draw). [`gpu::WgpuBackend`] maps it onto
//! wgpu; unit tests run the same code against a recording backend.

pub mod gpu;
pub mod handle;

#[cfg(test)]
pub(crate) mod recording;

use std::fmt;

use glam::{Mat4, Vec3};

pub use handle::{Handle, Slots};

use crate::renderer::Vertex;

pub enum TextureMarker {}
pub enum TargetMarker {}
pub enum ProgramMarker {}

pub type TextureId = Handle<TextureMarker>;
pub type TargetId = Handle<TargetMarker>;
pub type ProgramId = Handle<ProgramMarker>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureFormat {
    Rgba8,
    Depth32,
}

impl TextureFormat {
    pub fn is_depth(self) -> bool {
        matches!(self, TextureFormat::Depth32)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Filter {
    Linear,
    Nearest,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureDesc {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub filter: Filter,
    /// Usable as a render-target attachment.
    pub attachment: bool,
}

impl TextureDesc {
    pub fn sampled(label: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            label: label.into(),
            width,
            height,
            format: TextureFormat::Rgba8,
            filter: Filter::Linear,
            attachment: false,
        }
    }

    pub fn attachment(
        label: impl Into<String>,
        size: u32,
        format: TextureFormat,
    ) -> Self {
        Self {
            label: label.into(),
            width: size,
            height: size,
            format,
            filter: Filter::Nearest,
            attachment: true,
        }
    }
}

/// Texture units the shaders sample from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureUnit {
    Diffuse,
    Shadow,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgramKind {
    /// Camera pass: lit, textured, shadowed.
    Lit,
    /// Light pass: writes depth plus a depth visualisation to color.
    Depth,
    /// Screen-space quad showing a texture.
    Quad,
}

impl ProgramKind {
    pub const ALL: [ProgramKind; 3] = [ProgramKind::Lit, ProgramKind::Depth, ProgramKind::Quad];

    pub fn file_name(self) -> &'static str {
        match self {
            ProgramKind::Lit => "lit.wgsl",
            ProgramKind::Depth => "depth.wgsl",
            ProgramKind::Quad => "quad.wgsl",
        }
    }
}

/// Pixel rectangle, origin at the top-left of the target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassTarget {
    Screen,
    Offscreen(TargetId),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PassDesc {
    pub target: PassTarget,
    pub viewport: Viewport,
    /// Clear color (depth is cleared to 1.0 alongside); `None` keeps contents.
    pub clear: Option<[f32; 3]>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransformUniforms {
    pub model: Mat4,
    pub view: Mat4,
    pub proj: Mat4,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaterialUniforms {
    pub diffuse: Vec3,
    pub ambient: Vec3,
    pub specular: Vec3,
    pub shininess: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightUniforms {
    /// Unit vector pointing from the scene towards the light.
    pub direction: Vec3,
    pub color: Vec3,
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("unknown texture {0:?}")]
    UnknownTexture(TextureId),
    #[error("texture {0:?} has a depth format and takes no pixel uploads")]
    NotUploadable(TextureId),
    #[error("upload of {actual_width}x{actual_height} pixels into {expected_width}x{expected_height} texture")]
    SizeMismatch {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },
    #[error("texture '{label}' is {width}x{height}, device limit is {max}")]
    TooLarge {
        label: String,
        width: u32,
        height: u32,
        max: u32,
    },
    #[error("pixel buffer holds {actual} bytes, expected {expected}")]
    PixelCount { expected: usize, actual: usize },
    #[error("no frame in progress")]
    NoFrame,
    #[error("surface unavailable this frame: {0}")]
    SurfaceUnavailable(String),
    #[error("surface error: {0}")]
    Surface(String),
    #[error("failed to initialise GPU: {0}")]
    Init(String),
}

#[derive(Clone, Debug, thiserror::Error)]
#[error("{kind:?} program failed to build: {message}")]
pub struct ProgramError {
    pub kind: ProgramKind,
    pub message: String,
}

/// Format and size of one attachment, for diagnostics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttachmentInfo {
    pub label: String,
    pub format: TextureFormat,
    pub width: u32,
    pub height: u32,
    pub attachment: bool,
}

impl From<&TextureDesc> for AttachmentInfo {
    fn from(desc: &TextureDesc) -> Self {
        Self {
            label: desc.label.clone(),
            format: desc.format,
            width: desc.width,
            height: desc.height,
            attachment: desc.attachment,
        }
    }
}

impl fmt::Display for AttachmentInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' {:?} {}x{}",
            self.label, self.format, self.width, self.height
        )?;
        if !self.attachment {
            write!(f, " (not attachable)")?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error("render target {role} attachment {texture:?} does not exist")]
    MissingAttachment {
        role: &'static str,
        texture: TextureId,
    },
    #[error("incomplete render target ({reason}): depth {depth}, color {color}")]
    Incomplete {
        reason: &'static str,
        depth: AttachmentInfo,
        color: AttachmentInfo,
    },
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Size rule every backend applies before creating a texture.
pub fn check_texture_size(desc: &TextureDesc, max: u32) -> Result<(), BackendError> {
    if desc.width > max || desc.height > max {
        return Err(BackendError::TooLarge {
            label: desc.label.clone(),
            width: desc.width,
            height: desc.height,
            max,
        });
    }
    Ok(())
}

/// Completeness rule every backend applies before creating a target.
pub fn check_target_completeness(
    depth: &TextureDesc,
    color: &TextureDesc,
) -> Result<(), TargetError> {
    let reason = if !depth.format.is_depth() {
        Some("depth attachment does not have a depth format")
    } else if color.format.is_depth() {
        Some("color attachment has a depth format")
    } else if !depth.attachment || !color.attachment {
        Some("texture not created as an attachment")
    } else if depth.width != color.width || depth.height != color.height {
        Some("attachment sizes differ")
    } else if depth.width == 0 || depth.height == 0 {
        Some("zero-sized attachment")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(TargetError::Incomplete {
            reason,
            depth: depth.into(),
            color: color.into(),
        }),
        None => Ok(()),
    }
}

/// Operations the renderer issues against a graphics device.
pub trait GraphicsBackend {
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId, BackendError>;

    /// Uploads tightly packed RGB8 rows into an RGBA8 texture of the same size.
    fn upload_rgb(
        &mut self,
        texture: TextureId,
        width: u32,
        height: u32,
        rgb: &[u8],
    ) -> Result<(), BackendError>;

    fn texture_desc(&self, texture: TextureId) -> Option<&TextureDesc>;

    /// Returns `false` when the handle was already released.
    fn destroy_texture(&mut self, texture: TextureId) -> bool;

    /// Number of textures created through this trait and not yet destroyed.
    fn live_textures(&self) -> usize;

    fn create_target(
        &mut self,
        depth: TextureId,
        color: TextureId,
    ) -> Result<TargetId, TargetError>;

    fn destroy_target(&mut self, target: TargetId) -> bool;

    fn create_program(
        &mut self,
        kind: ProgramKind,
        source: &str,
    ) -> Result<ProgramId, ProgramError>;

    fn destroy_program(&mut self, program: ProgramId) -> bool;

    /// Size of the on-screen framebuffer in pixels.
    fn surface_size(&self) -> (u32, u32);

    fn begin_frame(&mut self) -> Result<(), BackendError>;

    fn begin_pass(&mut self, pass: &PassDesc) -> Result<(), BackendError>;

    fn use_program(&mut self, program: ProgramId);

    fn set_transform_uniforms(&mut self, program: ProgramId, transforms: &TransformUniforms);

    fn set_light_uniforms(&mut self, program: ProgramId, light: &LightUniforms);

    fn set_material_uniforms(&mut self, program: ProgramId, material: &MaterialUniforms);

    fn set_light_view_proj(&mut self, program: ProgramId, view_proj: Mat4);

    fn bind_texture(&mut self, unit: TextureUnit, texture: TextureId);

    /// Draws `vertices` as a triangle list with the current state.
    fn draw_triangles(&mut self, vertices: &[Vertex]);

    fn draw_textured_quad(&mut self, program: ProgramId, texture: TextureId, viewport: Viewport);

    /// Submits the frame's work and presents it.
    fn end_frame(&mut self) -> Result<(), BackendError>;
}
