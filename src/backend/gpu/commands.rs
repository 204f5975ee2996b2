use std::ops::Range;

use super::uniforms::DrawUniformsRaw;
use crate::backend::{PassDesc, ProgramId, TextureId, Viewport};
use crate::renderer::Vertex;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Command {
    Draw {
        program: ProgramId,
        uniform_offset: u32,
        vertices: Range<u32>,
        diffuse: Option<TextureId>,
        shadow: Option<TextureId>,
    },
    Quad {
        program: ProgramId,
        texture: TextureId,
        viewport: Viewport,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct RecordedPass {
    pub desc: PassDesc,
    pub commands: Vec<Command>,
}

/// One frame's passes plus the vertex and uniform bytes their draws point at.
///
/// Uniform blocks are written at `stride` intervals so each draw can bind its
/// block with a dynamic offset.
#[derive(Debug)]
pub(crate) struct FrameRecorder {
    passes: Vec<RecordedPass>,
    vertices: Vec<Vertex>,
    uniforms: Vec<u8>,
    stride: u32,
}

impl FrameRecorder {
    pub fn new(stride: u32) -> Self {
        Self {
            passes: Vec::new(),
            vertices: Vec::new(),
            uniforms: Vec::new(),
            stride: stride.max(std::mem::size_of::<DrawUniformsRaw>() as u32),
        }
    }

    pub fn clear(&mut self) {
        self.passes.clear();
        self.vertices.clear();
        self.uniforms.clear();
    }

    pub fn begin_pass(&mut self, desc: PassDesc) {
        self.passes.push(RecordedPass {
            desc,
            commands: Vec::new(),
        });
    }

    /// Records a draw in the current pass. Returns `false` when no pass is open
    /// or there is nothing to draw.
    pub fn push_draw(
        &mut self,
        program: ProgramId,
        uniforms: &DrawUniformsRaw,
        vertices: &[Vertex],
        diffuse: Option<TextureId>,
        shadow: Option<TextureId>,
    ) -> bool {
        if vertices.is_empty() {
            return false;
        }
        let Some(pass) = self.passes.last_mut() else {
            return false;
        };

        let uniform_offset = self.uniforms.len() as u32;
        self.uniforms.extend_from_slice(bytemuck::bytes_of(uniforms));
        self.uniforms
            .resize((uniform_offset + self.stride) as usize, 0);

        let first = self.vertices.len() as u32;
        self.vertices.extend_from_slice(vertices);

        pass.commands.push(Command::Draw {
            program,
            uniform_offset,
            vertices: first..self.vertices.len() as u32,
            diffuse,
            shadow,
        });
        true
    }

    pub fn push_quad(&mut self, program: ProgramId, texture: TextureId, viewport: Viewport) -> bool {
        let Some(pass) = self.passes.last_mut() else {
            return false;
        };
        pass.commands.push(Command::Quad {
            program,
            texture,
            viewport,
        });
        true
    }

    pub fn passes(&self) -> &[RecordedPass] {
        &self.passes
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn uniforms(&self) -> &[u8] {
        &self.uniforms
    }
}

/// Clips `viewport` to a `width` x `height` target; `None` if nothing is left.
pub(crate) fn clamp_viewport(viewport: Viewport, width: u32, height: u32) -> Option<Viewport> {
    let x = viewport.x.min(width);
    let y = viewport.y.min(height);
    let clamped = Viewport {
        x,
        y,
        width: viewport.width.min(width - x),
        height: viewport.height.min(height - y),
    };
    (clamped.width > 0 && clamped.height > 0).then_some(clamped)
}
