use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use crate::backend::{LightUniforms, MaterialUniforms, TransformUniforms};

/// Per-draw uniform block, laid out as `Draw` in the WGSL programs.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
pub(crate) struct DrawUniformsRaw {
    pub model: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
    pub light_view_proj: [[f32; 4]; 4],
    pub light_dir: [f32; 4],
    pub light_color: [f32; 4],
    pub diffuse: [f32; 4],
    pub ambient: [f32; 4],
    /// xyz: specular color, w: shininess.
    pub specular: [f32; 4],
}

/// Uniform values last uploaded to one program.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct ProgramUniforms {
    pub transforms: TransformUniforms,
    pub light: LightUniforms,
    pub material: MaterialUniforms,
    pub light_view_proj: Mat4,
}

impl Default for ProgramUniforms {
    fn default() -> Self {
        Self {
            transforms: TransformUniforms {
                model: Mat4::IDENTITY,
                view: Mat4::IDENTITY,
                proj: Mat4::IDENTITY,
            },
            light: LightUniforms {
                direction: Vec3::Y,
                color: Vec3::ONE,
            },
            material: MaterialUniforms {
                diffuse: Vec3::splat(0.8),
                ambient: Vec3::splat(0.2),
                specular: Vec3::ZERO,
                shininess: 1.0,
            },
            light_view_proj: Mat4::IDENTITY,
        }
    }
}

impl ProgramUniforms {
    pub fn to_raw(&self) -> DrawUniformsRaw {
        DrawUniformsRaw {
            model: self.transforms.model.to_cols_array_2d(),
            view: self.transforms.view.to_cols_array_2d(),
            proj: self.transforms.proj.to_cols_array_2d(),
            light_view_proj: self.light_view_proj.to_cols_array_2d(),
            light_dir: self.light.direction.extend(0.0).to_array(),
            light_color: self.light.color.extend(1.0).to_array(),
            diffuse: self.material.diffuse.extend(1.0).to_array(),
            ambient: self.material.ambient.extend(1.0).to_array(),
            specular: self
                .material
                .specular
                .extend(self.material.shininess)
                .to_array(),
        }
    }
}

/// Rounds `size` up to the next multiple of `alignment`.
pub(crate) fn align_to(size: u64, alignment: u64) -> u64 {
    let alignment = alignment.max(1);
    size.div_ceil(alignment) * alignment
}
