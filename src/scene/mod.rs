//! Static triangle scene: shared vertex attributes, one index stream and the
//! material batches that partition it.

mod loader;

use std::collections::BTreeMap;
use std::ops::Range;
use std::path::PathBuf;

use glam::{Vec2, Vec3};
use image::RgbImage;

pub use loader::load_obj;

#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: String,
    pub diffuse: Vec3,
    pub ambient: Vec3,
    pub specular: Vec3,
    pub shininess: f32,
    pub diffuse_texture: Option<String>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".into(),
            diffuse: Vec3::splat(0.8),
            ambient: Vec3::splat(0.2),
            specular: Vec3::ZERO,
            shininess: 1.0,
            diffuse_texture: None,
        }
    }
}

/// A contiguous run of the index stream drawn with one material.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawBatch {
    pub start_index: usize,
    pub nindices: usize,
    pub material: Material,
}

impl DrawBatch {
    pub fn range(&self) -> Range<usize> {
        self.start_index..self.start_index + self.nindices
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let first = *points.first()?;
        let (min, max) = points
            .iter()
            .fold((first, first), |(min, max), p| (min.min(*p), max.max(*p)));
        Some(Self { min, max })
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn radius(&self) -> f32 {
        (self.max - self.min).length() * 0.5
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("failed to parse {path:?}: {source}")]
    Obj {
        path: PathBuf,
        #[source]
        source: tobj::LoadError,
    },
    #[error("scene has no vertices")]
    Empty,
    #[error("attribute counts differ: {positions} positions, {normals} normals, {texcoords} texcoords")]
    AttributeCount {
        positions: usize,
        normals: usize,
        texcoords: usize,
    },
    #[error("batch {batch} covers indices {start}..{end} but the index stream has {len}")]
    BatchOutOfRange {
        batch: usize,
        start: usize,
        end: usize,
        len: usize,
    },
    #[error("batches {first} and {second} overlap in the index stream")]
    BatchOverlap { first: usize, second: usize },
    #[error("batch {batch} references vertex {index}, scene has {len}")]
    IndexOutOfRange { batch: usize, index: u32, len: usize },
}

/// Immutable scene data, validated at construction.
#[derive(Debug)]
pub struct Scene {
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    texcoords: Vec<Vec2>,
    indices: Vec<u32>,
    batches: Vec<DrawBatch>,
    images: BTreeMap<String, RgbImage>,
    bounds: Aabb,
}

impl Scene {
    pub fn new(
        positions: Vec<Vec3>,
        normals: Vec<Vec3>,
        texcoords: Vec<Vec2>,
        indices: Vec<u32>,
        batches: Vec<DrawBatch>,
        images: BTreeMap<String, RgbImage>,
    ) -> Result<Self, SceneError> {
        let bounds = Aabb::from_points(&positions).ok_or(SceneError::Empty)?;
        let scene = Self {
            positions,
            normals,
            texcoords,
            indices,
            batches,
            images,
            bounds,
        };
        scene.validate()?;
        Ok(scene)
    }

    fn validate(&self) -> Result<(), SceneError> {
        let vertex_count = self.positions.len();
        if self.normals.len() != vertex_count || self.texcoords.len() != vertex_count {
            return Err(SceneError::AttributeCount {
                positions: vertex_count,
                normals: self.normals.len(),
                texcoords: self.texcoords.len(),
            });
        }

        for (batch_index, batch) in self.batches.iter().enumerate() {
            let range = batch.range();
            if range.end > self.indices.len() {
                return Err(SceneError::BatchOutOfRange {
                    batch: batch_index,
                    start: range.start,
                    end: range.end,
                    len: self.indices.len(),
                });
            }
            if let Some(&index) = self.indices[range]
                .iter()
                .find(|&&index| index as usize >= vertex_count)
            {
                return Err(SceneError::IndexOutOfRange {
                    batch: batch_index,
                    index,
                    len: vertex_count,
                });
            }
        }

        let mut order: Vec<usize> = (0..self.batches.len())
            .filter(|&i| self.batches[i].nindices > 0)
            .collect();
        order.sort_by_key(|&i| self.batches[i].start_index);
        for pair in order.windows(2) {
            let (first, second) = (pair[0], pair[1]);
            if self.batches[first].range().end > self.batches[second].start_index {
                return Err(SceneError::BatchOverlap {
                    first: first.min(second),
                    second: first.max(second),
                });
            }
        }

        Ok(())
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    pub fn texcoords(&self) -> &[Vec2] {
        &self.texcoords
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn batches(&self) -> &[DrawBatch] {
        &self.batches
    }

    pub fn images(&self) -> &BTreeMap<String, RgbImage> {
        &self.images
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Index count summed over every batch.
    pub fn batched_index_count(&self) -> usize {
        self.batches.iter().map(|batch| batch.nindices).sum()
    }
}
