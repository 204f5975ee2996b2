// scene/loader.rs
use std::collections::BTreeMap;
use std::path::Path;

use glam::{Vec2, Vec3};
use image::RgbImage;

use super::{DrawBatch, Material, Scene, SceneError};

/// Loads an OBJ file, its MTL library and the diffuse images the materials
/// reference.
///
/// Every model with a non-empty index list becomes one batch. Images that
/// cannot be read are left out with a warning; the texture registry rejects
/// the scene later if a batch still names them.
pub fn load_obj(path: impl AsRef<Path>) -> Result<Scene, SceneError> {
    let path = path.as_ref();
    log::info!("Loading scene: {:?}", path);

    let (models, materials) =
        tobj::load_obj(path, &tobj::GPU_LOAD_OPTIONS).map_err(|source| SceneError::Obj {
            path: path.to_path_buf(),
            source,
        })?;

    let materials: Vec<Material> = match materials {
        Ok(materials) => materials.iter().map(convert_material).collect(),
        Err(err) => {
            log::warn!("Failed to load material library for {:?}: {}", path, err);
            Vec::new()
        }
    };

    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut texcoords = Vec::new();
    let mut indices = Vec::new();
    let mut batches = Vec::new();
    let mut missing_normals = 0usize;

    for model in &models {
        let mesh = &model.mesh;
        if mesh.indices.is_empty() {
            continue;
        }

        let base = positions.len() as u32;
        let vertex_count = mesh.positions.len() / 3;

        positions.extend(
            mesh.positions
                .chunks_exact(3)
                .map(|p| Vec3::new(p[0], p[1], p[2])),
        );

        if mesh.normals.len() == mesh.positions.len() {
            normals.extend(
                mesh.normals
                    .chunks_exact(3)
                    .map(|n| Vec3::new(n[0], n[1], n[2])),
            );
        } else {
            missing_normals += 1;
            normals.extend(std::iter::repeat(Vec3::Y).take(vertex_count));
        }

        if mesh.texcoords.len() / 2 == vertex_count {
            texcoords.extend(
                mesh.texcoords
                    .chunks_exact(2)
                    .map(|t| Vec2::new(t[0], t[1])),
            );
        } else {
            texcoords.extend(std::iter::repeat(Vec2::ZERO).take(vertex_count));
        }

        let material = mesh
            .material_id
            .and_then(|id| materials.get(id))
            .cloned()
            .unwrap_or_default();

        batches.push(DrawBatch {
            start_index: indices.len(),
            nindices: mesh.indices.len(),
            material,
        });
        indices.extend(mesh.indices.iter().map(|&index| index + base));
    }

    if missing_normals > 0 {
        log::warn!(
            "{} models in {:?} have no normals; using +Y",
            missing_normals,
            path
        );
    }

    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let images = load_images(base_dir, &batches);

    log::info!(
        "Loaded scene: {} vertices, {} indices, {} batches, {} images",
        positions.len(),
        indices.len(),
        batches.len(),
        images.len()
    );

    Scene::new(positions, normals, texcoords, indices, batches, images)
}

fn convert_material(material: &tobj::Material) -> Material {
    let defaults = Material::default();
    Material {
        name: material.name.clone(),
        diffuse: material.diffuse.map(Vec3::from).unwrap_or(defaults.diffuse),
        ambient: material.ambient.map(Vec3::from).unwrap_or(defaults.ambient),
        specular: material
            .specular
            .map(Vec3::from)
            .unwrap_or(defaults.specular),
        shininess: material.shininess.unwrap_or(defaults.shininess),
        diffuse_texture: material
            .diffuse_texture
            .clone()
            .filter(|name| !name.trim().is_empty()),
    }
}

fn load_images(base_dir: &Path, batches: &[DrawBatch]) -> BTreeMap<String, RgbImage> {
    let mut images = BTreeMap::new();

    for name in batches
        .iter()
        .filter_map(|batch| batch.material.diffuse_texture.as_deref())
    {
        if images.contains_key(name) {
            continue;
        }

        let image_path = base_dir.join(name.trim().replace('\\', "/"));
        match image::open(&image_path) {
            Ok(img) => {
                let rgb = img.to_rgb8();
                log::debug!(
                    "Loaded image {:?} ({}x{})",
                    image_path,
                    rgb.width(),
                    rgb.height()
                );
                images.insert(name.to_string(), rgb);
            }
            Err(err) => {
                log::warn!("Failed to load image {:?}: {}", image_path, err);
            }
        }
    }

    images
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_obj_is_a_parse_error() {
        let err = load_obj("does/not/exist.obj").unwrap_err();
        assert!(matches!(err, SceneError::Obj { .. }));
    }

    #[test]
    fn material_defaults_fill_missing_fields() {
        let converted = convert_material(&tobj::Material {
            name: "stone".into(),
            diffuse: Some([0.5, 0.4, 0.3]),
            diffuse_texture: Some("  ".into()),
            ..Default::default()
        });
        assert_eq!(converted.diffuse, Vec3::new(0.5, 0.4, 0.3));
        assert_eq!(converted.ambient, Material::default().ambient);
        assert_eq!(converted.shininess, 1.0);
        assert_eq!(converted.diffuse_texture, None);
    }
}
