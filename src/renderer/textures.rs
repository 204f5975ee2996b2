use std::collections::{BTreeMap, BTreeSet};

use crate::backend::{BackendError, GraphicsBackend, TextureDesc, TextureId};
use crate::scene::Scene;

#[derive(Debug, thiserror::Error)]
pub enum TextureError {
    #[error("materials reference textures that were not loaded: {}", missing.join(", "))]
    Unresolved { missing: Vec<String> },
    #[error("failed to upload texture '{name}': {source}")]
    Upload {
        name: String,
        #[source]
        source: BackendError,
    },
}

/// Scene textures by name, validated against every batch material.
///
/// Built once from the scene's images. Each texture has its source image's own
/// dimensions. If two images share a name the later one wins and the earlier
/// handle is released.
#[derive(Debug, Default)]
pub struct TextureRegistry {
    by_name: BTreeMap<String, TextureId>,
    fallback: Option<TextureId>,
}

impl TextureRegistry {
    /// Uploads every scene image and checks that every material's diffuse
    /// texture resolves. On failure nothing stays allocated.
    pub fn load<B>(backend: &mut B, scene: &Scene) -> Result<Self, TextureError>
    where
        B: GraphicsBackend + ?Sized,
    {
        let mut registry = Self::default();
        let result = registry
            .upload_all(backend, scene)
            .and_then(|()| registry.validate(scene));

        match result {
            Ok(()) => {
                log::info!("Loaded {} scene textures", registry.len());
                Ok(registry)
            }
            Err(err) => {
                registry.free(backend);
                Err(err)
            }
        }
    }

    fn upload_all<B>(&mut self, backend: &mut B, scene: &Scene) -> Result<(), TextureError>
    where
        B: GraphicsBackend + ?Sized,
    {
        self.fallback = Some(upload(backend, "fallback white", 1, 1, &[255, 255, 255])?);

        for (name, image) in scene.images() {
            let texture = upload(backend, name, image.width(), image.height(), image.as_raw())?;
            self.insert(backend, name, texture);
        }
        Ok(())
    }

    fn insert<B>(&mut self, backend: &mut B, name: &str, texture: TextureId)
    where
        B: GraphicsBackend + ?Sized,
    {
        if let Some(previous) = self.by_name.insert(name.to_string(), texture) {
            log::warn!("Texture name '{}' loaded twice; keeping the last", name);
            backend.destroy_texture(previous);
        }
    }

    fn validate(&self, scene: &Scene) -> Result<(), TextureError> {
        let missing: BTreeSet<&str> = scene
            .batches()
            .iter()
            .filter_map(|batch| batch.material.diffuse_texture.as_deref())
            .filter(|name| !self.by_name.contains_key(*name))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(TextureError::Unresolved {
                missing: missing.into_iter().map(str::to_string).collect(),
            })
        }
    }

    /// Texture to bind for a material: the named texture, or the white
    /// fallback when the material has none.
    pub fn resolve(&self, name: Option<&str>) -> Option<TextureId> {
        match name {
            Some(name) => self.by_name.get(name).copied(),
            None => self.fallback,
        }
    }

    pub fn get(&self, name: &str) -> Option<TextureId> {
        self.by_name.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Releases every texture and empties the registry. Safe to call twice.
    pub fn free<B>(&mut self, backend: &mut B)
    where
        B: GraphicsBackend + ?Sized,
    {
        for texture in self
            .fallback
            .take()
            .into_iter()
            .chain(std::mem::take(&mut self.by_name).into_values())
        {
            backend.destroy_texture(texture);
        }
    }
}

fn upload<B>(
    backend: &mut B,
    name: &str,
    width: u32,
    height: u32,
    rgb: &[u8],
) -> Result<TextureId, TextureError>
where
    B: GraphicsBackend + ?Sized,
{
    let wrap = |source| TextureError::Upload {
        name: name.to_string(),
        source,
    };
    let texture = backend
        .create_texture(&TextureDesc::sampled(name, width, height))
        .map_err(wrap)?;
    if let Err(err) = backend.upload_rgb(texture, width, height, rgb) {
        backend.destroy_texture(texture);
        return Err(wrap(err));
    }
    Ok(texture)
}
