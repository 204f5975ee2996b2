use crate::backend::{
    GraphicsBackend, PassTarget, TargetError, TargetId, TextureDesc, TextureFormat, TextureId,
};

/// Offscreen depth + color target the light pass renders into.
#[derive(Debug)]
pub struct ShadowTarget {
    target: Option<TargetId>,
    depth: Option<TextureId>,
    color: Option<TextureId>,
    size: u32,
}

impl ShadowTarget {
    pub fn load<B>(backend: &mut B, size: u32) -> Result<Self, TargetError>
    where
        B: GraphicsBackend + ?Sized,
    {
        let target = Self::from_descs(
            backend,
            &TextureDesc::attachment("shadow depth", size, TextureFormat::Depth32),
            &TextureDesc::attachment("shadow color", size, TextureFormat::Rgba8),
        )?;
        log::info!("Created {}x{} shadow target", size, size);
        Ok(target)
    }

    /// Allocates both attachments and links them. If the target is incomplete
    /// the attachments are released before the error is returned.
    pub fn from_descs<B>(
        backend: &mut B,
        depth_desc: &TextureDesc,
        color_desc: &TextureDesc,
    ) -> Result<Self, TargetError>
    where
        B: GraphicsBackend + ?Sized,
    {
        let depth = backend.create_texture(depth_desc)?;
        let color = match backend.create_texture(color_desc) {
            Ok(color) => color,
            Err(err) => {
                backend.destroy_texture(depth);
                return Err(err.into());
            }
        };

        match backend.create_target(depth, color) {
            Ok(target) => Ok(Self {
                target: Some(target),
                depth: Some(depth),
                color: Some(color),
                size: depth_desc.width,
            }),
            Err(err) => {
                backend.destroy_texture(depth);
                backend.destroy_texture(color);
                Err(err)
            }
        }
    }

    pub fn pass_target(&self) -> Option<PassTarget> {
        self.target.map(PassTarget::Offscreen)
    }

    pub fn depth_texture(&self) -> Option<TextureId> {
        self.depth
    }

    pub fn color_texture(&self) -> Option<TextureId> {
        self.color
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn is_loaded(&self) -> bool {
        self.target.is_some()
    }

    /// Releases the target and both attachments. Safe to call twice.
    pub fn free<B>(&mut self, backend: &mut B)
    where
        B: GraphicsBackend + ?Sized,
    {
        if let Some(target) = self.target.take() {
            backend.destroy_target(target);
        }
        for texture in [self.depth.take(), self.color.take()].into_iter().flatten() {
            backend.destroy_texture(texture);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::RecordingBackend;
    use crate::backend::BackendError;

    #[test]
    fn load_creates_matching_attachments() {
        let mut backend = RecordingBackend::new();
        let shadow = ShadowTarget::load(&mut backend, 1024).unwrap();

        let depth = backend.texture_desc(shadow.depth_texture().unwrap()).unwrap();
        let color = backend.texture_desc(shadow.color_texture().unwrap()).unwrap();
        assert_eq!(depth.format, TextureFormat::Depth32);
        assert_eq!(color.format, TextureFormat::Rgba8);
        assert_eq!((depth.width, depth.height), (1024, 1024));
        assert_eq!((color.width, color.height), (1024, 1024));
        assert_eq!(depth.filter, crate::backend::Filter::Nearest);
        assert_eq!(backend.live_targets(), 1);
    }

    #[test]
    fn mismatched_sizes_fail_every_time_without_leaking() {
        let mut backend = RecordingBackend::new();
        let depth = TextureDesc::attachment("depth", 4096, TextureFormat::Depth32);
        let color = TextureDesc::attachment("color", 2048, TextureFormat::Rgba8);

        for _ in 0..3 {
            let err = ShadowTarget::from_descs(&mut backend, &depth, &color).unwrap_err();
            assert!(matches!(
                err,
                TargetError::Incomplete {
                    reason: "attachment sizes differ",
                    ..
                }
            ));
        }
        assert_eq!(backend.live_textures(), 0);
        assert_eq!(backend.live_targets(), 0);
    }

    #[test]
    fn oversized_target_fails_without_leaking() {
        let mut backend = RecordingBackend::new();
        backend.max_texture_dimension = 4096;

        let err = ShadowTarget::load(&mut backend, 65536).unwrap_err();
        assert!(matches!(
            err,
            TargetError::Backend(BackendError::TooLarge {
                width: 65536,
                max: 4096,
                ..
            })
        ));
        assert_eq!(backend.live_textures(), 0);
        assert_eq!(backend.live_targets(), 0);
    }

    #[test]
    fn mismatched_formats_fail() {
        let mut backend = RecordingBackend::new();
        let depth = TextureDesc::attachment("depth", 64, TextureFormat::Rgba8);
        let color = TextureDesc::attachment("color", 64, TextureFormat::Rgba8);
        assert!(ShadowTarget::from_descs(&mut backend, &depth, &color).is_err());
        assert_eq!(backend.live_textures(), 0);
    }

    #[test]
    fn free_releases_everything_once() {
        let mut backend = RecordingBackend::new();
        let mut shadow = ShadowTarget::load(&mut backend, 64).unwrap();
        shadow.free(&mut backend);
        shadow.free(&mut backend);
        assert!(!shadow.is_loaded());
        assert!(shadow.pass_target().is_none());
        assert_eq!(backend.live_textures(), 0);
        assert_eq!(backend.live_targets(), 0);
    }
}
