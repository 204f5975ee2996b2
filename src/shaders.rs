//! WGSL programs read from disk and rebuilt whenever their sources change.

use std::fs;
use std::path::{Path, PathBuf};

use crate::backend::{GraphicsBackend, ProgramError, ProgramId, ProgramKind};

#[derive(Debug, thiserror::Error)]
pub enum ReloadError {
    #[error("failed to read shader {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Compile(#[from] ProgramError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderSources {
    pub lit: String,
    pub depth: String,
    pub quad: String,
}

impl ShaderSources {
    pub fn get(&self, kind: ProgramKind) -> &str {
        match kind {
            ProgramKind::Lit => &self.lit,
            ProgramKind::Depth => &self.depth,
            ProgramKind::Quad => &self.quad,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgramSet {
    pub lit: ProgramId,
    pub depth: ProgramId,
    pub quad: ProgramId,
}

impl ProgramSet {
    fn ids(&self) -> [ProgramId; 3] {
        [self.lit, self.depth, self.quad]
    }
}

/// Something that yields the frame's programs, rebuilding them if needed.
pub trait ProgramSource<B: ?Sized> {
    fn reload(&mut self, backend: &mut B) -> Result<ProgramSet, ReloadError>;
}

pub struct ProgramLoader {
    dir: PathBuf,
    /// Sources of the last build attempt, successful or not.
    attempted: Option<ShaderSources>,
    programs: Option<ProgramSet>,
    last_error: Option<ProgramError>,
}

impl ProgramLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            attempted: None,
            programs: None,
            last_error: None,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn programs(&self) -> Option<ProgramSet> {
        self.programs
    }

    pub fn read_sources(&self) -> Result<ShaderSources, ReloadError> {
        let read = |kind: ProgramKind| {
            let path = self.dir.join(kind.file_name());
            fs::read_to_string(&path).map_err(|source| ReloadError::Io { path, source })
        };
        Ok(ShaderSources {
            lit: read(ProgramKind::Lit)?,
            depth: read(ProgramKind::Depth)?,
            quad: read(ProgramKind::Quad)?,
        })
    }

    /// Builds programs from `sources` unless they match the last attempt.
    ///
    /// A failed build leaves no programs active; the same error is returned
    /// until the sources change.
    pub fn reload_from<B>(
        &mut self,
        backend: &mut B,
        sources: ShaderSources,
    ) -> Result<ProgramSet, ReloadError>
    where
        B: GraphicsBackend + ?Sized,
    {
        if self.attempted.as_ref() == Some(&sources) {
            if let Some(programs) = self.programs {
                return Ok(programs);
            }
            if let Some(err) = &self.last_error {
                return Err(err.clone().into());
            }
        }

        self.free(backend);
        let result = build(backend, &sources);
        self.attempted = Some(sources);

        match result {
            Ok(programs) => {
                log::info!("Built shader programs from {:?}", self.dir);
                self.programs = Some(programs);
                Ok(programs)
            }
            Err(err) => {
                self.last_error = Some(err.clone());
                Err(err.into())
            }
        }
    }

    /// Destroys the active programs, if any.
    pub fn free<B>(&mut self, backend: &mut B)
    where
        B: GraphicsBackend + ?Sized,
    {
        if let Some(programs) = self.programs.take() {
            for id in programs.ids() {
                backend.destroy_program(id);
            }
        }
        self.last_error = None;
    }
}

impl<B: GraphicsBackend + ?Sized> ProgramSource<B> for ProgramLoader {
    fn reload(&mut self, backend: &mut B) -> Result<ProgramSet, ReloadError> {
        let sources = self.read_sources()?;
        self.reload_from(backend, sources)
    }
}

fn build<B>(backend: &mut B, sources: &ShaderSources) -> Result<ProgramSet, ProgramError>
where
    B: GraphicsBackend + ?Sized,
{
    let mut built = Vec::with_capacity(ProgramKind::ALL.len());
    for kind in ProgramKind::ALL {
        match backend.create_program(kind, sources.get(kind)) {
            Ok(id) => built.push(id),
            Err(err) => {
                for id in built {
                    backend.destroy_program(id);
                }
                return Err(err);
            }
        }
    }
    Ok(ProgramSet {
        lit: built[0],
        depth: built[1],
        quad: built[2],
    })
}
