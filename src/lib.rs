pub mod app;
pub mod backend;
pub mod camera;
pub mod renderer;
pub mod scene;
pub mod settings;
pub mod shaders;
pub mod time;

use std::path::{Path, PathBuf};

use app::App;
use backend::BackendError;
use renderer::{FrameError, InitError};
use scene::SceneError;
use settings::RenderSettings;
use winit::event_loop::EventLoop;

/// Scene file, relative to the base path.
pub const SCENE_PATH: &str = "data/sponza_low/sponza_norm.obj";
/// Optional settings file, relative to the base path.
pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("failed to load scene: {0}")]
    Scene(#[from] SceneError),
    #[error("failed to set up rendering: {0}")]
    Init(#[from] InitError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("frame failed: {0}")]
    Frame(#[from] FrameError),
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    #[error(transparent)]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("window resumed after the scene was handed to the renderer")]
    SceneConsumed,
}

fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}

/// Picks the base path from the command line arguments, program name
/// excluded. `None` means the arguments are invalid.
pub fn base_path_from_args<I, S>(args: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = S>,
    S: Into<PathBuf>,
{
    let mut args = args.into_iter();
    match (args.next(), args.next()) {
        (None, _) => Some(PathBuf::from("./")),
        (Some(base), None) => Some(base.into()),
        (Some(_), Some(_)) => None,
    }
}

/// Loads the scene under `base`, opens the window and runs until it closes.
pub fn run(base: &Path) -> Result<(), AppError> {
    init_logging();
    log::info!("Loading scene and shaders relative to path {:?}", base);

    let settings = RenderSettings::load_from_path(base.join(SETTINGS_FILE));
    let scene = scene::load_obj(base.join(SCENE_PATH))?;

    let event_loop = EventLoop::new()?;
    let mut app = App::new(base, settings, scene);
    let result = event_loop.run_app(&mut app);

    if let Some(err) = app.take_fatal() {
        return Err(err);
    }
    result?;

    log::info!("Application shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_argument_defaults_to_current_directory() {
        assert_eq!(
            base_path_from_args(Vec::<String>::new()),
            Some(PathBuf::from("./"))
        );
    }

    #[test]
    fn single_argument_is_the_base_path() {
        assert_eq!(
            base_path_from_args(["assets/"]),
            Some(PathBuf::from("assets/"))
        );
    }

    #[test]
    fn extra_arguments_are_rejected() {
        assert_eq!(base_path_from_args(["a", "b"]), None);
    }
}
