// app.rs
use std::path::PathBuf;
use std::sync::Arc;

use glam::Vec2;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::*,
    event_loop::ActiveEventLoop,
    keyboard::{Key, NamedKey},
    window::{Window, WindowId},
};

use crate::backend::gpu::WgpuBackend;
use crate::backend::{BackendError, GraphicsBackend};
use crate::camera::OrbitCamera;
use crate::renderer::{FrameError, FrameOrchestrator, RenderContext};
use crate::scene::Scene;
use crate::settings::RenderSettings;
use crate::shaders::ProgramLoader;
use crate::AppError;

/// GPU-side state, alive between `resumed` and shutdown.
struct Running {
    window: Arc<Window>,
    backend: WgpuBackend,
    context: RenderContext,
    loader: ProgramLoader,
}

impl Running {
    fn free(mut self) {
        self.loader.free(&mut self.backend);
        self.context.free(&mut self.backend);
        log::info!(
            "Released GPU resources ({} textures still live)",
            self.backend.live_textures()
        );
    }
}

pub struct App {
    base: PathBuf,
    settings: RenderSettings,
    scene: Option<Scene>,
    running: Option<Running>,
    camera: OrbitCamera,
    orchestrator: FrameOrchestrator,
    fatal: Option<AppError>,
}

impl App {
    pub fn new(base: impl Into<PathBuf>, settings: RenderSettings, scene: Scene) -> Self {
        Self {
            base: base.into(),
            settings,
            scene: Some(scene),
            running: None,
            camera: OrbitCamera::default(),
            orchestrator: FrameOrchestrator::new(),
            fatal: None,
        }
    }

    /// The error that ended the event loop, if any.
    pub fn take_fatal(&mut self) -> Option<AppError> {
        self.fatal.take()
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<Running, AppError> {
        let Some(scene) = self.scene.take() else {
            return Err(AppError::SceneConsumed);
        };

        let size = self.settings.window;
        let window = Arc::new(
            event_loop.create_window(
                Window::default_attributes()
                    .with_title("Shadow Map Demo")
                    .with_inner_size(PhysicalSize::new(size.width, size.height)),
            )?,
        );

        let mut backend = WgpuBackend::new(window.clone(), &self.settings)?;
        let context = RenderContext::new(&mut backend, scene, &self.settings)?;
        let loader = ProgramLoader::new(self.base.join("shaders"));
        log::info!("Watching shaders in {:?}", loader.dir());

        Ok(Running {
            window,
            backend,
            context,
            loader,
        })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: AppError) {
        log::error!("{}", err);
        self.fatal = Some(err);
        self.shutdown(event_loop);
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(running) = self.running.take() {
            running.free();
        }
        event_loop.exit();
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(running) = self.running.as_mut() else {
            return;
        };

        let (width, height) = running.backend.surface_size();
        let camera = self.camera.matrices(width, height);
        let result = self.orchestrator.tick(
            &mut running.backend,
            &mut running.context,
            &mut running.loader,
            camera,
        );

        match result {
            Ok(_) => {}
            Err(FrameError::Backend(BackendError::SurfaceUnavailable(reason))) => {
                log::warn!("Frame dropped: {}", reason);
            }
            Err(err) => {
                self.fail(event_loop, err.into());
                return;
            }
        }
        running.window.request_redraw();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.running.is_some() || self.fatal.is_some() {
            return;
        }
        match self.start(event_loop) {
            Ok(running) => {
                running.window.request_redraw();
                self.running = Some(running);
            }
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        let Some(running) = self.running.as_mut() else {
            return;
        };
        if running.window.id() != id {
            return;
        }

        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                self.shutdown(event_loop);
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: Key::Named(NamedKey::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                self.shutdown(event_loop);
            }
            WindowEvent::Resized(size) => {
                running.backend.resize(size.width, size.height);
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                let size = running.window.inner_size();
                running.backend.resize(size.width, size.height);
            }
            WindowEvent::MouseInput { state, button, .. } => {
                self.camera.mouse_button(button, state);
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.camera
                    .cursor_moved(Vec2::new(position.x as f32, position.y as f32));
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }
}
