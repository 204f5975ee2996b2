pub mod context;
pub mod frame;
pub mod framebuffer;
pub mod light;
pub mod scene_renderer;
pub mod textures;
pub mod vertex;

pub use context::{InitError, RenderContext};
pub use frame::{CameraMatrices, FrameError, FrameOrchestrator, FrameOutcome};
pub use framebuffer::ShadowTarget;
pub use light::{LightModel, LightProjection};
pub use scene_renderer::{draw_scene, DrawStats, RenderError, VertexRecorder};
pub use textures::{TextureError, TextureRegistry};
pub use vertex::Vertex;
