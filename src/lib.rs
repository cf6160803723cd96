pub mod camera;
pub mod config;
pub mod error;
pub mod graphics;
pub mod render;
pub mod resources;
pub mod worker_thread;

pub use camera::{Camera, CameraView};
pub use config::RendererConfig;
pub use error::{RenderError, RenderResult, ResourceError};
pub use graphics::context::{RenderContext, RenderContextDesc};
pub use render::Renderer;
