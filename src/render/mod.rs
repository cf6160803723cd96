pub mod layer;
pub mod pass;
pub mod renderer;
pub mod thread_pool;

pub use layer::{LayerMask, RenderLayerTable, LAYER_COUNT};
pub use pass::{DrawItem, PassHandle, RenderPass, RenderRequest};
pub use renderer::{FrameStats, Renderer};
pub use thread_pool::{JobOutcome, PassJob, RenderThreadPool};
