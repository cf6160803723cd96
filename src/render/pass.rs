use std::{fmt, sync::Arc};

use glam::Mat4;
use parking_lot::{Mutex, MutexGuard};

use super::layer::LayerMask;
use crate::{error::PassError, graphics::backend::CommandList, resources::ResourceHandle};

#[derive(Clone, Debug, PartialEq)]
pub struct DrawItem {
    pub mesh: ResourceHandle,
    pub material: ResourceHandle,
    pub transform: Mat4,
}

/// A unit of gpu work that records one command list per frame.
pub trait RenderPass: Send + 'static {
    fn layer_flags(&self) -> LayerMask;

    fn set_view(&mut self, view: Mat4);

    fn set_proj(&mut self, proj: Mat4);

    fn schedule_render_request(&mut self, draw: DrawItem);

    /// `frame_index` selects the buffered frame slot the recording belongs to.
    fn build_command_list(&mut self, frame_index: usize) -> Result<CommandList, PassError>;
}

/// Shared, lockable handle to a registered pass.
///
/// The layer mask is read once at construction; layer tables bucket the pass
/// by that value.
#[derive(Clone)]
pub struct PassHandle(Arc<PassSlot>);

struct PassSlot {
    name: String,
    layers: LayerMask,
    pass: Mutex<Box<dyn RenderPass>>,
}

impl PassHandle {
    pub fn new(name: impl Into<String>, pass: impl RenderPass) -> Self {
        Self(Arc::new(PassSlot {
            name: name.into(),
            layers: pass.layer_flags(),
            pass: Mutex::new(Box::new(pass)),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn layer_flags(&self) -> LayerMask {
        self.0.layers
    }

    pub fn lock(&self) -> MutexGuard<'_, Box<dyn RenderPass>> {
        self.0.pass.lock()
    }

    pub fn ptr_eq(&self, other: &PassHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for PassHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassHandle")
            .field("name", &self.0.name)
            .field("layers", &self.0.layers)
            .finish()
    }
}

/// A draw routed to a pass for the next frame.
#[derive(Clone, Debug)]
pub struct RenderRequest {
    pub pass: PassHandle,
    pub draw: DrawItem,
}

#[cfg(test)]
mod tests {
    use super::*;

    const fn is_send_sync<T: Send + Sync>() {}

    const _: () = is_send_sync::<PassHandle>();
}
