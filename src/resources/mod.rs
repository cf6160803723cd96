pub mod backend;
pub mod completion;
pub mod loader_thread;
pub mod pool;
pub mod queue;
pub mod request;

pub use backend::{CreateResult, ResourceBackend};
pub use loader_thread::{LoaderThreadState, RequestHandler, ResourceLoaderThread};
pub use pool::ResourcePool;
pub use queue::RequestQueue;
pub use request::{ResourceHandle, ResourceKind, ResourceRequest, ResourceSlot, SlotState};
