pub mod backend;
pub mod command_queue;
pub mod context;
pub mod device;
pub mod frame_fence;
pub mod headless;
