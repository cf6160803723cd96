use std::io;

use smallvec::SmallVec;

use crate::{
    config::MAX_BUFFERED_FRAMES,
    graphics::backend::RemovalReason,
    resources::ResourceKind,
};

#[derive(thiserror::Error, Debug)]
pub enum ResourceError {
    #[error("failed to create {kind:?} `{source_name}`: {reason}")]
    Backend {
        kind: ResourceKind,
        source_name: String,
        reason: String,
    },

    #[error("backend has no creation routine for {0:?}")]
    Unsupported(ResourceKind),

    #[error("resource loader thread has been stopped")]
    LoaderStopped,

    #[error("request was dropped before it was processed")]
    Abandoned,

    #[error("creation routine for {kind:?} `{source_name}` panicked: {message}")]
    Panicked {
        kind: ResourceKind,
        source_name: String,
        message: String,
    },

    #[error("timed out waiting for {kind:?} `{source_name}`")]
    Timeout {
        kind: ResourceKind,
        source_name: String,
    },

    #[error("failed to spawn resource loader thread: {0}")]
    ThreadSpawn(#[source] io::Error),
}

impl ResourceError {
    pub fn backend(kind: ResourceKind, source_name: &str, reason: impl Into<String>) -> Self {
        Self::Backend {
            kind,
            source_name: source_name.to_owned(),
            reason: reason.into(),
        }
    }
}

#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum DeviceError {
    #[error("device removed: {0:?}")]
    Removed(RemovalReason),

    #[error("device call failed: {0}")]
    Failed(String),
}

#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum PassError {
    #[error("command list build failed: {0}")]
    Failed(String),

    #[error("device lost while recording: {0:?}")]
    DeviceLost(RemovalReason),

    #[error("command list build panicked: {0}")]
    Panicked(String),
}

#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("buffered frame count {0} is outside 2..={max}", max = MAX_BUFFERED_FRAMES)]
    BufferedFrames(usize),

    #[error("thread name must not be empty")]
    EmptyThreadName,
}

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("device removed: {0:?}")]
    DeviceRemoved(RemovalReason),

    #[error("layers {layers:?} have passes but no camera")]
    MissingCamera { layers: SmallVec<[u8; 4]> },

    #[error("failed to spawn render thread: {0}")]
    ThreadSpawn(#[source] io::Error),

    #[error("timed out waiting for gpu fence value {value}")]
    GpuTimeout { value: u64 },

    #[error(transparent)]
    Device(DeviceError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<DeviceError> for RenderError {
    fn from(value: DeviceError) -> Self {
        match value {
            DeviceError::Removed(reason) => RenderError::DeviceRemoved(reason),
            other => RenderError::Device(other),
        }
    }
}

pub type RenderResult<T> = Result<T, RenderError>;
