//! Seams to the native graphics api. The concurrency core only talks to the
//! gpu through these traits; see [`super::headless`] for a software version.

use std::{any::Any, fmt, time::Duration};

use crate::error::DeviceError;

/// Locally unique adapter identifier, compared before and after present.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AdapterId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RemovalReason {
    Hung,
    Reset,
    DriverInternalError,
    InvalidCall,
    AdapterChanged,
    Unknown,
}

pub trait GpuAdapter: Send + Sync {
    fn name(&self) -> String;

    fn adapter_id(&self) -> AdapterId;

    /// `None` while the device is healthy.
    fn removed_reason(&self) -> Option<RemovalReason>;
}

/// A hardware queue together with the fence it signals.
pub trait GpuQueue: Send + Sync {
    fn execute(&self, lists: Vec<CommandList>) -> Result<(), DeviceError>;

    fn signal(&self, value: u64) -> Result<(), DeviceError>;

    fn completed_value(&self) -> u64;

    /// Blocks until the fence reaches `value`. Returns `false` on timeout.
    fn wait_for_value(&self, value: u64, timeout: Option<Duration>) -> bool;
}

pub trait PresentTarget: Send + Sync {
    fn present(&self) -> Result<(), DeviceError>;

    fn resize(&self, width: u32, height: u32) -> Result<(), DeviceError>;
}

/// Recorded gpu work for one pass. The payload belongs to the backend.
pub struct CommandList {
    label: String,
    payload: Box<dyn Any + Send>,
}

impl CommandList {
    pub fn new(label: impl Into<String>, payload: impl Any + Send) -> Self {
        Self {
            label: label.into(),
            payload: Box::new(payload),
        }
    }

    pub fn empty(label: impl Into<String>) -> Self {
        Self::new(label, ())
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref()
    }

    pub fn into_payload<T: Any>(self) -> Option<Box<T>> {
        self.payload.downcast().ok()
    }
}

impl fmt::Debug for CommandList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandList")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}
