use std::{
    ops::Deref,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use parking_lot::Mutex;

use super::{
    backend::{CommandList, GpuQueue},
    device::Device,
};
use crate::error::{DeviceError, RenderError, RenderResult};

#[derive(Clone)]
pub struct CommandQueue(Arc<CommandQueueInner>);

pub struct CommandQueueInner {
    device: Device,
    raw: Arc<dyn GpuQueue>,
    pending_list: Mutex<Vec<CommandList>>,
    last_signaled: AtomicU64,
    wait_timeout: Option<Duration>,
}

impl CommandQueue {
    pub(crate) fn inner_new(
        device: Device,
        raw: Arc<dyn GpuQueue>,
        wait_timeout: Option<Duration>,
    ) -> Self {
        let last_signaled = raw.completed_value();

        Self(Arc::new(CommandQueueInner {
            device,
            raw,
            pending_list: Default::default(),
            last_signaled: AtomicU64::new(last_signaled),
            wait_timeout,
        }))
    }
}

impl CommandQueueInner {
    pub fn push(&self, list: CommandList) {
        self.pending_list.lock().push(list);
    }

    pub fn pending(&self) -> usize {
        self.pending_list.lock().len()
    }

    /// Submits everything pushed since the last call.
    pub fn execute(&self) -> RenderResult<()> {
        let lists = std::mem::take(&mut *self.pending_list.lock());
        if lists.is_empty() {
            return Ok(());
        }

        let result = self.raw.execute(lists);
        self.device_call(result)
    }

    pub fn signal(&self, value: u64) -> RenderResult<()> {
        let previous = self.last_signaled.fetch_max(value, Ordering::AcqRel);
        if value < previous {
            tracing::warn!(value, previous, "fence signaled with a smaller value");
        }

        let result = self.raw.signal(value);
        self.device_call(result)
    }

    pub fn last_signaled(&self) -> u64 {
        self.last_signaled.load(Ordering::Acquire)
    }

    pub fn completed_value(&self) -> u64 {
        self.raw.completed_value()
    }

    pub fn is_fence_complete(&self, value: u64) -> bool {
        self.completed_value() >= value
    }

    /// Parks the cpu until the gpu reached `value`. Returns whether it had to wait.
    pub fn wait_on_cpu(&self, value: u64) -> RenderResult<bool> {
        if self.is_fence_complete(value) {
            return Ok(false);
        }

        tracing::trace!(value, completed = self.completed_value(), "waiting for gpu");

        if !self.raw.wait_for_value(value, self.wait_timeout) {
            self.device.check_removed()?;
            tracing::error!(value, timeout = ?self.wait_timeout, "gpu fence wait timed out");
            return Err(RenderError::GpuTimeout { value });
        }

        Ok(true)
    }

    fn device_call(&self, result: Result<(), DeviceError>) -> RenderResult<()> {
        if let Err(DeviceError::Removed(reason)) = &result {
            self.device.mark_removed(*reason);
        }
        result.map_err(RenderError::from)
    }
}

impl Deref for CommandQueue {
    type Target = CommandQueueInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::headless::{HeadlessDevice, HeadlessDeviceDesc};

    const fn is_send_sync<T: Send + Sync>() {}

    const _: () = is_send_sync::<CommandQueue>();

    fn queue(latency: Duration, timeout: Option<Duration>) -> (HeadlessDevice, CommandQueue) {
        let headless = HeadlessDevice::new(HeadlessDeviceDesc {
            latency,
            ..Default::default()
        })
        .unwrap();
        let device = Device::new(headless.adapter());
        let queue = CommandQueue::inner_new(device, headless.queue(), timeout);
        (headless, queue)
    }

    #[test]
    fn execute_drains_pending_lists() {
        let (headless, queue) = queue(Duration::ZERO, None);
        queue.push(CommandList::empty("a"));
        queue.push(CommandList::empty("b"));
        assert_eq!(queue.pending(), 2);

        queue.execute().unwrap();
        assert_eq!(queue.pending(), 0);
        assert_eq!(headless.executed_labels(), ["a", "b"]);
    }

    #[test]
    fn wait_on_cpu_blocks_until_signal_lands() {
        let (_headless, queue) = queue(Duration::from_millis(20), None);

        queue.signal(1).unwrap();
        assert!(queue.wait_on_cpu(1).unwrap());
        assert!(queue.is_fence_complete(1));
        assert!(!queue.wait_on_cpu(1).unwrap());
    }

    #[test]
    fn wait_on_cpu_times_out() {
        let (_headless, queue) = queue(Duration::from_millis(200), Some(Duration::from_millis(5)));

        queue.signal(1).unwrap();
        assert!(matches!(
            queue.wait_on_cpu(1),
            Err(RenderError::GpuTimeout { value: 1 })
        ));
    }
}
