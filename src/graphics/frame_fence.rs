use super::command_queue::CommandQueue;
use crate::{config::MAX_BUFFERED_FRAMES, error::RenderResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameWait {
    /// The gpu had already released the slot.
    Immediate,
    /// The cpu blocked until the gpu caught up.
    Waited,
}

/// Fence values per buffered frame slot.
///
/// Slot `i` may only be recorded into again once the gpu has reached
/// `values[i]`, the value signaled when that slot was last submitted.
#[derive(Debug)]
pub struct FrameFence {
    values: [u64; MAX_BUFFERED_FRAMES],
    count: usize,
    cur: usize,
    cpu_waits: u64,
}

impl FrameFence {
    pub fn new(count: usize) -> Self {
        let count = count.clamp(1, MAX_BUFFERED_FRAMES);

        let mut values = [0; MAX_BUFFERED_FRAMES];
        values[0] = 1;

        Self {
            values,
            count,
            cur: 0,
            cpu_waits: 0,
        }
    }

    pub fn buffer_count(&self) -> usize {
        self.count
    }

    pub fn current_index(&self) -> usize {
        self.cur
    }

    pub fn value(&self, index: usize) -> u64 {
        self.values[index]
    }

    pub fn current_value(&self) -> u64 {
        self.values[self.cur]
    }

    pub fn cpu_waits(&self) -> u64 {
        self.cpu_waits
    }

    /// Signals the current slot, advances to the next one and blocks only if
    /// the gpu still owns it.
    pub fn move_to_next_frame(&mut self, queue: &CommandQueue) -> RenderResult<FrameWait> {
        let current = self.values[self.cur];
        queue.signal(current)?;

        self.cur = (self.cur + 1) % self.count;

        let wait = if queue.wait_on_cpu(self.values[self.cur])? {
            self.cpu_waits += 1;
            FrameWait::Waited
        } else {
            FrameWait::Immediate
        };

        self.values[self.cur] = current + 1;

        Ok(wait)
    }

    /// Drains the gpu completely. Meant for shutdown and resize.
    pub fn wait_for_gpu(&mut self, queue: &CommandQueue) -> RenderResult<()> {
        let value = self.values[self.cur];
        queue.signal(value)?;
        queue.wait_on_cpu(value)?;

        self.values[self.cur] += 1;

        Ok(())
    }
}
