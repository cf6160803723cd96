use std::{num::NonZeroUsize, time::Duration};

use crate::error::ConfigError;

pub const MAX_BUFFERED_FRAMES: usize = 4;

#[derive(Clone, Debug)]
pub struct RendererConfig {
    pub buffered_frames: usize,
    pub render_threads: Option<NonZeroUsize>,
    /// `None` waits on the gpu forever.
    pub gpu_wait_timeout: Option<Duration>,
    /// `None` blocks synchronous loads until the loader answers.
    pub load_timeout: Option<Duration>,
    pub loader_thread_name: String,
    pub render_thread_prefix: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            buffered_frames: 3,
            render_threads: None,
            gpu_wait_timeout: None,
            load_timeout: None,
            loader_thread_name: "resource-loader".to_string(),
            render_thread_prefix: "render-worker".to_string(),
        }
    }
}

impl RendererConfig {
    pub fn with_buffered_frames(mut self, count: usize) -> Self {
        self.buffered_frames = count;
        self
    }

    pub fn with_render_threads(mut self, count: NonZeroUsize) -> Self {
        self.render_threads = Some(count);
        self
    }

    pub fn with_gpu_wait_timeout(mut self, timeout: Duration) -> Self {
        self.gpu_wait_timeout = Some(timeout);
        self
    }

    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = Some(timeout);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(2..=MAX_BUFFERED_FRAMES).contains(&self.buffered_frames) {
            return Err(ConfigError::BufferedFrames(self.buffered_frames));
        }

        if self.loader_thread_name.is_empty() || self.render_thread_prefix.is_empty() {
            return Err(ConfigError::EmptyThreadName);
        }

        Ok(())
    }

    /// Falls back to the detected hardware concurrency, or one thread when
    /// it can't be queried.
    pub fn render_thread_count(&self) -> usize {
        self.render_threads
            .or_else(|| std::thread::available_parallelism().ok())
            .map_or(1, NonZeroUsize::get)
    }
}
