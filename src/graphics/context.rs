use std::sync::Arc;

use super::{
    backend::{GpuAdapter, GpuQueue, PresentTarget},
    command_queue::CommandQueue,
    device::Device,
};
use crate::{
    config::RendererConfig,
    error::{DeviceError, RenderError, RenderResult},
    resources::{ResourceBackend, ResourcePool},
};

/// Native objects a backend hands over when the renderer starts.
#[derive(Clone)]
pub struct RenderContextDesc {
    pub adapter: Arc<dyn GpuAdapter>,
    pub queue: Arc<dyn GpuQueue>,
    pub present: Arc<dyn PresentTarget>,
    pub resources: Arc<dyn ResourceBackend>,
}

/// Everything that needs the device, passed around explicitly.
///
/// Created by [`RenderContext::initialize`] and torn down by
/// [`RenderContext::deinitialize`]; there is no global instance.
pub struct RenderContext {
    pub device: Device,
    pub queue: CommandQueue,
    pub present: Arc<dyn PresentTarget>,
    pub resources: ResourcePool,
    pub config: RendererConfig,
}

impl RenderContext {
    pub fn initialize(desc: RenderContextDesc, config: RendererConfig) -> RenderResult<Self> {
        config.validate()?;

        let device = Device::new(desc.adapter);
        device.check_removed()?;

        let queue = CommandQueue::inner_new(device.clone(), desc.queue, config.gpu_wait_timeout);
        let resources = ResourcePool::initialize(desc.resources, &config)?;

        Ok(Self {
            device,
            queue,
            present: desc.present,
            resources,
            config,
        })
    }

    pub fn present(&self) -> RenderResult<()> {
        self.device_call(self.present.present())
    }

    pub fn resize(&self, width: u32, height: u32) -> RenderResult<()> {
        self.device_call(self.present.resize(width, height))
    }

    fn device_call(&self, result: Result<(), DeviceError>) -> RenderResult<()> {
        if let Err(DeviceError::Removed(reason)) = &result {
            self.device.mark_removed(*reason);
        }
        result.map_err(RenderError::from)
    }

    pub fn deinitialize(self) {
        self.resources.deinitialize();
        tracing::info!(device = %self.device.name(), "render context released");
    }
}

impl std::fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("device", &self.device)
            .field("resources", &self.resources)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::{ConfigError, RenderError},
        graphics::{
            backend::RemovalReason,
            headless::{HeadlessDevice, HeadlessDeviceDesc},
        },
        resources::{LoaderThreadState, ResourceSlot},
    };

    fn headless() -> HeadlessDevice {
        HeadlessDevice::new(HeadlessDeviceDesc::default()).unwrap()
    }

    #[test]
    fn initialize_starts_the_loader() {
        let headless = headless();
        let config = RendererConfig::default();
        let ctx = RenderContext::initialize(headless.context_desc(), config).unwrap();
        assert_eq!(ctx.resources.loader_state(), LoaderThreadState::Running);

        let slot = ResourceSlot::new();
        ctx.resources.request_material("stone", &slot).unwrap();
        assert!(slot.is_ready());

        ctx.deinitialize();
        assert_eq!(headless.created().len(), 2);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = RendererConfig::default().with_buffered_frames(9);
        let result = RenderContext::initialize(headless().context_desc(), config);
        assert!(matches!(
            result,
            Err(RenderError::Config(ConfigError::BufferedFrames(9)))
        ));
    }

    #[test]
    fn removed_device_fails_initialize() {
        let headless = headless();
        headless.remove(RemovalReason::DriverInternalError);

        let result = RenderContext::initialize(headless.context_desc(), RendererConfig::default());
        assert!(matches!(
            result,
            Err(RenderError::DeviceRemoved(RemovalReason::DriverInternalError))
        ));
    }
}
