use std::{ops::Deref, sync::Arc};

use parking_lot::Mutex;

use super::backend::{AdapterId, GpuAdapter, RemovalReason};
use crate::error::{RenderError, RenderResult};

#[derive(Clone)]
pub struct Device(Arc<DeviceInner>);

impl Device {
    pub fn new(adapter: Arc<dyn GpuAdapter>) -> Self {
        let name = adapter.name();
        let adapter_id = adapter.adapter_id();

        tracing::info!(%name, ?adapter_id, "device created");

        Self(Arc::new(DeviceInner {
            name,
            adapter,
            adapter_id,
            removed: Mutex::new(None),
        }))
    }
}

impl Deref for Device {
    type Target = DeviceInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

pub struct DeviceInner {
    name: String,
    adapter: Arc<dyn GpuAdapter>,
    adapter_id: AdapterId,
    removed: Mutex<Option<RemovalReason>>,
}

impl DeviceInner {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn adapter_id(&self) -> AdapterId {
        self.adapter_id
    }

    pub fn removal(&self) -> Option<RemovalReason> {
        *self.removed.lock()
    }

    pub fn is_removed(&self) -> bool {
        self.removal().is_some()
    }

    /// Sticky: once removed, the device never reports healthy again.
    pub fn mark_removed(&self, reason: RemovalReason) {
        let mut removed = self.removed.lock();
        if removed.is_none() {
            tracing::error!(device = %self.name, ?reason, "device removed, gpu state is lost");
            *removed = Some(reason);
        }
    }

    /// Compares the adapter identity and asks for a removal reason.
    pub fn check_removed(&self) -> RenderResult<()> {
        if let Some(reason) = self.removal() {
            return Err(RenderError::DeviceRemoved(reason));
        }

        if self.adapter.adapter_id() != self.adapter_id {
            self.mark_removed(RemovalReason::AdapterChanged);
        } else if let Some(reason) = self.adapter.removed_reason() {
            self.mark_removed(reason);
        }

        match self.removal() {
            Some(reason) => Err(RenderError::DeviceRemoved(reason)),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.name)
            .field("adapter_id", &self.adapter_id)
            .field("removed", &self.removal())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;

    const fn is_send_sync<T: Send + Sync>() {}

    const _: () = is_send_sync::<Device>();

    struct FlakyAdapter {
        id: AtomicU64,
        reason: Mutex<Option<RemovalReason>>,
    }

    impl GpuAdapter for FlakyAdapter {
        fn name(&self) -> String {
            "flaky".into()
        }

        fn adapter_id(&self) -> AdapterId {
            AdapterId(self.id.load(Ordering::SeqCst))
        }

        fn removed_reason(&self) -> Option<RemovalReason> {
            *self.reason.lock()
        }
    }

    fn flaky() -> Arc<FlakyAdapter> {
        Arc::new(FlakyAdapter {
            id: AtomicU64::new(1),
            reason: Mutex::new(None),
        })
    }

    #[test]
    fn removal_reason_is_sticky() {
        let adapter = flaky();
        let device = Device::new(adapter.clone());
        assert!(device.check_removed().is_ok());

        *adapter.reason.lock() = Some(RemovalReason::Hung);
        assert!(matches!(
            device.check_removed(),
            Err(RenderError::DeviceRemoved(RemovalReason::Hung))
        ));

        *adapter.reason.lock() = None;
        assert!(device.is_removed());
        assert!(device.check_removed().is_err());
    }

    #[test]
    fn adapter_change_counts_as_removal() {
        let adapter = flaky();
        let device = Device::new(adapter.clone());

        adapter.id.store(2, Ordering::SeqCst);
        assert_eq!(device.check_removed().ok(), None);
        assert_eq!(device.removal(), Some(RemovalReason::AdapterChanged));
    }
}
