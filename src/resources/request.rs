use std::{
    fmt,
    num::NonZeroU64,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use super::completion::Completer;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Texture,
    Material,
    RootLayout,
    Pipeline,
    Shader,
    RenderPass,
    RenderTarget,
    Mesh,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 8] = [
        ResourceKind::Texture,
        ResourceKind::Material,
        ResourceKind::RootLayout,
        ResourceKind::Pipeline,
        ResourceKind::Shader,
        ResourceKind::RenderPass,
        ResourceKind::RenderTarget,
        ResourceKind::Mesh,
    ];
}

/// Opaque backend object id. `0` and `u64::MAX` are reserved by [`ResourceSlot`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResourceHandle(NonZeroU64);

impl ResourceHandle {
    pub fn new(raw: u64) -> Option<Self> {
        if raw == SLOT_INVALID {
            return None;
        }

        NonZeroU64::new(raw).map(Self)
    }

    pub fn raw(&self) -> u64 {
        self.0.get()
    }
}

const SLOT_PENDING: u64 = 0;
const SLOT_INVALID: u64 = u64::MAX;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    Pending,
    Ready(ResourceHandle),
    Invalid,
}

/// Write-once destination for a created resource.
///
/// Cloning shares the slot. The loader fills it exactly once, either with a
/// handle or with the invalid marker when creation failed.
#[derive(Clone, Default)]
pub struct ResourceSlot(Arc<AtomicU64>);

impl ResourceSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SlotState {
        match self.0.load(Ordering::Acquire) {
            SLOT_PENDING => SlotState::Pending,
            SLOT_INVALID => SlotState::Invalid,
            raw => ResourceHandle::new(raw).map_or(SlotState::Invalid, SlotState::Ready),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state(), SlotState::Ready(_))
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self.state(), SlotState::Invalid)
    }

    pub fn handle(&self) -> Option<ResourceHandle> {
        match self.state() {
            SlotState::Ready(handle) => Some(handle),
            _ => None,
        }
    }

    pub(crate) fn fill(&self, handle: Option<ResourceHandle>) -> bool {
        let raw = handle.map_or(SLOT_INVALID, |h| h.raw());

        let written = self
            .0
            .compare_exchange(SLOT_PENDING, raw, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();

        if !written {
            tracing::warn!(slot = ?self, "resource slot already written, ignoring");
        }

        written
    }

    pub fn ptr_eq(&self, other: &ResourceSlot) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ResourceSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ResourceSlot").field(&self.state()).finish()
    }
}

pub struct ResourceRequest {
    pub kind: ResourceKind,
    pub source: String,
    pub slot: ResourceSlot,
    pub(crate) completer: Option<Completer>,
}

impl ResourceRequest {
    pub fn new(kind: ResourceKind, source: impl Into<String>, slot: ResourceSlot) -> Self {
        Self {
            kind,
            source: source.into(),
            slot,
            completer: None,
        }
    }

    pub(crate) fn with_completer(mut self, completer: Completer) -> Self {
        self.completer = Some(completer);
        self
    }
}

impl fmt::Debug for ResourceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceRequest")
            .field("kind", &self.kind)
            .field("source", &self.source)
            .field("slot", &self.slot)
            .field("sync", &self.completer.is_some())
            .finish()
    }
}
