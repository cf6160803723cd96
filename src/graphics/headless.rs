//! Software stand-in for a gpu. Signals land on a timeline thread after a
//! fixed latency, which is enough to exercise every wait in the renderer.

use std::{
    io,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex};

use super::{
    backend::{AdapterId, CommandList, GpuAdapter, GpuQueue, PresentTarget, RemovalReason},
    context::RenderContextDesc,
};
use crate::{
    error::{DeviceError, ResourceError},
    resources::{
        CreateResult, RequestQueue, ResourceBackend, ResourceHandle, ResourceKind, ResourcePool,
        ResourceSlot,
    },
    worker_thread::WorkerThread,
};

#[derive(Clone, Debug)]
pub struct HeadlessDeviceDesc {
    pub name: String,
    pub adapter_id: u64,
    /// Time between a signal and the fence reporting it complete.
    pub latency: Duration,
    pub creation_delay: Duration,
    /// Sources whose creation fails.
    pub failing_sources: Vec<String>,
    pub size: (u32, u32),
}

impl Default for HeadlessDeviceDesc {
    fn default() -> Self {
        Self {
            name: "headless".to_string(),
            adapter_id: 1,
            latency: Duration::from_millis(1),
            creation_delay: Duration::ZERO,
            failing_sources: Vec::new(),
            size: (1280, 720),
        }
    }
}

#[derive(Clone)]
pub struct HeadlessDevice {
    adapter: Arc<HeadlessAdapter>,
    queue: Arc<HeadlessQueue>,
    swapchain: Arc<HeadlessSwapchain>,
    resources: Arc<HeadlessResources>,
}

impl HeadlessDevice {
    pub fn new(desc: HeadlessDeviceDesc) -> io::Result<Self> {
        let adapter = Arc::new(HeadlessAdapter {
            name: desc.name,
            id: AtomicU64::new(desc.adapter_id),
            removed: Mutex::new(None),
        });

        let timeline = Arc::new(Timeline {
            submitted: RequestQueue::new(),
            completed: Mutex::new(0),
            cvar: Condvar::new(),
        });

        let gpu = {
            let timeline = Arc::clone(&timeline);
            let latency = desc.latency;
            WorkerThread::spawn("headless-gpu", move || timeline.run(latency))?
        };

        let queue = Arc::new(HeadlessQueue {
            adapter: Arc::clone(&adapter),
            timeline,
            executed: Mutex::new(Vec::new()),
            _gpu: gpu,
        });

        let swapchain = Arc::new(HeadlessSwapchain {
            adapter: Arc::clone(&adapter),
            presents: AtomicU64::new(0),
            size: Mutex::new(desc.size),
        });

        let resources = Arc::new(HeadlessResources {
            next: AtomicU64::new(0),
            delay: desc.creation_delay,
            failing: desc.failing_sources,
            created: Mutex::new(Vec::new()),
        });

        Ok(Self {
            adapter,
            queue,
            swapchain,
            resources,
        })
    }

    pub fn adapter(&self) -> Arc<dyn GpuAdapter> {
        self.adapter.clone()
    }

    pub fn queue(&self) -> Arc<dyn GpuQueue> {
        self.queue.clone()
    }

    pub fn present_target(&self) -> Arc<dyn PresentTarget> {
        self.swapchain.clone()
    }

    pub fn resources(&self) -> Arc<dyn ResourceBackend> {
        self.resources.clone()
    }

    pub fn context_desc(&self) -> RenderContextDesc {
        RenderContextDesc {
            adapter: self.adapter(),
            queue: self.queue(),
            present: self.present_target(),
            resources: self.resources(),
        }
    }

    pub fn remove(&self, reason: RemovalReason) {
        *self.adapter.removed.lock() = Some(reason);
    }

    pub fn swap_adapter(&self, id: u64) {
        self.adapter.id.store(id, Ordering::SeqCst);
    }

    pub fn executed_labels(&self) -> Vec<String> {
        self.queue.executed.lock().clone()
    }

    pub fn presents(&self) -> u64 {
        self.swapchain.presents.load(Ordering::SeqCst)
    }

    pub fn size(&self) -> (u32, u32) {
        *self.swapchain.size.lock()
    }

    pub fn created(&self) -> Vec<(ResourceKind, String)> {
        self.resources.created.lock().clone()
    }
}

struct HeadlessAdapter {
    name: String,
    id: AtomicU64,
    removed: Mutex<Option<RemovalReason>>,
}

impl HeadlessAdapter {
    fn ensure_alive(&self) -> Result<(), DeviceError> {
        match *self.removed.lock() {
            Some(reason) => Err(DeviceError::Removed(reason)),
            None => Ok(()),
        }
    }
}

impl GpuAdapter for HeadlessAdapter {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn adapter_id(&self) -> AdapterId {
        AdapterId(self.id.load(Ordering::SeqCst))
    }

    fn removed_reason(&self) -> Option<RemovalReason> {
        *self.removed.lock()
    }
}

struct Timeline {
    submitted: RequestQueue<(u64, Instant)>,
    completed: Mutex<u64>,
    cvar: Condvar,
}

impl Timeline {
    fn run(&self, latency: Duration) {
        while let Some((value, submitted_at)) = self.submitted.pop() {
            let due = submitted_at + latency;
            let now = Instant::now();
            if due > now {
                thread::sleep(due - now);
            }

            let mut completed = self.completed.lock();
            *completed = (*completed).max(value);
            self.cvar.notify_all();
        }
    }
}

struct HeadlessQueue {
    adapter: Arc<HeadlessAdapter>,
    timeline: Arc<Timeline>,
    executed: Mutex<Vec<String>>,
    _gpu: WorkerThread,
}

impl GpuQueue for HeadlessQueue {
    fn execute(&self, lists: Vec<CommandList>) -> Result<(), DeviceError> {
        self.adapter.ensure_alive()?;

        self.executed
            .lock()
            .extend(lists.iter().map(|list| list.label().to_owned()));
        Ok(())
    }

    fn signal(&self, value: u64) -> Result<(), DeviceError> {
        self.adapter.ensure_alive()?;

        self.timeline
            .submitted
            .push((value, Instant::now()))
            .map_err(|_| DeviceError::Failed("gpu timeline stopped".into()))
    }

    fn completed_value(&self) -> u64 {
        *self.timeline.completed.lock()
    }

    fn wait_for_value(&self, value: u64, timeout: Option<Duration>) -> bool {
        let mut completed = self.timeline.completed.lock();

        match timeout {
            None => {
                while *completed < value {
                    self.timeline.cvar.wait(&mut completed);
                }
            }
            Some(timeout) => {
                self.timeline
                    .cvar
                    .wait_while_for(&mut completed, |c| *c < value, timeout);
            }
        }

        *completed >= value
    }
}

impl Drop for HeadlessQueue {
    fn drop(&mut self) {
        self.timeline.submitted.close();
    }
}

struct HeadlessSwapchain {
    adapter: Arc<HeadlessAdapter>,
    presents: AtomicU64,
    size: Mutex<(u32, u32)>,
}

impl PresentTarget for HeadlessSwapchain {
    fn present(&self) -> Result<(), DeviceError> {
        self.adapter.ensure_alive()?;
        self.presents.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn resize(&self, width: u32, height: u32) -> Result<(), DeviceError> {
        self.adapter.ensure_alive()?;
        *self.size.lock() = (width, height);
        Ok(())
    }
}

struct HeadlessResources {
    next: AtomicU64,
    delay: Duration,
    failing: Vec<String>,
    created: Mutex<Vec<(ResourceKind, String)>>,
}

impl HeadlessResources {
    fn make(&self, kind: ResourceKind, source: &str) -> CreateResult {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }

        if self.failing.iter().any(|s| s == source) {
            return Err(ResourceError::backend(kind, source, "headless failure"));
        }

        self.created.lock().push((kind, source.to_owned()));

        let raw = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        ResourceHandle::new(raw)
            .ok_or_else(|| ResourceError::backend(kind, source, "handle space exhausted"))
    }
}

impl ResourceBackend for HeadlessResources {
    fn create_texture(&self, _: &ResourcePool, source: &str) -> CreateResult {
        self.make(ResourceKind::Texture, source)
    }

    fn create_material(&self, pool: &ResourcePool, source: &str) -> CreateResult {
        pool.request_texture(&format!("{source}.albedo"), &ResourceSlot::new())?;
        self.make(ResourceKind::Material, source)
    }

    fn create_root_layout(&self, _: &ResourcePool, source: &str) -> CreateResult {
        self.make(ResourceKind::RootLayout, source)
    }

    fn create_pipeline(&self, pool: &ResourcePool, source: &str) -> CreateResult {
        pool.request_root_layout(&format!("{source}.layout"), &ResourceSlot::new())?;
        pool.request_shader(&format!("{source}.vs"), &ResourceSlot::new())?;
        pool.request_shader(&format!("{source}.ps"), &ResourceSlot::new())?;
        self.make(ResourceKind::Pipeline, source)
    }

    fn create_shader(&self, _: &ResourcePool, source: &str) -> CreateResult {
        self.make(ResourceKind::Shader, source)
    }

    fn create_render_pass(&self, _: &ResourcePool, source: &str) -> CreateResult {
        self.make(ResourceKind::RenderPass, source)
    }

    fn create_render_target(&self, _: &ResourcePool, source: &str) -> CreateResult {
        self.make(ResourceKind::RenderTarget, source)
    }

    fn create_mesh(&self, _: &ResourcePool, source: &str) -> CreateResult {
        self.make(ResourceKind::Mesh, source)
    }
}
