use std::{
    fmt,
    sync::{Arc, Weak},
};

use super::{
    backend::ResourceBackend,
    loader_thread::{LoaderThreadState, RequestHandler, ResourceLoaderThread},
    ResourceHandle, ResourceKind, ResourceRequest, ResourceSlot,
};
use crate::{config::RendererConfig, error::ResourceError};

/// Entry point for resource creation.
///
/// Requests made from the loader thread itself (a creation routine asking for
/// a dependency) run inline; everything else goes through the loader queue.
pub struct ResourcePool(Arc<ResourcePoolInner>);

struct ResourcePoolInner {
    backend: Arc<dyn ResourceBackend>,
    loader: ResourceLoaderThread<PoolDispatcher>,
}

struct PoolDispatcher {
    pool: Weak<ResourcePoolInner>,
}

impl RequestHandler for PoolDispatcher {
    fn handle(&self, request: &ResourceRequest) -> Result<ResourceHandle, ResourceError> {
        let inner = self.pool.upgrade().ok_or(ResourceError::LoaderStopped)?;
        ResourcePool(inner).run_routine(request.kind, &request.source)
    }
}

impl ResourcePool {
    pub fn initialize(
        backend: Arc<dyn ResourceBackend>,
        config: &RendererConfig,
    ) -> Result<Self, ResourceError> {
        let inner = Arc::new_cyclic(|pool| ResourcePoolInner {
            backend,
            loader: ResourceLoaderThread::new(
                PoolDispatcher { pool: pool.clone() },
                config.loader_thread_name.clone(),
                config.load_timeout,
            ),
        });

        inner.loader.start()?;

        Ok(Self(inner))
    }

    pub fn deinitialize(self) {
        self.0.loader.kill();
    }

    /// True when the caller is running on the loader thread.
    pub fn is_locked(&self) -> bool {
        self.0.loader.is_loader_thread()
    }

    pub fn loader_state(&self) -> LoaderThreadState {
        self.0.loader.state()
    }

    pub fn queued_requests(&self) -> usize {
        self.0.loader.queued()
    }

    /// Blocks until the resource exists (or failed), filling `slot`.
    pub fn request(
        &self,
        kind: ResourceKind,
        name: &str,
        slot: &ResourceSlot,
    ) -> Result<ResourceHandle, ResourceError> {
        if self.is_locked() {
            return self.create(kind, name, slot);
        }

        self.0
            .loader
            .load(ResourceRequest::new(kind, name, slot.clone()))
    }

    /// Queues the request; `slot` becomes ready at some later point.
    pub fn request_async(
        &self,
        kind: ResourceKind,
        name: &str,
        slot: &ResourceSlot,
    ) -> Result<(), ResourceError> {
        self.0
            .loader
            .load_async(ResourceRequest::new(kind, name, slot.clone()))
    }

    /// Runs the creation routine on the calling thread.
    pub fn create(
        &self,
        kind: ResourceKind,
        name: &str,
        slot: &ResourceSlot,
    ) -> Result<ResourceHandle, ResourceError> {
        let result = self.run_routine(kind, name);

        if let Err(err) = &result {
            tracing::warn!(?kind, source = name, %err, "inline resource creation failed");
        }

        slot.fill(result.as_ref().ok().copied());
        result
    }

    fn run_routine(&self, kind: ResourceKind, name: &str) -> Result<ResourceHandle, ResourceError> {
        tracing::trace!(?kind, source = name, inline = self.is_locked(), "creating resource");
        kind.create(self.0.backend.as_ref(), self, name)
    }
}

macro_rules! kind_requests {
    ($($kind:ident => $request:ident, $request_async:ident, $create:ident;)*) => {
        impl ResourcePool {
            $(
                pub fn $request(
                    &self,
                    name: &str,
                    slot: &ResourceSlot,
                ) -> Result<ResourceHandle, ResourceError> {
                    self.request(ResourceKind::$kind, name, slot)
                }

                pub fn $request_async(
                    &self,
                    name: &str,
                    slot: &ResourceSlot,
                ) -> Result<(), ResourceError> {
                    self.request_async(ResourceKind::$kind, name, slot)
                }

                pub fn $create(
                    &self,
                    name: &str,
                    slot: &ResourceSlot,
                ) -> Result<ResourceHandle, ResourceError> {
                    self.create(ResourceKind::$kind, name, slot)
                }
            )*
        }
    };
}

kind_requests! {
    Texture => request_texture, request_texture_async, create_texture;
    Material => request_material, request_material_async, create_material;
    RootLayout => request_root_layout, request_root_layout_async, create_root_layout;
    Pipeline => request_pipeline, request_pipeline_async, create_pipeline;
    Shader => request_shader, request_shader_async, create_shader;
    RenderPass => request_render_pass, request_render_pass_async, create_render_pass;
    RenderTarget => request_render_target, request_render_target_async, create_render_target;
    Mesh => request_mesh, request_mesh_async, create_mesh;
}

impl fmt::Debug for ResourcePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourcePool")
            .field("loader", &self.0.loader.state())
            .field("queued", &self.0.loader.queued())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicU64, Ordering},
        thread::{self, ThreadId},
        time::Duration,
    };

    use parking_lot::Mutex;

    use super::*;
    use crate::resources::backend::CreateResult;

    const fn is_send_sync<T: Send + Sync>() {}

    const _: () = is_send_sync::<ResourcePool>();

    #[derive(Default)]
    struct NestingBackend {
        next: AtomicU64,
        log: Mutex<Vec<(ResourceKind, String, ThreadId)>>,
        queued_during_nested: Mutex<Vec<usize>>,
    }

    impl NestingBackend {
        fn record(&self, kind: ResourceKind, source: &str) -> ResourceHandle {
            self.log
                .lock()
                .push((kind, source.to_owned(), thread::current().id()));
            ResourceHandle::new(self.next.fetch_add(1, Ordering::SeqCst) + 1).unwrap()
        }
    }

    impl ResourceBackend for NestingBackend {
        fn create_texture(&self, _: &ResourcePool, source: &str) -> CreateResult {
            if source == "missing.png" {
                return Err(ResourceError::backend(ResourceKind::Texture, source, "not found"));
            }
            Ok(self.record(ResourceKind::Texture, source))
        }

        fn create_material(&self, pool: &ResourcePool, source: &str) -> CreateResult {
            let before = pool.queued_requests();
            let albedo = ResourceSlot::new();
            pool.request_texture(&format!("{source}/albedo.png"), &albedo)?;
            let after = pool.queued_requests();
            self.queued_during_nested.lock().extend([before, after]);

            assert!(albedo.is_ready());
            Ok(self.record(ResourceKind::Material, source))
        }
    }

    fn pool(backend: &Arc<NestingBackend>) -> ResourcePool {
        let backend: Arc<dyn ResourceBackend> = backend.clone();
        ResourcePool::initialize(backend, &RendererConfig::default()).unwrap()
    }

    #[test]
    fn nested_request_runs_inline_on_loader_thread() {
        let backend = Arc::new(NestingBackend::default());
        let pool = pool(&backend);
        assert!(!pool.is_locked());

        let slot = ResourceSlot::new();
        pool.request_material("bricks", &slot).unwrap();
        assert!(slot.is_ready());

        let log = backend.log.lock();
        assert_eq!(log.len(), 2);
        // The nested texture finished before its material and on the same thread.
        assert_eq!(log[0].0, ResourceKind::Texture);
        assert_eq!(log[0].1, "bricks/albedo.png");
        assert_eq!(log[1].0, ResourceKind::Material);
        assert_eq!(log[0].2, log[1].2);
        assert_ne!(log[0].2, thread::current().id());

        let queued = backend.queued_during_nested.lock();
        assert_eq!(queued[0], queued[1]);
    }

    #[test]
    fn async_requests_fill_slots_eventually() {
        let backend = Arc::new(NestingBackend::default());
        let pool = pool(&backend);

        let slots: Vec<ResourceSlot> = (0..4).map(|_| ResourceSlot::new()).collect();
        for (i, slot) in slots.iter().enumerate() {
            pool.request_texture_async(&format!("tex{i}.png"), slot).unwrap();
        }

        pool.deinitialize();
        assert!(slots.iter().all(ResourceSlot::is_ready));
    }

    #[test]
    fn failed_creation_is_local() {
        let backend = Arc::new(NestingBackend::default());
        let pool = pool(&backend);

        let missing = ResourceSlot::new();
        assert!(pool.request_texture("missing.png", &missing).is_err());
        assert!(missing.is_invalid());

        let ok = ResourceSlot::new();
        pool.request_texture("present.png", &ok).unwrap();
        assert!(ok.is_ready());
        assert_eq!(pool.loader_state(), LoaderThreadState::Running);
    }

    #[test]
    fn unsupported_kind_reports_error() {
        let backend = Arc::new(NestingBackend::default());
        let pool = pool(&backend);

        let slot = ResourceSlot::new();
        let result = pool.request_pipeline("opaque", &slot);
        assert!(matches!(
            result,
            Err(ResourceError::Unsupported(ResourceKind::Pipeline))
        ));
        assert!(slot.is_invalid());
    }

    #[test]
    fn create_runs_on_calling_thread() {
        let backend = Arc::new(NestingBackend::default());
        let pool = pool(&backend);

        let slot = ResourceSlot::new();
        pool.create_texture("inline.png", &slot).unwrap();

        assert_eq!(backend.log.lock()[0].2, thread::current().id());
        assert!(slot.is_ready());
    }

    #[test]
    fn panicking_backend_does_not_stall_later_requests() {
        struct Fragile;
        impl ResourceBackend for Fragile {
            fn create_shader(&self, _: &ResourcePool, source: &str) -> CreateResult {
                if source == "broken.hlsl" {
                    panic!("shader compiler crashed");
                }
                Ok(ResourceHandle::new(9).unwrap())
            }
        }

        let pool = ResourcePool::initialize(Arc::new(Fragile), &RendererConfig::default()).unwrap();

        let broken = ResourceSlot::new();
        let result = pool.request_shader("broken.hlsl", &broken);
        assert!(matches!(result, Err(ResourceError::Panicked { .. })));
        assert!(broken.is_invalid());
        assert_eq!(pool.loader_state(), LoaderThreadState::Running);

        let fine = ResourceSlot::new();
        assert_eq!(pool.request_shader("fine.hlsl", &fine).unwrap().raw(), 9);
        assert!(fine.is_ready());
    }

    #[test]
    fn load_timeout_is_reported() {
        struct Slow;
        impl ResourceBackend for Slow {
            fn create_mesh(&self, _: &ResourcePool, _: &str) -> CreateResult {
                thread::sleep(Duration::from_millis(200));
                Ok(ResourceHandle::new(1).unwrap())
            }
        }

        let config = RendererConfig::default().with_load_timeout(Duration::from_millis(10));
        let pool = ResourcePool::initialize(Arc::new(Slow), &config).unwrap();

        let slot = ResourceSlot::new();
        let result = pool.request_mesh("terrain", &slot);
        assert!(matches!(result, Err(ResourceError::Timeout { .. })));

        pool.deinitialize();
        assert!(slot.is_ready());
    }
}
