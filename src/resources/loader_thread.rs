use std::{
    panic::{self, AssertUnwindSafe},
    sync::{atomic::Ordering, Arc, OnceLock},
    thread::{self, ThreadId},
    time::Duration,
};

use atomig::{Atom, Atomic};
use parking_lot::Mutex;

use super::{completion::completion, queue::RequestQueue, ResourceHandle, ResourceRequest};
use crate::{
    error::ResourceError,
    worker_thread::{panic_message, WorkerThread},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoaderThreadState {
    NotStarted,
    Running,
    Draining,
    Stopped,
}

impl Atom for LoaderThreadState {
    type Repr = u8;

    fn pack(self) -> Self::Repr {
        self as u8
    }

    fn unpack(src: Self::Repr) -> Self {
        match src {
            0 => LoaderThreadState::NotStarted,
            1 => LoaderThreadState::Running,
            2 => LoaderThreadState::Draining,
            _ => LoaderThreadState::Stopped,
        }
    }
}

/// Turns a dequeued request into a backend object. Runs on the loader thread.
pub trait RequestHandler: Send + Sync + 'static {
    fn handle(&self, request: &ResourceRequest) -> Result<ResourceHandle, ResourceError>;
}

#[derive(Debug)]
pub struct ResourceLoaderThread<H: RequestHandler> {
    shared: Arc<LoaderShared<H>>,
    thread: Mutex<Option<WorkerThread>>,
    name: String,
    load_timeout: Option<Duration>,
}

#[derive(Debug)]
struct LoaderShared<H> {
    handler: H,
    queue: RequestQueue<ResourceRequest>,
    state: Atomic<LoaderThreadState>,
    worker_id: OnceLock<ThreadId>,
}

impl<H: RequestHandler> ResourceLoaderThread<H> {
    pub fn new(handler: H, name: impl Into<String>, load_timeout: Option<Duration>) -> Self {
        Self {
            shared: Arc::new(LoaderShared {
                handler,
                queue: RequestQueue::new(),
                state: Atomic::new(LoaderThreadState::NotStarted),
                worker_id: OnceLock::new(),
            }),
            thread: Mutex::new(None),
            name: name.into(),
            load_timeout,
        }
    }

    pub fn state(&self) -> LoaderThreadState {
        self.shared.state.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.state() == LoaderThreadState::Running
    }

    pub fn queued(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn thread_id(&self) -> Option<ThreadId> {
        self.thread.lock().as_ref().map(WorkerThread::id)
    }

    /// True when called from the loader thread itself.
    pub fn is_loader_thread(&self) -> bool {
        self.shared.worker_id.get() == Some(&thread::current().id())
    }

    /// Spawns the worker unless one is already running.
    pub fn start(&self) -> Result<(), ResourceError> {
        let mut thread = self.thread.lock();

        match self.state() {
            LoaderThreadState::Running => return Ok(()),
            LoaderThreadState::Draining | LoaderThreadState::Stopped => {
                return Err(ResourceError::LoaderStopped)
            }
            LoaderThreadState::NotStarted => {}
        }

        let shared = Arc::clone(&self.shared);
        let worker = WorkerThread::spawn(self.name.clone(), move || shared.run())
            .map_err(ResourceError::ThreadSpawn)?;

        tracing::info!(thread = %self.name, "resource loader started");

        self.shared
            .state
            .store(LoaderThreadState::Running, Ordering::Release);
        *thread = Some(worker);

        Ok(())
    }

    /// Queues `request` and blocks until the worker has processed it.
    pub fn load(&self, request: ResourceRequest) -> Result<ResourceHandle, ResourceError> {
        let kind = request.kind;
        let source_name = request.source.clone();

        let (completer, completion) = completion();
        self.enqueue(request.with_completer(completer))?;

        match self.load_timeout {
            None => completion.wait(),
            Some(timeout) => completion.wait_timeout(timeout).unwrap_or_else(|| {
                tracing::error!(
                    ?kind,
                    source = %source_name,
                    ?timeout,
                    "synchronous load timed out"
                );
                Err(ResourceError::Timeout { kind, source_name })
            }),
        }
    }

    /// Queues `request` and returns at once; the slot is filled later.
    pub fn load_async(&self, request: ResourceRequest) -> Result<(), ResourceError> {
        self.enqueue(request)
    }

    fn enqueue(&self, request: ResourceRequest) -> Result<(), ResourceError> {
        self.start()?;

        // The loader may stop between start and push; the request is handed
        // back and dropping it releases any waiter.
        self.shared
            .queue
            .push(request)
            .map_err(|_| ResourceError::LoaderStopped)
    }

    /// Finishes the queued requests, then stops and joins the worker.
    pub fn kill(&self) {
        let worker = {
            let mut thread = self.thread.lock();

            match self.state() {
                LoaderThreadState::Running => {
                    self.shared
                        .state
                        .store(LoaderThreadState::Draining, Ordering::Release);
                }
                LoaderThreadState::NotStarted => {
                    self.shared
                        .state
                        .store(LoaderThreadState::Stopped, Ordering::Release);
                }
                LoaderThreadState::Draining | LoaderThreadState::Stopped => {}
            }

            self.shared.queue.close();
            thread.take()
        };

        // Whoever took the worker reports Stopped once it has drained.
        if let Some(worker) = worker {
            worker.join();
            self.shared
                .state
                .store(LoaderThreadState::Stopped, Ordering::Release);
            tracing::info!(thread = %self.name, "resource loader stopped");
        }
    }
}

impl<H: RequestHandler> Drop for ResourceLoaderThread<H> {
    fn drop(&mut self) {
        self.kill();
    }
}

impl<H: RequestHandler> LoaderShared<H> {
    fn run(&self) {
        let _ = self.worker_id.set(thread::current().id());

        while let Some(mut request) = self.queue.pop() {
            let span = tracing::debug_span!("load", kind = ?request.kind, source = %request.source);
            let _enter = span.enter();

            let result = panic::catch_unwind(AssertUnwindSafe(|| self.handler.handle(&request)))
                .unwrap_or_else(|payload| {
                    Err(ResourceError::Panicked {
                        kind: request.kind,
                        source_name: request.source.clone(),
                        message: panic_message(payload.as_ref()),
                    })
                });

            match &result {
                Ok(handle) => {
                    tracing::debug!(handle = handle.raw(), "resource created");
                }
                Err(err) => {
                    tracing::warn!(%err, "resource creation failed");
                }
            }

            request.slot.fill(result.as_ref().ok().copied());

            if let Some(completer) = request.completer.take() {
                completer.complete(result);
            }
        }
    }
}
