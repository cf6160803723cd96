use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use parking_lot::{Condvar, Mutex, MutexGuard};

use super::pass::PassHandle;
use crate::{
    camera::CameraView,
    error::{PassError, RenderError, RenderResult},
    graphics::backend::CommandList,
    worker_thread::{panic_message, WorkerThread},
};

/// One pass to record for one layer.
#[derive(Clone, Debug)]
pub struct PassJob {
    pub layer: u8,
    pub pass: PassHandle,
    pub view: CameraView,
    pub frame_index: usize,
}

#[derive(Debug)]
pub struct JobOutcome {
    pub layer: u8,
    pub pass: PassHandle,
    pub result: Result<CommandList, PassError>,
}

/// Fixed set of render workers fed one batch of jobs per frame.
///
/// [`RenderThreadPool::dispatch`] is the frame barrier: it returns once every
/// worker has drained the batch and reported back.
pub struct RenderThreadPool {
    shared: Arc<PoolShared>,
    workers: Vec<WorkerThread>,
}

struct PoolShared {
    state: Mutex<FrameState>,
    start: Condvar,
    done: Condvar,
}

#[derive(Default)]
struct FrameState {
    jobs: Vec<PassJob>,
    outcomes: Vec<JobOutcome>,
    generation: u64,
    processed: usize,
    shutdown: bool,
}

impl RenderThreadPool {
    pub fn new(count: usize, prefix: &str) -> RenderResult<Self> {
        let count = count.max(1);

        let mut pool = Self {
            shared: Arc::new(PoolShared {
                state: Mutex::new(FrameState::default()),
                start: Condvar::new(),
                done: Condvar::new(),
            }),
            workers: Vec::with_capacity(count),
        };

        // On failure `pool` drops here and shuts down the workers spawned so far.
        for i in 0..count {
            let shared = Arc::clone(&pool.shared);
            let worker = WorkerThread::spawn(format!("{prefix}-{i}"), move || shared.run())
                .map_err(RenderError::ThreadSpawn)?;
            pool.workers.push(worker);
        }

        tracing::info!(workers = count, "render thread pool started");

        Ok(pool)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Hands `jobs` to the workers and blocks until all of them are built.
    ///
    /// Every job is built exactly once; outcomes come back in no particular order.
    pub fn dispatch(&mut self, jobs: Vec<PassJob>) -> Vec<JobOutcome> {
        if jobs.is_empty() {
            return Vec::new();
        }

        let job_count = jobs.len();
        let mut state = self.shared.state.lock();
        state.jobs = jobs;
        state.outcomes = Vec::with_capacity(job_count);
        state.processed = 0;
        state.generation += 1;
        self.shared.start.notify_all();

        let workers = self.workers.len();
        self.shared
            .done
            .wait_while(&mut state, |state| state.processed < workers);

        tracing::debug!(jobs = job_count, workers, "frame barrier passed");

        debug_assert!(state.jobs.is_empty());
        std::mem::take(&mut state.outcomes)
    }
}

impl Drop for RenderThreadPool {
    fn drop(&mut self) {
        self.shared.state.lock().shutdown = true;
        self.shared.start.notify_all();

        for worker in self.workers.drain(..) {
            worker.join();
        }

        tracing::info!("render thread pool shut down");
    }
}

impl PoolShared {
    fn run(&self) {
        let mut seen = 0;
        let mut state = self.state.lock();

        loop {
            self.start
                .wait_while(&mut state, |state| state.generation == seen && !state.shutdown);

            if state.shutdown {
                return;
            }
            seen = state.generation;

            while let Some(job) = state.jobs.pop() {
                let outcome = MutexGuard::unlocked(&mut state, || build(job));
                state.outcomes.push(outcome);
            }

            state.processed += 1;
            self.done.notify_one();
        }
    }
}

fn build(job: PassJob) -> JobOutcome {
    let span = tracing::trace_span!("build_pass", pass = %job.pass.name(), layer = job.layer);
    let _guard = span.enter();

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut pass = job.pass.lock();
        pass.set_view(job.view.view);
        pass.set_proj(job.view.proj);
        pass.build_command_list(job.frame_index)
    }))
    .unwrap_or_else(|payload| {
        let message = panic_message(payload.as_ref());
        tracing::error!(pass = %job.pass.name(), %message, "render pass panicked");
        Err(PassError::Panicked(message))
    });

    JobOutcome {
        layer: job.layer,
        pass: job.pass,
        result,
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        thread,
        time::Duration,
    };

    use glam::Mat4;
    use rand::Rng;

    use super::*;
    use crate::render::{
        layer::LayerMask,
        pass::{DrawItem, RenderPass},
    };

    const fn is_send_sync<T: Send + Sync>() {}

    const _: () = is_send_sync::<RenderThreadPool>();

    struct Counting {
        builds: Arc<AtomicUsize>,
        view: Mat4,
        jitter_us: u64,
    }

    impl RenderPass for Counting {
        fn layer_flags(&self) -> LayerMask {
            LayerMask::MAIN
        }

        fn set_view(&mut self, view: Mat4) {
            self.view = view;
        }

        fn set_proj(&mut self, _: Mat4) {}

        fn schedule_render_request(&mut self, _: DrawItem) {}

        fn build_command_list(&mut self, frame_index: usize) -> Result<CommandList, PassError> {
            if self.jitter_us > 0 {
                thread::sleep(Duration::from_micros(self.jitter_us));
            }
            self.builds.fetch_add(1, Ordering::SeqCst);
            Ok(CommandList::new("counting", (frame_index, self.view)))
        }
    }

    struct Exploding;

    impl RenderPass for Exploding {
        fn layer_flags(&self) -> LayerMask {
            LayerMask::MAIN
        }

        fn set_view(&mut self, _: Mat4) {}

        fn set_proj(&mut self, _: Mat4) {}

        fn schedule_render_request(&mut self, _: DrawItem) {}

        fn build_command_list(&mut self, _: usize) -> Result<CommandList, PassError> {
            panic!("boom");
        }
    }

    fn job(pass: &PassHandle, layer: u8) -> PassJob {
        PassJob {
            layer,
            pass: pass.clone(),
            view: CameraView {
                view: Mat4::from_scale(glam::Vec3::splat(layer as f32 + 1.0)),
                proj: Mat4::IDENTITY,
            },
            frame_index: 1,
        }
    }

    #[test]
    fn every_job_is_built_exactly_once() {
        let mut rng = rand::thread_rng();
        let mut pool = RenderThreadPool::new(4, "test-render").unwrap();
        assert_eq!(pool.worker_count(), 4);

        let counters: Vec<_> = (0..64).map(|_| Arc::new(AtomicUsize::new(0))).collect();
        let passes: Vec<_> = counters
            .iter()
            .map(|builds| {
                PassHandle::new(
                    "counting",
                    Counting {
                        builds: Arc::clone(builds),
                        view: Mat4::ZERO,
                        jitter_us: rng.gen_range(0..200),
                    },
                )
            })
            .collect();

        for frame in 1..=5 {
            let jobs = passes.iter().map(|p| job(p, 0)).collect();
            let outcomes = pool.dispatch(jobs);

            assert_eq!(outcomes.len(), passes.len());
            for builds in &counters {
                assert_eq!(builds.load(Ordering::SeqCst), frame);
            }
        }
    }

    #[test]
    fn job_view_reaches_the_pass() {
        let mut pool = RenderThreadPool::new(2, "test-render").unwrap();
        let pass = PassHandle::new(
            "counting",
            Counting {
                builds: Arc::new(AtomicUsize::new(0)),
                view: Mat4::ZERO,
                jitter_us: 0,
            },
        );

        let outcomes = pool.dispatch(vec![job(&pass, 3)]);
        let list = outcomes.into_iter().next().unwrap().result.unwrap();
        let (frame_index, view) = *list.into_payload::<(usize, Mat4)>().unwrap();

        assert_eq!(frame_index, 1);
        assert_eq!(view, Mat4::from_scale(glam::Vec3::splat(4.0)));
    }

    #[test]
    fn panicking_pass_is_reported_and_pool_survives() {
        let mut pool = RenderThreadPool::new(2, "test-render").unwrap();
        let bad = PassHandle::new("exploding", Exploding);
        let builds = Arc::new(AtomicUsize::new(0));
        let good = PassHandle::new(
            "counting",
            Counting {
                builds: Arc::clone(&builds),
                view: Mat4::ZERO,
                jitter_us: 0,
            },
        );

        let outcomes = pool.dispatch(vec![job(&bad, 0), job(&good, 0)]);
        let failed: Vec<_> = outcomes.iter().filter(|o| o.result.is_err()).collect();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].pass.ptr_eq(&bad));
        assert_eq!(failed[0].result.as_ref().unwrap_err(), &PassError::Panicked("boom".into()));

        let outcomes = pool.dispatch(vec![job(&good, 0)]);
        assert!(outcomes[0].result.is_ok());
        assert_eq!(builds.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn empty_dispatch_returns_immediately() {
        let mut pool = RenderThreadPool::new(1, "test-render").unwrap();
        assert!(pool.dispatch(Vec::new()).is_empty());
    }
}
