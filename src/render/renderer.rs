use smallvec::SmallVec;

use super::{
    layer::RenderLayerTable,
    pass::{DrawItem, PassHandle, RenderRequest},
    thread_pool::{JobOutcome, PassJob, RenderThreadPool},
};
use crate::{
    camera::Camera,
    config::RendererConfig,
    error::{PassError, RenderError, RenderResult},
    graphics::{
        context::{RenderContext, RenderContextDesc},
        frame_fence::{FrameFence, FrameWait},
    },
    resources::ResourcePool,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frame: u64,
    /// Buffered frame slot the frame was recorded into.
    pub frame_index: usize,
    pub passes_built: usize,
    pub passes_failed: usize,
    pub layers_submitted: usize,
    /// The cpu blocked on the fence before the next frame could start.
    pub cpu_waited: bool,
}

/// Drives one frame at a time: layer and camera assignment, parallel command
/// recording, submission in layer order, present and fence rotation.
pub struct Renderer {
    ctx: RenderContext,
    pool: RenderThreadPool,
    layers: RenderLayerTable,
    passes: Vec<PassHandle>,
    requests: Vec<RenderRequest>,
    cameras: Vec<Camera>,
    frame_fence: FrameFence,
    frame_count: u64,
}

impl Renderer {
    pub fn initialize(desc: RenderContextDesc, config: RendererConfig) -> RenderResult<Self> {
        let ctx = RenderContext::initialize(desc, config)?;
        let pool = RenderThreadPool::new(
            ctx.config.render_thread_count(),
            &ctx.config.render_thread_prefix,
        )?;
        let frame_fence = FrameFence::new(ctx.config.buffered_frames);

        tracing::info!(
            device = %ctx.device.name(),
            buffered_frames = frame_fence.buffer_count(),
            render_threads = pool.worker_count(),
            "renderer initialized"
        );

        Ok(Self {
            ctx,
            pool,
            layers: RenderLayerTable::new(),
            passes: Vec::new(),
            requests: Vec::new(),
            cameras: Vec::new(),
            frame_fence,
            frame_count: 0,
        })
    }

    pub fn context(&self) -> &RenderContext {
        &self.ctx
    }

    pub fn resources(&self) -> &ResourcePool {
        &self.ctx.resources
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn layers(&self) -> &RenderLayerTable {
        &self.layers
    }

    /// Keeps `pass` in its layers until [`Renderer::unregister_pass`].
    pub fn register_pass(&mut self, pass: &PassHandle) {
        if self.passes.iter().any(|p| p.ptr_eq(pass)) {
            return;
        }

        self.passes.push(pass.clone());
        tracing::debug!(pass = %pass.name(), layers = ?pass.layer_flags(), "pass registered");
    }

    pub fn unregister_pass(&mut self, pass: &PassHandle) {
        self.passes.retain(|p| !p.ptr_eq(pass));
        self.requests.retain(|r| !r.pass.ptr_eq(pass));
        self.layers.remove_pass(pass);
    }

    /// Queues a draw for the next frame. An unregistered pass gets registered.
    pub fn submit(&mut self, pass: &PassHandle, draw: DrawItem) {
        self.register_pass(pass);
        self.requests.push(RenderRequest {
            pass: pass.clone(),
            draw,
        });
    }

    /// Adds a camera for the next frame only.
    pub fn add_camera(&mut self, camera: Camera) {
        self.cameras.push(camera);
    }

    pub fn render(&mut self) -> RenderResult<FrameStats> {
        let span = tracing::info_span!("frame", index = self.frame_count);
        let _guard = span.enter();

        if let Err(err) = self.ctx.device.check_removed() {
            self.reset_frame();
            return Err(err);
        }

        let frame_index = self.frame_fence.current_index();

        self.assign_layers();
        for camera in &self.cameras {
            self.layers.insert_camera(camera);
        }

        let (jobs, unmatched) = self.collect_jobs(frame_index);
        let outcomes = self.pool.dispatch(jobs);
        self.reset_frame();

        if let Some(reason) = outcomes.iter().find_map(|o| match o.result {
            Err(PassError::DeviceLost(reason)) => Some(reason),
            _ => None,
        }) {
            self.ctx.device.mark_removed(reason);
            return Err(RenderError::DeviceRemoved(reason));
        }

        if !unmatched.is_empty() {
            tracing::error!(layers = ?unmatched, "layers have passes but no camera, frame dropped");
            return Err(RenderError::MissingCamera { layers: unmatched });
        }

        let mut stats = self.submit_layers(outcomes)?;

        self.ctx.present()?;
        self.ctx.device.check_removed()?;

        let wait = self.frame_fence.move_to_next_frame(&self.ctx.queue)?;
        stats.cpu_waited = wait == FrameWait::Waited;
        stats.frame = self.frame_count;
        stats.frame_index = frame_index;
        self.frame_count += 1;

        tracing::debug!(?stats, "frame presented");

        Ok(stats)
    }

    /// Drains the gpu, then resizes the present target.
    pub fn resize(&mut self, width: u32, height: u32) -> RenderResult<()> {
        self.wait_for_gpu()?;
        self.ctx.resize(width, height)?;

        tracing::info!(width, height, "present target resized");

        Ok(())
    }

    pub fn wait_for_gpu(&mut self) -> RenderResult<()> {
        self.frame_fence.wait_for_gpu(&self.ctx.queue)
    }

    pub fn deinitialize(mut self) {
        if let Err(err) = self.wait_for_gpu() {
            tracing::warn!(%err, "gpu not drained on shutdown");
        }

        let Self { ctx, pool, .. } = self;
        drop(pool);
        ctx.deinitialize();
    }

    fn assign_layers(&mut self) {
        for request in self.requests.drain(..) {
            request.pass.lock().schedule_render_request(request.draw);
        }

        for pass in &self.passes {
            self.layers.insert_pass(pass);
        }
    }

    fn collect_jobs(&self, frame_index: usize) -> (Vec<PassJob>, SmallVec<[u8; 4]>) {
        let mut jobs = Vec::new();
        let mut unmatched = SmallVec::new();

        for layer in self.layers.occupied_layers() {
            let Some(camera) = self.layers.camera(layer) else {
                unmatched.push(layer);
                continue;
            };

            let view = camera.camera_view();
            jobs.extend(self.layers.passes(layer).iter().map(|pass| PassJob {
                layer,
                pass: pass.clone(),
                view,
                frame_index,
            }));
        }

        (jobs, unmatched)
    }

    /// Executes the built lists one layer at a time, lowest layer first.
    fn submit_layers(&mut self, mut outcomes: Vec<JobOutcome>) -> RenderResult<FrameStats> {
        outcomes.sort_by_key(|o| o.layer);

        let mut stats = FrameStats::default();
        let mut current = None;

        for outcome in outcomes {
            if current.is_some_and(|layer| layer != outcome.layer) {
                self.ctx.queue.execute()?;
                stats.layers_submitted += 1;
            }
            current = Some(outcome.layer);

            match outcome.result {
                Ok(list) => {
                    self.ctx.queue.push(list);
                    stats.passes_built += 1;
                }
                Err(err) => {
                    tracing::warn!(
                        pass = %outcome.pass.name(),
                        layer = outcome.layer,
                        %err,
                        "pass skipped this frame"
                    );
                    stats.passes_failed += 1;
                }
            }
        }

        if current.is_some() {
            self.ctx.queue.execute()?;
            stats.layers_submitted += 1;
        }

        Ok(stats)
    }

    fn reset_frame(&mut self) {
        self.cameras.clear();
        self.layers.clear_cameras();
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("ctx", &self.ctx)
            .field("layers", &self.layers)
            .field("frame_fence", &self.frame_fence)
            .field("frame_count", &self.frame_count)
            .finish_non_exhaustive()
    }
}
