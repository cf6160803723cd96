use glam::{Mat4, Vec3};
use render_weave::{
    error::PassError,
    graphics::{
        backend::CommandList,
        headless::{HeadlessDevice, HeadlessDeviceDesc},
    },
    render::{DrawItem, LayerMask, PassHandle, RenderPass},
    resources::ResourceSlot,
    Camera, Renderer, RendererConfig,
};
use tracing_subscriber::EnvFilter;

const FRAMES: u64 = 120;

struct ForwardPass {
    label: &'static str,
    layers: LayerMask,
    view_proj: Mat4,
    draws: Vec<DrawItem>,
}

impl ForwardPass {
    fn new(label: &'static str, layers: LayerMask) -> Self {
        Self {
            label,
            layers,
            view_proj: Mat4::IDENTITY,
            draws: Vec::new(),
        }
    }
}

impl RenderPass for ForwardPass {
    fn layer_flags(&self) -> LayerMask {
        self.layers
    }

    fn set_view(&mut self, view: Mat4) {
        self.view_proj = view;
    }

    fn set_proj(&mut self, proj: Mat4) {
        self.view_proj = proj * self.view_proj;
    }

    fn schedule_render_request(&mut self, draw: DrawItem) {
        self.draws.push(draw);
    }

    fn build_command_list(&mut self, frame_index: usize) -> Result<CommandList, PassError> {
        let transforms: Vec<Mat4> = self
            .draws
            .drain(..)
            .map(|draw| self.view_proj * draw.transform)
            .collect();

        tracing::trace!(pass = self.label, frame_index, draws = transforms.len(), "recorded");

        Ok(CommandList::new(self.label, transforms))
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let headless = HeadlessDevice::new(HeadlessDeviceDesc {
        creation_delay: std::time::Duration::from_millis(2),
        ..Default::default()
    })?;
    let mut renderer = Renderer::initialize(headless.context_desc(), RendererConfig::default())?;

    let pool = renderer.resources();
    let mesh = pool.request_mesh("cube", &ResourceSlot::new())?;
    let material = pool.request_material("brick", &ResourceSlot::new())?;
    pool.request_pipeline("forward", &ResourceSlot::new())?;

    let sky = ResourceSlot::new();
    pool.request_texture_async("sky", &sky)?;

    let scene = PassHandle::new("scene", ForwardPass::new("scene", LayerMask::MAIN));
    let ui = PassHandle::new("ui", ForwardPass::new("ui", LayerMask::OVERLAY));
    renderer.register_pass(&scene);
    renderer.register_pass(&ui);

    let (width, height) = headless.size();
    let aspect = width as f32 / height as f32;

    for frame in 0..FRAMES {
        let angle = frame as f32 * 0.05;
        for i in 0..8 {
            renderer.submit(
                &scene,
                DrawItem {
                    mesh,
                    material,
                    transform: Mat4::from_rotation_y(angle)
                        * Mat4::from_translation(Vec3::X * i as f32),
                },
            );
        }

        let eye = Vec3::new(angle.sin() * 10.0, 2.0, angle.cos() * -10.0);
        renderer.add_camera(Camera::look_to(eye, -eye.normalize(), 1.0, aspect));
        renderer.add_camera(
            Camera::new(Mat4::IDENTITY, 1.0, aspect, 0.1, 1.0).with_layers(LayerMask::OVERLAY),
        );

        let stats = renderer.render()?;
        if frame % 30 == 0 {
            tracing::info!(?stats, sky = ?sky.state(), "frame");
        }

        if frame == FRAMES / 2 {
            renderer.resize(1920, 1080)?;
        }
    }

    tracing::info!(
        frames = renderer.frame_count(),
        presents = headless.presents(),
        resources = headless.created().len(),
        "demo finished"
    );

    renderer.deinitialize();

    Ok(())
}
