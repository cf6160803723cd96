use super::{ResourceHandle, ResourceKind, ResourcePool};
use crate::error::ResourceError;

pub type CreateResult = Result<ResourceHandle, ResourceError>;

/// Native creation routines, one per [`ResourceKind`].
///
/// Each routine runs on whatever thread the [`ResourcePool`] picked, usually
/// the loader thread. The `pool` argument is the pool that called in, so a
/// routine can request the resources it depends on; such nested calls run
/// inline instead of queueing behind the current request.
pub trait ResourceBackend: Send + Sync {
    fn create_texture(&self, pool: &ResourcePool, source: &str) -> CreateResult {
        unsupported(pool, source, ResourceKind::Texture)
    }

    fn create_material(&self, pool: &ResourcePool, source: &str) -> CreateResult {
        unsupported(pool, source, ResourceKind::Material)
    }

    fn create_root_layout(&self, pool: &ResourcePool, source: &str) -> CreateResult {
        unsupported(pool, source, ResourceKind::RootLayout)
    }

    fn create_pipeline(&self, pool: &ResourcePool, source: &str) -> CreateResult {
        unsupported(pool, source, ResourceKind::Pipeline)
    }

    fn create_shader(&self, pool: &ResourcePool, source: &str) -> CreateResult {
        unsupported(pool, source, ResourceKind::Shader)
    }

    fn create_render_pass(&self, pool: &ResourcePool, source: &str) -> CreateResult {
        unsupported(pool, source, ResourceKind::RenderPass)
    }

    fn create_render_target(&self, pool: &ResourcePool, source: &str) -> CreateResult {
        unsupported(pool, source, ResourceKind::RenderTarget)
    }

    fn create_mesh(&self, pool: &ResourcePool, source: &str) -> CreateResult {
        unsupported(pool, source, ResourceKind::Mesh)
    }
}

fn unsupported(_: &ResourcePool, _: &str, kind: ResourceKind) -> CreateResult {
    Err(ResourceError::Unsupported(kind))
}

type CreateFn = fn(&dyn ResourceBackend, &ResourcePool, &str) -> CreateResult;

impl ResourceKind {
    fn create_fn(self) -> CreateFn {
        match self {
            ResourceKind::Texture => |b, p, s| b.create_texture(p, s),
            ResourceKind::Material => |b, p, s| b.create_material(p, s),
            ResourceKind::RootLayout => |b, p, s| b.create_root_layout(p, s),
            ResourceKind::Pipeline => |b, p, s| b.create_pipeline(p, s),
            ResourceKind::Shader => |b, p, s| b.create_shader(p, s),
            ResourceKind::RenderPass => |b, p, s| b.create_render_pass(p, s),
            ResourceKind::RenderTarget => |b, p, s| b.create_render_target(p, s),
            ResourceKind::Mesh => |b, p, s| b.create_mesh(p, s),
        }
    }

    pub(crate) fn create(
        self,
        backend: &dyn ResourceBackend,
        pool: &ResourcePool,
        source: &str,
    ) -> CreateResult {
        (self.create_fn())(backend, pool, source)
    }
}
