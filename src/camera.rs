use glam::{Mat4, Vec3};

use crate::render::layer::LayerMask;

#[derive(Clone, Debug)]
pub struct Camera {
    pub view: Mat4,
    pub far: f32,
    pub near: f32,
    pub fov: f32,
    pub aspect_ratio: f32,
    pub layers: LayerMask,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraView {
    pub view: Mat4,
    pub proj: Mat4,
}

impl Camera {
    pub fn new(view: Mat4, fov: f32, aspect_ratio: f32, near: f32, far: f32) -> Self {
        Self {
            view,
            far,
            near,
            fov,
            aspect_ratio,
            layers: LayerMask::MAIN,
        }
    }

    pub fn look_to(eye: Vec3, dir: Vec3, fov: f32, aspect_ratio: f32) -> Self {
        Self::new(Mat4::look_to_lh(eye, dir, Vec3::Y), fov, aspect_ratio, 0.1, 1000.0)
    }

    pub fn with_layers(mut self, layers: LayerMask) -> Self {
        self.layers = layers;
        self
    }

    pub fn layer_flags(&self) -> LayerMask {
        self.layers
    }

    pub fn proj(&self) -> Mat4 {
        Mat4::perspective_lh(self.fov, self.aspect_ratio, self.near, self.far)
    }

    pub fn camera_view(&self) -> CameraView {
        CameraView {
            view: self.view,
            proj: self.proj(),
        }
    }
}
