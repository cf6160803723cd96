use smallvec::SmallVec;

use super::pass::PassHandle;
use crate::camera::Camera;

pub const LAYER_COUNT: usize = 64;

bitflags::bitflags! {
    /// One bit per layer, layer `i` is bit `i`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct LayerMask: u64 {
        const MAIN = 1;
        const OVERLAY = 1 << 63;

        const _ = !0;
    }
}

impl LayerMask {
    pub fn layer(index: u8) -> Self {
        debug_assert!((index as usize) < LAYER_COUNT, "layer {index} out of range");
        Self::from_bits_retain(1u64.checked_shl(index as u32).unwrap_or(0))
    }

    pub fn from_layers(layers: impl IntoIterator<Item = u8>) -> Self {
        layers
            .into_iter()
            .fold(Self::empty(), |mask, layer| mask | Self::layer(layer))
    }

    /// Set layers in ascending order.
    pub fn layers(self) -> impl Iterator<Item = u8> {
        (0..LAYER_COUNT as u8).filter(move |&i| self.bits() & (1 << i) != 0)
    }
}

/// Passes and cameras bucketed by layer, rebuilt every frame.
///
/// Passes stay until removed; cameras are cleared at the end of each frame.
pub struct RenderLayerTable {
    passes: [SmallVec<[PassHandle; 4]>; LAYER_COUNT],
    cameras: [SmallVec<[Camera; 1]>; LAYER_COUNT],
}

impl Default for RenderLayerTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderLayerTable {
    pub fn new() -> Self {
        Self {
            passes: std::array::from_fn(|_| SmallVec::new()),
            cameras: std::array::from_fn(|_| SmallVec::new()),
        }
    }

    /// Returns how many layers the pass was newly added to.
    pub fn insert_pass(&mut self, pass: &PassHandle) -> usize {
        let mut inserted = 0;

        for layer in pass.layer_flags().layers() {
            let list = &mut self.passes[layer as usize];
            if !list.iter().any(|p| p.ptr_eq(pass)) {
                list.push(pass.clone());
                inserted += 1;
            }
        }

        inserted
    }

    pub fn remove_pass(&mut self, pass: &PassHandle) {
        for list in &mut self.passes {
            list.retain(|p| !p.ptr_eq(pass));
        }
    }

    pub fn insert_camera(&mut self, camera: &Camera) {
        for layer in camera.layer_flags().layers() {
            self.cameras[layer as usize].push(camera.clone());
        }
    }

    pub fn passes(&self, layer: u8) -> &[PassHandle] {
        &self.passes[layer as usize]
    }

    /// The first camera registered for `layer` this frame.
    pub fn camera(&self, layer: u8) -> Option<&Camera> {
        self.cameras[layer as usize].first()
    }

    pub fn cameras(&self, layer: u8) -> &[Camera] {
        &self.cameras[layer as usize]
    }

    /// Layers holding at least one pass, ascending.
    pub fn occupied_layers(&self) -> impl Iterator<Item = u8> + '_ {
        (0..LAYER_COUNT as u8).filter(move |&layer| !self.passes[layer as usize].is_empty())
    }

    pub fn clear_cameras(&mut self) {
        for list in &mut self.cameras {
            list.clear();
        }
    }
}

impl std::fmt::Debug for RenderLayerTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for layer in self.occupied_layers() {
            map.entry(
                &layer,
                &(self.passes(layer).len(), self.cameras(layer).len()),
            );
        }
        map.finish()
    }
}
