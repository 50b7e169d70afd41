// src/renderer/context.rs

use glam::Mat4;

use crate::scene::{Camera, Lighting, World};
use crate::settings::{BloomSettings, ReflectionSettings};

/// Per-frame bundle handed to every pass.
///
/// Passes read it and never mutate the caller's copy. The pipeline writes
/// `light_space_matrix` between passes; cube captures derive a copy with
/// [`RenderContext::with_view_projection`] for each face.
#[derive(Clone)]
pub struct RenderContext<'a> {
    pub camera: &'a Camera,
    pub lighting: &'a Lighting,
    pub world: &'a World,
    pub view_projection: Mat4,
    pub light_space_matrix: Mat4,
    pub debug_mode: u32,
    pub bloom: &'a BloomSettings,
    pub reflection: &'a ReflectionSettings,
    pub frame_index: u64,
    /// Final output view, in the GPU context's surface format.
    pub backbuffer: Option<&'a wgpu::TextureView>,
}

impl<'a> RenderContext<'a> {
    pub fn new(
        camera: &'a Camera,
        lighting: &'a Lighting,
        world: &'a World,
        bloom: &'a BloomSettings,
        reflection: &'a ReflectionSettings,
    ) -> Self {
        Self {
            camera,
            lighting,
            world,
            view_projection: camera.view_projection(),
            light_space_matrix: Mat4::IDENTITY,
            debug_mode: 0,
            bloom,
            reflection,
            frame_index: 0,
            backbuffer: None,
        }
    }

    pub fn with_frame(mut self, frame_index: u64) -> Self {
        self.frame_index = frame_index;
        self
    }

    pub fn with_backbuffer(mut self, backbuffer: &'a wgpu::TextureView) -> Self {
        self.backbuffer = Some(backbuffer);
        self
    }

    pub fn with_debug_mode(mut self, debug_mode: u32) -> Self {
        self.debug_mode = debug_mode;
        self
    }

    /// Copy of this context rendering through `view_projection` instead of
    /// the camera's.
    pub fn with_view_projection(&self, view_projection: Mat4) -> Self {
        Self {
            view_projection,
            ..self.clone()
        }
    }
}
