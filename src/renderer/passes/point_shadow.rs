use glam::Mat4;

use super::cube::{
    face_view_projections, CaptureSchedule, CUBE_FACES, CUBE_FAR, CUBE_FRONT_FACE, CUBE_NEAR,
};
use super::geometry::{GeometryProgram, GeometryUniform};
use crate::error::RenderError;
use crate::gpu::GpuContext;
use crate::renderer::pass::pass_state_accessors;
use crate::renderer::resources::{RenderTexture, TextureSlot, DEPTH_FORMAT};
use crate::renderer::{PassState, RenderContext, RenderPass};
use crate::scene::SceneObjects;

struct PointShadowTargets {
    cube: RenderTexture,
    program: GeometryProgram,
}

impl PointShadowTargets {
    fn new(gpu: &GpuContext, pass: &str, size: u32) -> Result<Self, RenderError> {
        let cube = gpu.validated(pass, |device| {
            RenderTexture::depth_cube(device, &format!("{pass}Cube"), size)
        })?;
        let program = GeometryProgram::new(gpu, "PointShadowDistance", |builder| {
            builder
                .with_fragment_entry("fs_distance")
                .with_depth_stencil(DEPTH_FORMAT, true, wgpu::CompareFunction::LessEqual)
                .with_front_face(CUBE_FRONT_FACE)
        })?;
        log::info!("{pass}: allocated 6x{size}x{size} {DEPTH_FORMAT:?} cube");
        Ok(Self { cube, program })
    }
}

/// Omnidirectional shadow cube for one point light.
///
/// Every face stores the distance from the light to the nearest surface,
/// divided by the far plane. The light is looked up by index on each
/// execute, so the pass can be created before the light list is final;
/// executing without the light is a [`RenderError::MissingLight`].
pub struct PointShadowRenderPass {
    state: PassState,
    light_index: usize,
    size: u32,
    schedule: CaptureSchedule,
    targets: Option<PointShadowTargets>,
    output: TextureSlot,
}

impl PointShadowRenderPass {
    pub fn new(light_index: usize, size: u32) -> Self {
        Self {
            state: PassState::new(format!("PointShadowPass{light_index}")),
            light_index,
            size: size.max(1),
            schedule: CaptureSchedule::new(Default::default()),
            targets: None,
            output: TextureSlot::new(),
        }
    }

    pub fn light_index(&self) -> usize {
        self.light_index
    }

    /// Slot the cube view is published to whenever it holds a capture.
    pub fn cube_slot(&self) -> TextureSlot {
        self.output.clone()
    }
}

impl RenderPass for PointShadowRenderPass {
    pass_state_accessors!();

    fn execute(
        &mut self,
        gpu: &GpuContext,
        context: &RenderContext<'_>,
        objects: &mut dyn SceneObjects,
    ) -> Result<Option<Mat4>, RenderError> {
        let light = context
            .lighting
            .point_lights
            .get(self.light_index)
            .ok_or_else(|| RenderError::MissingLight {
                pass: self.state.name().to_owned(),
                index: self.light_index,
            })?;

        self.schedule.set_mode(light.shadow);
        if !self.schedule.should_render() {
            if self.schedule.has_rendered_once() {
                if let Some(targets) = &self.targets {
                    self.output.publish(context.frame_index, targets.cube.view().clone());
                }
            }
            return Ok(None);
        }

        let targets = match &mut self.targets {
            Some(targets) => targets,
            slot => slot.insert(PointShadowTargets::new(gpu, self.state.name(), self.size)?),
        };

        let faces = face_view_projections(light.position, CUBE_NEAR, CUBE_FAR);
        let params = light.position.extend(CUBE_FAR);

        // One submission per face: the uniform written for face N must be
        // on the queue before face N + 1 overwrites it.
        for (face, view_projection) in faces.iter().enumerate() {
            targets
                .program
                .write(&gpu.queue, GeometryUniform::new(*view_projection, params));

            let mut encoder = gpu.create_encoder("PointShadowFaceEncoder");
            {
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("PointShadowFace"),
                    color_attachments: &[],
                    depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                        view: targets.cube.layer_view(face),
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(1.0),
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }),
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
                objects.render_depth(&mut pass, &targets.program.shader());
            }
            gpu.submit(encoder);
        }
        log::trace!("{}: rendered {} faces", self.state.name(), CUBE_FACES.len());

        self.schedule.mark_rendered();
        self.output
            .publish(context.frame_index, targets.cube.view().clone());

        Ok(None)
    }

    fn dispose(&mut self) {
        if let Some(targets) = self.targets.take() {
            targets.cube.release();
        }
        self.schedule.reset();
        self.output.clear();
    }

    fn output(&self) -> Option<wgpu::TextureView> {
        self.targets.as_ref().map(|targets| targets.cube.view().clone())
    }
}
