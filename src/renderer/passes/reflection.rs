use glam::{Mat4, UVec2};

use super::cube::{face_view_projections, CaptureSchedule, CUBE_FAR, CUBE_FRONT_FACE, CUBE_NEAR};
use crate::error::RenderError;
use crate::gpu::GpuContext;
use crate::renderer::pass::pass_state_accessors;
use crate::renderer::resources::{RenderTexture, TextureSlot, DEPTH_FORMAT, HDR_FORMAT};
use crate::renderer::{PassState, RenderContext, RenderPass};
use crate::scene::{DrawTarget, ReflectionProbe, SceneObjects};
use crate::settings::CaptureMode;

const COLOR_FORMATS: [wgpu::TextureFormat; 1] = [HDR_FORMAT];

struct ReflectionTargets {
    cube: RenderTexture,
    /// Face depth buffer, dropped once a static capture is done.
    depth: Option<RenderTexture>,
}

/// Whether the face depth buffer is worth keeping after a capture.
pub fn keeps_face_depth(mode: CaptureMode) -> bool {
    mode == CaptureMode::Dynamic
}

/// Captures the scene around one reflection probe into an HDR cube map.
pub struct CubeReflectionRenderPass {
    state: PassState,
    probe_index: usize,
    face_size: u32,
    schedule: CaptureSchedule,
    targets: Option<ReflectionTargets>,
    output: TextureSlot,
}

impl CubeReflectionRenderPass {
    pub fn new(probe_index: usize, face_size: u32, mode: CaptureMode) -> Self {
        Self {
            state: PassState::new(format!("ReflectionPass{probe_index}")),
            probe_index,
            face_size: face_size.max(1),
            schedule: CaptureSchedule::new(mode),
            targets: None,
            output: TextureSlot::new(),
        }
    }

    pub fn probe_index(&self) -> usize {
        self.probe_index
    }

    pub fn set_mode(&mut self, mode: CaptureMode) {
        self.schedule.set_mode(mode);
    }

    /// Forces the next execute to capture again, even in static mode.
    pub fn invalidate(&mut self) {
        self.schedule.reset();
    }

    pub fn cube_slot(&self) -> TextureSlot {
        self.output.clone()
    }

    /// The probe to capture this frame, or `None` with reflections off.
    ///
    /// A missing probe is only an error while reflections are enabled.
    pub fn probe_to_capture(
        &self,
        context: &RenderContext<'_>,
    ) -> Result<Option<ReflectionProbe>, RenderError> {
        if !context.reflection.enabled {
            return Ok(None);
        }
        context
            .world
            .reflection_probe(self.probe_index)
            .copied()
            .map(Some)
            .ok_or_else(|| RenderError::MissingProbe {
                pass: self.state.name().to_owned(),
                index: self.probe_index,
            })
    }
}

fn face_depth(device: &wgpu::Device, name: &str, size: u32) -> RenderTexture {
    RenderTexture::depth_2d(device, &format!("{name}Depth"), UVec2::splat(size))
}

impl ReflectionTargets {
    fn new(gpu: &GpuContext, name: &str, size: u32) -> Result<Self, RenderError> {
        let targets = gpu.validated(name, |device| ReflectionTargets {
            cube: RenderTexture::color_cube(device, &format!("{name}Cube"), size, HDR_FORMAT),
            depth: Some(face_depth(device, name, size)),
        })?;
        log::info!("{name}: allocated 6x{size}x{size} {HDR_FORMAT:?} cube");
        Ok(targets)
    }
}

impl RenderPass for CubeReflectionRenderPass {
    pass_state_accessors!();

    fn execute(
        &mut self,
        gpu: &GpuContext,
        context: &RenderContext<'_>,
        objects: &mut dyn SceneObjects,
    ) -> Result<Option<Mat4>, RenderError> {
        let Some(probe) = self.probe_to_capture(context)? else {
            return Ok(None);
        };

        if !self.schedule.should_render() {
            if let (true, Some(targets)) = (self.schedule.has_rendered_once(), &self.targets) {
                self.output
                    .publish(context.frame_index, targets.cube.view().clone());
            }
            return Ok(None);
        }

        let targets = match &mut self.targets {
            Some(targets) => targets,
            slot => slot.insert(ReflectionTargets::new(gpu, self.state.name(), self.face_size)?),
        };
        let depth = match &mut targets.depth {
            Some(depth) => depth,
            slot => {
                let name = self.state.name();
                slot.insert(gpu.validated(name, |device| face_depth(device, name, self.face_size))?)
            }
        };

        let target = DrawTarget {
            color_formats: &COLOR_FORMATS,
            depth_format: Some(DEPTH_FORMAT),
            front_face: CUBE_FRONT_FACE,
        };
        let faces = face_view_projections(probe.position, CUBE_NEAR, CUBE_FAR);

        for (face, view_projection) in faces.into_iter().enumerate() {
            let face_context = context.with_view_projection(view_projection);
            let mut encoder = gpu.create_encoder("ReflectionFaceEncoder");
            {
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("ReflectionFace"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: targets.cube.layer_view(face),
                        resolve_target: None,
                        depth_slice: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(context.world.sky_color()),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                        view: depth.view(),
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(1.0),
                            store: wgpu::StoreOp::Discard,
                        }),
                        stencil_ops: None,
                    }),
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
                objects.render_all(&gpu.queue, &mut pass, &target, &face_context);
            }
            gpu.submit(encoder);
        }

        self.schedule.mark_rendered();
        if !keeps_face_depth(self.schedule.mode()) {
            if let Some(depth) = targets.depth.take() {
                log::debug!("{}: static capture done, releasing face depth", self.state.name());
                depth.release();
            }
        }
        self.output
            .publish(context.frame_index, targets.cube.view().clone());

        Ok(None)
    }

    fn dispose(&mut self) {
        if let Some(targets) = self.targets.take() {
            targets.cube.release();
            if let Some(depth) = targets.depth {
                depth.release();
            }
        }
        self.schedule.reset();
        self.output.clear();
    }

    fn output(&self) -> Option<wgpu::TextureView> {
        self.targets.as_ref().map(|targets| targets.cube.view().clone())
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::scene::{Camera, Lighting, World};
    use crate::settings::{BloomSettings, ReflectionSettings};

    #[test]
    fn only_dynamic_probes_keep_their_face_depth() {
        assert!(keeps_face_depth(CaptureMode::Dynamic));
        assert!(!keeps_face_depth(CaptureMode::Static));
    }

    #[test]
    fn disabled_reflections_skip_the_probe_lookup() {
        let camera = Camera::looking_at(Vec3::Z, Vec3::ZERO, 64, 64);
        let lighting = Lighting::default();
        let world = World::default();
        let bloom = BloomSettings::default();
        let reflection = ReflectionSettings {
            enabled: false,
            ..ReflectionSettings::default()
        };
        let pass = CubeReflectionRenderPass::new(3, 64, CaptureMode::Static);

        let context = RenderContext::new(&camera, &lighting, &world, &bloom, &reflection);
        assert!(matches!(pass.probe_to_capture(&context), Ok(None)));

        let reflection = ReflectionSettings::default();
        let context = RenderContext::new(&camera, &lighting, &world, &bloom, &reflection);
        assert!(matches!(
            pass.probe_to_capture(&context),
            Err(RenderError::MissingProbe { index: 3, .. })
        ));
    }

    #[test]
    fn enabled_reflections_find_the_probe() {
        let camera = Camera::looking_at(Vec3::Z, Vec3::ZERO, 64, 64);
        let lighting = Lighting::default();
        let mut world = World::default();
        world.add_reflection_probe(Vec3::new(1.0, 2.0, 3.0));
        let bloom = BloomSettings::default();
        let reflection = ReflectionSettings::default();
        let context = RenderContext::new(&camera, &lighting, &world, &bloom, &reflection);

        let pass = CubeReflectionRenderPass::new(0, 64, CaptureMode::Dynamic);
        let probe = pass.probe_to_capture(&context).ok().flatten();
        assert_eq!(probe.map(|probe| probe.position), Some(Vec3::new(1.0, 2.0, 3.0)));
    }
}
