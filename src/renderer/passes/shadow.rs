// src/renderer/passes/shadow.rs

use glam::{Mat4, UVec2, Vec3, Vec4};

use super::geometry::{GeometryProgram, GeometryUniform};
use crate::error::RenderError;
use crate::gpu::GpuContext;
use crate::renderer::pass::pass_state_accessors;
use crate::renderer::resources::{RenderTexture, TextureSlot, DEPTH_FORMAT};
use crate::renderer::{PassState, RenderContext, RenderPass};
use crate::scene::{SceneObjects, Sun};

const ORTHO_HALF_EXTENT: f32 = 10.0;
const ORTHO_NEAR: f32 = 0.1;
const ORTHO_FAR: f32 = 50.0;
const DEPTH_BIAS_CONSTANT: i32 = 2;
const DEPTH_BIAS_SLOPE: f32 = 2.0;

/// Orthographic light-space transform of the sun.
///
/// Looks from `sun.position` along `sun.direction`. The up vector is +Y
/// unless the sun points straight up or down, where +Z is used instead.
pub fn light_space_matrix(sun: &Sun) -> Mat4 {
    let direction = sun.direction.try_normalize().unwrap_or(Vec3::NEG_Y);
    let up = if direction.cross(Vec3::Y).length_squared() < 1e-6 {
        Vec3::Z
    } else {
        Vec3::Y
    };
    let view = Mat4::look_at_rh(sun.position, sun.position + direction, up);
    let projection = Mat4::orthographic_rh(
        -ORTHO_HALF_EXTENT,
        ORTHO_HALF_EXTENT,
        -ORTHO_HALF_EXTENT,
        ORTHO_HALF_EXTENT,
        ORTHO_NEAR,
        ORTHO_FAR,
    );
    projection * view
}

struct ShadowTargets {
    depth: RenderTexture,
    program: GeometryProgram,
}

impl ShadowTargets {
    fn new(gpu: &GpuContext, pass: &str, size: u32) -> Result<Self, RenderError> {
        let depth = gpu.validated(pass, |device| {
            RenderTexture::depth_2d(device, "ShadowMap", UVec2::splat(size))
        })?;
        let program = GeometryProgram::new(gpu, "ShadowDepth", |builder| {
            builder.depth_only().with_depth_stencil_biased(
                DEPTH_FORMAT,
                DEPTH_BIAS_CONSTANT,
                DEPTH_BIAS_SLOPE,
            )
        })?;
        log::info!("{pass}: allocated {size}x{size} {DEPTH_FORMAT:?} shadow map");
        Ok(Self { depth, program })
    }
}

/// Renders scene depth from the sun into a square shadow map and hands the
/// light-space matrix to the passes after it.
pub struct ShadowRenderPass {
    state: PassState,
    size: u32,
    targets: Option<ShadowTargets>,
    output: TextureSlot,
}

impl ShadowRenderPass {
    pub fn new(size: u32) -> Self {
        Self {
            state: PassState::new("ShadowPass"),
            size: size.max(1),
            targets: None,
            output: TextureSlot::new(),
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Slot the depth view is published to each frame.
    pub fn depth_slot(&self) -> TextureSlot {
        self.output.clone()
    }
}

impl RenderPass for ShadowRenderPass {
    pass_state_accessors!();

    fn execute(
        &mut self,
        gpu: &GpuContext,
        context: &RenderContext<'_>,
        objects: &mut dyn SceneObjects,
    ) -> Result<Option<Mat4>, RenderError> {
        let light_space = light_space_matrix(&context.lighting.sun);
        let targets = match &mut self.targets {
            Some(targets) => targets,
            slot => slot.insert(ShadowTargets::new(gpu, self.state.name(), self.size)?),
        };

        targets
            .program
            .write(&gpu.queue, GeometryUniform::new(light_space, Vec4::ZERO));

        let mut encoder = gpu.create_encoder("ShadowPassEncoder");
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("ShadowPass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: targets.depth.view(),
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

        self.output
            .publish(context.frame_index, targets.depth.view().clone());

        Ok(Some(light_space))
    }

    fn dispose(&mut self) {
        if let Some(targets) = self.targets.take() {
            targets.depth.release();
        }
        self.output.clear();
    }

    fn output(&self) -> Option<wgpu::TextureView> {
        self.targets.as_ref().map(|targets| targets.depth.view().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(matrix: Mat4, point: Vec3) -> Vec3 {
        matrix.project_point3(point)
    }

    #[test]
    fn sun_position_lands_on_near_plane_centre() {
        let sun = Sun {
            position: Vec3::new(-2.0, 4.0, -1.0),
            direction: Vec3::new(0.2, -1.0, 0.3),
            ..Sun::default()
        };
        let matrix = light_space_matrix(&sun);
        let ahead = sun.position + sun.direction.normalize() * ORTHO_NEAR;
        let ndc = project(matrix, ahead);
        assert!(ndc.x.abs() < 1e-4 && ndc.y.abs() < 1e-4, "{ndc:?}");
        assert!(ndc.z.abs() < 1e-4);
    }

    #[test]
    fn vertical_sun_uses_fallback_up_axis() {
        let sun = Sun {
            position: Vec3::new(0.0, 20.0, 0.0),
            direction: Vec3::NEG_Y,
            ..Sun::default()
        };
        let matrix = light_space_matrix(&sun);
        assert!(matrix.is_finite());

        let ground = project(matrix, Vec3::new(3.0, 0.0, 0.0));
        assert!((ground.x.abs() - 0.3).abs() < 1e-4, "{ground:?}");
        let expected_depth = (20.0 - ORTHO_NEAR) / (ORTHO_FAR - ORTHO_NEAR);
        assert!((ground.z - expected_depth).abs() < 1e-4);
    }

    #[test]
    fn ortho_bounds_cover_ten_units() {
        let sun = Sun {
            position: Vec3::new(0.0, 0.0, 10.0),
            direction: Vec3::NEG_Z,
            ..Sun::default()
        };
        let matrix = light_space_matrix(&sun);
        let corner = project(matrix, Vec3::new(10.0, 10.0, 0.0));
        assert!((corner.x - 1.0).abs() < 1e-4);
        assert!((corner.y - 1.0).abs() < 1e-4);
    }
}
