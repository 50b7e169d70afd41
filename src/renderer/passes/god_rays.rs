use std::mem;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, UVec2, Vec2, Vec4};

use super::geometry::{GeometryProgram, GeometryUniform};
use crate::error::RenderError;
use crate::gpu::GpuContext;
use crate::renderer::pass::pass_state_accessors;
use crate::renderer::pipeline_builder::{
    create_shader, create_uniform_buffer, linear_clamp_sampler, sampler_entry, texture_entry,
    uniform_entry,
};
use crate::renderer::resources::{RenderTexture, TextureSlot, HDR_FORMAT};
use crate::renderer::{PassState, PipelineBuilder, RenderContext, RenderPass};
use crate::scene::SceneObjects;
use crate::settings::GodRaySettings;

const GOD_RAY_SHADER: &str = concat!(
    include_str!("../../shader/fullscreen.wgsl"),
    include_str!("../../shader/god_rays.wgsl")
);
const MASK_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Where a world-space point lands on screen, as a texture coordinate with
/// (0, 0) at the top-left. `None` when the point is behind the camera.
pub fn sun_screen_position(view_projection: Mat4, position: glam::Vec3) -> Option<Vec2> {
    let clip = view_projection * position.extend(1.0);
    if clip.w <= 0.0 {
        return None;
    }
    let ndc = Vec2::new(clip.x, clip.y) / clip.w;
    Some(Vec2::new(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5))
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
struct GodRayUniform {
    light: [f32; 4],
    params: [f32; 4],
}

impl GodRayUniform {
    fn new(sun_uv: Vec2, settings: &GodRaySettings) -> Self {
        Self {
            light: [sun_uv.x, sun_uv.y, settings.density, settings.weight],
            params: [settings.decay, settings.exposure, settings.samples as f32, 0.0],
        }
    }
}

struct GodRayTargets {
    mask: RenderTexture,
    rays: RenderTexture,
    mask_program: GeometryProgram,
    blur_pipeline: wgpu::RenderPipeline,
    blur_bind_group: wgpu::BindGroup,
    uniform: wgpu::Buffer,
}

impl GodRayTargets {
    fn new(gpu: &GpuContext, pass: &str, size: UVec2) -> Result<Self, RenderError> {
        let (mask, rays) = gpu.validated(pass, |device| {
            (
                RenderTexture::color_2d(device, "GodRayMask", size, MASK_FORMAT),
                RenderTexture::color_2d(device, "GodRays", size, HDR_FORMAT),
            )
        })?;

        let mask_program = GeometryProgram::new(gpu, "GodRayMask", |builder| {
            builder
                .with_fragment_entry("fs_mask")
                .with_color_target(MASK_FORMAT, None)
        })?;

        let (blur_pipeline, blur_bind_group, uniform) = gpu.compiled("GodRayBlur", |device| {
            let shader = create_shader(device, "GodRayBlur", GOD_RAY_SHADER);
            let uniform_size = mem::size_of::<GodRayUniform>() as u64;
            let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("GodRayBlurLayout"),
                entries: &[
                    texture_entry(0, wgpu::ShaderStages::FRAGMENT),
                    sampler_entry(1, wgpu::ShaderStages::FRAGMENT),
                    uniform_entry(2, wgpu::ShaderStages::FRAGMENT, uniform_size),
                ],
            });
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("GodRayBlurPipelineLayout"),
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            });
            let pipeline = PipelineBuilder::fullscreen(device, &pipeline_layout, &shader)
                .with_label("GodRayBlur")
                .with_fragment_entry("fs_radial_blur")
                .with_color_target(HDR_FORMAT, None)
                .build();

            let uniform = create_uniform_buffer(device, "GodRayUniform", uniform_size);
            let sampler = linear_clamp_sampler(device, "GodRaySampler");
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("GodRayBlurBindGroup"),
                layout: &layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(mask.view()),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: uniform.as_entire_binding(),
                    },
                ],
            });
            (pipeline, bind_group, uniform)
        })?;

        log::info!("{pass}: allocated {}x{} mask and ray targets", size.x, size.y);
        Ok(Self {
            mask,
            rays,
            mask_program,
            blur_pipeline,
            blur_bind_group,
            uniform,
        })
    }

    fn release(self) {
        self.mask.release();
        self.rays.release();
    }
}

/// Light shafts from the sun, rendered at half resolution.
///
/// Geometry is drawn black over a white clear into an occlusion mask, which
/// is then blurred radially towards the sun's screen position. With the sun
/// behind the camera the output is plain black.
pub struct GodRayPass {
    state: PassState,
    settings: GodRaySettings,
    targets: Option<GodRayTargets>,
    output: TextureSlot,
}

impl GodRayPass {
    pub fn new(settings: GodRaySettings) -> Self {
        Self {
            state: PassState::new("GodRayPass"),
            settings,
            targets: None,
            output: TextureSlot::new(),
        }
    }

    pub fn settings_mut(&mut self) -> &mut GodRaySettings {
        &mut self.settings
    }

    pub fn rays_slot(&self) -> TextureSlot {
        self.output.clone()
    }
}

impl RenderPass for GodRayPass {
    pass_state_accessors!();

    fn execute(
        &mut self,
        gpu: &GpuContext,
        context: &RenderContext<'_>,
        objects: &mut dyn SceneObjects,
    ) -> Result<Option<Mat4>, RenderError> {
        let size = (UVec2::new(context.camera.render_width, context.camera.render_height) / 2)
            .max(UVec2::ONE);
        if self.targets.as_ref().is_some_and(|targets| targets.rays.size() != size) {
            if let Some(stale) = self.targets.take() {
                stale.release();
            }
        }
        let targets = match &mut self.targets {
            Some(targets) => targets,
            slot => slot.insert(GodRayTargets::new(gpu, self.state.name(), size)?),
        };

        let mut encoder = gpu.create_encoder("GodRayEncoder");
        match sun_screen_position(context.view_projection, context.lighting.sun.position) {
            Some(sun_uv) => {
                targets.mask_program.write(
                    &gpu.queue,
                    GeometryUniform::new(context.view_projection, Vec4::ZERO),
                );
                gpu.queue.write_buffer(
                    &targets.uniform,
                    0,
                    bytemuck::bytes_of(&GodRayUniform::new(sun_uv, &self.settings)),
                );

                {
                    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                        label: Some("GodRayMask"),
                        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                            view: targets.mask.view(),
                            resolve_target: None,
                            depth_slice: None,
                            ops: wgpu::Operations {
                                load: wgpu::LoadOp::Clear(wgpu::Color::WHITE),
                                store: wgpu::StoreOp::Store,
                            },
                        })],
                        depth_stencil_attachment: None,
                        timestamp_writes: None,
                        occlusion_query_set: None,
                    });
                    objects.render_depth(&mut pass, &targets.mask_program.shader());
                }

                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("GodRayBlur"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: targets.rays.view(),
                        resolve_target: None,
                        depth_slice: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
                pass.set_pipeline(&targets.blur_pipeline);
                pass.set_bind_group(0, &targets.blur_bind_group, &[]);
                pass.draw(0..3, 0..1);
            }
            None => {
                log::trace!("{}: sun behind the camera", self.state.name());
                // Clearing is the whole pass; end it before submitting.
                drop(encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("GodRayClear"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: targets.rays.view(),
                        resolve_target: None,
                        depth_slice: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                }));
            }
        }
        gpu.submit(encoder);

        self.output
            .publish(context.frame_index, targets.rays.view().clone());
        Ok(None)
    }

    fn dispose(&mut self) {
        if let Some(targets) = self.targets.take() {
            targets.release();
        }
        self.output.clear();
    }

    fn output(&self) -> Option<wgpu::TextureView> {
        self.targets.as_ref().map(|targets| targets.rays.view().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Camera;
    use glam::Vec3;

    #[test]
    fn point_ahead_of_camera_maps_to_uv() {
        let camera = Camera::looking_at(Vec3::ZERO, Vec3::NEG_Z, 800, 800);
        let vp = camera.view_projection();

        let centre = sun_screen_position(vp, Vec3::new(0.0, 0.0, -10.0)).unwrap();
        assert!(centre.abs_diff_eq(Vec2::splat(0.5), 1e-5));

        let above = sun_screen_position(vp, Vec3::new(0.0, 3.0, -10.0)).unwrap();
        assert!(above.y < 0.5, "points above the centre have smaller v: {above:?}");
        let right = sun_screen_position(vp, Vec3::new(3.0, 0.0, -10.0)).unwrap();
        assert!(right.x > 0.5);
    }

    #[test]
    fn point_behind_camera_has_no_screen_position() {
        let camera = Camera::looking_at(Vec3::ZERO, Vec3::NEG_Z, 800, 800);
        assert!(sun_screen_position(camera.view_projection(), Vec3::new(0.0, 5.0, 10.0)).is_none());
    }

    #[test]
    fn uniform_layout_follows_settings() {
        let settings = GodRaySettings::default();
        let uniform = GodRayUniform::new(Vec2::new(0.25, 0.75), &settings);
        assert_eq!(uniform.light, [0.25, 0.75, settings.density, settings.weight]);
        assert_eq!(uniform.params[2], settings.samples as f32);
    }
}
