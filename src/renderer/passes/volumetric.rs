use std::mem;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, UVec2};

use super::hdr::CaptureSlots;
use crate::error::RenderError;
use crate::gpu::GpuContext;
use crate::renderer::pass::pass_state_accessors;
use crate::renderer::pipeline_builder::{
    create_shader, create_uniform_buffer, depth_texture_entry, uniform_entry,
};
use crate::renderer::resources::{RenderTexture, TextureSlot, HDR_FORMAT};
use crate::renderer::{PassState, RenderContext, RenderPass};
use crate::scene::SceneObjects;
use crate::settings::VolumetricSettings;

const VOLUMETRIC_SHADER: &str = include_str!("../../shader/volumetric.wgsl");
const WORKGROUP_SIZE: u32 = 8;

/// Workgroups needed to cover `size` pixels.
pub fn dispatch_size(size: UVec2) -> UVec2 {
    UVec2::new(
        size.x.div_ceil(WORKGROUP_SIZE),
        size.y.div_ceil(WORKGROUP_SIZE),
    )
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct VolumetricUniform {
    inv_view_proj: [[f32; 4]; 4],
    light_space: [[f32; 4]; 4],
    camera: [f32; 4],
    sun_direction: [f32; 4],
    sun_color: [f32; 4],
    params: [f32; 4],
}

impl VolumetricUniform {
    fn new(context: &RenderContext<'_>, settings: &VolumetricSettings) -> Self {
        let sun = &context.lighting.sun;
        let direction = sun.direction.normalize_or_zero();
        let color = sun.color * sun.intensity;
        Self {
            inv_view_proj: context.view_projection.inverse().to_cols_array_2d(),
            light_space: context.light_space_matrix.to_cols_array_2d(),
            camera: context.camera.position.extend(settings.max_distance).to_array(),
            sun_direction: direction.extend(settings.scattering).to_array(),
            sun_color: color.extend(settings.density).to_array(),
            params: [settings.steps as f32, 0.0, 0.0, 0.0],
        }
    }
}

struct VolumetricTargets {
    output: RenderTexture,
    layout: wgpu::BindGroupLayout,
    pipeline: wgpu::ComputePipeline,
    uniform: wgpu::Buffer,
}

impl VolumetricTargets {
    fn new(gpu: &GpuContext, pass: &str, size: UVec2) -> Result<Self, RenderError> {
        let output = gpu.validated(pass, |device| {
            RenderTexture::storage_2d(device, "VolumetricLight", size, HDR_FORMAT)
        })?;

        let (layout, pipeline, uniform) = gpu.compiled("VolumetricLight", |device| {
            let shader = create_shader(device, "VolumetricLight", VOLUMETRIC_SHADER);
            let uniform_size = mem::size_of::<VolumetricUniform>() as u64;
            let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("VolumetricLayout"),
                entries: &[
                    depth_texture_entry(0, wgpu::ShaderStages::COMPUTE),
                    depth_texture_entry(1, wgpu::ShaderStages::COMPUTE),
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::StorageTexture {
                            access: wgpu::StorageTextureAccess::WriteOnly,
                            format: HDR_FORMAT,
                            view_dimension: wgpu::TextureViewDimension::D2,
                        },
                        count: None,
                    },
                    uniform_entry(3, wgpu::ShaderStages::COMPUTE, uniform_size),
                ],
            });
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("VolumetricPipelineLayout"),
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            });
            let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("VolumetricPipeline"),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: Some("cs_main"),
                compilation_options: Default::default(),
                cache: None,
            });
            let uniform = create_uniform_buffer(device, "VolumetricUniform", uniform_size);
            (layout, pipeline, uniform)
        })?;

        log::info!("{pass}: allocated {}x{} {:?} storage image", size.x, size.y, HDR_FORMAT);
        Ok(Self {
            output,
            layout,
            pipeline,
            uniform,
        })
    }
}

/// Sunlight scattered by a participating medium, marched per pixel in a
/// compute shader.
///
/// Needs this frame's scene depth and directional shadow map; when either
/// is missing the pass logs and does nothing.
pub struct VolumetricLightPass {
    state: PassState,
    settings: VolumetricSettings,
    capture: CaptureSlots,
    shadow_map: TextureSlot,
    targets: Option<VolumetricTargets>,
    output: TextureSlot,
}

impl VolumetricLightPass {
    pub fn new(settings: VolumetricSettings, capture: CaptureSlots, shadow_map: TextureSlot) -> Self {
        Self {
            state: PassState::new("VolumetricLightPass"),
            settings,
            capture,
            shadow_map,
            targets: None,
            output: TextureSlot::new(),
        }
    }

    pub fn settings_mut(&mut self) -> &mut VolumetricSettings {
        &mut self.settings
    }

    pub fn light_slot(&self) -> TextureSlot {
        self.output.clone()
    }
}

impl RenderPass for VolumetricLightPass {
    pass_state_accessors!();

    fn execute(
        &mut self,
        gpu: &GpuContext,
        context: &RenderContext<'_>,
        _objects: &mut dyn SceneObjects,
    ) -> Result<Option<Mat4>, RenderError> {
        let frame = context.frame_index;
        let (Some(depth), Some(shadow_map)) =
            (self.capture.depth.current(frame), self.shadow_map.current(frame))
        else {
            log::warn!(
                "{}: scene depth or shadow map missing this frame, skipping",
                self.state.name()
            );
            return Ok(None);
        };

        let size = UVec2::new(context.camera.render_width, context.camera.render_height)
            .max(UVec2::ONE);
        if let Some(stale) = self.targets.take_if(|targets| targets.output.size() != size) {
            stale.output.release();
        }
        let targets = match &mut self.targets {
            Some(targets) => targets,
            slot => slot.insert(VolumetricTargets::new(gpu, self.state.name(), size)?),
        };

        gpu.queue.write_buffer(
            &targets.uniform,
            0,
            bytemuck::bytes_of(&VolumetricUniform::new(context, &self.settings)),
        );
        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("VolumetricBindGroup"),
            layout: &targets.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&depth),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&shadow_map),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(targets.output.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: targets.uniform.as_entire_binding(),
                },
            ],
        });

        let groups = dispatch_size(size);
        let mut encoder = gpu.create_encoder("VolumetricEncoder");
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("VolumetricLight"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&targets.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(groups.x, groups.y, 1);
        }
        gpu.submit(encoder);

        self.output.publish(frame, targets.output.view().clone());
        Ok(None)
    }

    fn dispose(&mut self) {
        if let Some(targets) = self.targets.take() {
            targets.output.release();
        }
        self.output.clear();
    }

    fn output(&self) -> Option<wgpu::TextureView> {
        self.targets.as_ref().map(|targets| targets.output.view().clone())
    }
}
