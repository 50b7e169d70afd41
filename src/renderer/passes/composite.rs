// src/renderer/passes/composite.rs

use std::mem;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use super::hdr::CaptureSlots;
use crate::error::RenderError;
use crate::gpu::GpuContext;
use crate::renderer::pass::pass_state_accessors;
use crate::renderer::pipeline_builder::{
    create_shader, create_uniform_buffer, linear_clamp_sampler, sampler_entry, texture_entry,
    uniform_entry,
};
use crate::renderer::resources::{RenderTexture, TextureSlot};
use crate::renderer::{PassState, PipelineBuilder, RenderContext, RenderPass};
use crate::scene::SceneObjects;

const COMPOSITE_SHADER: &str = concat!(
    include_str!("../../shader/fullscreen.wgsl"),
    include_str!("../../shader/composite.wgsl")
);

/// What the composite pass shows, selected by `RenderContext::debug_mode`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DebugView {
    Final,
    SceneColor,
    Bloom,
    GodRays,
    VolumetricLight,
}

impl DebugView {
    /// Unknown modes fall back to the final image.
    pub fn from_mode(mode: u32) -> Self {
        match mode {
            1 => DebugView::SceneColor,
            2 => DebugView::Bloom,
            3 => DebugView::GodRays,
            4 => DebugView::VolumetricLight,
            _ => DebugView::Final,
        }
    }

    pub fn mode(self) -> u32 {
        match self {
            DebugView::Final => 0,
            DebugView::SceneColor => 1,
            DebugView::Bloom => 2,
            DebugView::GodRays => 3,
            DebugView::VolumetricLight => 4,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
struct CompositeUniform {
    exposure: f32,
    bloom_strength: f32,
    debug_mode: u32,
    _padding: u32,
}

impl CompositeUniform {
    fn new(context: &RenderContext<'_>) -> Self {
        Self {
            exposure: context.bloom.exposure,
            bloom_strength: context.bloom.strength,
            debug_mode: DebugView::from_mode(context.debug_mode).mode(),
            _padding: 0,
        }
    }
}

struct CompositeResources {
    layout: wgpu::BindGroupLayout,
    pipeline: wgpu::RenderPipeline,
    sampler: wgpu::Sampler,
    uniform: wgpu::Buffer,
    black: RenderTexture,
}

impl CompositeResources {
    fn new(gpu: &GpuContext) -> Result<Self, RenderError> {
        let resources = gpu.compiled("Composite", |device| {
            let shader = create_shader(device, "Composite", COMPOSITE_SHADER);
            let uniform_size = mem::size_of::<CompositeUniform>() as u64;
            let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("CompositeLayout"),
                entries: &[
                    texture_entry(0, wgpu::ShaderStages::FRAGMENT),
                    texture_entry(1, wgpu::ShaderStages::FRAGMENT),
                    texture_entry(2, wgpu::ShaderStages::FRAGMENT),
                    texture_entry(3, wgpu::ShaderStages::FRAGMENT),
                    sampler_entry(4, wgpu::ShaderStages::FRAGMENT),
                    uniform_entry(5, wgpu::ShaderStages::FRAGMENT, uniform_size),
                ],
            });
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("CompositePipelineLayout"),
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            });
            let pipeline = PipelineBuilder::fullscreen(device, &pipeline_layout, &shader)
                .with_label("Composite")
                .with_fragment_entry("fs_composite")
                .with_color_target(gpu.surface_format, None)
                .build();

            CompositeResources {
                layout,
                pipeline,
                sampler: linear_clamp_sampler(device, "CompositeSampler"),
                uniform: create_uniform_buffer(device, "CompositeUniform", uniform_size),
                black: RenderTexture::fallback(device, &gpu.queue, "CompositeBlack", [0, 0, 0, 255]),
            }
        })?;
        log::info!("Composite: output format {:?}", gpu.surface_format);
        Ok(resources)
    }
}

/// Terminal pass: tone maps the HDR scene plus its effects into the
/// backbuffer.
pub struct CompositePass {
    state: PassState,
    capture: CaptureSlots,
    bloom: TextureSlot,
    god_rays: TextureSlot,
    volumetric: TextureSlot,
    resources: Option<CompositeResources>,
}

impl CompositePass {
    pub fn new(
        capture: CaptureSlots,
        bloom: TextureSlot,
        god_rays: TextureSlot,
        volumetric: TextureSlot,
    ) -> Self {
        Self {
            state: PassState::new("CompositePass"),
            capture,
            bloom,
            god_rays,
            volumetric,
            resources: None,
        }
    }
}

impl RenderPass for CompositePass {
    pass_state_accessors!();

    fn execute(
        &mut self,
        gpu: &GpuContext,
        context: &RenderContext<'_>,
        _objects: &mut dyn SceneObjects,
    ) -> Result<Option<Mat4>, RenderError> {
        let Some(backbuffer) = context.backbuffer else {
            log::warn!("{}: no backbuffer, skipping", self.state.name());
            return Ok(None);
        };
        let frame = context.frame_index;
        // Without an HDR capture this frame the scene is already in the
        // backbuffer.
        let Some(scene) = self.capture.color.current(frame) else {
            log::debug!("{}: no HDR scene this frame, skipping", self.state.name());
            return Ok(None);
        };

        let resources = match &mut self.resources {
            Some(resources) => resources,
            slot => slot.insert(CompositeResources::new(gpu)?),
        };

        let bloom = self.bloom.current(frame);
        let god_rays = self.god_rays.current(frame);
        let volumetric = self.volumetric.current(frame);
        let black = resources.black.view();

        gpu.queue.write_buffer(
            &resources.uniform,
            0,
            bytemuck::bytes_of(&CompositeUniform::new(context)),
        );
        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("CompositeBindGroup"),
            layout: &resources.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&scene),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(bloom.as_ref().unwrap_or(black)),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(
                        god_rays.as_ref().unwrap_or(black),
                    ),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(
                        volumetric.as_ref().unwrap_or(black),
                    ),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(&resources.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: resources.uniform.as_entire_binding(),
                },
            ],
        });

        let mut encoder = gpu.create_encoder("CompositeEncoder");
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("CompositePass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: backbuffer,
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
            pass.set_pipeline(&resources.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        gpu.submit(encoder);

        Ok(None)
    }

    fn dispose(&mut self) {
        if let Some(resources) = self.resources.take() {
            resources.black.release();
        }
    }
}
