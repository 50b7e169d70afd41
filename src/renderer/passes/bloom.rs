// src/renderer/passes/bloom.rs

use std::mem;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, UVec2};

use super::bloom_mip::SharedMipChain;
use super::hdr::CaptureSlots;
use crate::error::RenderError;
use crate::gpu::GpuContext;
use crate::renderer::pass::pass_state_accessors;
use crate::renderer::pipeline_builder::{
    create_shader, create_uniform_buffer, linear_clamp_sampler, sampler_entry, texture_entry,
    uniform_entry, ADDITIVE_BLEND,
};
use crate::renderer::resources::{TextureSlot, HDR_FORMAT};
use crate::renderer::{PassState, PipelineBuilder, RenderContext, RenderPass};
use crate::scene::SceneObjects;
use crate::settings::BloomSettings;

const BLOOM_SHADER: &str = concat!(
    include_str!("../../shader/fullscreen.wgsl"),
    include_str!("../../shader/bloom.wgsl")
);

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub(crate) struct BloomUniform {
    values: [f32; 4],
}

impl BloomUniform {
    fn downsample(settings: &BloomSettings, apply_threshold: bool, karis_average: bool) -> Self {
        Self {
            values: [
                settings.threshold_min,
                settings.threshold_max,
                if apply_threshold { 1.0 } else { 0.0 },
                if karis_average { 1.0 } else { 0.0 },
            ],
        }
    }

    fn upsample(filter_radius: f32, weight: f32) -> Self {
        Self {
            values: [filter_radius, weight, 0.0, 0.0],
        }
    }
}

/// Resolution of mip 0: the scene capture resolution.
pub fn chain_base(context: &RenderContext<'_>) -> UVec2 {
    UVec2::new(context.camera.render_width, context.camera.render_height).max(UVec2::ONE)
}

/// `(source, target)` level of each downsample draw, in submission order.
/// A `None` source is the scene capture; every other level reads the one
/// before it.
pub fn downsample_plan(levels: usize) -> Vec<(Option<usize>, usize)> {
    (0..levels).map(|level| (level.checked_sub(1), level)).collect()
}

/// `(source, target)` level of each upsample draw, from the smallest mip
/// up to mip 0. Empty for a single-level chain.
pub fn upsample_plan(levels: usize) -> Vec<(usize, usize)> {
    (1..levels).rev().map(|source| (source, source - 1)).collect()
}

/// Pipeline, sampler and per-level uniforms of one bloom stage.
struct BloomProgram {
    layout: wgpu::BindGroupLayout,
    pipeline: wgpu::RenderPipeline,
    sampler: wgpu::Sampler,
    uniforms: Vec<wgpu::Buffer>,
}

impl BloomProgram {
    fn new(
        gpu: &GpuContext,
        label: &str,
        fragment_entry: &str,
        blend: Option<wgpu::BlendState>,
    ) -> Result<Self, RenderError> {
        gpu.compiled(label, |device| {
            let shader = create_shader(device, label, BLOOM_SHADER);
            let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(&format!("{label}Layout")),
                entries: &[
                    texture_entry(0, wgpu::ShaderStages::FRAGMENT),
                    sampler_entry(1, wgpu::ShaderStages::FRAGMENT),
                    uniform_entry(
                        2,
                        wgpu::ShaderStages::FRAGMENT,
                        mem::size_of::<BloomUniform>() as u64,
                    ),
                ],
            });
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(&format!("{label}PipelineLayout")),
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            });
            let pipeline = PipelineBuilder::fullscreen(device, &pipeline_layout, &shader)
                .with_label(label)
                .with_fragment_entry(fragment_entry)
                .with_color_target(HDR_FORMAT, blend)
                .build();

            Self {
                layout,
                pipeline,
                sampler: linear_clamp_sampler(device, &format!("{label}Sampler")),
                uniforms: Vec::new(),
            }
        })
    }

    /// Makes sure there are `count` uniform buffers.
    fn reserve_uniforms(&mut self, device: &wgpu::Device, count: usize) {
        while self.uniforms.len() < count {
            let index = self.uniforms.len();
            self.uniforms.push(create_uniform_buffer(
                device,
                &format!("BloomUniform{index}"),
                mem::size_of::<BloomUniform>() as u64,
            ));
        }
    }

    fn bind_group(
        &self,
        device: &wgpu::Device,
        source: &wgpu::TextureView,
        level: usize,
    ) -> Option<wgpu::BindGroup> {
        let uniform = self.uniforms.get(level)?;
        Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("BloomBindGroup"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(source),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: uniform.as_entire_binding(),
                },
            ],
        }))
    }
}

/// Fills the mip chain from the bright-pass texture.
///
/// Level 0 is rendered at the capture resolution from the bright texture,
/// or from the scene colour with the soft threshold applied when no bright
/// texture was published this frame. Each further level reads the previous
/// one.
pub struct BloomDownsamplePass {
    state: PassState,
    chain: SharedMipChain,
    capture: CaptureSlots,
    program: Option<BloomProgram>,
}

impl BloomDownsamplePass {
    pub fn new(chain: SharedMipChain, capture: CaptureSlots) -> Self {
        Self {
            state: PassState::new("BloomDownsamplePass"),
            chain,
            capture,
            program: None,
        }
    }
}

impl RenderPass for BloomDownsamplePass {
    pass_state_accessors!();

    fn execute(
        &mut self,
        gpu: &GpuContext,
        context: &RenderContext<'_>,
        _objects: &mut dyn SceneObjects,
    ) -> Result<Option<Mat4>, RenderError> {
        let frame = context.frame_index;
        let (scene, apply_threshold) = match self.capture.bright.current(frame) {
            Some(bright) => (bright, false),
            None => match self.capture.color.current(frame) {
                Some(color) => (color, true),
                None => {
                    log::warn!("{}: no scene texture this frame, skipping", self.state.name());
                    return Ok(None);
                }
            },
        };

        let mut chain = self.chain.borrow_mut();
        chain.ensure(gpu, self.state.name(), chain_base(context), context.bloom.mip_levels)?;

        let program = match &mut self.program {
            Some(program) => program,
            slot => slot.insert(BloomProgram::new(gpu, "BloomDownsample", "fs_downsample", None)?),
        };
        program.reserve_uniforms(&gpu.device, chain.len());

        let mut encoder = gpu.create_encoder("BloomDownsampleEncoder");
        for (source, target) in downsample_plan(chain.len()) {
            let first = source.is_none();
            let uniform = BloomUniform::downsample(context.bloom, first && apply_threshold, first);
            gpu.queue
                .write_buffer(&program.uniforms[target], 0, bytemuck::bytes_of(&uniform));

            let input = match source {
                Some(level) => chain.mips()[level].view(),
                None => &scene,
            };
            let Some(bind_group) = program.bind_group(&gpu.device, input, target) else {
                continue;
            };
            let Some(mut pass) =
                chain.begin_mip(&mut encoder, target, wgpu::LoadOp::Clear(wgpu::Color::BLACK))
            else {
                continue;
            };
            pass.set_pipeline(&program.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        gpu.submit(encoder);

        Ok(None)
    }

    /// Owns the chain, so it releases it.
    fn dispose(&mut self) {
        self.chain.borrow_mut().release();
        self.program = None;
    }
}

/// Walks the chain back up, accumulating each level into the next larger
/// one, and publishes mip 0 as the bloom texture.
pub struct BloomUpsamplePass {
    state: PassState,
    chain: SharedMipChain,
    program: Option<BloomProgram>,
    output: TextureSlot,
}

impl BloomUpsamplePass {
    pub fn new(chain: SharedMipChain) -> Self {
        Self {
            state: PassState::new("BloomUpsamplePass"),
            chain,
            program: None,
            output: TextureSlot::new(),
        }
    }

    pub fn bloom_slot(&self) -> TextureSlot {
        self.output.clone()
    }
}

impl RenderPass for BloomUpsamplePass {
    pass_state_accessors!();

    fn execute(
        &mut self,
        gpu: &GpuContext,
        context: &RenderContext<'_>,
        _objects: &mut dyn SceneObjects,
    ) -> Result<Option<Mat4>, RenderError> {
        let chain = self.chain.borrow();
        if !chain.is_allocated() {
            log::warn!("{}: mip chain not allocated, skipping", self.state.name());
            return Ok(None);
        }

        let program = match &mut self.program {
            Some(program) => program,
            slot => slot.insert(BloomProgram::new(
                gpu,
                "BloomUpsample",
                "fs_upsample",
                Some(ADDITIVE_BLEND),
            )?),
        };
        program.reserve_uniforms(&gpu.device, chain.len());

        let mut encoder = gpu.create_encoder("BloomUpsampleEncoder");
        for (source, target) in upsample_plan(chain.len()) {
            let uniform =
                BloomUniform::upsample(context.bloom.filter_radius, context.bloom.mip_weight(source));
            gpu.queue
                .write_buffer(&program.uniforms[source], 0, bytemuck::bytes_of(&uniform));

            let Some(bind_group) =
                program.bind_group(&gpu.device, chain.mips()[source].view(), source)
            else {
                continue;
            };
            let Some(mut pass) = chain.begin_mip(&mut encoder, target, wgpu::LoadOp::Load) else {
                continue;
            };
            pass.set_pipeline(&program.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        gpu.submit(encoder);

        if let Some(mip) = chain.mip(0) {
            self.output.publish(context.frame_index, mip.view().clone());
        }
        Ok(None)
    }

    fn dispose(&mut self) {
        self.program = None;
        self.output.clear();
    }

    fn output(&self) -> Option<wgpu::TextureView> {
        self.chain.borrow().mip(0).map(|mip| mip.view().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_levels_walk_down_then_back_up() {
        assert_eq!(
            downsample_plan(5),
            vec![(None, 0), (Some(0), 1), (Some(1), 2), (Some(2), 3), (Some(3), 4)]
        );
        assert_eq!(upsample_plan(5), vec![(4, 3), (3, 2), (2, 1), (1, 0)]);
    }

    #[test]
    fn single_level_chain_has_no_upsample() {
        assert_eq!(downsample_plan(1), vec![(None, 0)]);
        assert!(upsample_plan(1).is_empty());
        assert!(downsample_plan(0).is_empty());
        assert!(upsample_plan(0).is_empty());
    }

    #[test]
    fn chain_starts_at_the_capture_resolution() {
        use crate::scene::{Camera, Lighting, World};
        use crate::settings::ReflectionSettings;
        use glam::Vec3;

        let camera = Camera::looking_at(Vec3::Z, Vec3::ZERO, 512, 512);
        let lighting = Lighting::default();
        let world = World::default();
        let bloom = BloomSettings::default();
        let reflection = ReflectionSettings::default();
        let context = RenderContext::new(&camera, &lighting, &world, &bloom, &reflection);

        let base = chain_base(&context);
        assert_eq!(base, UVec2::splat(512));
        assert_eq!(
            crate::renderer::passes::mip_sizes(base, bloom.mip_levels),
            vec![
                UVec2::splat(512),
                UVec2::splat(256),
                UVec2::splat(128),
                UVec2::splat(64),
                UVec2::splat(32),
            ]
        );
    }

    #[test]
    fn downsample_uniform_packs_thresholds_and_flags() {
        let settings = BloomSettings {
            threshold_min: 0.5,
            threshold_max: 1.5,
            ..BloomSettings::default()
        };
        let uniform = BloomUniform::downsample(&settings, true, false);
        assert_eq!(uniform.values, [0.5, 1.5, 1.0, 0.0]);
    }

    #[test]
    fn upsample_uniform_carries_radius_and_weight() {
        let uniform = BloomUniform::upsample(0.005, 0.25);
        assert_eq!(uniform.values, [0.005, 0.25, 0.0, 0.0]);
    }
}
