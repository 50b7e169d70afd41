// src/renderer/standard.rs

use crate::renderer::passes::{
    BloomDownsamplePass, BloomMipChain, BloomRenderPass, BloomUpsamplePass, CaptureSlots,
    CompositePass, CubeReflectionRenderPass, GodRayPass, HdrRenderPass, HdrSwitch,
    PointShadowRenderPass, ShadowRenderPass, SharedMipChain, VolumetricLightPass,
};
use crate::renderer::{PassHandle, PassRole, RenderPass, RenderPipeline, TextureSlot};
use crate::scene::World;
use crate::settings::RenderSettings;

/// Handles to everything [`standard_pipeline`] wires together.
pub struct StandardOutputs {
    pub shadow_map: TextureSlot,
    pub point_shadows: Vec<TextureSlot>,
    pub reflections: Vec<TextureSlot>,
    pub capture: CaptureSlots,
    /// Toggles HDR on the plain scene capture pass.
    pub hdr: HdrSwitch,
    pub bloom_chain: SharedMipChain,
    pub bloom: TextureSlot,
    pub god_rays: TextureSlot,
    pub volumetric: TextureSlot,
    pub god_ray_pass: PassHandle,
    pub volumetric_pass: PassHandle,
}

impl StandardOutputs {
    /// Copies the most recent shadow and reflection captures into `world`
    /// so material shaders can sample them next frame.
    pub fn apply_to_world(&self, world: &mut World) {
        world.shadow_map = self.shadow_map.latest();

        world.point_shadow_maps = self.point_shadows.iter().map(TextureSlot::latest).collect();

        if world.reflection_maps.len() < self.reflections.len() {
            world.reflection_maps.resize(self.reflections.len(), None);
        }
        for (map, slot) in world.reflection_maps.iter_mut().zip(&self.reflections) {
            *map = slot.latest();
        }
    }
}

/// Builds the full pass chain.
///
/// Order: directional shadow, one point shadow per light, one reflection
/// capture per probe, scene capture, bloom downsample and upsample, god
/// rays, volumetric light, composite. The plain HDR capture is registered
/// disabled as the alternative to the bloom capture.
pub fn standard_pipeline(
    settings: &RenderSettings,
    point_lights: usize,
    probes: usize,
) -> (RenderPipeline, StandardOutputs) {
    let mut pipeline = RenderPipeline::new();

    let shadow = ShadowRenderPass::new(settings.shadow_map_size);
    let shadow_map = shadow.depth_slot();
    pipeline.add_pass_with_role(PassRole::Shadow, Box::new(shadow));

    let point_shadows = (0..point_lights)
        .map(|index| {
            let pass = PointShadowRenderPass::new(index, settings.point_shadow_size);
            let slot = pass.cube_slot();
            pipeline.add_pass(Box::new(pass));
            slot
        })
        .collect();

    let reflections = (0..probes)
        .map(|index| {
            let pass = CubeReflectionRenderPass::new(
                index,
                settings.reflection.face_size,
                settings.reflection.mode,
            );
            let slot = pass.cube_slot();
            pipeline.add_pass(Box::new(pass));
            slot
        })
        .collect();

    let capture = CaptureSlots::default();
    let mut hdr = HdrRenderPass::new(capture.clone());
    hdr.set_enabled(false);
    let hdr_switch = hdr.hdr_switch();
    pipeline.add_pass_with_role(PassRole::Hdr, Box::new(hdr));
    pipeline.add_pass_with_role(PassRole::Bloom, Box::new(BloomRenderPass::new(capture.clone())));

    let bloom_chain = BloomMipChain::shared();
    pipeline.add_pass(Box::new(BloomDownsamplePass::new(
        bloom_chain.clone(),
        capture.clone(),
    )));
    let upsample = BloomUpsamplePass::new(bloom_chain.clone());
    let bloom = upsample.bloom_slot();
    pipeline.add_pass(Box::new(upsample));

    let god_ray = GodRayPass::new(settings.god_rays.clone());
    let god_rays = god_ray.rays_slot();
    let god_ray_pass = pipeline.add_pass(Box::new(god_ray));

    let volumetric_light =
        VolumetricLightPass::new(settings.volumetric.clone(), capture.clone(), shadow_map.clone());
    let volumetric = volumetric_light.light_slot();
    let volumetric_pass = pipeline.add_pass(Box::new(volumetric_light));

    pipeline.add_pass(Box::new(CompositePass::new(
        capture.clone(),
        bloom.clone(),
        god_rays.clone(),
        volumetric.clone(),
    )));

    log::info!(
        "Standard pipeline: {} passes ({} point shadows, {} reflection probes)",
        pipeline.len(),
        point_lights,
        probes
    );

    (
        pipeline,
        StandardOutputs {
            shadow_map,
            point_shadows,
            reflections,
            capture,
            hdr: hdr_switch,
            bloom_chain,
            bloom,
            god_rays,
            volumetric,
            god_ray_pass,
            volumetric_pass,
        },
    )
}
