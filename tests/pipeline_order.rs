use glam::Vec3;

use wgpu_passes::settings::RenderSettings;
use wgpu_passes::{standard_pipeline, World};

#[test]
fn standard_pipeline_runs_passes_in_dependency_order() {
    let (pipeline, _outputs) = standard_pipeline(&RenderSettings::default(), 2, 1);

    assert_eq!(
        pipeline.pass_names(),
        vec![
            "ShadowPass",
            "PointShadowPass0",
            "PointShadowPass1",
            "ReflectionPass0",
            "HdrPass",
            "BloomCapturePass",
            "BloomDownsamplePass",
            "BloomUpsamplePass",
            "GodRayPass",
            "VolumetricLightPass",
            "CompositePass",
        ]
    );
}

#[test]
fn bloom_capture_is_the_active_scene_pass() {
    let (mut pipeline, _outputs) = standard_pipeline(&RenderSettings::default(), 0, 0);

    let hdr = pipeline.hdr_pass_mut().expect("hdr role");
    assert_eq!(hdr.name(), "HdrPass");
    assert!(!hdr.is_enabled());

    let bloom = pipeline.bloom_pass_mut().expect("bloom role");
    assert_eq!(bloom.name(), "BloomCapturePass");
    assert!(bloom.is_enabled());
}

#[test]
fn handles_reach_the_effect_passes() {
    let (mut pipeline, outputs) = standard_pipeline(&RenderSettings::default(), 1, 0);

    let god_rays = pipeline.pass_mut(outputs.god_ray_pass).expect("god ray pass");
    assert_eq!(god_rays.name(), "GodRayPass");
    god_rays.set_enabled(false);
    assert!(!god_rays.is_enabled());

    let volumetric = pipeline
        .pass_mut(outputs.volumetric_pass)
        .expect("volumetric pass");
    assert_eq!(volumetric.name(), "VolumetricLightPass");
}

#[test]
fn nothing_is_published_before_the_first_frame() {
    let (mut pipeline, outputs) = standard_pipeline(&RenderSettings::default(), 1, 2);

    assert!(pipeline.shadow_depth_texture().is_none());
    assert!(!outputs.bloom_chain.borrow().is_allocated());

    let mut world = World::default();
    world.add_reflection_probe(Vec3::ZERO);
    outputs.apply_to_world(&mut world);

    assert!(world.shadow_map.is_none());
    assert_eq!(world.point_shadow_maps.len(), 1);
    assert_eq!(world.reflection_maps.len(), 2);
    assert!(world.reflection_maps.iter().all(Option::is_none));

    pipeline.dispose();
    pipeline.dispose();
    assert_eq!(pipeline.len(), 10);
}

#[test]
fn hdr_switch_reaches_the_boxed_pass() {
    let (mut pipeline, outputs) = standard_pipeline(&RenderSettings::default(), 0, 0);
    assert!(outputs.hdr.is_hdr());

    outputs.hdr.set_hdr(false);
    let hdr = pipeline.hdr_pass_mut().expect("hdr role");
    hdr.set_enabled(true);
    assert!(!outputs.hdr.is_hdr());

    outputs.hdr.set_hdr(true);
    assert!(outputs.hdr.is_hdr());
}
