mod demo_scene;

use std::time::Instant;

use glam::{UVec2, Vec3};

use demo_scene::SpinningCubes;
use wgpu_passes::renderer::RenderTexture;
use wgpu_passes::scene::{PointLight, Sun};
use wgpu_passes::settings::CaptureMode;
use wgpu_passes::{
    standard_pipeline, Camera, GpuContext, Lighting, RenderContext, RenderError, RenderSettings,
    World,
};

const DEFAULT_FRAMES: u64 = 120;
const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// Renders the standard pipeline offscreen for a fixed number of frames.
///
/// Usage: `wgpu-passes-demo [frames] [debug_mode]`. Halfway through, the
/// scene capture switches from the bloom pass to the plain HDR pass; for the
/// last quarter HDR is turned off and the scene goes straight to the
/// backbuffer.
fn run(frames: u64, debug_mode: u32) -> Result<(), RenderError> {
    let settings = RenderSettings::load();
    let gpu = pollster::block_on(GpuContext::headless(OUTPUT_FORMAT))?;

    let camera = Camera::looking_at(Vec3::new(0.0, 4.0, 9.0), Vec3::ZERO, 1280, 720);

    let mut lighting = Lighting::new(Sun::default());
    lighting.add_point(PointLight::new(Vec3::new(0.0, 2.5, 0.0), Vec3::new(4.0, 2.0, 1.0)));
    let mut static_light = PointLight::new(Vec3::new(-4.0, 1.5, 2.0), Vec3::new(0.5, 1.0, 3.0));
    static_light.shadow = CaptureMode::Static;
    lighting.add_point(static_light);

    let mut world = World::default();
    world.add_reflection_probe(Vec3::new(0.0, 1.0, 0.0));

    let (mut pipeline, outputs) = standard_pipeline(
        &settings,
        lighting.point_lights.len(),
        world.reflection_probes.len(),
    );
    log::info!("Passes: {}", pipeline.pass_names().join(" -> "));

    let mut cubes = SpinningCubes::new(&gpu, 8);
    let backbuffer = RenderTexture::color_2d(
        &gpu.device,
        "Backbuffer",
        UVec2::new(camera.render_width, camera.render_height),
        OUTPUT_FORMAT,
    );

    let start = Instant::now();
    for frame in 0..frames {
        if frame == frames / 2 {
            log::info!("Frame {frame}: switching scene capture to the plain HDR pass");
            if let Some(bloom) = pipeline.bloom_pass_mut() {
                bloom.set_enabled(false);
            }
            if let Some(hdr) = pipeline.hdr_pass_mut() {
                hdr.set_enabled(true);
            }
        }
        if frame == frames * 3 / 4 && frames / 2 != frames * 3 / 4 {
            log::info!("Frame {frame}: rendering the scene directly into the backbuffer");
            outputs.hdr.set_hdr(false);
        }

        cubes.update(&gpu.queue, start.elapsed().as_secs_f32());

        let frame_start = Instant::now();
        let mut context = RenderContext::new(
            &camera,
            &lighting,
            &world,
            &settings.bloom,
            &settings.reflection,
        )
        .with_frame(frame)
        .with_backbuffer(backbuffer.view())
        .with_debug_mode(debug_mode);

        let light_space = pipeline.render_all(&gpu, &mut context, &mut cubes)?;
        log::debug!(
            "Frame {frame}: {:.2} ms, light space row 0 {:?}",
            frame_start.elapsed().as_secs_f64() * 1000.0,
            light_space.row(0)
        );

        outputs.apply_to_world(&mut world);
    }

    let elapsed = start.elapsed();
    log::info!(
        "Rendered {frames} frames in {:.2?} ({:.2} ms/frame)",
        elapsed,
        elapsed.as_secs_f64() * 1000.0 / frames.max(1) as f64
    );
    log::info!(
        "Shadow map: {}, reflection probes captured: {}/{}, bloom mips: {}",
        if pipeline.shadow_depth_texture().is_some() { "ready" } else { "missing" },
        world.reflection_maps.iter().filter(|map| map.is_some()).count(),
        world.reflection_maps.len(),
        outputs.bloom_chain.borrow().len()
    );

    pipeline.dispose();
    backbuffer.release();
    Ok(())
}

fn main() {
    wgpu_passes::init_logging();

    let mut args = std::env::args().skip(1);
    let frames = args
        .next()
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(DEFAULT_FRAMES);
    let debug_mode = args.next().and_then(|arg| arg.parse().ok()).unwrap_or(0);

    if let Err(err) = run(frames, debug_mode) {
        log::error!("Demo failed: {err}");
        std::process::exit(1);
    }
}
