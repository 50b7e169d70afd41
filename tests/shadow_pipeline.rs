use glam::{Mat4, Vec3};

use wgpu_passes::renderer::passes::light_space_matrix;
use wgpu_passes::scene::Sun;

const EPSILON: f32 = 1e-5;

fn project_shadow_cpu(matrix: Mat4, world_pos: Vec3) -> Vec3 {
    let clip = matrix * world_pos.extend(1.0);
    if clip.w <= 0.0 {
        return Vec3::splat(-1.0);
    }
    let ndc = clip.truncate() / clip.w;
    Vec3::new(ndc.x * 0.5 + 0.5, -ndc.y * 0.5 + 0.5, ndc.z)
}

fn compute_ndc(matrix: Mat4, world_pos: Vec3) -> Vec3 {
    let clip = matrix * world_pos.extend(1.0);
    clip.truncate() / clip.w
}

fn sun_at(position: Vec3, direction: Vec3) -> Sun {
    Sun {
        position,
        direction,
        ..Sun::default()
    }
}

fn in_unit_range(value: f32) -> bool {
    (-EPSILON..=1.0 + EPSILON).contains(&value)
}

#[test]
fn scene_near_the_sun_axis_lands_inside_the_shadow_map() {
    let sun = Sun::default();
    let matrix = light_space_matrix(&sun);

    let points = [
        Vec3::ZERO,
        Vec3::new(-3.5, 0.0, -2.0),
        Vec3::new(2.0, 1.0, 4.0),
        Vec3::new(4.5, -0.5, -3.0),
    ];

    for point in points {
        let projected = project_shadow_cpu(matrix, point);
        assert!(in_unit_range(projected.x), "{point:?} -> {projected:?}");
        assert!(in_unit_range(projected.y), "{point:?} -> {projected:?}");
        assert!(in_unit_range(projected.z), "{point:?} -> {projected:?}");
    }
}

#[test]
fn shadow_depth_grows_along_the_sun_direction() {
    let sun = Sun::default();
    let matrix = light_space_matrix(&sun);
    let direction = sun.direction.normalize();

    let near = project_shadow_cpu(matrix, sun.position + direction * 5.0);
    let far = project_shadow_cpu(matrix, sun.position + direction * 25.0);
    assert!(near.z < far.z);

    // Orthographic: depth is linear in distance.
    let expected = (25.0 - 0.1) / (50.0 - 0.1);
    assert!((far.z - expected).abs() < 1e-4);
}

#[test]
fn directional_shadow_texture_axis_is_flipped_from_clip_space() {
    let sun = sun_at(Vec3::new(0.0, 0.0, 20.0), Vec3::NEG_Z);
    let matrix = light_space_matrix(&sun);

    let top_world = Vec3::new(0.0, 5.0, 0.0);
    let bottom_world = Vec3::new(0.0, -5.0, 0.0);

    let ndc_top = compute_ndc(matrix, top_world);
    let ndc_bottom = compute_ndc(matrix, bottom_world);
    assert!(ndc_top.y > ndc_bottom.y);

    let tex_top = project_shadow_cpu(matrix, top_world);
    let tex_bottom = project_shadow_cpu(matrix, bottom_world);
    assert!(tex_top.y < tex_bottom.y);
    assert!((tex_top.z - ndc_top.z).abs() < EPSILON);
    assert!((tex_bottom.z - ndc_bottom.z).abs() < EPSILON);
}

#[test]
fn vertical_sun_still_builds_a_finite_matrix() {
    let sun = sun_at(Vec3::new(0.0, 20.0, 0.0), Vec3::NEG_Y);
    let matrix = light_space_matrix(&sun);
    assert!(matrix.is_finite());

    let projected = project_shadow_cpu(matrix, Vec3::ZERO);
    assert!(projected.abs_diff_eq(Vec3::new(0.5, 0.5, projected.z), EPSILON));
    assert!(in_unit_range(projected.z));
}

#[test]
fn points_outside_the_ortho_box_fall_outside_the_map() {
    let sun = sun_at(Vec3::new(0.0, 0.0, 20.0), Vec3::NEG_Z);
    let matrix = light_space_matrix(&sun);

    let projected = project_shadow_cpu(matrix, Vec3::new(15.0, 0.0, 0.0));
    assert!(projected.x > 1.0);
}
