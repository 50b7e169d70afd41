use glam::{Mat4, Vec2, Vec3};

use wgpu_passes::renderer::cube_mesh;
use wgpu_passes::renderer::passes::{
    face_view_projections, CUBE_FACES, CUBE_FAR, CUBE_FRONT_FACE, CUBE_NEAR,
};
use wgpu_passes::scene::Camera;

fn ndc(matrix: Mat4, point: Vec3) -> Vec2 {
    let clip = matrix * point.extend(1.0);
    Vec2::new(clip.x, clip.y) / clip.w
}

fn signed_area(a: Vec2, b: Vec2, c: Vec2) -> f32 {
    (b - a).perp_dot(c - a) * 0.5
}

/// Signed NDC areas of every triangle of a unit cube at `offset` that faces
/// `eye`.
fn facing_areas(matrix: Mat4, eye: Vec3, offset: Vec3) -> Vec<f32> {
    let (vertices, indices) = cube_mesh();
    indices
        .chunks_exact(3)
        .filter_map(|tri| {
            let corners =
                [tri[0], tri[1], tri[2]].map(|i| Vec3::from(vertices[i as usize].pos) + offset);
            let normal = Vec3::from(vertices[tri[0] as usize].normal);
            let centre = (corners[0] + corners[1] + corners[2]) / 3.0;
            (normal.dot(eye - centre) > 0.0).then(|| {
                signed_area(
                    ndc(matrix, corners[0]),
                    ndc(matrix, corners[1]),
                    ndc(matrix, corners[2]),
                )
            })
        })
        .collect()
}

#[test]
fn main_camera_sees_counter_clockwise_fronts() {
    let camera = Camera::looking_at(Vec3::ZERO, Vec3::NEG_Z, 512, 512);
    let areas = facing_areas(camera.view_projection(), Vec3::ZERO, Vec3::new(0.0, 0.0, -3.0));

    assert_eq!(areas.len(), 2);
    assert!(areas.iter().all(|&area| area > 0.0), "{areas:?}");
}

#[test]
fn cube_faces_see_clockwise_fronts() {
    assert_eq!(CUBE_FRONT_FACE, wgpu::FrontFace::Cw);

    let matrices = face_view_projections(Vec3::ZERO, CUBE_NEAR, CUBE_FAR);
    for (face, (direction, _)) in CUBE_FACES.iter().enumerate() {
        let areas = facing_areas(matrices[face], Vec3::ZERO, *direction * 3.0);
        assert_eq!(areas.len(), 2, "face {face}");
        assert!(areas.iter().all(|&area| area < 0.0), "face {face}: {areas:?}");
    }
}

#[test]
fn objects_beyond_the_far_plane_are_clipped() {
    let matrices = face_view_projections(Vec3::ZERO, CUBE_NEAR, CUBE_FAR);
    let clip = matrices[0] * Vec3::new(CUBE_FAR + 1.0, 0.0, 0.0).extend(1.0);
    assert!(clip.z / clip.w > 1.0);

    let clip = matrices[0] * Vec3::new(CUBE_FAR - 1.0, 0.0, 0.0).extend(1.0);
    let depth = clip.z / clip.w;
    assert!((0.0..1.0).contains(&depth));
}
