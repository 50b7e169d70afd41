use super::vertex::{v, Vertex};

/// Unit cube centred on the origin, counter-clockwise front faces.
pub fn cube_mesh() -> (Vec<Vertex>, Vec<u32>) {
    // (normal, u axis, v axis) per face; corners are n*0.5 +- u*0.5 +- v*0.5.
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for (n, u, w) in faces {
        let base = vertices.len() as u32;
        for (su, sv, uv) in [
            (-1.0, -1.0, [0.0, 1.0]),
            (1.0, -1.0, [1.0, 1.0]),
            (1.0, 1.0, [1.0, 0.0]),
            (-1.0, 1.0, [0.0, 0.0]),
        ] {
            let pos = [
                0.5 * (n[0] + su * u[0] + sv * w[0]),
                0.5 * (n[1] + su * u[1] + sv * w[1]),
                0.5 * (n[2] + su * u[2] + sv * w[2]),
            ];
            vertices.push(v(pos, n, uv));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    (vertices, indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn cube_triangles_wind_counter_clockwise_outward() {
        let (vertices, indices) = cube_mesh();
        assert_eq!(vertices.len(), 24);
        assert_eq!(indices.len(), 36);

        for tri in indices.chunks(3) {
            let a = Vec3::from(vertices[tri[0] as usize].pos);
            let b = Vec3::from(vertices[tri[1] as usize].pos);
            let c = Vec3::from(vertices[tri[2] as usize].pos);
            let normal = Vec3::from(vertices[tri[0] as usize].normal);
            let face_normal = (b - a).cross(c - a).normalize();
            assert!(face_normal.abs_diff_eq(normal, 1e-5), "{face_normal:?} vs {normal:?}");
        }
    }
}
