use glam::{Mat4, Vec3};

use crate::settings::CaptureMode;

pub const CUBE_NEAR: f32 = 0.1;
pub const CUBE_FAR: f32 = 50.0;

/// Look direction and up vector of each cube face, in +X, -X, +Y, -Y, +Z,
/// -Z layer order.
pub const CUBE_FACES: [(Vec3, Vec3); 6] = [
    (Vec3::X, Vec3::NEG_Y),
    (Vec3::NEG_X, Vec3::NEG_Y),
    (Vec3::Y, Vec3::Z),
    (Vec3::NEG_Y, Vec3::NEG_Z),
    (Vec3::Z, Vec3::NEG_Y),
    (Vec3::NEG_Z, Vec3::NEG_Y),
];

/// Winding of front faces when rendering through [`cube_projection`].
pub const CUBE_FRONT_FACE: wgpu::FrontFace = wgpu::FrontFace::Cw;

/// 90 degree square projection used for every face.
///
/// The face table above follows the up vectors cube samplers expect when
/// row 0 is the bottom of the image; wgpu stores row 0 at the top, so the
/// projection mirrors Y. That mirror reverses triangle winding, see
/// [`CUBE_FRONT_FACE`].
pub fn cube_projection(near: f32, far: f32) -> Mat4 {
    Mat4::from_scale(Vec3::new(1.0, -1.0, 1.0))
        * Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, near, far)
}

pub fn face_view(position: Vec3, face: usize) -> Mat4 {
    let (direction, up) = CUBE_FACES[face % CUBE_FACES.len()];
    Mat4::look_at_rh(position, position + direction, up)
}

pub fn face_view_projections(position: Vec3, near: f32, far: f32) -> [Mat4; 6] {
    let projection = cube_projection(near, far);
    std::array::from_fn(|face| projection * face_view(position, face))
}

/// Layer index of the face a direction points into.
pub fn face_for_direction(direction: Vec3) -> usize {
    let abs = direction.abs();
    if abs.x >= abs.y && abs.x >= abs.z {
        if direction.x >= 0.0 {
            0
        } else {
            1
        }
    } else if abs.y >= abs.z {
        if direction.y >= 0.0 {
            2
        } else {
            3
        }
    } else if direction.z >= 0.0 {
        4
    } else {
        5
    }
}

/// Decides whether a cube capture re-renders this frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureSchedule {
    mode: CaptureMode,
    has_rendered_once: bool,
}

impl CaptureSchedule {
    pub fn new(mode: CaptureMode) -> Self {
        Self {
            mode,
            has_rendered_once: false,
        }
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: CaptureMode) {
        self.mode = mode;
    }

    pub fn should_render(&self) -> bool {
        match self.mode {
            CaptureMode::None => false,
            CaptureMode::Static => !self.has_rendered_once,
            CaptureMode::Dynamic => true,
        }
    }

    pub fn has_rendered_once(&self) -> bool {
        self.has_rendered_once
    }

    pub fn mark_rendered(&mut self) {
        self.has_rendered_once = true;
    }

    /// Forgets earlier captures, used when the targets are released.
    pub fn reset(&mut self) {
        self.has_rendered_once = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec2, Vec4};

    /// Face and texel coordinates a cube sampler picks for `dir`, following
    /// the major-axis table shared by Vulkan, Metal and D3D.
    fn sampled(dir: Vec3) -> (usize, Vec2) {
        let face = face_for_direction(dir);
        let (sc, tc, ma) = match face {
            0 => (-dir.z, -dir.y, dir.x.abs()),
            1 => (dir.z, -dir.y, dir.x.abs()),
            2 => (dir.x, dir.z, dir.y.abs()),
            3 => (dir.x, -dir.z, dir.y.abs()),
            4 => (dir.x, -dir.y, dir.z.abs()),
            _ => (-dir.x, -dir.y, dir.z.abs()),
        };
        (face, Vec2::new(sc / ma + 1.0, tc / ma + 1.0) * 0.5)
    }

    fn ndc(view_projection: Mat4, point: Vec3) -> Vec2 {
        let clip = view_projection * Vec4::new(point.x, point.y, point.z, 1.0);
        Vec2::new(clip.x, clip.y) / clip.w
    }

    #[test]
    fn face_directions_map_to_their_layer() {
        for (index, (direction, _)) in CUBE_FACES.iter().enumerate() {
            assert_eq!(face_for_direction(*direction), index);
        }
        assert_eq!(face_for_direction(Vec3::new(0.2, -0.9, 0.3)), 3);
        assert_eq!(face_for_direction(Vec3::new(0.1, 0.2, -0.5)), 5);
    }

    #[test]
    fn face_centre_projects_to_screen_centre() {
        let position = Vec3::new(1.0, 2.0, -3.0);
        let matrices = face_view_projections(position, CUBE_NEAR, CUBE_FAR);
        for (matrix, (direction, _)) in matrices.iter().zip(CUBE_FACES.iter()) {
            let centre = ndc(*matrix, position + *direction * 5.0);
            assert!(centre.abs_diff_eq(Vec2::ZERO, 1e-5), "{centre:?}");
        }
    }

    #[test]
    fn rendered_texels_match_sampled_texels() {
        let matrices = face_view_projections(Vec3::ZERO, CUBE_NEAR, CUBE_FAR);
        let directions = [
            Vec3::new(1.0, 0.5, -0.25),
            Vec3::new(-1.0, -0.3, 0.6),
            Vec3::new(0.4, 1.0, 0.7),
            Vec3::new(-0.2, -1.0, 0.5),
            Vec3::new(0.6, 0.1, 1.0),
            Vec3::new(-0.3, 0.45, -1.0),
        ];

        for dir in directions {
            let (face, uv) = sampled(dir);
            let rendered = ndc(matrices[face], dir * 3.0);
            // Framebuffer row 0 is the top of the image.
            let expected = Vec2::new(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0);
            assert!(
                rendered.abs_diff_eq(expected, 1e-5),
                "face {face}: rendered {rendered:?}, sampled {expected:?}"
            );
        }
    }

    #[test]
    fn static_capture_renders_once() {
        let mut schedule = CaptureSchedule::new(CaptureMode::Static);
        assert!(schedule.should_render());
        schedule.mark_rendered();
        assert!(!schedule.should_render());

        schedule.reset();
        assert!(schedule.should_render());
    }

    #[test]
    fn dynamic_and_disabled_captures() {
        let mut dynamic = CaptureSchedule::new(CaptureMode::Dynamic);
        dynamic.mark_rendered();
        assert!(dynamic.should_render());

        let none = CaptureSchedule::new(CaptureMode::None);
        assert!(!none.should_render());
    }
}
