use glam::{Mat4, Vec3};

/// Viewpoint the frame is rendered from.
///
/// `render_width`/`render_height` are the viewport dimensions in pixels;
/// passes whose targets follow the viewport size read them on their first
/// execute.
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub position: Vec3,
    pub front: Vec3,
    pub up: Vec3,
    pub fov_y_radians: f32,
    pub near: f32,
    pub far: f32,
    pub render_width: u32,
    pub render_height: u32,
}

impl Camera {
    pub fn looking_at(position: Vec3, target: Vec3, render_width: u32, render_height: u32) -> Self {
        let front = (target - position).try_normalize().unwrap_or(Vec3::NEG_Z);
        Self {
            position,
            front,
            render_width,
            render_height,
            ..Self::default()
        }
    }

    pub fn aspect(&self) -> f32 {
        self.render_width.max(1) as f32 / self.render_height.max(1) as f32
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front, self.up)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_radians, self.aspect(), self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection() * self.view()
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 3.0),
            front: Vec3::NEG_Z,
            up: Vec3::Y,
            fov_y_radians: 60f32.to_radians(),
            near: 0.1,
            far: 100.0,
            render_width: 1280,
            render_height: 720,
        }
    }
}
