use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::settings::CaptureMode;

pub const MAX_POINT_LIGHTS: usize = 16;
pub const MAX_SPOT_LIGHTS: usize = 8;

/// The directional light. `position` is where the shadow camera sits,
/// `direction` is the rotation vector it looks along.
#[derive(Clone, Copy, Debug)]
pub struct Sun {
    pub position: Vec3,
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

impl Default for Sun {
    fn default() -> Self {
        Self {
            position: Vec3::new(-8.0, 12.0, 6.0),
            direction: Vec3::new(8.0, -12.0, -6.0).normalize(),
            color: Vec3::new(1.0, 0.95, 0.85),
            intensity: 3.0,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Vec3,
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
    pub shadow: CaptureMode,
}

impl PointLight {
    pub fn new(position: Vec3, color: Vec3) -> Self {
        Self {
            position,
            color,
            constant: 1.0,
            linear: 0.09,
            quadratic: 0.032,
            shadow: CaptureMode::Dynamic,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SpotLight {
    pub position: Vec3,
    pub direction: Vec3,
    pub color: Vec3,
    /// Cosine of the inner cone angle.
    pub cut_off: f32,
    /// Cosine of the outer cone angle.
    pub outer_cut_off: f32,
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

/// Snapshot of the scene's lights for one frame.
#[derive(Clone, Default, Debug)]
pub struct Lighting {
    pub sun: Sun,
    pub point_lights: Vec<PointLight>,
    pub spot_lights: Vec<SpotLight>,
}

impl Lighting {
    pub fn new(sun: Sun) -> Self {
        Self {
            sun,
            ..Self::default()
        }
    }

    pub fn add_point(&mut self, light: PointLight) {
        self.point_lights.push(light);
    }

    pub fn add_spot(&mut self, light: SpotLight) {
        self.spot_lights.push(light);
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct SunRaw {
    pub direction: [f32; 4],
    pub color_intensity: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct PointLightRaw {
    pub position: [f32; 4],
    pub color: [f32; 4],
    /// constant, linear, quadratic, unused
    pub falloff: [f32; 4],
}

impl PointLightRaw {
    pub fn from_light(light: &PointLight) -> Self {
        Self {
            position: light.position.extend(1.0).to_array(),
            color: light.color.extend(1.0).to_array(),
            falloff: [light.constant, light.linear, light.quadratic, 0.0],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct SpotLightRaw {
    pub position: [f32; 4],
    pub direction: [f32; 4],
    pub color: [f32; 4],
    pub falloff: [f32; 4],
    pub cone: [f32; 4],
}

impl SpotLightRaw {
    pub fn from_light(light: &SpotLight) -> Self {
        let mut inner = light.cut_off;
        let mut outer = light.outer_cut_off;
        // Cosines: the inner cone has the larger value.
        if inner < outer {
            std::mem::swap(&mut inner, &mut outer);
        }
        Self {
            position: light.position.extend(1.0).to_array(),
            direction: light.direction.extend(0.0).to_array(),
            color: light.color.extend(1.0).to_array(),
            falloff: [light.constant, light.linear, light.quadratic, 0.0],
            cone: [inner, outer, 0.0, 0.0],
        }
    }
}

/// GPU packing of a [`Lighting`] snapshot for object collaborators that
/// update their lighting uniforms in `render_all`.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct LightingUniform {
    pub counts: [u32; 4],
    pub sun: SunRaw,
    pub points: [PointLightRaw; MAX_POINT_LIGHTS],
    pub spots: [SpotLightRaw; MAX_SPOT_LIGHTS],
}

impl LightingUniform {
    pub fn from_lighting(lighting: &Lighting) -> Self {
        let mut uniform = Self::zeroed();

        let sun = &lighting.sun;
        uniform.sun = SunRaw {
            direction: sun.direction.normalize_or_zero().extend(0.0).to_array(),
            color_intensity: sun.color.extend(sun.intensity).to_array(),
        };

        let point_count = lighting.point_lights.len().min(MAX_POINT_LIGHTS);
        if point_count < lighting.point_lights.len() {
            log::warn!(
                "{} point lights exceed the uniform capacity of {}",
                lighting.point_lights.len(),
                MAX_POINT_LIGHTS
            );
        }
        uniform.counts[0] = point_count as u32;
        for (dst, src) in uniform.points.iter_mut().zip(&lighting.point_lights) {
            *dst = PointLightRaw::from_light(src);
        }

        let spot_count = lighting.spot_lights.len().min(MAX_SPOT_LIGHTS);
        uniform.counts[1] = spot_count as u32;
        for (dst, src) in uniform.spots.iter_mut().zip(&lighting.spot_lights) {
            *dst = SpotLightRaw::from_light(src);
        }

        uniform
    }
}
