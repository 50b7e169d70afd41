use glam::Vec3;
use wgpu::Color;

/// A registered reflection capture point.
#[derive(Clone, Copy, Debug)]
pub struct ReflectionProbe {
    pub position: Vec3,
}

/// World-level state the passes read during a frame.
///
/// Besides the sky color, the world carries the textures the pipeline
/// produced on earlier frames (shadow map, point shadow cubes, reflection
/// cubes) so material shaders can sample them. The caller copies them back
/// from the pipeline between frames; passes never write to the world.
#[derive(Clone, Debug)]
pub struct World {
    sky_color: Color,
    pub shadow_map: Option<wgpu::TextureView>,
    pub point_shadow_maps: Vec<Option<wgpu::TextureView>>,
    pub reflection_probes: Vec<ReflectionProbe>,
    pub reflection_maps: Vec<Option<wgpu::TextureView>>,
}

impl World {
    pub fn new(sky_color: Color) -> Self {
        Self {
            sky_color,
            shadow_map: None,
            point_shadow_maps: Vec::new(),
            reflection_probes: Vec::new(),
            reflection_maps: Vec::new(),
        }
    }

    pub fn sky_color(&self) -> Color {
        self.sky_color
    }

    pub fn set_sky_color(&mut self, color: Color) {
        self.sky_color = color;
    }

    pub fn with_sky_color(mut self, color: Color) -> Self {
        self.sky_color = color;
        self
    }

    /// Registers a probe and returns its index.
    pub fn add_reflection_probe(&mut self, position: Vec3) -> usize {
        self.reflection_probes.push(ReflectionProbe { position });
        self.reflection_maps.push(None);
        self.reflection_probes.len() - 1
    }

    pub fn reflection_probe(&self, index: usize) -> Option<&ReflectionProbe> {
        self.reflection_probes.get(index)
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new(Color {
            r: 0.231,
            g: 0.269,
            b: 0.338,
            a: 1.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probes_get_sequential_indices_and_empty_maps() {
        let mut world = World::default();
        assert_eq!(world.add_reflection_probe(Vec3::X), 0);
        assert_eq!(world.add_reflection_probe(Vec3::Y), 1);
        assert_eq!(world.reflection_maps.len(), 2);
        assert!(world.reflection_maps.iter().all(Option::is_none));
        assert_eq!(world.reflection_probe(1).map(|p| p.position), Some(Vec3::Y));
        assert!(world.reflection_probe(2).is_none());
    }
}
