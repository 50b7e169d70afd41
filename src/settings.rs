use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Margin kept between the bloom luminance thresholds by
/// [`BloomSettings::clamp_thresholds`].
pub const THRESHOLD_MARGIN: f32 = 0.01;

/// How often a cube capture (point shadow or reflection probe) is refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    /// The light or probe does not participate.
    None,
    /// Rendered once, then reused for the lifetime of the pass.
    Static,
    /// Re-rendered every frame.
    #[default]
    Dynamic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BloomSettings {
    pub exposure: f32,
    pub strength: f32,
    pub threshold_min: f32,
    pub threshold_max: f32,
    pub filter_radius: f32,
    pub mip_levels: usize,
    pub mip_weights: Vec<f32>,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            exposure: 1.0,
            strength: 0.04,
            threshold_min: 0.8,
            threshold_max: 1.2,
            filter_radius: 0.005,
            mip_levels: 5,
            mip_weights: vec![1.0, 1.0, 1.0, 1.0, 1.0],
        }
    }
}

impl BloomSettings {
    /// Keeps `threshold_max` strictly above `threshold_min`.
    pub fn clamp_thresholds(&mut self) {
        if self.threshold_min >= self.threshold_max {
            self.threshold_max = self.threshold_min + THRESHOLD_MARGIN;
        }
    }

    /// Weight applied to `level` when it is blended during upsampling.
    pub fn mip_weight(&self, level: usize) -> f32 {
        self.mip_weights.get(level).copied().unwrap_or(0.0)
    }

    fn validate(mut self) -> Self {
        if self.mip_levels == 0 {
            warn!("Bloom needs at least one mip level. Using the default count.");
            self.mip_levels = Self::default().mip_levels;
        }
        if self.mip_weights.len() > self.mip_levels {
            warn!(
                "{} bloom mip weights given for {} levels, dropping the extra weights",
                self.mip_weights.len(),
                self.mip_levels
            );
            self.mip_weights.truncate(self.mip_levels);
        }
        self.clamp_thresholds();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflectionSettings {
    pub enabled: bool,
    pub strength: f32,
    pub face_size: u32,
    pub mode: CaptureMode,
}

impl Default for ReflectionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            strength: 0.5,
            face_size: 512,
            mode: CaptureMode::Static,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GodRaySettings {
    pub samples: u32,
    pub density: f32,
    pub decay: f32,
    pub weight: f32,
    pub exposure: f32,
}

impl Default for GodRaySettings {
    fn default() -> Self {
        Self {
            samples: 100,
            density: 0.96,
            decay: 0.97,
            weight: 0.5,
            exposure: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumetricSettings {
    pub steps: u32,
    /// Henyey-Greenstein anisotropy, in (-1, 1).
    pub scattering: f32,
    pub density: f32,
    pub max_distance: f32,
}

impl Default for VolumetricSettings {
    fn default() -> Self {
        Self {
            steps: 48,
            scattering: 0.6,
            density: 0.05,
            max_distance: 50.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSettings {
    #[serde(default = "RenderSettings::default_shadow_map_size")]
    pub shadow_map_size: u32,
    #[serde(default = "RenderSettings::default_point_shadow_size")]
    pub point_shadow_size: u32,
    #[serde(default)]
    pub bloom: BloomSettings,
    #[serde(default)]
    pub reflection: ReflectionSettings,
    #[serde(default)]
    pub god_rays: GodRaySettings,
    #[serde(default)]
    pub volumetric: VolumetricSettings,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            shadow_map_size: Self::default_shadow_map_size(),
            point_shadow_size: Self::default_point_shadow_size(),
            bloom: BloomSettings::default(),
            reflection: ReflectionSettings::default(),
            god_rays: GodRaySettings::default(),
            volumetric: VolumetricSettings::default(),
        }
    }
}

impl RenderSettings {
    pub fn load() -> Self {
        Self::load_from_path("settings.json")
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Self {
        use std::fs;

        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<RenderSettings>(&contents) {
                Ok(settings) => {
                    info!("Loaded render settings from {:?}", path);
                    settings.validate()
                }
                Err(err) => {
                    warn!(
                        "Failed to parse {:?} ({}). Falling back to default render settings.",
                        path, err
                    );
                    RenderSettings::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "Render settings file {:?} not found. Using default settings.",
                    path
                );
                RenderSettings::default()
            }
            Err(err) => {
                warn!(
                    "Failed to read {:?} ({}). Falling back to default render settings.",
                    path, err
                );
                RenderSettings::default()
            }
        }
    }

    pub fn validate(mut self) -> Self {
        if self.shadow_map_size == 0 {
            warn!("Shadow map size must be greater than zero. Using default value.");
            self.shadow_map_size = Self::default_shadow_map_size();
        }

        if self.point_shadow_size == 0 {
            warn!("Point shadow size must be greater than zero. Using default value.");
            self.point_shadow_size = Self::default_point_shadow_size();
        }

        if self.reflection.face_size == 0 {
            warn!("Reflection face size must be greater than zero. Using default value.");
            self.reflection.face_size = ReflectionSettings::default().face_size;
        }

        if self.volumetric.steps == 0 {
            warn!("Volumetric light needs at least one step. Using default value.");
            self.volumetric.steps = VolumetricSettings::default().steps;
        }

        self.bloom = self.bloom.validate();
        self
    }

    const fn default_shadow_map_size() -> u32 {
        4096
    }

    const fn default_point_shadow_size() -> u32 {
        1024
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_thresholds_adds_margin_when_inverted() {
        let mut bloom = BloomSettings {
            threshold_min: 1.5,
            threshold_max: 1.0,
            ..BloomSettings::default()
        };
        bloom.clamp_thresholds();
        assert_eq!(bloom.threshold_min, 1.5);
        assert_eq!(bloom.threshold_max, 1.5 + THRESHOLD_MARGIN);

        let mut equal = BloomSettings {
            threshold_min: 0.7,
            threshold_max: 0.7,
            ..BloomSettings::default()
        };
        equal.clamp_thresholds();
        assert_eq!(equal.threshold_max, 0.7 + THRESHOLD_MARGIN);
    }

    #[test]
    fn clamp_thresholds_is_noop_when_ordered() {
        let mut bloom = BloomSettings {
            threshold_min: 0.2,
            threshold_max: 0.9,
            ..BloomSettings::default()
        };
        let before = bloom.clone();
        bloom.clamp_thresholds();
        assert_eq!(bloom, before);
    }

    #[test]
    fn mip_weight_out_of_range_is_zero() {
        let bloom = BloomSettings {
            mip_weights: vec![0.5, 0.25],
            ..BloomSettings::default()
        };
        assert_eq!(bloom.mip_weight(0), 0.5);
        assert_eq!(bloom.mip_weight(1), 0.25);
        assert_eq!(bloom.mip_weight(2), 0.0);
        assert_eq!(bloom.mip_weight(usize::MAX), 0.0);
    }

    #[test]
    fn validate_replaces_invalid_values_with_defaults() {
        let mut settings = RenderSettings::default();
        settings.shadow_map_size = 0;
        settings.point_shadow_size = 0;
        settings.reflection.face_size = 0;
        settings.bloom.mip_levels = 2;
        settings.bloom.mip_weights = vec![1.0, 0.5, 0.25, 0.125];
        settings.bloom.threshold_min = 2.0;
        settings.bloom.threshold_max = 1.0;

        let validated = settings.validate();

        assert_eq!(validated.shadow_map_size, 4096);
        assert_eq!(validated.point_shadow_size, 1024);
        assert_eq!(validated.reflection.face_size, 512);
        assert_eq!(validated.bloom.mip_weights, vec![1.0, 0.5]);
        assert!(validated.bloom.threshold_max > validated.bloom.threshold_min);
    }

    #[test]
    fn partial_json_uses_field_defaults() {
        let json = r#"{ "shadow_map_size": 2048, "bloom": { "strength": 0.1 } }"#;
        let settings: RenderSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.shadow_map_size, 2048);
        assert_eq!(settings.point_shadow_size, 1024);
        assert_eq!(settings.bloom.strength, 0.1);
        assert_eq!(settings.bloom.mip_levels, 5);
        assert_eq!(settings.reflection.mode, CaptureMode::Static);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let settings = RenderSettings::load_from_path("does/not/exist/settings.json");
        assert_eq!(settings.shadow_map_size, 4096);
        assert_eq!(settings.bloom, BloomSettings::default());
    }
}
