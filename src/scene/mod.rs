//! Collaborators the pipeline reads from: camera, lights, world state and the
//! object collection.

pub mod camera;
pub mod lights;
pub mod objects;
pub mod world;

pub use camera::Camera;
pub use lights::{Lighting, LightingUniform, PointLight, SpotLight, Sun};
pub use objects::{DepthShader, DrawTarget, SceneObjects};
pub use world::{ReflectionProbe, World};
