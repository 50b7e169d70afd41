//! Multi-pass wgpu render pipeline: shadow maps, cube captures, HDR bloom,
//! light shafts and a tone-mapped composite, driven by an ordered list of
//! passes that share one frame context.

pub mod error;
pub mod gpu;
pub mod renderer;
pub mod scene;
pub mod settings;

pub use error::RenderError;
pub use gpu::GpuContext;
pub use renderer::{
    standard_pipeline, RenderContext, RenderPass, RenderPipeline, StandardOutputs,
};
pub use scene::{Camera, Lighting, SceneObjects, World};
pub use settings::RenderSettings;

pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}
