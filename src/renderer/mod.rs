pub mod context;
pub mod pass;
pub mod passes;
pub mod pipeline;
pub mod pipeline_builder;
pub mod primitives;
pub mod resources;
pub mod standard;
pub mod vertex;

pub use context::RenderContext;
pub use pass::{PassState, RenderPass};
pub use pipeline::{PassHandle, PassRole, RenderPipeline};
pub use pipeline_builder::PipelineBuilder;
pub use primitives::cube_mesh;
pub use resources::{FrameSlot, RenderTexture, TextureSlot, DEPTH_FORMAT, HDR_FORMAT};
pub use standard::{standard_pipeline, StandardOutputs};
pub use vertex::{ModelInstance, Vertex};
