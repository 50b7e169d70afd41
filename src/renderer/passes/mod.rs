pub mod bloom;
pub mod bloom_mip;
pub mod composite;
pub mod cube;
mod geometry;
pub mod god_rays;
pub mod hdr;
pub mod point_shadow;
pub mod reflection;
pub mod shadow;
pub mod volumetric;

pub use bloom::{
    chain_base, downsample_plan, upsample_plan, BloomDownsamplePass, BloomUpsamplePass,
};
pub use bloom_mip::{mip_sizes, BloomMip, BloomMipChain, SharedMipChain};
pub use composite::{CompositePass, DebugView};
pub use cube::{
    cube_projection, face_for_direction, face_view_projections, CaptureSchedule, CUBE_FACES,
    CUBE_FAR, CUBE_FRONT_FACE, CUBE_NEAR,
};
pub use god_rays::{sun_screen_position, GodRayPass};
pub use hdr::{BloomRenderPass, CaptureLayout, CaptureSlots, HdrRenderPass, HdrSwitch};
pub use point_shadow::PointShadowRenderPass;
pub use reflection::{keeps_face_depth, CubeReflectionRenderPass};
pub use shadow::{light_space_matrix, ShadowRenderPass};
pub use volumetric::{dispatch_size, VolumetricLightPass};
