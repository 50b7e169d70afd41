use crate::renderer::RenderContext;

/// The attachment set a collaborator is drawing into.
///
/// Material pipelines must be built for exactly these color formats (in
/// order), this depth format and this winding. Cube faces are rendered with
/// a Y-flipped projection and therefore report [`wgpu::FrontFace::Cw`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawTarget<'a> {
    pub color_formats: &'a [wgpu::TextureFormat],
    pub depth_format: Option<wgpu::TextureFormat>,
    pub front_face: wgpu::FrontFace,
}

/// Depth-only program handed to [`SceneObjects::render_depth`].
///
/// The pipeline expects vertex slot 0 to hold [`crate::renderer::Vertex`]
/// data and slot 1 per-instance [`crate::renderer::ModelInstance`] model
/// matrices. Bind group 0 belongs to the pass.
pub struct DepthShader<'a> {
    pipeline: &'a wgpu::RenderPipeline,
    bind_group: &'a wgpu::BindGroup,
}

impl<'a> DepthShader<'a> {
    pub fn new(pipeline: &'a wgpu::RenderPipeline, bind_group: &'a wgpu::BindGroup) -> Self {
        Self {
            pipeline,
            bind_group,
        }
    }

    /// Binds the program and the pass's view uniforms.
    pub fn bind(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(self.pipeline);
        pass.set_bind_group(0, self.bind_group, &[]);
    }
}

/// The opaque object collection the pipeline draws.
pub trait SceneObjects {
    /// Draws every visible object with its own material, updating the
    /// object's lighting uniforms from `context` as needed.
    fn render_all(
        &mut self,
        queue: &wgpu::Queue,
        pass: &mut wgpu::RenderPass<'_>,
        target: &DrawTarget<'_>,
        context: &RenderContext<'_>,
    );

    /// Draws every object's geometry with `shader` bound.
    fn render_depth(&mut self, pass: &mut wgpu::RenderPass<'_>, shader: &DepthShader<'_>);
}
