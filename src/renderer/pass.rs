use glam::Mat4;

use crate::error::RenderError;
use crate::gpu::GpuContext;
use crate::renderer::RenderContext;
use crate::scene::SceneObjects;

/// One stage of a [`crate::renderer::RenderPipeline`].
///
/// Passes allocate their GPU targets lazily on the first `execute`. Only
/// shadow-style passes return `Some(matrix)`; the pipeline then makes it the
/// light-space matrix of every later pass in the same frame.
///
/// `G` is the GPU handle the pass renders with. Real passes use
/// [`GpuContext`]; the parameter exists so pipeline behaviour can be
/// exercised without a device.
pub trait RenderPass<G = GpuContext> {
    fn name(&self) -> &str;

    fn is_enabled(&self) -> bool;

    fn set_enabled(&mut self, enabled: bool);

    fn execute(
        &mut self,
        gpu: &G,
        context: &RenderContext<'_>,
        objects: &mut dyn SceneObjects,
    ) -> Result<Option<Mat4>, RenderError>;

    /// Releases every GPU resource the pass created. Calling it again is a
    /// no-op; a later `execute` allocates afresh.
    fn dispose(&mut self);

    /// The texture view this pass produces for consumers outside the
    /// pipeline, if any.
    fn output(&self) -> Option<wgpu::TextureView> {
        None
    }
}

/// Name and enabled flag every pass carries.
#[derive(Clone, Debug)]
pub struct PassState {
    name: String,
    enabled: bool,
}

impl PassState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            log::debug!(
                "{} {}",
                self.name,
                if enabled { "enabled" } else { "disabled" }
            );
        }
        self.enabled = enabled;
    }
}

/// Forwards the bookkeeping half of [`RenderPass`] to a `state: PassState`
/// field.
macro_rules! pass_state_accessors {
    () => {
        fn name(&self) -> &str {
            self.state.name()
        }

        fn is_enabled(&self) -> bool {
            self.state.is_enabled()
        }

        fn set_enabled(&mut self, enabled: bool) {
            self.state.set_enabled(enabled);
        }
    };
}

pub(crate) use pass_state_accessors;
