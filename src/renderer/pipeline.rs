// src/renderer/pipeline.rs

use glam::Mat4;

use crate::error::RenderError;
use crate::gpu::GpuContext;
use crate::renderer::{RenderContext, RenderPass};
use crate::scene::SceneObjects;

/// Index of a pass inside a [`RenderPipeline`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PassHandle(usize);

impl PassHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Distinguished passes the pipeline keeps a reference to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassRole {
    /// Plain HDR scene capture.
    Hdr,
    /// Scene capture with a bright-pass attachment.
    Bloom,
    /// Directional shadow pass whose depth texture is exposed.
    Shadow,
}

/// Ordered list of passes executed once per frame.
///
/// Passes run in insertion order. The pipeline threads the light-space
/// matrix returned by a shadow pass into the context seen by every pass
/// after it.
pub struct RenderPipeline<G = GpuContext> {
    passes: Vec<Box<dyn RenderPass<G>>>,
    hdr: Option<PassHandle>,
    bloom: Option<PassHandle>,
    shadow: Option<PassHandle>,
    /// Passes before this index have been disposed.
    disposed: usize,
}

impl<G> Default for RenderPipeline<G> {
    fn default() -> Self {
        Self {
            passes: Vec::new(),
            hdr: None,
            bloom: None,
            shadow: None,
            disposed: 0,
        }
    }
}

impl<G> RenderPipeline<G> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pass(&mut self, pass: Box<dyn RenderPass<G>>) -> PassHandle {
        log::debug!("Adding render pass {} at {}", pass.name(), self.passes.len());
        self.passes.push(pass);
        PassHandle(self.passes.len() - 1)
    }

    /// Appends `pass` and remembers it as the pass playing `role`.
    pub fn add_pass_with_role(&mut self, role: PassRole, pass: Box<dyn RenderPass<G>>) -> PassHandle {
        let handle = self.add_pass(pass);
        let slot = match role {
            PassRole::Hdr => &mut self.hdr,
            PassRole::Bloom => &mut self.bloom,
            PassRole::Shadow => &mut self.shadow,
        };
        if let Some(previous) = slot.replace(handle) {
            log::warn!(
                "{:?} role moved from pass {} to pass {}",
                role,
                previous.index(),
                handle.index()
            );
        }
        handle
    }

    /// Executes every enabled pass in order and returns the light-space
    /// matrix in effect after the last one.
    ///
    /// `context.light_space_matrix` is updated in place whenever a pass
    /// returns a matrix. The first failing pass aborts the frame.
    pub fn render_all(
        &mut self,
        gpu: &G,
        context: &mut RenderContext<'_>,
        objects: &mut dyn SceneObjects,
    ) -> Result<Mat4, RenderError> {
        for pass in self.passes.iter_mut() {
            if !pass.is_enabled() {
                log::trace!("Skipping disabled pass {}", pass.name());
                continue;
            }

            if let Some(light_space) = pass.execute(gpu, context, objects)? {
                context.light_space_matrix = light_space;
            }
        }

        Ok(context.light_space_matrix)
    }

    /// Disposes every pass once, in order. Passes added after an earlier
    /// dispose are disposed by the next call; the others are not touched
    /// again.
    pub fn dispose(&mut self) {
        for pass in self.passes.iter_mut().skip(self.disposed) {
            log::debug!("Disposing {}", pass.name());
            pass.dispose();
        }
        self.disposed = self.passes.len();
    }

    pub fn pass_mut(&mut self, handle: PassHandle) -> Option<&mut (dyn RenderPass<G> + 'static)> {
        self.passes.get_mut(handle.0).map(|pass| pass.as_mut())
    }

    pub fn hdr_pass_mut(&mut self) -> Option<&mut (dyn RenderPass<G> + 'static)> {
        let handle = self.hdr?;
        self.pass_mut(handle)
    }

    pub fn bloom_pass_mut(&mut self) -> Option<&mut (dyn RenderPass<G> + 'static)> {
        let handle = self.bloom?;
        self.pass_mut(handle)
    }

    /// Depth texture of the pass registered with [`PassRole::Shadow`].
    pub fn shadow_depth_texture(&self) -> Option<wgpu::TextureView> {
        let handle = self.shadow?;
        self.passes.get(handle.0)?.output()
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|pass| pass.name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::PassState;
    use crate::scene::{Camera, DepthShader, DrawTarget, Lighting, Sun, World};
    use crate::settings::{BloomSettings, ReflectionSettings};
    use std::cell::RefCell;
    use std::rc::Rc;

    struct NoObjects;

    impl SceneObjects for NoObjects {
        fn render_all(
            &mut self,
            _queue: &wgpu::Queue,
            _pass: &mut wgpu::RenderPass<'_>,
            _target: &DrawTarget<'_>,
            _context: &RenderContext<'_>,
        ) {
        }

        fn render_depth(&mut self, _pass: &mut wgpu::RenderPass<'_>, _shader: &DepthShader<'_>) {}
    }

    type Log = Rc<RefCell<Vec<String>>>;

    struct Recording {
        state: PassState,
        log: Log,
        returns: Option<Mat4>,
        seen: Rc<RefCell<Vec<Mat4>>>,
    }

    impl Recording {
        fn boxed(name: &str, log: &Log, returns: Option<Mat4>) -> Box<Self> {
            Box::new(Self {
                state: PassState::new(name),
                log: Rc::clone(log),
                returns,
                seen: Rc::default(),
            })
        }
    }

    impl RenderPass<()> for Recording {
        crate::renderer::pass::pass_state_accessors!();

        fn execute(
            &mut self,
            _gpu: &(),
            context: &RenderContext<'_>,
            _objects: &mut dyn SceneObjects,
        ) -> Result<Option<Mat4>, RenderError> {
            self.log.borrow_mut().push(format!("execute {}", self.state.name()));
            self.seen.borrow_mut().push(context.light_space_matrix);
            Ok(self.returns)
        }

        fn dispose(&mut self) {
            self.log.borrow_mut().push(format!("dispose {}", self.state.name()));
        }
    }

    struct Failing;

    impl RenderPass<()> for Failing {
        fn name(&self) -> &str {
            "Failing"
        }

        fn is_enabled(&self) -> bool {
            true
        }

        fn set_enabled(&mut self, _enabled: bool) {}

        fn execute(
            &mut self,
            _gpu: &(),
            _context: &RenderContext<'_>,
            _objects: &mut dyn SceneObjects,
        ) -> Result<Option<Mat4>, RenderError> {
            Err(RenderError::IncompleteTarget {
                pass: "Failing".into(),
                message: "test".into(),
            })
        }

        fn dispose(&mut self) {}
    }

    fn with_context<R>(f: impl FnOnce(&mut RenderContext<'_>) -> R) -> R {
        let camera = Camera::default();
        let lighting = Lighting::new(Sun::default());
        let world = World::default();
        let bloom = BloomSettings::default();
        let reflection = ReflectionSettings::default();
        let mut context = RenderContext::new(&camera, &lighting, &world, &bloom, &reflection);
        f(&mut context)
    }

    #[test]
    fn light_space_matrix_flows_to_later_passes() {
        let log = Log::default();
        let shadow_matrix = Mat4::from_scale(glam::Vec3::splat(0.5));

        let mut pipeline = RenderPipeline::<()>::new();
        let first = Recording::boxed("A", &log, None);
        let shadow = Recording::boxed("Shadow", &log, Some(shadow_matrix));
        let last = Recording::boxed("B", &log, None);
        let seen_first = Rc::clone(&first.seen);
        let seen_last = Rc::clone(&last.seen);
        pipeline.add_pass(first);
        pipeline.add_pass_with_role(PassRole::Shadow, shadow);
        pipeline.add_pass(last);

        let result = with_context(|context| {
            let result = pipeline.render_all(&(), context, &mut NoObjects);
            assert_eq!(context.light_space_matrix, shadow_matrix);
            result
        });

        assert_eq!(result.unwrap(), shadow_matrix);
        assert_eq!(seen_first.borrow()[0], Mat4::IDENTITY);
        assert_eq!(seen_last.borrow()[0], shadow_matrix);
        assert_eq!(
            *log.borrow(),
            vec!["execute A", "execute Shadow", "execute B"]
        );
    }

    #[test]
    fn disabled_passes_are_skipped() {
        let log = Log::default();
        let mut pipeline = RenderPipeline::<()>::new();
        pipeline.add_pass(Recording::boxed("A", &log, None));
        let handle = pipeline.add_pass(Recording::boxed("B", &log, None));
        pipeline.add_pass(Recording::boxed("C", &log, None));

        pipeline.pass_mut(handle).unwrap().set_enabled(false);
        with_context(|context| pipeline.render_all(&(), context, &mut NoObjects)).unwrap();

        assert_eq!(*log.borrow(), vec!["execute A", "execute C"]);
    }

    #[test]
    fn first_error_stops_the_frame() {
        let log = Log::default();
        let mut pipeline = RenderPipeline::<()>::new();
        pipeline.add_pass(Recording::boxed("A", &log, None));
        pipeline.add_pass(Box::new(Failing));
        pipeline.add_pass(Recording::boxed("C", &log, None));

        let result = with_context(|context| pipeline.render_all(&(), context, &mut NoObjects));

        assert!(matches!(result, Err(RenderError::IncompleteTarget { .. })));
        assert_eq!(*log.borrow(), vec!["execute A"]);
    }

    #[test]
    fn dispose_runs_once_in_order() {
        let log = Log::default();
        let mut pipeline = RenderPipeline::<()>::new();
        pipeline.add_pass(Recording::boxed("A", &log, None));
        pipeline.add_pass(Recording::boxed("B", &log, None));

        pipeline.dispose();
        pipeline.dispose();

        assert_eq!(*log.borrow(), vec!["dispose A", "dispose B"]);
    }

    #[test]
    fn late_passes_do_not_redispose_earlier_ones() {
        let log = Log::default();
        let mut pipeline = RenderPipeline::<()>::new();
        pipeline.add_pass(Recording::boxed("A", &log, None));
        pipeline.dispose();

        pipeline.add_pass(Recording::boxed("B", &log, None));
        pipeline.dispose();
        pipeline.dispose();

        assert_eq!(*log.borrow(), vec!["dispose A", "dispose B"]);
    }

    #[test]
    fn roles_resolve_to_their_passes() {
        let log = Log::default();
        let mut pipeline = RenderPipeline::<()>::new();
        assert!(pipeline.hdr_pass_mut().is_none());
        assert!(pipeline.shadow_depth_texture().is_none());

        pipeline.add_pass_with_role(PassRole::Shadow, Recording::boxed("Shadow", &log, None));
        pipeline.add_pass_with_role(PassRole::Hdr, Recording::boxed("Hdr", &log, None));
        pipeline.add_pass_with_role(PassRole::Bloom, Recording::boxed("Bloom", &log, None));

        assert_eq!(pipeline.hdr_pass_mut().unwrap().name(), "Hdr");
        assert_eq!(pipeline.bloom_pass_mut().unwrap().name(), "Bloom");
        assert_eq!(pipeline.pass_names(), vec!["Shadow", "Hdr", "Bloom"]);
        assert_eq!(pipeline.len(), 3);
        // Mock passes expose no texture.
        assert!(pipeline.shadow_depth_texture().is_none());
    }
}
