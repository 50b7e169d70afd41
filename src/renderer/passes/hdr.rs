// src/renderer/passes/hdr.rs

use std::cell::Cell;
use std::rc::Rc;

use glam::{Mat4, UVec2};

use crate::error::RenderError;
use crate::gpu::GpuContext;
use crate::renderer::pass::pass_state_accessors;
use crate::renderer::resources::{RenderTexture, TextureSlot, DEPTH_FORMAT, HDR_FORMAT};
use crate::renderer::{PassState, RenderContext, RenderPass};
use crate::scene::{DrawTarget, SceneObjects};

const SCENE_FORMATS: [wgpu::TextureFormat; 1] = [HDR_FORMAT];
const SCENE_BRIGHT_FORMATS: [wgpu::TextureFormat; 2] = [HDR_FORMAT, HDR_FORMAT];

/// Where the scene capture passes publish their textures.
///
/// The plain and the bloom capture pass share one set, so consumers read
/// whichever of them ran this frame.
#[derive(Clone, Default)]
pub struct CaptureSlots {
    pub color: TextureSlot,
    pub bright: TextureSlot,
    pub depth: TextureSlot,
}

impl CaptureSlots {
    pub fn clear(&self) {
        self.color.clear();
        self.bright.clear();
        self.depth.clear();
    }
}

/// Attachments a capture pass allocates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureLayout {
    /// Drawing straight into the backbuffer: only the depth buffer is owned.
    DepthOnly,
    Color,
    ColorBright,
}

impl CaptureLayout {
    /// Layout of the plain HDR capture for the given HDR setting.
    pub fn for_hdr(hdr: bool) -> Self {
        if hdr {
            CaptureLayout::Color
        } else {
            CaptureLayout::DepthOnly
        }
    }

    pub fn has_color(self) -> bool {
        self != CaptureLayout::DepthOnly
    }

    pub fn has_bright(self) -> bool {
        self == CaptureLayout::ColorBright
    }
}

struct CaptureTargets {
    layout: CaptureLayout,
    color: Option<RenderTexture>,
    bright: Option<RenderTexture>,
    depth: RenderTexture,
}

impl CaptureTargets {
    fn new(
        gpu: &GpuContext,
        pass: &str,
        size: UVec2,
        layout: CaptureLayout,
    ) -> Result<Self, RenderError> {
        let targets = gpu.validated(pass, |device| CaptureTargets {
            layout,
            color: layout
                .has_color()
                .then(|| RenderTexture::color_2d(device, "SceneColor", size, HDR_FORMAT)),
            bright: layout
                .has_bright()
                .then(|| RenderTexture::color_2d(device, "SceneBright", size, HDR_FORMAT)),
            depth: RenderTexture::depth_2d(device, "SceneDepth", size),
        })?;
        log::info!("{pass}: allocated {}x{} {:?} targets", size.x, size.y, layout);
        Ok(targets)
    }

    fn size(&self) -> UVec2 {
        self.depth.size()
    }

    fn release(self) {
        if let Some(color) = self.color {
            color.release();
        }
        if let Some(bright) = self.bright {
            bright.release();
        }
        self.depth.release();
    }
}

fn render_size(context: &RenderContext<'_>) -> UVec2 {
    UVec2::new(context.camera.render_width, context.camera.render_height).max(UVec2::ONE)
}

/// Allocates on first use and again whenever the viewport size or the
/// layout changed.
fn ensure_targets<'t>(
    slot: &'t mut Option<CaptureTargets>,
    gpu: &GpuContext,
    pass: &str,
    size: UVec2,
    layout: CaptureLayout,
) -> Result<&'t CaptureTargets, RenderError> {
    let targets = match slot.take() {
        Some(targets) if targets.size() == size && targets.layout == layout => targets,
        Some(stale) => {
            log::info!(
                "{pass}: targets changed from {:?} {:?} to {:?} {:?}, reallocating",
                stale.size(),
                stale.layout,
                size,
                layout
            );
            stale.release();
            CaptureTargets::new(gpu, pass, size, layout)?
        }
        None => CaptureTargets::new(gpu, pass, size, layout)?,
    };
    Ok(slot.insert(targets))
}

fn draw_scene(
    gpu: &GpuContext,
    context: &RenderContext<'_>,
    objects: &mut dyn SceneObjects,
    label: &str,
    colors: &[&wgpu::TextureView],
    target: DrawTarget<'_>,
    depth: &wgpu::TextureView,
) {
    let sky = context.world.sky_color();
    let attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = colors
        .iter()
        .enumerate()
        .map(|(index, &view)| {
            Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    // Only the scene colour starts from the sky.
                    load: wgpu::LoadOp::Clear(if index == 0 { sky } else { wgpu::Color::BLACK }),
                    store: wgpu::StoreOp::Store,
                },
            })
        })
        .collect();

    let mut encoder = gpu.create_encoder(label);
    {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &attachments,
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        objects.render_all(&gpu.queue, &mut pass, &target, context);
    }
    gpu.submit(encoder);
}

/// Shared on/off flag for HDR rendering of an [`HdrRenderPass`].
///
/// Clones observe the same flag, so the switch stays usable after the pass
/// has been boxed into a pipeline.
#[derive(Clone, Debug)]
pub struct HdrSwitch(Rc<Cell<bool>>);

impl HdrSwitch {
    pub fn new(hdr: bool) -> Self {
        Self(Rc::new(Cell::new(hdr)))
    }

    pub fn is_hdr(&self) -> bool {
        self.0.get()
    }

    pub fn set_hdr(&self, hdr: bool) {
        self.0.set(hdr);
    }
}

impl Default for HdrSwitch {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Renders the scene into a floating-point colour target.
///
/// With HDR turned off the scene is drawn straight into the backbuffer and
/// nothing is published.
pub struct HdrRenderPass {
    state: PassState,
    hdr: HdrSwitch,
    targets: Option<CaptureTargets>,
    slots: CaptureSlots,
}

impl HdrRenderPass {
    pub fn new(slots: CaptureSlots) -> Self {
        Self {
            state: PassState::new("HdrPass"),
            hdr: HdrSwitch::default(),
            targets: None,
            slots,
        }
    }

    pub fn is_hdr(&self) -> bool {
        self.hdr.is_hdr()
    }

    pub fn set_hdr(&mut self, hdr: bool) {
        self.hdr.set_hdr(hdr);
    }

    /// Handle that toggles HDR after the pass has been added to a pipeline.
    pub fn hdr_switch(&self) -> HdrSwitch {
        self.hdr.clone()
    }

    pub fn slots(&self) -> &CaptureSlots {
        &self.slots
    }
}

impl RenderPass for HdrRenderPass {
    pass_state_accessors!();

    fn execute(
        &mut self,
        gpu: &GpuContext,
        context: &RenderContext<'_>,
        objects: &mut dyn SceneObjects,
    ) -> Result<Option<Mat4>, RenderError> {
        let hdr = self.hdr.is_hdr();
        let size = render_size(context);

        if !hdr {
            let Some(backbuffer) = context.backbuffer else {
                log::warn!("{}: no backbuffer to draw into, skipping", self.state.name());
                return Ok(None);
            };
            let targets = ensure_targets(
                &mut self.targets,
                gpu,
                self.state.name(),
                size,
                CaptureLayout::for_hdr(false),
            )?;
            let formats = [gpu.surface_format];
            let target = DrawTarget {
                color_formats: &formats,
                depth_format: Some(DEPTH_FORMAT),
                front_face: wgpu::FrontFace::Ccw,
            };
            draw_scene(
                gpu,
                context,
                objects,
                "HdrPassDirect",
                &[backbuffer],
                target,
                targets.depth.view(),
            );
            return Ok(None);
        }

        let targets = ensure_targets(
            &mut self.targets,
            gpu,
            self.state.name(),
            size,
            CaptureLayout::for_hdr(true),
        )?;
        let Some(color) = targets.color.as_ref().map(RenderTexture::view) else {
            return Err(RenderError::IncompleteTarget {
                pass: self.state.name().to_owned(),
                message: "scene colour attachment missing".into(),
            });
        };

        let target = DrawTarget {
            color_formats: &SCENE_FORMATS,
            depth_format: Some(DEPTH_FORMAT),
            front_face: wgpu::FrontFace::Ccw,
        };
        draw_scene(
            gpu,
            context,
            objects,
            "HdrPass",
            &[color],
            target,
            targets.depth.view(),
        );

        let frame = context.frame_index;
        self.slots.color.publish(frame, color.clone());
        self.slots.depth.publish(frame, targets.depth.view().clone());
        Ok(None)
    }

    fn dispose(&mut self) {
        if let Some(targets) = self.targets.take() {
            targets.release();
        }
        self.slots.clear();
    }

    fn output(&self) -> Option<wgpu::TextureView> {
        let color = self.targets.as_ref()?.color.as_ref()?;
        Some(color.view().clone())
    }
}

/// Scene capture with a second attachment receiving the bright pass.
///
/// Material shaders write the full colour to location 0 and the part above
/// the bloom threshold to location 1.
pub struct BloomRenderPass {
    state: PassState,
    targets: Option<CaptureTargets>,
    slots: CaptureSlots,
}

impl BloomRenderPass {
    pub fn new(slots: CaptureSlots) -> Self {
        Self {
            state: PassState::new("BloomCapturePass"),
            targets: None,
            slots,
        }
    }

    pub fn slots(&self) -> &CaptureSlots {
        &self.slots
    }
}

impl RenderPass for BloomRenderPass {
    pass_state_accessors!();

    fn execute(
        &mut self,
        gpu: &GpuContext,
        context: &RenderContext<'_>,
        objects: &mut dyn SceneObjects,
    ) -> Result<Option<Mat4>, RenderError> {
        let size = render_size(context);
        let targets = ensure_targets(
            &mut self.targets,
            gpu,
            self.state.name(),
            size,
            CaptureLayout::ColorBright,
        )?;
        let (Some(color), Some(bright)) = (targets.color.as_ref(), targets.bright.as_ref()) else {
            return Err(RenderError::IncompleteTarget {
                pass: self.state.name().to_owned(),
                message: "colour or bright attachment missing".into(),
            });
        };

        let target = DrawTarget {
            color_formats: &SCENE_BRIGHT_FORMATS,
            depth_format: Some(DEPTH_FORMAT),
            front_face: wgpu::FrontFace::Ccw,
        };
        draw_scene(
            gpu,
            context,
            objects,
            "BloomCapturePass",
            &[color.view(), bright.view()],
            target,
            targets.depth.view(),
        );

        let frame = context.frame_index;
        self.slots.color.publish(frame, color.view().clone());
        self.slots.bright.publish(frame, bright.view().clone());
        self.slots.depth.publish(frame, targets.depth.view().clone());
        Ok(None)
    }

    fn dispose(&mut self) {
        if let Some(targets) = self.targets.take() {
            targets.release();
        }
        self.slots.clear();
    }

    fn output(&self) -> Option<wgpu::TextureView> {
        let color = self.targets.as_ref()?.color.as_ref()?;
        Some(color.view().clone())
    }
}
