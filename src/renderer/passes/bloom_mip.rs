use std::cell::RefCell;
use std::rc::Rc;

use glam::UVec2;

use crate::error::RenderError;
use crate::gpu::GpuContext;
use crate::renderer::resources::{RenderTexture, HDR_FORMAT};

/// Resolutions of a bloom chain starting at `base`, halving (rounding
/// down) per level.
///
/// Returns fewer than `levels` entries when a further level would have a
/// zero dimension.
pub fn mip_sizes(base: UVec2, levels: usize) -> Vec<UVec2> {
    let mut sizes = Vec::with_capacity(levels);
    let mut size = base;
    for level in 0..levels {
        if size.x == 0 || size.y == 0 {
            log::warn!(
                "Bloom chain stops at {} of {} levels: {}x{} cannot be halved further",
                level,
                levels,
                base.x,
                base.y
            );
            break;
        }
        sizes.push(size);
        size /= 2;
    }
    sizes
}

/// One level of the chain.
pub struct BloomMip {
    texture: RenderTexture,
}

impl BloomMip {
    pub fn size(&self) -> UVec2 {
        self.texture.size()
    }

    pub fn view(&self) -> &wgpu::TextureView {
        self.texture.view()
    }
}

/// Progressively smaller HDR targets shared by the downsample and upsample
/// passes.
#[derive(Default)]
pub struct BloomMipChain {
    mips: Vec<BloomMip>,
    base: UVec2,
    levels: usize,
}

pub type SharedMipChain = Rc<RefCell<BloomMipChain>>;

impl BloomMipChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedMipChain {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Allocates the chain for `base` unless it already matches.
    pub fn ensure(
        &mut self,
        gpu: &GpuContext,
        pass: &str,
        base: UVec2,
        levels: usize,
    ) -> Result<(), RenderError> {
        if !self.mips.is_empty() && self.base == base && self.levels == levels {
            return Ok(());
        }
        self.release();

        let sizes = mip_sizes(base, levels);
        let mips = gpu.validated(pass, |device| {
            sizes
                .iter()
                .enumerate()
                .map(|(level, size)| BloomMip {
                    texture: RenderTexture::color_2d(
                        device,
                        &format!("BloomMip{level}"),
                        *size,
                        HDR_FORMAT,
                    ),
                })
                .collect::<Vec<_>>()
        })?;

        log::info!(
            "{pass}: allocated {} bloom mips from {}x{}",
            mips.len(),
            base.x,
            base.y
        );
        self.mips = mips;
        self.base = base;
        self.levels = levels;
        Ok(())
    }

    pub fn is_allocated(&self) -> bool {
        !self.mips.is_empty()
    }

    pub fn len(&self) -> usize {
        self.mips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mips.is_empty()
    }

    pub fn mip(&self, index: usize) -> Option<&BloomMip> {
        self.mips.get(index)
    }

    pub fn mips(&self) -> &[BloomMip] {
        &self.mips
    }

    /// Opens a render pass whose only colour attachment is mip `index`.
    ///
    /// The returned pass borrows the encoder, so no other mip can be bound
    /// until it is dropped.
    pub fn begin_mip<'e>(
        &self,
        encoder: &'e mut wgpu::CommandEncoder,
        index: usize,
        load: wgpu::LoadOp<wgpu::Color>,
    ) -> Option<wgpu::RenderPass<'e>> {
        let mip = self.mips.get(index)?;
        Some(encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("BloomMip"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: mip.view(),
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        }))
    }

    pub fn release(&mut self) {
        for mip in self.mips.drain(..) {
            mip.texture.release();
        }
        self.base = UVec2::ZERO;
        self.levels = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_halve_with_floor() {
        let sizes = mip_sizes(UVec2::new(640, 360), 5);
        assert_eq!(
            sizes,
            vec![
                UVec2::new(640, 360),
                UVec2::new(320, 180),
                UVec2::new(160, 90),
                UVec2::new(80, 45),
                UVec2::new(40, 22),
            ]
        );
    }

    #[test]
    fn chain_stops_before_zero_dimension() {
        let sizes = mip_sizes(UVec2::new(8, 3), 6);
        assert_eq!(sizes, vec![UVec2::new(8, 3), UVec2::new(4, 1)]);
    }

    #[test]
    fn empty_base_yields_no_levels() {
        assert!(mip_sizes(UVec2::new(0, 100), 4).is_empty());
        assert!(mip_sizes(UVec2::new(64, 64), 0).is_empty());
    }

    #[test]
    fn new_chain_is_unallocated() {
        let chain = BloomMipChain::shared();
        assert!(!chain.borrow().is_allocated());
        assert!(chain.borrow().mip(0).is_none());
    }
}
