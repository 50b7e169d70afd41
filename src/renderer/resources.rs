use std::cell::RefCell;
use std::rc::Rc;

use glam::UVec2;

pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

const CUBE_FACES: u32 = 6;

/// An owned GPU texture and the views the passes render to or sample from.
///
/// `view` covers the whole resource (a `Cube` view for cube textures);
/// `layer_views` holds one 2D view per array layer so a single face can be
/// used as an attachment. The texture is destroyed by [`RenderTexture::release`]
/// or when the wrapper is dropped.
pub struct RenderTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    layer_views: Vec<wgpu::TextureView>,
    size: UVec2,
    format: wgpu::TextureFormat,
}

impl RenderTexture {
    pub fn color_2d(
        device: &wgpu::Device,
        label: &str,
        size: UVec2,
        format: wgpu::TextureFormat,
    ) -> Self {
        Self::new_2d(
            device,
            label,
            size,
            format,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        )
    }

    pub fn depth_2d(device: &wgpu::Device, label: &str, size: UVec2) -> Self {
        Self::new_2d(
            device,
            label,
            size,
            DEPTH_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        )
    }

    /// Image written by compute shaders and sampled afterwards.
    pub fn storage_2d(
        device: &wgpu::Device,
        label: &str,
        size: UVec2,
        format: wgpu::TextureFormat,
    ) -> Self {
        Self::new_2d(
            device,
            label,
            size,
            format,
            wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING,
        )
    }

    pub fn color_cube(
        device: &wgpu::Device,
        label: &str,
        face_size: u32,
        format: wgpu::TextureFormat,
    ) -> Self {
        Self::new_cube(device, label, face_size, format)
    }

    pub fn depth_cube(device: &wgpu::Device, label: &str, face_size: u32) -> Self {
        Self::new_cube(device, label, face_size, DEPTH_FORMAT)
    }

    /// 1x1 texture filled with `rgba`, bound where an optional input is
    /// absent.
    pub fn fallback(device: &wgpu::Device, queue: &wgpu::Queue, label: &str, rgba: [u8; 4]) -> Self {
        let texture = Self::new_2d(
            device,
            label,
            UVec2::ONE,
            wgpu::TextureFormat::Rgba8Unorm,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        );
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4),
                rows_per_image: Some(1),
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        texture
    }

    fn new_2d(
        device: &wgpu::Device,
        label: &str,
        size: UVec2,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let size = size.max(UVec2::ONE);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size.x,
                height: size.y,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            layer_views: Vec::new(),
            size,
            format,
        }
    }

    fn new_cube(
        device: &wgpu::Device,
        label: &str,
        face_size: u32,
        format: wgpu::TextureFormat,
    ) -> Self {
        let face_size = face_size.max(1);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: face_size,
                height: face_size,
                depth_or_array_layers: CUBE_FACES,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(&format!("{label}CubeView")),
            format: Some(format),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            aspect: wgpu::TextureAspect::All,
            base_array_layer: 0,
            array_layer_count: Some(CUBE_FACES),
            ..Default::default()
        });

        let layer_views = (0..CUBE_FACES)
            .map(|layer| {
                texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some(&format!("{label}Face{layer}")),
                    format: Some(format),
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    aspect: wgpu::TextureAspect::All,
                    base_array_layer: layer,
                    array_layer_count: Some(1),
                    ..Default::default()
                })
            })
            .collect();

        Self {
            texture,
            view,
            layer_views,
            size: UVec2::splat(face_size),
            format,
        }
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    /// View of a single array layer (cube face).
    pub fn layer_view(&self, layer: usize) -> &wgpu::TextureView {
        match self.layer_views.get(layer) {
            Some(view) => view,
            None => {
                log::warn!(
                    "Layer {} requested from a texture with {} layers, using the full view",
                    layer,
                    self.layer_views.len()
                );
                &self.view
            }
        }
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn size(&self) -> UVec2 {
        self.size
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// Frees the GPU memory now rather than when the last view is dropped.
    pub fn release(self) {
        self.texture.destroy();
    }
}

/// A handle published by the pass that owns it for later passes to sample.
///
/// Each publication is stamped with the frame index it belongs to, so a
/// consumer can tell a handle produced this frame from a stale one.
/// Clones share the same cell; ownership of the underlying resource stays
/// with the producer.
pub struct FrameSlot<T> {
    inner: Rc<RefCell<Option<(u64, T)>>>,
}

impl<T> Clone for FrameSlot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Default for FrameSlot<T> {
    fn default() -> Self {
        Self {
            inner: Rc::new(RefCell::new(None)),
        }
    }
}

impl<T: Clone> FrameSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, frame: u64, value: T) {
        *self.inner.borrow_mut() = Some((frame, value));
    }

    /// The value if it was published during `frame`.
    pub fn current(&self, frame: u64) -> Option<T> {
        match &*self.inner.borrow() {
            Some((published, value)) if *published == frame => Some(value.clone()),
            _ => None,
        }
    }

    /// The most recent value regardless of frame.
    pub fn latest(&self) -> Option<T> {
        self.inner.borrow().as_ref().map(|(_, value)| value.clone())
    }

    pub fn clear(&self) {
        self.inner.borrow_mut().take();
    }
}

pub type TextureSlot = FrameSlot<wgpu::TextureView>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_only_reports_current_frame() {
        let producer: FrameSlot<u32> = FrameSlot::new();
        let consumer = producer.clone();

        assert_eq!(consumer.current(0), None);
        producer.publish(3, 42);
        assert_eq!(consumer.current(3), Some(42));
        assert_eq!(consumer.current(4), None);
        assert_eq!(consumer.latest(), Some(42));

        producer.clear();
        assert_eq!(consumer.latest(), None);
    }
}
