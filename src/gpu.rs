use crate::error::RenderError;

/// The single native graphics context the pipeline renders with.
///
/// Owns the device and queue; `surface_format` is the format of the
/// backbuffer views handed to the pipeline each frame.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub surface_format: wgpu::TextureFormat,
}

impl GpuContext {
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        surface_format: wgpu::TextureFormat,
    ) -> Self {
        Self {
            device,
            queue,
            surface_format,
        }
    }

    /// Requests an adapter and device without a surface.
    pub async fn headless(surface_format: wgpu::TextureFormat) -> Result<Self, RenderError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await?;

        log::info!("Using adapter: {:?}", adapter.get_info());
        log::info!("Using backend: {:?}", adapter.get_info().backend);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await?;

        Ok(Self::new(device, queue, surface_format))
    }

    /// Runs `build` inside a validation error scope.
    ///
    /// Any validation error reported while allocating the targets means the
    /// attachment set can never be rendered to, so it is returned as
    /// [`RenderError::IncompleteTarget`].
    pub fn validated<T>(
        &self,
        pass: &str,
        build: impl FnOnce(&wgpu::Device) -> T,
    ) -> Result<T, RenderError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = build(&self.device);
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(err) => {
                log::error!("{pass}: target allocation failed: {err}");
                Err(RenderError::IncompleteTarget {
                    pass: pass.to_owned(),
                    message: err.to_string(),
                })
            }
            None => Ok(value),
        }
    }

    /// Like [`GpuContext::validated`] but for shader modules and pipelines.
    pub fn compiled<T>(
        &self,
        label: &str,
        build: impl FnOnce(&wgpu::Device) -> T,
    ) -> Result<T, RenderError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = build(&self.device);
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(err) => {
                log::error!("Shader {label} failed to build: {err}");
                Err(RenderError::Shader {
                    label: label.to_owned(),
                    message: err.to_string(),
                })
            }
            None => Ok(value),
        }
    }

    pub fn create_encoder(&self, label: &str) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }

    /// Finishes and submits one encoder. Commands of the next pass are
    /// ordered after these on the queue.
    pub fn submit(&self, encoder: wgpu::CommandEncoder) {
        self.queue.submit(Some(encoder.finish()));
    }
}
