use thiserror::Error;

/// Errors raised by the render pipeline.
///
/// Target and shader failures are fatal: they surface from the first
/// `execute` of the offending pass and abort the frame. The precondition
/// variants report passes that were registered before the light or probe
/// they point at.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("{pass}: render target is incomplete: {message}")]
    IncompleteTarget { pass: String, message: String },

    #[error("shader `{label}` failed to build: {message}")]
    Shader { label: String, message: String },

    #[error("{pass}: no point light registered at index {index}")]
    MissingLight { pass: String, index: usize },

    #[error("{pass}: no reflection probe registered at index {index}")]
    MissingProbe { pass: String, index: usize },

    #[error("failed to find a graphics adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),

    #[error("failed to create a graphics device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
}

impl RenderError {
    /// True for conditions that indicate a broken configuration rather than
    /// a missing registration.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            RenderError::MissingLight { .. } | RenderError::MissingProbe { .. }
        )
    }
}
