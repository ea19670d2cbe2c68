use thiserror::Error;

use crate::graph::Stage;

/// Errors raised while setting up or driving the compute devices.
///
/// Setup errors are fatal for the render that hit them; nothing is retried.
#[derive(Error, Debug)]
pub enum GpuError {
    #[error("No compute devices found")]
    NoDevices,

    #[error("Backend '{0}' is not compiled into this build")]
    BackendUnavailable(&'static str),

    #[error("Kernel program failed to build on {platform}:\n{log}")]
    ProgramBuild { platform: String, log: String },

    #[error("Kernel entry point '{}' is missing or invalid: {message}", .stage.entry_point())]
    MissingEntryPoint { stage: Stage, message: String },

    #[cfg(feature = "wgpu")]
    #[error("Device request failed: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[cfg(feature = "wgpu")]
    #[error("Buffer map failed: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),

    #[error("Readback failed: {0}")]
    Readback(String),

    #[error("Seed pool holds {found} seeds, {expected} required")]
    SeedPool { expected: usize, found: usize },

    #[error("Texture atlas of {bytes} bytes exceeds the 32-bit offset range")]
    AtlasOverflow { bytes: usize },

    #[error("Stage graph violates the wavefront ordering: {0}")]
    Schedule(String),

    #[error("Device thread for '{0}' panicked")]
    DeviceThread(String),

    #[error("No scene loaded")]
    NoScene,

    #[error(transparent)]
    Scene(#[from] lumen_core::SceneError),
}

pub type GpuResult<T> = Result<T, GpuError>;
