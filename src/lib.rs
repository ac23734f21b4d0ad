pub mod camera;
pub mod common;
pub mod error;
pub mod frame;
pub mod method;
pub mod system;

pub use sentech_sys as bindings;

// Re-export main types for convenience
pub use crate::camera::Camera;
pub use crate::common::{CameraVersion, DEFAULT_TIMEOUT_MS, DriverVersion, PixelFormat};
pub use crate::error::{SentechError, SentechResult};
pub use crate::frame::Frame;
pub use crate::method::{BoundMethod, CameraHandle};
pub use crate::system::System;
pub use sentech_sys::{SdkConfig, Value};
