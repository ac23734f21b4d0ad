//! Entry point: loads the SDK once and hands out cameras.

use std::sync::Arc;

use sentech_sys::{BindingTable, NativeArg, SdkConfig, Value};

use crate::camera::Camera;
use crate::error::{SentechError, SentechResult};

const COUNT: &str = "StCam_CameraCount";

/// Loaded SDK shared by every camera opened from it.
#[derive(Debug, Clone)]
pub struct System {
    table: Arc<BindingTable>,
}

impl System {
    /// Loads the SDK described by `config`.
    pub fn new(config: &SdkConfig) -> SentechResult<Self> {
        Ok(Self::with_bindings(Arc::new(sentech_sys::load(config)?)))
    }

    /// Loads the SDK found through `SENTECHPATH`.
    pub fn from_env() -> SentechResult<Self> {
        Self::new(&SdkConfig::default())
    }

    /// Wraps an already built binding table.
    pub fn with_bindings(table: Arc<BindingTable>) -> Self {
        Self { table }
    }

    pub fn bindings(&self) -> &Arc<BindingTable> {
        &self.table
    }

    /// Number of connected cameras.
    pub fn camera_count(&self) -> SentechResult<u32> {
        // SAFETY: the reserved argument must be null.
        let count = unsafe {
            self.table
                .call(COUNT, &mut [NativeArg::Value(Value::null())])
        }?;
        count.as_u32().ok_or_else(|| {
            SentechError::Binding(sentech_sys::Error::Argument {
                function: COUNT.to_string(),
                message: format!("expected a camera count, got {count:?}"),
            })
        })
    }

    /// Opens the camera at `index` (0-based).
    pub fn open_camera(&self, index: u32) -> SentechResult<Camera> {
        Camera::open(Arc::clone(&self.table), index)
    }
}
