//! Error handling for the Sentech camera wrapper

use std::ffi::c_void;
use std::path::PathBuf;

use sentech_sys::{BindingTable, NativeArg, Value};

/// Result type for camera operations
pub type SentechResult<T> = Result<T, SentechError>;

/// Native entry point queried for the code behind a failed call.
pub const LAST_ERROR_FUNCTION: &str = "StCam_GetLastError";

/// Errors that can occur when working with a Sentech camera
#[derive(Debug, thiserror::Error)]
pub enum SentechError {
    /// Locating, loading or calling into the SDK failed
    #[error(transparent)]
    Binding(#[from] sentech_sys::Error),
    /// A `BOOL` entry point reported failure
    #[error("{function} failed: {message}")]
    Device {
        function: String,
        code: Option<u32>,
        message: String,
    },
    /// Pixel format code outside the supported set
    #[error("Invalid pixel format code {0}, expected one of 1 (Mono8), 4 (BGR24), 8 (BGR32)")]
    InvalidFormat(u32),
    /// The native image save call failed
    #[error("Couldn't save file to: {}", path.display())]
    BufferIo { path: PathBuf },
    /// Payload too small for the declared geometry
    #[error("Payload of {payload_size} bytes can't hold a {width}x{height} image at {bytes_per_pixel} bytes per pixel")]
    Geometry {
        width: u32,
        height: u32,
        bytes_per_pixel: usize,
        payload_size: usize,
    },
    /// No bound method with that name on this camera
    #[error("Unknown camera method: {0}")]
    UnknownMethod(String),
    /// The camera or frame was already released
    #[error("Camera has been released")]
    Released,
    /// The device-open call returned an invalid handle
    #[error("Couldn't open camera {index}")]
    OpenFailed { index: u32 },
}

impl SentechError {
    /// Builds a device error for `function`, querying the last native error code of `handle`.
    ///
    /// The query itself never fails: if it can't be made the code is left unknown.
    pub fn from_last_error(handle: *mut c_void, table: &BindingTable, function: &str) -> Self {
        // SAFETY: `StCam_GetLastError` only reads the handle it is given.
        let code = unsafe { table.call(LAST_ERROR_FUNCTION, &mut [NativeArg::Value(Value::Ptr(handle))]) }
            .ok()
            .and_then(|v| v.as_u32());
        let message = match code {
            Some(code) => format!("error code {code}"),
            None => "unknown error".to_string(),
        };
        SentechError::Device {
            function: function.to_string(),
            code,
            message,
        }
    }

    /// Native error code carried by a device error.
    pub fn code(&self) -> Option<u32> {
        match self {
            SentechError::Device { code, .. } => *code,
            _ => None,
        }
    }
}

impl From<std::ffi::NulError> for SentechError {
    fn from(err: std::ffi::NulError) -> Self {
        SentechError::Binding(sentech_sys::Error::Nul(err))
    }
}
