use std::fmt;

use serde::Serialize;

use crate::error::{SentechError, SentechResult};

/// Default capture timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u32 = 1000;

/// Preview pixel formats supported by the frame buffer. Discriminants are the device codes.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PixelFormat {
    Mono8 = 1,
    Bgr24 = 4,
    Bgr32 = 8,
}

impl PixelFormat {
    pub const ALL: [PixelFormat; 3] = [PixelFormat::Mono8, PixelFormat::Bgr24, PixelFormat::Bgr32];

    pub fn from_raw(value: u32) -> Option<Self> {
        match value {
            1 => Some(PixelFormat::Mono8),
            4 => Some(PixelFormat::Bgr24),
            8 => Some(PixelFormat::Bgr32),
            _ => None,
        }
    }

    /// Like [`PixelFormat::from_raw`], but unknown codes are an [`SentechError::InvalidFormat`].
    pub fn try_from_code(value: u32) -> SentechResult<Self> {
        Self::from_raw(value).ok_or(SentechError::InvalidFormat(value))
    }

    pub fn as_raw(self) -> u32 {
        self as u32
    }

    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Mono8 => 1,
            PixelFormat::Bgr24 => 3,
            PixelFormat::Bgr32 => 4,
        }
    }

    /// Same as bytes per pixel: every format is 8 bits per channel.
    pub fn channels(self) -> usize {
        self.bytes_per_pixel()
    }
}

impl TryFrom<u32> for PixelFormat {
    type Error = SentechError;

    fn try_from(value: u32) -> SentechResult<Self> {
        Self::try_from_code(value)
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PixelFormat::Mono8 => "Mono8",
            PixelFormat::Bgr24 => "BGR24",
            PixelFormat::Bgr32 => "BGR32",
        };
        f.write_str(name)
    }
}

/// Hardware identification reported by `StCam_GetCameraVersion`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CameraVersion {
    pub usb_vendor_id: u16,
    pub usb_product_id: u16,
    pub fpga_version: u16,
    pub firm_version: u16,
}

/// Driver file and product versions reported by `StCam_GetDriverVersion`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DriverVersion {
    pub file_version_ms: u32,
    pub file_version_ls: u32,
    pub product_version_ms: u32,
    pub product_version_ls: u32,
}

impl DriverVersion {
    /// `"<ms>.<ls>"` for the file version.
    pub fn file_version(&self) -> String {
        format!("{}.{}", self.file_version_ms, self.file_version_ls)
    }

    pub fn product_version(&self) -> String {
        format!("{}.{}", self.product_version_ms, self.product_version_ls)
    }
}
