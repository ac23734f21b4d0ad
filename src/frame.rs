//! Frame buffer for raw snapshots.

use std::ffi::c_void;
use std::path::Path;

use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use log::debug;
use ndarray::{ArrayViewD, IxDyn};
use sentech_sys::Value;

use crate::common::PixelFormat;
use crate::error::{SentechError, SentechResult};
use crate::method::BoundMethod;

/// SDK image writer used by [`Frame::save_to_path`].
pub const SAVE_IMAGE: &str = "StCam_SaveImageA";

/// One image buffer sized to the device payload for a fixed geometry and pixel format.
///
/// A frame never changes shape. When the camera's width, height or pixel format
/// changes, the old frame is released and a new one allocated.
#[derive(Debug)]
pub struct Frame {
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
    payload_size: usize,
    buffer: Option<Box<[u8]>>,
    bytes_transferred: u32,
    frame_number: u32,
}

impl Frame {
    /// Allocates a zeroed buffer of exactly `payload_size` bytes.
    pub fn allocate(width: u32, height: u32, payload_size: usize, pixel_format: PixelFormat) -> SentechResult<Self> {
        let needed = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(pixel_format.bytes_per_pixel()));
        if needed.is_none_or(|needed| payload_size < needed) {
            return Err(geometry_error(width, height, pixel_format, payload_size));
        }
        debug!("Allocating {payload_size} byte frame buffer for {width}x{height} {pixel_format}");
        Ok(Frame {
            width,
            height,
            pixel_format,
            payload_size,
            buffer: Some(vec![0u8; payload_size].into_boxed_slice()),
            bytes_transferred: 0,
            frame_number: 0,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    /// Size of the buffer in bytes, as reported by the device.
    pub fn payload_size(&self) -> usize {
        self.payload_size
    }

    /// Bytes written by the last snapshot.
    pub fn bytes_transferred(&self) -> u32 {
        self.bytes_transferred
    }

    /// Device frame counter of the last snapshot.
    pub fn frame_number(&self) -> u32 {
        self.frame_number
    }

    pub fn is_released(&self) -> bool {
        self.buffer.is_none()
    }

    /// The whole raw buffer, including any trailing bytes past the image.
    pub fn data(&self) -> SentechResult<&[u8]> {
        self.buffer.as_deref().ok_or(SentechError::Released)
    }

    /// Pixel bytes only: `height * width * bytes_per_pixel`.
    pub fn pixels(&self) -> SentechResult<&[u8]> {
        let data = self.data()?;
        Ok(&data[..self.image_len()])
    }

    fn image_len(&self) -> usize {
        self.width as usize * self.height as usize * self.pixel_format.bytes_per_pixel()
    }

    /// Zero-copy view indexed `[row][col]` for Mono8 and `[row][col][channel]` otherwise.
    pub fn as_multidim_view(&self) -> SentechResult<ArrayViewD<'_, u8>> {
        let (h, w) = (self.height as usize, self.width as usize);
        let shape = match self.pixel_format {
            PixelFormat::Mono8 => IxDyn(&[h, w]),
            format => IxDyn(&[h, w, format.channels()]),
        };
        let pixels = self.pixels()?;
        ArrayViewD::from_shape(shape, pixels).map_err(|_| self.geometry_error())
    }

    /// Copies the pixels into an [`image::DynamicImage`].
    ///
    /// BGR24 and BGR32 are assumed to be stored blue first and are swapped to RGB(A).
    // TODO: confirm the channel order of the 3 and 4 byte formats on a colour camera.
    pub fn as_image(&self) -> SentechResult<DynamicImage> {
        let mut pixels = self.pixels()?.to_vec();
        let (w, h) = (self.width, self.height);
        let image = match self.pixel_format {
            PixelFormat::Mono8 => GrayImage::from_raw(w, h, pixels).map(DynamicImage::ImageLuma8),
            PixelFormat::Bgr24 => {
                pixels.chunks_exact_mut(3).for_each(|px| px.swap(0, 2));
                RgbImage::from_raw(w, h, pixels).map(DynamicImage::ImageRgb8)
            }
            PixelFormat::Bgr32 => {
                pixels.chunks_exact_mut(4).for_each(|px| px.swap(0, 2));
                RgbaImage::from_raw(w, h, pixels).map(DynamicImage::ImageRgba8)
            }
        };
        image.ok_or_else(|| self.geometry_error())
    }

    /// Writes the frame to `path` through `StCam_SaveImageA`; the file type follows the extension.
    ///
    /// `save` must be the camera's `StCam_SaveImageA` method. The path goes to an ANSI
    /// entry point, so it must be valid UTF-8.
    pub fn save_to_path(&self, save: &BoundMethod, path: impl AsRef<Path>) -> SentechResult<()> {
        let path = path.as_ref();
        if save.name() != SAVE_IMAGE {
            return Err(save_argument_error(format!("expected {SAVE_IMAGE}, got {}", save.name())));
        }
        let file_name = path
            .to_str()
            .ok_or_else(|| save_argument_error(format!("path {} is not valid UTF-8", path.display())))?;
        let buffer = self.data()?.as_ptr() as *mut c_void;
        let mut args = [
            Value::U32(self.width),
            Value::U32(self.height),
            Value::U32(self.pixel_format.as_raw()),
            Value::Ptr(buffer),
            Value::cstring(file_name)?,
            Value::U32(0),
        ];
        // SAFETY: the buffer holds `payload_size` bytes and outlives the call; the SDK only reads it.
        match unsafe { save.call(&mut args) } {
            Ok(_) => Ok(()),
            Err(SentechError::Device { .. }) => Err(SentechError::BufferIo {
                path: path.to_path_buf(),
            }),
            Err(e) => Err(e),
        }
    }

    /// Frees the buffer. Safe to call any number of times.
    pub fn release(&mut self) {
        if self.buffer.take().is_some() {
            debug!("Released {} byte frame buffer", self.payload_size);
        }
    }

    pub(crate) fn as_mut_ptr(&mut self) -> SentechResult<*mut c_void> {
        self.buffer
            .as_deref_mut()
            .map(|b| b.as_mut_ptr() as *mut c_void)
            .ok_or(SentechError::Released)
    }

    pub(crate) fn record_transfer(&mut self, bytes_transferred: u32, frame_number: u32) {
        self.bytes_transferred = bytes_transferred;
        self.frame_number = frame_number;
    }

    fn geometry_error(&self) -> SentechError {
        geometry_error(self.width, self.height, self.pixel_format, self.payload_size)
    }
}

fn save_argument_error(message: String) -> SentechError {
    SentechError::Binding(sentech_sys::Error::Argument {
        function: SAVE_IMAGE.to_string(),
        message,
    })
}

fn geometry_error(width: u32, height: u32, pixel_format: PixelFormat, payload_size: usize) -> SentechError {
    SentechError::Geometry {
        width,
        height,
        bytes_per_pixel: pixel_format.bytes_per_pixel(),
        payload_size,
    }
}
