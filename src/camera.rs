//! Safe Rust API for one open Sentech camera

use std::collections::BTreeMap;
use std::ffi::c_void;
use std::path::Path;
use std::sync::Arc;

use log::{debug, warn};
use sentech_sys::{BindingTable, NativeArg, Value};

use crate::common::{CameraVersion, DEFAULT_TIMEOUT_MS, DriverVersion, PixelFormat};
use crate::error::{SentechError, SentechResult};
use crate::frame::{Frame, SAVE_IMAGE};
use crate::method::{self, BoundMethod, CameraHandle};

const OPEN: &str = "StCam_Open";
const CLOSE: &str = "StCam_Close";

/// Scan mode passed to `StCam_SetImageSize` for an arbitrary region of interest.
pub const SCAN_MODE_ROI: u16 = 8;

const PRODUCT_NAME_LEN: usize = 100;

/// An open camera: its handle, one bound method per handle-taking SDK function, and the frame buffer.
///
/// Dropping the camera releases it.
pub struct Camera {
    index: u32,
    handle: Option<CameraHandle>,
    table: Arc<BindingTable>,
    methods: BTreeMap<String, BoundMethod>,
    frame: Option<Frame>,
}

impl Camera {
    /// Opens the camera at `index` and allocates a frame for its current geometry.
    pub fn open(table: Arc<BindingTable>, index: u32) -> SentechResult<Self> {
        // SAFETY: `StCam_Open` takes the instance index by value.
        let raw = unsafe { table.call(OPEN, &mut [NativeArg::Value(Value::U32(index))]) }?;
        let handle = CameraHandle::new(raw.as_ptr().unwrap_or(std::ptr::null_mut()));
        if !handle.is_valid() {
            return Err(SentechError::OpenFailed { index });
        }
        debug!("Opened camera {index}");
        let methods = method::synthesize(handle, &table);
        let mut camera = Camera {
            index,
            handle: Some(handle),
            table,
            methods,
            frame: None,
        };
        camera.setup_frame()?;
        Ok(camera)
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn handle(&self) -> Option<CameraHandle> {
        self.handle
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    pub fn bindings(&self) -> &Arc<BindingTable> {
        &self.table
    }

    /// Bound method by SDK function name, e.g. `StCam_GetGain`.
    pub fn method(&self, name: &str) -> SentechResult<&BoundMethod> {
        if self.handle.is_none() {
            return Err(SentechError::Released);
        }
        self.methods
            .get(name)
            .ok_or_else(|| SentechError::UnknownMethod(name.to_string()))
    }

    /// All bound methods, by name.
    pub fn methods(&self) -> impl Iterator<Item = &BoundMethod> {
        self.methods.values()
    }

    /// Calls a bound method by name. See [`BoundMethod::call`].
    ///
    /// # Safety
    ///
    /// Pointers in `args` must be valid for what the native function does with them.
    pub unsafe fn call(&self, name: &str, args: &mut [Value]) -> SentechResult<Value> {
        let method = self.method(name)?;
        // SAFETY: forwarded to the caller.
        unsafe { method.call(args) }
    }

    /// Calls a bound method whose arguments hold no caller pointers.
    pub(crate) fn invoke(&self, name: &str, args: &mut [Value]) -> SentechResult<Value> {
        // SAFETY: scalar arguments only; out-parameters point into `args`.
        unsafe { self.call(name, args) }
    }

    /// Reallocates the frame for the device's current geometry and pixel format.
    ///
    /// The previous buffer is released first.
    fn setup_frame(&mut self) -> SentechResult<()> {
        if let Some(mut old) = self.frame.take() {
            old.release();
        }
        let (width, height) = self.image_shape()?;
        let payload_size = self.payload_size()?;
        let pixel_format = self.pixel_format()?;
        self.frame = Some(Frame::allocate(width, height, payload_size, pixel_format)?);
        Ok(())
    }

    /// Reallocates the frame if the device geometry, format or payload no longer match it.
    ///
    /// Raw method calls can change any of them behind the typed setters' back.
    fn refresh_frame(&mut self) -> SentechResult<()> {
        let frame = self.frame.as_ref().ok_or(SentechError::Released)?;
        let current = (frame.width(), frame.height(), frame.pixel_format(), frame.payload_size());
        let (width, height) = self.image_shape()?;
        let device = (width, height, self.pixel_format()?, self.payload_size()?);
        if device != current {
            debug!(
                "Camera {} changed from {}x{} {} to {width}x{height} {}, reallocating frame",
                self.index, current.0, current.1, current.2, device.2
            );
            self.setup_frame()?;
        }
        Ok(())
    }

    /// Current frame, `None` once released.
    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    /// Bytes the device writes for one raw frame.
    pub fn payload_size(&self) -> SentechResult<usize> {
        let mut args = [Value::U32(0)];
        self.invoke("StCam_GetRawDataSize", &mut args)?;
        Ok(args[0].as_u32().unwrap_or_default() as usize)
    }

    pub fn pixel_format(&self) -> SentechResult<PixelFormat> {
        let mut args = [Value::U32(0)];
        self.invoke("StCam_GetPreviewPixelFormat", &mut args)?;
        PixelFormat::try_from_code(args[0].as_u32().unwrap_or_default())
    }

    /// Changes the pixel format and reallocates the frame.
    pub fn set_pixel_format(&mut self, format: PixelFormat) -> SentechResult<()> {
        self.invoke("StCam_SetPreviewPixelFormat", &mut [Value::U32(format.as_raw())])?;
        self.setup_frame()
    }

    /// Same as [`Camera::set_pixel_format`] for a raw device code. Unknown codes fail
    /// before anything is sent to the device.
    pub fn set_pixel_format_code(&mut self, code: u32) -> SentechResult<()> {
        let format = PixelFormat::try_from_code(code)?;
        self.set_pixel_format(format)
    }

    // (offset_x, offset_y, width, height)
    fn image_region(&self) -> SentechResult<(u32, u32, u32, u32)> {
        let mut args = [
            Value::U32(0),
            Value::U16(0),
            Value::U32(0),
            Value::U32(0),
            Value::U32(0),
            Value::U32(0),
        ];
        self.invoke("StCam_GetImageSize", &mut args)?;
        let get = |i: usize| args[i].as_u32().unwrap_or_default();
        Ok((get(2), get(3), get(4), get(5)))
    }

    fn set_image_region(&self, offset_x: u32, offset_y: u32, width: u32, height: u32) -> SentechResult<()> {
        self.invoke(
            "StCam_SetImageSize",
            &mut [
                Value::U32(0),
                Value::U16(SCAN_MODE_ROI),
                Value::U32(offset_x),
                Value::U32(offset_y),
                Value::U32(width),
                Value::U32(height),
            ],
        )?;
        Ok(())
    }

    /// (width, height)
    pub fn image_shape(&self) -> SentechResult<(u32, u32)> {
        let (_, _, width, height) = self.image_region()?;
        Ok((width, height))
    }

    /// Sets the region of interest size, keeping the offsets, and reallocates the frame.
    ///
    /// Not every model accepts a width change.
    pub fn set_image_shape(&mut self, (width, height): (u32, u32)) -> SentechResult<()> {
        let (offset_x, offset_y) = self.image_offsets()?;
        self.set_image_region(offset_x, offset_y, width, height)?;
        self.setup_frame()
    }

    /// (x, y)
    pub fn image_offsets(&self) -> SentechResult<(u32, u32)> {
        let (offset_x, offset_y, _, _) = self.image_region()?;
        Ok((offset_x, offset_y))
    }

    pub fn set_image_offsets(&mut self, (offset_x, offset_y): (u32, u32)) -> SentechResult<()> {
        let (width, height) = self.image_shape()?;
        self.set_image_region(offset_x, offset_y, width, height)
    }

    pub fn image_width(&self) -> SentechResult<u32> {
        Ok(self.image_shape()?.0)
    }

    pub fn set_image_width(&mut self, width: u32) -> SentechResult<()> {
        let (_, height) = self.image_shape()?;
        self.set_image_shape((width, height))
    }

    pub fn image_height(&self) -> SentechResult<u32> {
        Ok(self.image_shape()?.1)
    }

    pub fn set_image_height(&mut self, height: u32) -> SentechResult<()> {
        let (width, _) = self.image_shape()?;
        self.set_image_shape((width, height))
    }

    pub fn max_image_shape(&self) -> SentechResult<(u32, u32)> {
        let mut args = [Value::U32(0), Value::U32(0)];
        self.invoke("StCam_GetMaximumImageSize", &mut args)?;
        Ok((
            args[0].as_u32().unwrap_or_default(),
            args[1].as_u32().unwrap_or_default(),
        ))
    }

    pub fn gain(&self) -> SentechResult<u16> {
        let mut args = [Value::U16(0)];
        self.invoke("StCam_GetGain", &mut args)?;
        Ok(args[0].as_u16().unwrap_or_default())
    }

    /// Negative values are clamped to zero.
    pub fn set_gain(&self, gain: i32) -> SentechResult<()> {
        let gain = gain.clamp(0, u16::MAX as i32) as u16;
        self.invoke("StCam_SetGain", &mut [Value::U16(gain)])?;
        Ok(())
    }

    pub fn product_name(&self) -> SentechResult<String> {
        let mut name = vec![0u8; PRODUCT_NAME_LEN];
        let mut args = [
            Value::Ptr(name.as_mut_ptr() as *mut c_void),
            Value::U32(PRODUCT_NAME_LEN as u32),
        ];
        // SAFETY: the SDK writes at most `PRODUCT_NAME_LEN` bytes into `name`.
        unsafe { self.call("StCam_GetProductNameA", &mut args) }?;
        let end = name.iter().position(|&b| b == 0).unwrap_or(name.len());
        Ok(String::from_utf8_lossy(&name[..end]).trim_end().to_string())
    }

    pub fn camera_version(&self) -> SentechResult<CameraVersion> {
        let mut args = [Value::U16(0), Value::U16(0), Value::U16(0), Value::U16(0)];
        self.invoke("StCam_GetCameraVersion", &mut args)?;
        let get = |i: usize| args[i].as_u16().unwrap_or_default();
        Ok(CameraVersion {
            usb_vendor_id: get(0),
            usb_product_id: get(1),
            fpga_version: get(2),
            firm_version: get(3),
        })
    }

    pub fn driver_version(&self) -> SentechResult<DriverVersion> {
        let mut args = [Value::U32(0), Value::U32(0), Value::U32(0), Value::U32(0)];
        self.invoke("StCam_GetDriverVersion", &mut args)?;
        let get = |i: usize| args[i].as_u32().unwrap_or_default();
        Ok(DriverVersion {
            file_version_ms: get(0),
            file_version_ls: get(1),
            product_version_ms: get(2),
            product_version_ls: get(3),
        })
    }

    /// Restores factory settings. The frame is reallocated since geometry may have changed.
    pub fn reset_settings(&mut self) -> SentechResult<()> {
        self.invoke("StCam_ResetSetting", &mut [])?;
        self.setup_frame()
    }

    /// Captures one raw frame with the default timeout.
    pub fn grab_frame(&mut self) -> SentechResult<&Frame> {
        self.grab_frame_timeout(DEFAULT_TIMEOUT_MS)
    }

    /// Transfers the current camera image into the frame buffer.
    ///
    /// The frame is reallocated first if the device no longer matches it.
    /// A timeout surfaces as the device error of `StCam_TakeRawSnapShot`.
    pub fn grab_frame_timeout(&mut self, timeout_ms: u32) -> SentechResult<&Frame> {
        self.refresh_frame()?;
        let (buffer, size) = {
            let frame = self.frame.as_mut().ok_or(SentechError::Released)?;
            (frame.as_mut_ptr()?, frame.payload_size())
        };
        let mut args = [
            Value::Ptr(buffer),
            Value::U32(u32::try_from(size).unwrap_or(u32::MAX)),
            Value::U32(0),
            Value::U32(0),
            Value::U32(timeout_ms),
        ];
        // SAFETY: `buffer` holds `size` bytes and the frame is not touched until the call returns.
        unsafe { self.call("StCam_TakeRawSnapShot", &mut args) }?;
        let bytes_transferred = args[2].as_u32().unwrap_or_default();
        let frame_number = args[3].as_u32().unwrap_or_default();
        let frame = self.frame.as_mut().ok_or(SentechError::Released)?;
        frame.record_transfer(bytes_transferred, frame_number);
        Ok(frame)
    }

    /// Saves the current frame through the SDK's image writer.
    pub fn save_frame(&self, path: impl AsRef<Path>) -> SentechResult<()> {
        let frame = self.frame.as_ref().ok_or(SentechError::Released)?;
        frame.save_to_path(self.method(SAVE_IMAGE)?, path)
    }

    /// Frees the frame buffer, then closes the handle.
    ///
    /// Never fails and may be called any number of times.
    pub fn release(&mut self) {
        if let Some(mut frame) = self.frame.take() {
            frame.release();
        }
        self.methods.clear();
        let Some(handle) = self.handle.take() else {
            return;
        };
        // SAFETY: the handle came from `StCam_Open` and is closed exactly once.
        let closed = unsafe {
            self.table
                .call(CLOSE, &mut [NativeArg::Value(Value::Ptr(handle.as_raw()))])
        };
        match closed {
            Ok(_) => debug!("Closed camera {}", self.index),
            Err(e) => warn!("Failed to close camera {}: {e}", self.index),
        }
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Camera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Camera")
            .field("index", &self.index)
            .field("handle", &self.handle)
            .field("methods", &self.methods.len())
            .field("frame", &self.frame)
            .finish()
    }
}
