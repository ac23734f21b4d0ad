//! Simulated StCam SDK: a fixture header plus a stub native layer backed by in-memory device state.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::ffi::c_void;
use std::sync::{Arc, Mutex, MutexGuard};

use sentech::bindings::{
    scan_header, BindingTable, CallTypes, Error, NativeArg, NativeFunction, NativeLibrary, Result, Value,
};

pub const FAKE_HANDLE: usize = 0x5e47;
pub const PRODUCT_NAME: &str = "STC-MCS500U3V";

pub const HEADER: &str = r#"
#pragma once
#include <windows.h>

#define STCAM_PIXEL_FORMAT_08_MONO_OR_RAW   0x0001
#define STCAM_PIXEL_FORMAT_24_BGR           0x0004
#define STCAM_PIXEL_FORMAT_32_BGR           0x0008
#define STCAM_SCAN_MODE_ROI                 0x0008
#define STCAM_SDK_NAME                      "StandardSDK"

typedef BOOL (WINAPI *STCAM_CALLBACK)(HANDLE hCamera, PVOID pvContext);

DWORD WINAPI StCam_CameraCount(PVOID pvReserved);
HANDLE WINAPI StCam_Open(DWORD dwInstance);
void WINAPI StCam_Close(HANDLE hCamera);
DWORD WINAPI StCam_GetLastError(HANDLE hCamera);

BOOL WINAPI StCam_GetRawDataSize(HANDLE hCamera, PDWORD pdwSize);
BOOL WINAPI StCam_GetPreviewPixelFormat(HANDLE hCamera, PDWORD pdwPreviewPixelFormat);
BOOL WINAPI StCam_SetPreviewPixelFormat(HANDLE hCamera, DWORD dwPreviewPixelFormat);
BOOL WINAPI StCam_GetImageSize(HANDLE hCamera, PDWORD pdwReserved, PWORD pwScanMode, PDWORD pdwOffsetX, PDWORD pdwOffsetY, PDWORD pdwWidth, PDWORD pdwHeight);
BOOL WINAPI StCam_SetImageSize(HANDLE hCamera, DWORD dwReserved, WORD wScanMode, DWORD dwOffsetX, DWORD dwOffsetY, DWORD dwWidth, DWORD dwHeight);
BOOL WINAPI StCam_GetMaximumImageSize(HANDLE hCamera, PDWORD pdwMaximumWidth, PDWORD pdwMaximumHeight);
BOOL WINAPI StCam_GetGain(HANDLE hCamera, PWORD pwGain);
BOOL WINAPI StCam_SetGain(HANDLE hCamera, WORD wGain);
BOOL WINAPI StCam_GetProductNameA(HANDLE hCamera, PSTR pszProductName, DWORD dwBufferSize);
BOOL WINAPI StCam_GetCameraVersion(HANDLE hCamera, PWORD pwUSBVendorID, PWORD pwUSBProductID, PWORD pwFPGAVersion, PWORD pwFirmVersion);
BOOL WINAPI StCam_GetDriverVersion(HANDLE hCamera, PDWORD pdwFileVersionMS, PDWORD pdwFileVersionLS, PDWORD pdwProductVersionMS, PDWORD pdwProductVersionLS);
BOOL WINAPI StCam_ResetSetting(HANDLE hCamera);
BOOL WINAPI StCam_TakeRawSnapShot(HANDLE hCamera, PBYTE pbyteBuffer, DWORD dwBufferSize, PDWORD pdwNumberOfByteTrans, PDWORD pdwFrameNo, DWORD dwMilliseconds);
BOOL WINAPI StCam_SaveImageA(HANDLE hCamera, DWORD dwWidth, DWORD dwHeight, DWORD dwPreviewPixelFormat, PBYTE pbyteData, PCSTR pszFileName, DWORD dwParam);
BOOL WINAPI StCam_SetCallbackFunction(HANDLE hCamera, STCAM_CALLBACK pCallback, PVOID pvContext);
"#;

/// What the simulated camera currently looks like.
#[derive(Debug)]
pub struct DeviceState {
    pub camera_count: u32,
    pub open_fails: bool,
    pub width: u32,
    pub height: u32,
    pub offset_x: u32,
    pub offset_y: u32,
    pub max_width: u32,
    pub max_height: u32,
    pub pixel_format: u32,
    pub gain: u16,
    pub frame_number: u32,
    pub closes: u32,
    pub last_error: u32,
    /// Functions that report failure, and the code they leave behind.
    pub failing: HashMap<String, u32>,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            camera_count: 1,
            open_fails: false,
            width: 64,
            height: 48,
            offset_x: 0,
            offset_y: 0,
            max_width: 2448,
            max_height: 2048,
            pixel_format: 1,
            gain: 10,
            frame_number: 0,
            closes: 0,
            last_error: 0,
            failing: HashMap::new(),
        }
    }
}

pub fn bytes_per_pixel(code: u32) -> usize {
    match code {
        4 => 3,
        8 => 4,
        _ => 1,
    }
}

impl DeviceState {
    pub fn payload_size(&self) -> usize {
        self.width as usize * self.height as usize * bytes_per_pixel(self.pixel_format)
    }
}

/// What the stub saw for one argument.
#[derive(Debug, Clone, PartialEq)]
pub struct SeenArg {
    pub by_ref: bool,
    pub int: Option<i64>,
    pub ptr: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub name: String,
    pub args: Vec<SeenArg>,
    pub typed: bool,
}

type Handler = Arc<dyn Fn(&mut DeviceState, &mut [NativeArg<'_>]) -> Value + Send + Sync>;

struct StubFunction {
    name: String,
    handler: Handler,
    state: Arc<Mutex<DeviceState>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl NativeFunction for StubFunction {
    unsafe fn invoke(&self, args: &mut [NativeArg<'_>], types: CallTypes<'_>) -> Result<Value> {
        self.calls.lock().unwrap().push(RecordedCall {
            name: self.name.clone(),
            args: args
                .iter()
                .map(|a| SeenArg {
                    by_ref: a.is_ref(),
                    int: a.value().as_i64(),
                    ptr: a.value().as_ptr().map(|p| p as usize),
                })
                .collect(),
            typed: types.args.is_some(),
        });
        let mut state = self.state.lock().unwrap();
        if let Some(code) = state.failing.get(&self.name).copied() {
            state.last_error = code;
            return Ok(Value::Bool(false));
        }
        Ok((self.handler)(&mut state, args))
    }
}

fn arg_u32(args: &[NativeArg<'_>], i: usize) -> u32 {
    args[i].value().as_u32().unwrap_or_default()
}

fn arg_ptr(args: &[NativeArg<'_>], i: usize) -> *mut u8 {
    args[i].value().as_ptr().unwrap_or(std::ptr::null_mut()) as *mut u8
}

/// The simulated SDK. Clones share device state and the call log.
#[derive(Clone)]
pub struct FakeSdk {
    handlers: HashMap<String, Handler>,
    state: Arc<Mutex<DeviceState>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl FakeSdk {
    pub fn new() -> Self {
        let sdk = FakeSdk {
            handlers: HashMap::new(),
            state: Arc::new(Mutex::new(DeviceState::default())),
            calls: Arc::new(Mutex::new(Vec::new())),
        };
        sdk.with("StCam_CameraCount", |s, _| Value::U32(s.camera_count))
            .with("StCam_Open", |s, _| {
                if s.open_fails {
                    Value::null()
                } else {
                    Value::Ptr(FAKE_HANDLE as *mut c_void)
                }
            })
            .with("StCam_Close", |s, _| {
                s.closes += 1;
                Value::Void
            })
            .with("StCam_GetLastError", |s, _| Value::U32(s.last_error))
            .with("StCam_GetRawDataSize", |s, args| {
                args[1].write(Value::U32(s.payload_size() as u32));
                Value::Bool(true)
            })
            .with("StCam_GetPreviewPixelFormat", |s, args| {
                args[1].write(Value::U32(s.pixel_format));
                Value::Bool(true)
            })
            .with("StCam_SetPreviewPixelFormat", |s, args| {
                s.pixel_format = arg_u32(args, 1);
                Value::Bool(true)
            })
            .with("StCam_GetImageSize", |s, args| {
                args[1].write(Value::U32(0));
                args[2].write(Value::U16(8));
                args[3].write(Value::U32(s.offset_x));
                args[4].write(Value::U32(s.offset_y));
                args[5].write(Value::U32(s.width));
                args[6].write(Value::U32(s.height));
                Value::Bool(true)
            })
            .with("StCam_SetImageSize", |s, args| {
                s.offset_x = arg_u32(args, 3);
                s.offset_y = arg_u32(args, 4);
                s.width = arg_u32(args, 5);
                s.height = arg_u32(args, 6);
                Value::Bool(true)
            })
            .with("StCam_GetMaximumImageSize", |s, args| {
                args[1].write(Value::U32(s.max_width));
                args[2].write(Value::U32(s.max_height));
                Value::Bool(true)
            })
            .with("StCam_GetGain", |s, args| {
                args[1].write(Value::U16(s.gain));
                Value::Bool(true)
            })
            .with("StCam_SetGain", |s, args| {
                s.gain = args[1].value().as_u16().unwrap_or_default();
                Value::Bool(true)
            })
            .with("StCam_GetProductNameA", |_, args| {
                let buffer = arg_ptr(args, 1);
                let len = arg_u32(args, 2) as usize;
                let name = PRODUCT_NAME.as_bytes();
                let n = name.len().min(len.saturating_sub(1));
                // SAFETY: the caller hands over a buffer of `len` bytes.
                unsafe {
                    std::ptr::copy_nonoverlapping(name.as_ptr(), buffer, n);
                    *buffer.add(n) = 0;
                }
                Value::Bool(true)
            })
            .with("StCam_GetCameraVersion", |_, args| {
                for (i, v) in [0x0ee7u16, 0x0517, 0x0102, 0x0304].into_iter().enumerate() {
                    args[i + 1].write(Value::U16(v));
                }
                Value::Bool(true)
            })
            .with("StCam_GetDriverVersion", |_, args| {
                for (i, v) in [3u32, 8, 3, 9].into_iter().enumerate() {
                    args[i + 1].write(Value::U32(v));
                }
                Value::Bool(true)
            })
            .with("StCam_ResetSetting", |s, _| {
                let defaults = DeviceState::default();
                s.width = defaults.width;
                s.height = defaults.height;
                s.pixel_format = defaults.pixel_format;
                s.gain = defaults.gain;
                Value::Bool(true)
            })
            .with("StCam_TakeRawSnapShot", |s, args| {
                let buffer = arg_ptr(args, 1);
                let size = (arg_u32(args, 2) as usize).min(s.payload_size());
                // SAFETY: the caller hands over a buffer of at least `size` bytes.
                let data = unsafe { std::slice::from_raw_parts_mut(buffer, size) };
                for (i, byte) in data.iter_mut().enumerate() {
                    *byte = (i % 251) as u8;
                }
                s.frame_number += 1;
                args[3].write(Value::U32(size as u32));
                args[4].write(Value::U32(s.frame_number));
                Value::Bool(true)
            })
            .with("StCam_SaveImageA", |_, args| {
                let len = arg_u32(args, 1) as usize * arg_u32(args, 2) as usize * bytes_per_pixel(arg_u32(args, 3));
                let Value::Str(path) = args[5].value() else {
                    return Value::Bool(false);
                };
                // SAFETY: the frame buffer holds at least `len` bytes.
                let data = unsafe { std::slice::from_raw_parts(arg_ptr(args, 4), len) };
                Value::Bool(std::fs::write(path.to_str().unwrap(), data).is_ok())
            })
            .with("StCam_SetCallbackFunction", |_, _| Value::Bool(true))
    }

    pub fn with(
        mut self,
        name: &str,
        handler: impl Fn(&mut DeviceState, &mut [NativeArg<'_>]) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.handlers.insert(name.to_string(), Arc::new(handler));
        self
    }

    pub fn without(mut self, name: &str) -> Self {
        self.handlers.remove(name);
        self
    }

    pub fn table(&self) -> Arc<BindingTable> {
        Arc::new(BindingTable::build(Arc::new(self.clone()), scan_header(HEADER)))
    }

    pub fn state(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap()
    }

    /// Makes `name` report failure, leaving `code` as the last error.
    pub fn fail(&self, name: &str, code: u32) {
        self.state().failing.insert(name.to_string(), code);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, name: &str) -> Vec<RecordedCall> {
        self.calls().into_iter().filter(|c| c.name == name).collect()
    }

    pub fn called(&self, name: &str) -> bool {
        !self.calls_to(name).is_empty()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

impl NativeLibrary for FakeSdk {
    fn resolve(&self, symbol: &str) -> Result<Arc<dyn NativeFunction>> {
        let handler = self.handlers.get(symbol).ok_or_else(|| Error::Symbol {
            name: symbol.to_string(),
            message: "not exported by the simulated SDK".into(),
        })?;
        Ok(Arc::new(StubFunction {
            name: symbol.to_string(),
            handler: Arc::clone(handler),
            state: Arc::clone(&self.state),
            calls: Arc::clone(&self.calls),
        }))
    }
}

/// Every function name the fixture header declares.
pub fn declared_functions() -> HashSet<String> {
    scan_header(HEADER).functions.into_iter().map(|f| f.name).collect()
}
