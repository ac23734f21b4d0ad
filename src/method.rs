//! Bound methods: SDK functions that take a camera handle, closed over one camera.

use std::collections::BTreeMap;
use std::ffi::c_void;
use std::sync::Arc;

use log::debug;
use sentech_sys::{Binding, BindingTable, NativeArg, Passing, Value};

use crate::error::{SentechError, SentechResult};

/// Name of the leading parameter that marks a function as a camera method.
pub const CAMERA_HANDLE_PARAM: &str = "hCamera";

/// Opaque handle returned by `StCam_Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraHandle(*mut c_void);

// The handle is an opaque token; the driver serializes access per camera.
unsafe impl Send for CameraHandle {}

impl CameraHandle {
    pub fn new(raw: *mut c_void) -> Self {
        Self(raw)
    }

    pub fn as_raw(self) -> *mut c_void {
        self.0
    }

    /// `StCam_Open` reports failure with a null or `INVALID_HANDLE_VALUE` handle.
    pub fn is_valid(self) -> bool {
        !self.0.is_null() && self.0 as isize != -1
    }
}

/// One SDK function with the owning camera's handle captured.
#[derive(Debug, Clone)]
pub struct BoundMethod {
    handle: CameraHandle,
    binding: Arc<Binding>,
    table: Arc<BindingTable>,
}

impl BoundMethod {
    pub fn new(handle: CameraHandle, binding: Arc<Binding>, table: Arc<BindingTable>) -> Self {
        Self {
            handle,
            binding,
            table,
        }
    }

    pub fn name(&self) -> &str {
        self.binding.name()
    }

    pub fn binding(&self) -> &Arc<Binding> {
        &self.binding
    }

    /// Number of arguments a call takes, excluding the handle.
    pub fn arity(&self) -> usize {
        self.binding.signature().params.len().saturating_sub(1)
    }

    /// Calls the function with the camera handle prepended.
    ///
    /// Arguments declared with a by-reference type are passed as pointers to the
    /// caller's values, so out-parameters are written back into `args`. A
    /// [`Value::Ptr`] in such a slot is passed through as the buffer itself.
    /// A `BOOL` result of zero becomes a [`SentechError::Device`]; any other
    /// result is returned unchanged.
    ///
    /// # Safety
    ///
    /// Pointers in `args` must be valid for what the native function does with them.
    pub unsafe fn call(&self, args: &mut [Value]) -> SentechResult<Value> {
        if args.len() != self.arity() {
            return Err(sentech_sys::Error::Argument {
                function: self.name().to_string(),
                message: format!("expected {} arguments, got {}", self.arity(), args.len()),
            }
            .into());
        }
        let passing = self.binding.passing().get(1..).unwrap_or_default();
        let mut native = Vec::with_capacity(args.len() + 1);
        native.push(NativeArg::Value(Value::Ptr(self.handle.as_raw())));
        for (arg, mode) in args.iter_mut().zip(passing) {
            let by_ref = *mode == Passing::Reference && arg.as_ptr().is_none();
            native.push(if by_ref {
                NativeArg::Ref(arg)
            } else {
                NativeArg::Value(arg.clone())
            });
        }
        // SAFETY: forwarded to the caller.
        let result = unsafe { self.binding.call(&mut native) }?;
        if self.binding.returns_bool() && !result.is_truthy() {
            return Err(SentechError::from_last_error(
                self.handle.as_raw(),
                &self.table,
                self.name(),
            ));
        }
        Ok(result)
    }
}

/// Builds one bound method per function whose first parameter is the camera handle.
pub fn synthesize(handle: CameraHandle, table: &Arc<BindingTable>) -> BTreeMap<String, BoundMethod> {
    let methods: BTreeMap<String, BoundMethod> = table
        .iter()
        .filter(|b| b.signature().first_param_name() == Some(CAMERA_HANDLE_PARAM))
        .map(|b| {
            (
                b.name().to_string(),
                BoundMethod::new(handle, Arc::clone(b), Arc::clone(table)),
            )
        })
        .collect();
    debug!("Synthesized {} of {} functions as camera methods", methods.len(), table.len());
    methods
}
