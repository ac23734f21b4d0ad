//! libffi-backed invoker for exports whose signature is only known at runtime.

use std::ffi::c_void;
use std::sync::Arc;

use libffi::middle::{Arg, Cif, CodePtr, Type};

use crate::error::{Error, Result};
use crate::library::{CallTypes, NativeFunction};
use crate::types::{NativeType, Scalar};
use crate::value::{NativeArg, Value};

// Untyped calls follow the usual C default: the result is read as an `int`.
const DEFAULT_RETURN: NativeType = NativeType::Scalar(Scalar::I32);

pub(crate) struct FfiFunction {
    name: String,
    code: CodePtr,
    // Keeps the code mapped for as long as any binding can reach it.
    _library: Arc<libloading::Library>,
}

unsafe impl Send for FfiFunction {}
unsafe impl Sync for FfiFunction {}

impl FfiFunction {
    pub(crate) fn new(name: &str, address: *const c_void, library: Arc<libloading::Library>) -> Self {
        Self {
            name: name.to_string(),
            code: CodePtr::from_ptr(address),
            _library: library,
        }
    }
}

/// Argument storage with a stable address for the duration of one call.
#[derive(Debug, PartialEq)]
enum Slot {
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Ptr(*const c_void),
}

impl Slot {
    fn from_scalar(value: &Value) -> Option<Slot> {
        Some(match *value {
            Value::Bool(b) => Slot::I32(b as i32),
            Value::I8(v) => Slot::I8(v),
            Value::U8(v) => Slot::U8(v),
            Value::I16(v) => Slot::I16(v),
            Value::U16(v) => Slot::U16(v),
            Value::I32(v) => Slot::I32(v),
            Value::U32(v) => Slot::U32(v),
            Value::I64(v) => Slot::I64(v),
            Value::U64(v) => Slot::U64(v),
            Value::F32(v) => Slot::F32(v),
            Value::F64(v) => Slot::F64(v),
            _ => return None,
        })
    }

    fn from_pointer(value: &Value) -> Option<Slot> {
        Some(match value {
            Value::Ptr(p) => Slot::Ptr(*p as *const c_void),
            Value::Str(s) => Slot::Ptr(s.as_ptr() as *const c_void),
            Value::WStr(s) => Slot::Ptr(s.as_ptr() as *const c_void),
            _ => return None,
        })
    }

    fn ffi_type(&self) -> Type {
        match self {
            Slot::I8(_) => Type::i8(),
            Slot::U8(_) => Type::u8(),
            Slot::I16(_) => Type::i16(),
            Slot::U16(_) => Type::u16(),
            Slot::I32(_) => Type::i32(),
            Slot::U32(_) => Type::u32(),
            Slot::I64(_) => Type::i64(),
            Slot::U64(_) => Type::u64(),
            Slot::F32(_) => Type::f32(),
            Slot::F64(_) => Type::f64(),
            Slot::Ptr(_) => Type::pointer(),
        }
    }

    fn ffi_arg(&self) -> Arg {
        match self {
            Slot::I8(v) => Arg::new(v),
            Slot::U8(v) => Arg::new(v),
            Slot::I16(v) => Arg::new(v),
            Slot::U16(v) => Arg::new(v),
            Slot::I32(v) => Arg::new(v),
            Slot::U32(v) => Arg::new(v),
            Slot::I64(v) => Arg::new(v),
            Slot::U64(v) => Arg::new(v),
            Slot::F32(v) => Arg::new(v),
            Slot::F64(v) => Arg::new(v),
            Slot::Ptr(v) => Arg::new(v),
        }
    }
}

fn marshal(function: &str, index: usize, arg: &mut NativeArg<'_>, declared: Option<NativeType>) -> Result<Slot> {
    let mismatch = |value: &Value| {
        Error::argument(
            function,
            format!("argument {index} ({value:?}) does not fit declared type {declared:?}"),
        )
    };
    match arg {
        NativeArg::Ref(value) => {
            if let Some(NativeType::Ref(scalar)) = declared {
                if value.scalar() != Some(scalar) {
                    let coerced = value.coerce(scalar).ok_or_else(|| mismatch(&**value))?;
                    **value = coerced;
                }
            }
            if let Some(p) = value.as_ptr() {
                return Ok(Slot::Ptr(p as *const c_void));
            }
            let p = value.scalar_ptr().ok_or_else(|| mismatch(&**value))?;
            Ok(Slot::Ptr(p as *const c_void))
        }
        NativeArg::Value(value) => {
            let slot = match declared {
                None => Slot::from_scalar(value).or_else(|| Slot::from_pointer(value)),
                Some(NativeType::Bool) => Some(Slot::I32(value.is_truthy() as i32)),
                Some(NativeType::Scalar(scalar)) => value.coerce(scalar).as_ref().and_then(Slot::from_scalar),
                Some(NativeType::Pointer) | Some(NativeType::Ref(_)) => match value {
                    Value::Ptr(_) | Value::Str(_) | Value::WStr(_) => Slot::from_pointer(value),
                    _ => None,
                },
                Some(NativeType::CString) => match value {
                    Value::Ptr(_) | Value::Str(_) => Slot::from_pointer(value),
                    _ => None,
                },
                Some(NativeType::WideString) => match value {
                    Value::Ptr(_) | Value::WStr(_) => Slot::from_pointer(value),
                    _ => None,
                },
                Some(NativeType::Void) => None,
            };
            slot.ok_or_else(|| mismatch(&*value))
        }
    }
}

fn return_type(ret: NativeType) -> Type {
    match ret {
        NativeType::Void => Type::void(),
        NativeType::Bool => Type::i32(),
        NativeType::Scalar(scalar) => Slot::from_scalar(&Value::zeroed(scalar))
            .map(|s| s.ffi_type())
            .unwrap_or_else(Type::i32),
        NativeType::Pointer | NativeType::Ref(_) | NativeType::CString | NativeType::WideString => {
            Type::pointer()
        }
    }
}

impl NativeFunction for FfiFunction {
    unsafe fn invoke(&self, args: &mut [NativeArg<'_>], types: CallTypes<'_>) -> Result<Value> {
        let mut slots = Vec::with_capacity(args.len());
        for (index, arg) in args.iter_mut().enumerate() {
            let declared = types.args.and_then(|t| t.get(index).copied());
            slots.push(marshal(&self.name, index, arg, declared)?);
        }
        let ret = types.ret.unwrap_or(DEFAULT_RETURN);

        #[allow(unused_mut)]
        let mut cif = Cif::new(slots.iter().map(Slot::ffi_type), return_type(ret));
        #[cfg(all(windows, target_arch = "x86"))]
        cif.set_abi(libffi::raw::ffi_abi_FFI_STDCALL);

        let ffi_args: Vec<Arg> = slots.iter().map(Slot::ffi_arg).collect();

        // Integer results narrower than a register come back widened to a full `ffi_arg`,
        // so they are read as `usize` and truncated.
        // SAFETY: the caller guarantees the arguments match the export; `slots` and the
        // by-reference targets outlive the call.
        let value = unsafe {
            match ret {
                NativeType::Void => {
                    cif.call::<()>(self.code, &ffi_args);
                    Value::Void
                }
                NativeType::Bool => Value::Bool(cif.call::<usize>(self.code, &ffi_args) as u32 != 0),
                NativeType::Scalar(Scalar::I8) => Value::I8(cif.call::<usize>(self.code, &ffi_args) as i8),
                NativeType::Scalar(Scalar::U8) => Value::U8(cif.call::<usize>(self.code, &ffi_args) as u8),
                NativeType::Scalar(Scalar::I16) => Value::I16(cif.call::<usize>(self.code, &ffi_args) as i16),
                NativeType::Scalar(Scalar::U16) => Value::U16(cif.call::<usize>(self.code, &ffi_args) as u16),
                NativeType::Scalar(Scalar::I32) => Value::I32(cif.call::<usize>(self.code, &ffi_args) as i32),
                NativeType::Scalar(Scalar::U32) => Value::U32(cif.call::<usize>(self.code, &ffi_args) as u32),
                NativeType::Scalar(Scalar::I64) => Value::I64(cif.call::<i64>(self.code, &ffi_args)),
                NativeType::Scalar(Scalar::U64) => Value::U64(cif.call::<u64>(self.code, &ffi_args)),
                NativeType::Scalar(Scalar::F32) => Value::F32(cif.call::<f32>(self.code, &ffi_args)),
                NativeType::Scalar(Scalar::F64) => Value::F64(cif.call::<f64>(self.code, &ffi_args)),
                NativeType::Pointer | NativeType::Ref(_) | NativeType::CString | NativeType::WideString => {
                    Value::Ptr(cif.call::<*mut c_void>(self.code, &ffi_args))
                }
            }
        };
        Ok(value)
    }
}
