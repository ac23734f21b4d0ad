//! Values passed to and returned from native calls.

use std::ffi::{c_void, CString};

use widestring::U16CString;

use crate::types::Scalar;

/// A value crossing the native boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Void,
    Bool(bool),
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
    Ptr(*mut c_void),
    Str(CString),
    WStr(U16CString),
}

impl Value {
    pub fn null() -> Self {
        Value::Ptr(std::ptr::null_mut())
    }

    /// Narrow string argument; fails on interior NUL.
    pub fn cstring(s: &str) -> Result<Self, std::ffi::NulError> {
        Ok(Value::Str(CString::new(s)?))
    }

    /// UTF-16 string argument; fails on interior NUL.
    pub fn wide_string(s: &str) -> Result<Self, widestring::error::ContainsNul<u16>> {
        Ok(Value::WStr(U16CString::from_str(s)?))
    }

    /// Zero of the given scalar type, used to seed out-parameters.
    pub fn zeroed(scalar: Scalar) -> Self {
        match scalar {
            Scalar::I8 => Value::I8(0),
            Scalar::U8 => Value::U8(0),
            Scalar::I16 => Value::I16(0),
            Scalar::U16 => Value::U16(0),
            Scalar::I32 => Value::I32(0),
            Scalar::U32 => Value::U32(0),
            Scalar::I64 => Value::I64(0),
            Scalar::U64 => Value::U64(0),
            Scalar::F32 => Value::F32(0.0),
            Scalar::F64 => Value::F64(0.0),
        }
    }

    /// Truthiness as used for `BOOL` results.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Void => false,
            Value::Bool(b) => *b,
            Value::F32(v) => *v != 0.0,
            Value::F64(v) => *v != 0.0,
            Value::Ptr(p) => !p.is_null(),
            Value::Str(s) => !s.as_bytes().is_empty(),
            Value::WStr(s) => !s.is_empty(),
            other => other.as_i128().is_some_and(|v| v != 0),
        }
    }

    fn as_i128(&self) -> Option<i128> {
        Some(match *self {
            Value::Bool(b) => b as i128,
            Value::I8(v) => v as i128,
            Value::U8(v) => v as i128,
            Value::I16(v) => v as i128,
            Value::U16(v) => v as i128,
            Value::I32(v) => v as i128,
            Value::U32(v) => v as i128,
            Value::I64(v) => v as i128,
            Value::U64(v) => v as i128,
            _ => return None,
        })
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_i128().and_then(|v| i64::try_from(v).ok())
    }

    pub fn as_u32(&self) -> Option<u32> {
        self.as_i128().and_then(|v| u32::try_from(v).ok())
    }

    pub fn as_u16(&self) -> Option<u16> {
        self.as_i128().and_then(|v| u16::try_from(v).ok())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::F32(v) => Some(v as f64),
            Value::F64(v) => Some(v),
            _ => self.as_i128().map(|v| v as f64),
        }
    }

    pub fn as_ptr(&self) -> Option<*mut c_void> {
        match *self {
            Value::Ptr(p) => Some(p),
            _ => None,
        }
    }

    /// Converts to the given scalar width. Integers are range-checked;
    /// floats never silently truncate into integers.
    pub fn coerce(&self, scalar: Scalar) -> Option<Value> {
        if scalar.is_float() {
            let v = self.as_f64()?;
            return Some(match scalar {
                Scalar::F32 => Value::F32(v as f32),
                _ => Value::F64(v),
            });
        }
        let v = self.as_i128()?;
        Some(match scalar {
            Scalar::I8 => Value::I8(i8::try_from(v).ok()?),
            Scalar::U8 => Value::U8(u8::try_from(v).ok()?),
            Scalar::I16 => Value::I16(i16::try_from(v).ok()?),
            Scalar::U16 => Value::U16(u16::try_from(v).ok()?),
            Scalar::I32 => Value::I32(i32::try_from(v).ok()?),
            Scalar::U32 => Value::U32(u32::try_from(v).ok()?),
            Scalar::I64 => Value::I64(i64::try_from(v).ok()?),
            Scalar::U64 => Value::U64(u64::try_from(v).ok()?),
            Scalar::F32 | Scalar::F64 => unreachable!("handled above"),
        })
    }

    /// Scalar type of a numeric value.
    pub fn scalar(&self) -> Option<Scalar> {
        Some(match self {
            Value::I8(_) => Scalar::I8,
            Value::U8(_) => Scalar::U8,
            Value::I16(_) => Scalar::I16,
            Value::U16(_) => Scalar::U16,
            Value::I32(_) | Value::Bool(_) => Scalar::I32,
            Value::U32(_) => Scalar::U32,
            Value::I64(_) => Scalar::I64,
            Value::U64(_) => Scalar::U64,
            Value::F32(_) => Scalar::F32,
            Value::F64(_) => Scalar::F64,
            _ => return None,
        })
    }

    /// Address of the scalar stored inline, for by-reference passing.
    #[cfg_attr(not(feature = "native"), allow(dead_code))]
    pub(crate) fn scalar_ptr(&mut self) -> Option<*mut c_void> {
        Some(match self {
            Value::I8(v) => v as *mut i8 as *mut c_void,
            Value::U8(v) => v as *mut u8 as *mut c_void,
            Value::I16(v) => v as *mut i16 as *mut c_void,
            Value::U16(v) => v as *mut u16 as *mut c_void,
            Value::I32(v) => v as *mut i32 as *mut c_void,
            Value::U32(v) => v as *mut u32 as *mut c_void,
            Value::I64(v) => v as *mut i64 as *mut c_void,
            Value::U64(v) => v as *mut u64 as *mut c_void,
            Value::F32(v) => v as *mut f32 as *mut c_void,
            Value::F64(v) => v as *mut f64 as *mut c_void,
            _ => return None,
        })
    }
}

/// One argument as handed to a [`NativeFunction`](crate::NativeFunction).
#[derive(Debug)]
pub enum NativeArg<'a> {
    /// Passed by value.
    Value(Value),
    /// Passed as a pointer to caller storage; the native side may write through it.
    Ref(&'a mut Value),
}

impl NativeArg<'_> {
    pub fn is_ref(&self) -> bool {
        matches!(self, NativeArg::Ref(_))
    }

    pub fn value(&self) -> &Value {
        match self {
            NativeArg::Value(v) => v,
            NativeArg::Ref(v) => v,
        }
    }

    /// Stores `value` into the caller's location. Returns `false` for by-value arguments.
    pub fn write(&mut self, value: Value) -> bool {
        match self {
            NativeArg::Ref(slot) => {
                **slot = value;
                true
            }
            NativeArg::Value(_) => false,
        }
    }
}
