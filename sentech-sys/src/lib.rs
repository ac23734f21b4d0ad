//! Runtime bindings for the Sentech StCam SDK.
//!
//! Instead of a hand-written `extern` block, the SDK header (`StCamD.h`) is scanned
//! at load time: every `WINAPI` declaration becomes a [`Binding`] whose argument and
//! return types come from the [`types`] map, and every `#define` literal becomes a
//! constant on the [`BindingTable`].

pub mod binding;
pub mod error;
#[cfg(feature = "native")]
mod ffi;
pub mod header;
pub mod library;
pub mod sdk;
pub mod types;
pub mod value;

pub use crate::binding::{Binding, BindingTable, Passing};
pub use crate::error::{Error, Result};
pub use crate::header::{scan_header, ConstantTable, ConstantValue, FunctionSignature, Header, Parameter};
pub use crate::library::{CallTypes, DynamicLibrary, NativeFunction, NativeLibrary};
pub use crate::sdk::{load, SdkConfig, SdkPaths};
pub use crate::types::{NativeType, Scalar, TypeDescriptor};
pub use crate::value::{NativeArg, Value};
