//! Native library seam: symbol lookup and invocation.
//!
//! [`DynamicLibrary`] is the real implementation backed by `libloading` and the
//! libffi invoker. Tests and host-only tools provide their own
//! [`NativeLibrary`] to drive the binding table without the vendor DLL.

use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::NativeType;
use crate::value::{NativeArg, Value};

/// Declared argument and return types for one call.
///
/// `None` means the type map could not resolve the declaration and the
/// invoker must fall back to default marshaling.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallTypes<'a> {
    pub args: Option<&'a [NativeType]>,
    pub ret: Option<NativeType>,
}

/// A resolved export that can be invoked.
pub trait NativeFunction: Send + Sync {
    /// # Safety
    ///
    /// The arguments must match what the native entry point expects. Pointers
    /// handed over (buffers, handles) must stay valid for the duration of the call.
    unsafe fn invoke(&self, args: &mut [NativeArg<'_>], types: CallTypes<'_>) -> Result<Value>;
}

/// Source of native entry points.
pub trait NativeLibrary: Send + Sync {
    fn resolve(&self, symbol: &str) -> Result<Arc<dyn NativeFunction>>;

    fn path(&self) -> Option<&Path> {
        None
    }
}

/// A shared library opened from disk.
pub struct DynamicLibrary {
    path: PathBuf,
    library: Arc<libloading::Library>,
}

impl DynamicLibrary {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        // SAFETY: loading the vendor DLL runs its initialisers; nothing else can be checked here.
        let library = unsafe { libloading::Library::new(&path) }.map_err(|source| Error::Load {
            path: path.clone(),
            source,
        })?;
        Ok(Self {
            path,
            library: Arc::new(library),
        })
    }

    fn address(&self, symbol: &str) -> Result<*const c_void> {
        // SAFETY: the symbol is only used as an address; its real signature comes from the header.
        let sym: libloading::Symbol<unsafe extern "C" fn()> =
            unsafe { self.library.get(symbol.as_bytes()) }.map_err(|e| Error::Symbol {
                name: symbol.to_string(),
                message: e.to_string(),
            })?;
        Ok(*sym as *const c_void)
    }
}

impl NativeLibrary for DynamicLibrary {
    #[cfg(feature = "native")]
    fn resolve(&self, symbol: &str) -> Result<Arc<dyn NativeFunction>> {
        let address = self.address(symbol)?;
        Ok(Arc::new(crate::ffi::FfiFunction::new(
            symbol,
            address,
            Arc::clone(&self.library),
        )))
    }

    #[cfg(not(feature = "native"))]
    fn resolve(&self, symbol: &str) -> Result<Arc<dyn NativeFunction>> {
        self.address(symbol)?;
        Err(Error::Unsupported(format!(
            "{symbol} resolved, but sentech-sys was built without the `native` feature"
        )))
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

impl std::fmt::Debug for DynamicLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicLibrary").field("path", &self.path).finish()
    }
}
