//! Binding table: every declared function paired with its export and type metadata.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::json;

use crate::error::{Error, Result};
use crate::header::{ConstantTable, ConstantValue, FunctionSignature, Header};
use crate::library::{CallTypes, NativeFunction, NativeLibrary};
use crate::types::{self, NativeType, TypeDescriptor};
use crate::value::{NativeArg, Value};

/// How a parameter slot is handed to the native call by bound methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Passing {
    Value,
    Reference,
}

/// One declared function, ready to call.
pub struct Binding {
    signature: FunctionSignature,
    arg_types: Option<Vec<TypeDescriptor>>,
    ret_type: Option<TypeDescriptor>,
    native_args: Option<Vec<NativeType>>,
    passing: Vec<Passing>,
    function: std::result::Result<Arc<dyn NativeFunction>, String>,
}

impl Binding {
    fn new(signature: FunctionSignature, function: std::result::Result<Arc<dyn NativeFunction>, String>) -> Self {
        let arg_types: Option<Vec<TypeDescriptor>> = signature
            .params
            .iter()
            .map(|p| types::resolve(&p.type_name))
            .collect();
        if arg_types.is_none() {
            debug!(
                "{}: unresolved parameter types {:?}, arguments left untyped",
                signature.name,
                signature.param_types()
            );
        }
        let ret_type = types::resolve(&signature.return_type);
        if ret_type.is_none() {
            warn!(
                "Couldn't parse return type `{}` for: {}",
                signature.return_type, signature.name
            );
        }
        let passing = signature
            .params
            .iter()
            .map(|p| {
                if types::is_reference_type(&p.type_name) {
                    Passing::Reference
                } else {
                    Passing::Value
                }
            })
            .collect();
        let native_args = arg_types
            .as_ref()
            .map(|t| t.iter().map(|d| d.native).collect());
        Self {
            signature,
            arg_types,
            ret_type,
            native_args,
            passing,
            function,
        }
    }

    pub fn name(&self) -> &str {
        &self.signature.name
    }

    pub fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    /// Resolved parameter types, or `None` when any of them is unknown.
    pub fn arg_types(&self) -> Option<&[TypeDescriptor]> {
        self.arg_types.as_deref()
    }

    pub fn ret_type(&self) -> Option<&TypeDescriptor> {
        self.ret_type.as_ref()
    }

    /// Per-parameter passing mode, in declaration order.
    pub fn passing(&self) -> &[Passing] {
        &self.passing
    }

    pub fn returns_bool(&self) -> bool {
        self.ret_type.is_some_and(|t| t.is_bool())
    }

    /// Whether the export was found in the library.
    pub fn is_resolved(&self) -> bool {
        self.function.is_ok()
    }

    /// One-line C-style description, e.g. `BOOL StCam_Open(HANDLE hCamera)`.
    pub fn describe(&self) -> String {
        let params = self
            .signature
            .params
            .iter()
            .map(|p| match &p.name {
                Some(name) => format!("{} {}", p.type_name, name),
                None => p.type_name.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("{} {}({})", self.signature.return_type, self.signature.name, params)
    }

    /// Calls the export with fully marshaled arguments. No return-value interpretation.
    ///
    /// # Safety
    ///
    /// See [`NativeFunction::invoke`].
    pub unsafe fn call(&self, args: &mut [NativeArg<'_>]) -> Result<Value> {
        let function = self.function.as_ref().map_err(|message| Error::Symbol {
            name: self.signature.name.clone(),
            message: message.clone(),
        })?;
        if let Some(declared) = &self.native_args {
            if args.len() != declared.len() {
                return Err(Error::argument(
                    self.name(),
                    format!("expected {} arguments, got {}", declared.len(), args.len()),
                ));
            }
        }
        let types = CallTypes {
            args: self.native_args.as_deref(),
            ret: self.ret_type.map(|t| t.native),
        };
        // SAFETY: forwarded to the caller.
        unsafe { function.invoke(args, types) }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("signature", &self.signature)
            .field("typed", &self.arg_types.is_some())
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// All bindings and constants of one loaded SDK.
pub struct BindingTable {
    library: Arc<dyn NativeLibrary>,
    constants: ConstantTable,
    bindings: BTreeMap<String, Arc<Binding>>,
}

impl BindingTable {
    /// Resolves every declared function against `library`.
    ///
    /// Never fails: unknown types leave a binding untyped and a missing export
    /// is reported when that one function is called.
    pub fn build(library: Arc<dyn NativeLibrary>, header: Header) -> Self {
        let Header { constants, functions } = header;
        let mut bindings = BTreeMap::new();
        for signature in functions {
            let function = library.resolve(&signature.name).map_err(|e| {
                debug!("{}: {}", signature.name, e);
                e.to_string()
            });
            let binding = Binding::new(signature, function);
            bindings.insert(binding.name().to_string(), Arc::new(binding));
        }
        let table = Self {
            library,
            constants,
            bindings,
        };
        info!(
            "Bound {} functions ({} unresolved), {} constants{}",
            table.bindings.len(),
            table.bindings.values().filter(|b| !b.is_resolved()).count(),
            table.constants.len(),
            table
                .library
                .path()
                .map(|p| format!(" from {}", p.display()))
                .unwrap_or_default()
        );
        table
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Binding>> {
        self.bindings.get(name)
    }

    pub fn binding(&self, name: &str) -> Result<&Arc<Binding>> {
        self.get(name)
            .ok_or_else(|| Error::UnknownFunction(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Bindings in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Binding>> {
        self.bindings.values()
    }

    pub fn constants(&self) -> &ConstantTable {
        &self.constants
    }

    pub fn constant(&self, name: &str) -> Option<&ConstantValue> {
        self.constants.get(name)
    }

    pub fn library(&self) -> &Arc<dyn NativeLibrary> {
        &self.library
    }

    /// Calls a function by name.
    ///
    /// # Safety
    ///
    /// See [`NativeFunction::invoke`].
    pub unsafe fn call(&self, name: &str, args: &mut [NativeArg<'_>]) -> Result<Value> {
        let binding = self.binding(name)?;
        // SAFETY: forwarded to the caller.
        unsafe { binding.call(args) }
    }

    /// Describes every binding and constant, for diagnostics.
    pub fn to_json(&self) -> serde_json::Value {
        let functions: Vec<serde_json::Value> = self
            .bindings
            .values()
            .map(|b| {
                json!({
                    "name": b.name(),
                    "params": b.signature().params,
                    "return_type": b.signature().return_type,
                    "args_typed": b.arg_types().is_some(),
                    "return_typed": b.ret_type().is_some(),
                    "resolved": b.is_resolved(),
                })
            })
            .collect();
        json!({
            "library": self.library.path().map(|p| p.display().to_string()),
            "functions": functions,
            "constants": self.constants,
        })
    }
}

impl fmt::Debug for BindingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingTable")
            .field("library", &self.library.path())
            .field("functions", &self.bindings.len())
            .field("constants", &self.constants.len())
            .finish()
    }
}
