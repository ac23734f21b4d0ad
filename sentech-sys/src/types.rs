//! Type map for the Win32 type names used in `StCamD.h`.
//!
//! Every name resolves to the representation the call interface needs. Names that
//! are not in the table are not an error: the binding table leaves such functions
//! untyped and lets the invoker fall back to default marshaling.

use serde::Serialize;

/// Fixed-width scalar as it crosses the native boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Scalar {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl Scalar {
    /// Width in bytes.
    pub fn size(self) -> usize {
        match self {
            Scalar::I8 | Scalar::U8 => 1,
            Scalar::I16 | Scalar::U16 => 2,
            Scalar::I32 | Scalar::U32 | Scalar::F32 => 4,
            Scalar::I64 | Scalar::U64 | Scalar::F64 => 8,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, Scalar::F32 | Scalar::F64)
    }
}

/// Calling-convention representation of a declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NativeType {
    /// Win32 `BOOL`: a 32-bit integer, zero means failure.
    Bool,
    Scalar(Scalar),
    /// Opaque pointer or handle, passed through untouched.
    Pointer,
    /// Pointer to a caller-owned scalar that the native side writes into.
    Ref(Scalar),
    /// Pointer to a NUL-terminated narrow string.
    CString,
    /// Pointer to a NUL-terminated UTF-16 string.
    WideString,
    Void,
}

/// One entry of the type map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TypeDescriptor {
    pub name: &'static str,
    pub native: NativeType,
}

impl TypeDescriptor {
    const fn new(name: &'static str, native: NativeType) -> Self {
        Self { name, native }
    }

    /// Out-parameter types that bound methods pass by reference.
    pub fn is_by_reference(&self) -> bool {
        matches!(self.native, NativeType::Ref(_))
    }

    pub fn is_bool(&self) -> bool {
        self.native == NativeType::Bool
    }

    pub fn is_pointer(&self) -> bool {
        matches!(
            self.native,
            NativeType::Pointer | NativeType::Ref(_) | NativeType::CString | NativeType::WideString
        )
    }

    /// Scalar written through a by-reference type.
    pub fn pointee(&self) -> Option<Scalar> {
        match self.native {
            NativeType::Ref(scalar) => Some(scalar),
            _ => None,
        }
    }
}

/// Names of the by-reference category, in the order the SDK documents them.
pub const REFERENCE_TYPES: [&str; 6] = ["PWORD", "PDWORD", "PBYTE", "PSHORT", "PLONG", "PFLOAT"];

// Windows is LLP64: LONG/ULONG/DWORD are 32 bits wide on both x32 and x64.
const TYPE_MAP: &[TypeDescriptor] = &[
    TypeDescriptor::new("BOOL", NativeType::Bool),
    TypeDescriptor::new("BOOL*", NativeType::Pointer),
    TypeDescriptor::new("BYTE", NativeType::Scalar(Scalar::U8)),
    TypeDescriptor::new("SHORT", NativeType::Scalar(Scalar::I16)),
    TypeDescriptor::new("WORD", NativeType::Scalar(Scalar::U16)),
    TypeDescriptor::new("WCHAR", NativeType::Scalar(Scalar::U16)),
    TypeDescriptor::new("LONG", NativeType::Scalar(Scalar::I32)),
    TypeDescriptor::new("ULONG", NativeType::Scalar(Scalar::U32)),
    TypeDescriptor::new("UINT", NativeType::Scalar(Scalar::U32)),
    TypeDescriptor::new("DWORD", NativeType::Scalar(Scalar::U32)),
    TypeDescriptor::new("FLOAT", NativeType::Scalar(Scalar::F32)),
    TypeDescriptor::new("DOUBLE", NativeType::Scalar(Scalar::F64)),
    TypeDescriptor::new("PWORD", NativeType::Ref(Scalar::U16)),
    TypeDescriptor::new("PDWORD", NativeType::Ref(Scalar::U32)),
    TypeDescriptor::new("PBYTE", NativeType::Ref(Scalar::U8)),
    TypeDescriptor::new("PSHORT", NativeType::Ref(Scalar::I16)),
    TypeDescriptor::new("PLONG", NativeType::Ref(Scalar::I32)),
    TypeDescriptor::new("PFLOAT", NativeType::Ref(Scalar::F32)),
    TypeDescriptor::new("HANDLE", NativeType::Pointer),
    TypeDescriptor::new("HWND", NativeType::Pointer),
    TypeDescriptor::new("HWND*", NativeType::Pointer),
    TypeDescriptor::new("HMENU", NativeType::Pointer),
    TypeDescriptor::new("HDC", NativeType::Pointer),
    TypeDescriptor::new("HDC*", NativeType::Pointer),
    TypeDescriptor::new("LPVOID", NativeType::Pointer),
    TypeDescriptor::new("PVOID", NativeType::Pointer),
    TypeDescriptor::new("PSTR", NativeType::CString),
    TypeDescriptor::new("PCSTR", NativeType::CString),
    TypeDescriptor::new("PWSTR", NativeType::WideString),
    TypeDescriptor::new("PCWSTR", NativeType::WideString),
    TypeDescriptor::new("VOID", NativeType::Void),
    TypeDescriptor::new("void", NativeType::Void),
];

/// Looks up a declared type name.
pub fn resolve(type_name: &str) -> Option<TypeDescriptor> {
    TYPE_MAP.iter().find(|t| t.name == type_name).copied()
}

/// Whether arguments of this declared type are passed by reference.
///
/// Decided on the name alone, so it holds even for functions whose
/// other parameter types failed to resolve.
pub fn is_reference_type(type_name: &str) -> bool {
    REFERENCE_TYPES.contains(&type_name)
}

/// Every entry of the type map.
pub fn type_map() -> &'static [TypeDescriptor] {
    TYPE_MAP
}
