//! Scanner for the SDK header: `#define` constants and `WINAPI` declarations.
//!
//! The scanner is line oriented and best effort. Anything it cannot read is
//! skipped so a vendor header full of constructs we don't model still yields
//! every declaration we do.

use std::collections::BTreeMap;
use std::path::Path;

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::error::{Error, Result};

/// Calling-convention marker that identifies an exported function declaration.
pub const CALLING_CONVENTION_MARKER: &str = "WINAPI";

static DEFINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*#\s*define\s+([A-Za-z_][A-Za-z0-9_]*)\s+("(?:[^"\\]|\\.)*"|\S+)"#)
        .expect("valid #define pattern")
});

static DECLARATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<ret>.*?)\s+WINAPI\s+(?P<name>[A-Za-z_][A-Za-z0-9_]*)\s*\((?P<args>[^)]*)\)")
        .expect("valid declaration pattern")
});

/// Literal value of a header constant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConstantValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl ConstantValue {
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            ConstantValue::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        self.as_i64().and_then(|v| u32::try_from(v).ok())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            ConstantValue::Int(v) => Some(v as f64),
            ConstantValue::Float(v) => Some(v),
            ConstantValue::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConstantValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Constants discovered in the header, by name.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ConstantTable {
    values: BTreeMap<String, ConstantValue>,
    #[serde(skip)]
    skipped: Vec<String>,
}

impl ConstantTable {
    pub fn get(&self, name: &str) -> Option<&ConstantValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConstantValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Names whose value could not be evaluated as a literal.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    fn record(&mut self, name: &str, raw: &str) {
        match parse_literal(raw) {
            Some(value) => {
                self.skipped.retain(|s| s != name);
                self.values.insert(name.to_string(), value);
            }
            None => {
                debug!("Skipping constant {name}: `{raw}` is not a literal");
                self.skipped.push(name.to_string());
            }
        }
    }
}

/// One declared parameter. The name is optional in C prototypes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Parameter {
    pub type_name: String,
    pub name: Option<String>,
}

/// A function declared with the calling-convention marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionSignature {
    pub name: String,
    pub params: Vec<Parameter>,
    pub return_type: String,
}

impl FunctionSignature {
    pub fn param_types(&self) -> Vec<&str> {
        self.params.iter().map(|p| p.type_name.as_str()).collect()
    }

    /// Parameter names, or an empty list when any parameter is unnamed.
    pub fn param_names(&self) -> Vec<&str> {
        self.params
            .iter()
            .map(|p| p.name.as_deref())
            .collect::<Option<Vec<_>>>()
            .unwrap_or_default()
    }

    /// Name of the first declared parameter, if it has one.
    pub fn first_param_name(&self) -> Option<&str> {
        self.params.first().and_then(|p| p.name.as_deref())
    }
}

/// Everything the scanner extracted from one header.
#[derive(Debug, Clone, Default)]
pub struct Header {
    pub constants: ConstantTable,
    pub functions: Vec<FunctionSignature>,
}

impl Header {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        // Vendor headers are not guaranteed to be UTF-8 (comments in Shift-JIS are common).
        Ok(scan_header(&String::from_utf8_lossy(&text)))
    }

    pub fn function(&self, name: &str) -> Option<&FunctionSignature> {
        self.functions.iter().find(|f| f.name == name)
    }
}

/// Scans header text for constants and function declarations.
pub fn scan_header(text: &str) -> Header {
    let mut header = Header::default();
    for line in text.lines() {
        if let Some(caps) = DEFINE.captures(line) {
            header.constants.record(&caps[1], &caps[2]);
            continue;
        }
        if let Some(signature) = parse_declaration(line) {
            match header.functions.iter_mut().find(|f| f.name == signature.name) {
                Some(existing) => {
                    debug!("{} declared more than once, keeping the last declaration", signature.name);
                    *existing = signature;
                }
                None => header.functions.push(signature),
            }
        }
    }
    debug!(
        "Scanned header: {} constants ({} skipped), {} functions",
        header.constants.len(),
        header.constants.skipped().len(),
        header.functions.len()
    );
    header
}

/// Parses a single-line declaration such as `BOOL WINAPI StCam_Open(HANDLE hCamera);`.
pub fn parse_declaration(line: &str) -> Option<FunctionSignature> {
    let code = line.split("//").next().unwrap_or_default();
    let trimmed = code.trim_start();
    if trimmed.starts_with("/*") || trimmed.starts_with('*') || trimmed.starts_with('#') {
        return None;
    }
    if !code.contains(CALLING_CONVENTION_MARKER) {
        return None;
    }
    let Some(caps) = DECLARATION.captures(code) else {
        debug!("Ignoring unsupported declaration: {}", line.trim());
        return None;
    };
    // Linkage prefixes (`extern "C"`, `__declspec(...)`) come before the return type.
    let return_type = caps["ret"].split_whitespace().last()?.to_string();
    Some(FunctionSignature {
        name: caps["name"].to_string(),
        params: parse_params(&caps["args"]),
        return_type,
    })
}

fn parse_params(args: &str) -> Vec<Parameter> {
    let args = args.trim();
    if args.is_empty() || args == "void" || args == "VOID" {
        return Vec::new();
    }
    args.split(',')
        .map(str::trim)
        .filter(|group| !group.is_empty())
        .map(parse_param)
        .collect()
}

fn parse_param(group: &str) -> Parameter {
    let tokens: Vec<&str> = group.split_whitespace().collect();
    match tokens.split_last() {
        Some((last, rest)) if !rest.is_empty() => {
            let mut type_name = rest.join(" ");
            let mut name = *last;
            // `HWND *phWnd` declares the same type as `HWND* phWnd`.
            while let Some(stripped) = name.strip_prefix('*') {
                type_name.push('*');
                name = stripped;
            }
            Parameter {
                type_name,
                name: (!name.is_empty()).then(|| name.to_string()),
            }
        }
        _ => Parameter {
            type_name: group.to_string(),
            name: None,
        },
    }
}

/// Evaluates a macro body as an integer, float or quoted-string literal.
///
/// Nothing is executed: identifiers, expressions and casts return `None`.
pub fn parse_literal(raw: &str) -> Option<ConstantValue> {
    let mut text = raw.trim();
    while let Some(inner) = text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        text = inner.trim();
    }
    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        return unescape(&text[1..text.len() - 1]).map(ConstantValue::Str);
    }
    parse_int(text)
        .map(ConstantValue::Int)
        .or_else(|| parse_float(text).map(ConstantValue::Float))
}

fn split_sign(text: &str) -> (bool, &str) {
    match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    }
}

fn parse_int(text: &str) -> Option<i64> {
    let (negative, body) = split_sign(text);
    let body = body.trim_end_matches(['u', 'U', 'l', 'L']);
    let magnitude = if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()?
    } else if !body.bytes().all(|b| b.is_ascii_digit()) || body.is_empty() {
        return None;
    } else if let Some(octal) = body.strip_prefix('0').filter(|rest| !rest.is_empty()) {
        // `08` and `09` are not valid C literals.
        u64::from_str_radix(octal, 8).ok()?
    } else {
        body.parse::<u64>().ok()?
    };
    if negative {
        0i64.checked_sub_unsigned(magnitude)
    } else {
        // Unsigned masks such as 0xFFFFFFFFFFFFFFFF keep their bit pattern.
        Some(magnitude as i64)
    }
}

fn parse_float(text: &str) -> Option<f64> {
    let (_, body) = split_sign(text);
    // Rejects identifiers that `f64::from_str` would accept (inf, NaN), and
    // integer-looking text the integer parser refused.
    if !body.starts_with(|c: char| c.is_ascii_digit() || c == '.') || !body.contains(['.', 'e', 'E']) {
        return None;
    }
    text.trim_end_matches(['f', 'F']).parse::<f64>().ok()
}

fn unescape(body: &str) -> Option<String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        out.push(match chars.next()? {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            other => other,
        });
    }
    Some(out)
}
