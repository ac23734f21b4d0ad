//! Error handling for the dynamic StCam binding layer

use std::path::PathBuf;

/// Result type for binding-layer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while locating, loading or calling into the native SDK.
///
/// Parsing anomalies (constants that don't evaluate, unknown type names,
/// malformed declarations) never show up here: the scanner and the table
/// builder skip them and keep going.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// SDK root, header or library path could not be determined
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// The native library exists but could not be opened
    #[error("Couldn't load native library {}: {source}", path.display())]
    Load {
        path: PathBuf,
        source: libloading::Error,
    },
    /// The export behind a declared function could not be resolved
    #[error("Symbol {name} is not available: {message}")]
    Symbol { name: String, message: String },
    /// The function is not declared in the scanned header
    #[error("Function {0} is not declared in the SDK header")]
    UnknownFunction(String),
    /// Argument count or value does not fit the declared signature
    #[error("Invalid argument for {function}: {message}")]
    Argument { function: String, message: String },
    /// Reading the header failed
    #[error("Couldn't read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A string argument contains an interior NUL
    #[error("Null character in string: {0}")]
    Nul(#[from] std::ffi::NulError),
    /// Native invocation was compiled out
    #[error("Native calls are unavailable: {0}")]
    Unsupported(String),
}

impl Error {
    pub(crate) fn argument(function: &str, message: impl Into<String>) -> Self {
        Error::Argument {
            function: function.to_string(),
            message: message.into(),
        }
    }
}
