//! Locating the SDK on disk and loading it into a [`BindingTable`].

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::info;

use crate::binding::BindingTable;
use crate::error::{Error, Result};
use crate::header::Header;
use crate::library::DynamicLibrary;

/// Environment variable consulted when no SDK root is given.
pub const SDK_PATH_ENV: &str = "SENTECHPATH";
/// Header file name under `<root>/include`.
pub const HEADER_FILE: &str = "StCamD.h";
/// Library file name under `<root>/bin/x{32,64}`.
pub const LIBRARY_FILE: &str = "StCamD.dll";

/// Where to find the SDK. Unset fields fall back to discovery.
#[derive(Debug, Clone, Default)]
pub struct SdkConfig {
    pub sdk_root: Option<PathBuf>,
    pub library_path: Option<PathBuf>,
}

/// Fully resolved SDK locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdkPaths {
    pub root: PathBuf,
    pub header: PathBuf,
    pub library: PathBuf,
}

impl SdkConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sdk_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.sdk_root = Some(root.into());
        self
    }

    /// Skips discovery of the DLL next to the header.
    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = Some(path.into());
        self
    }

    /// Resolves the root (falling back to `SENTECHPATH`), the header and the library.
    pub fn resolve(&self) -> Result<SdkPaths> {
        self.resolve_with(std::env::var_os(SDK_PATH_ENV))
    }

    fn resolve_with(&self, env_root: Option<OsString>) -> Result<SdkPaths> {
        let root = self
            .sdk_root
            .clone()
            .filter(|p| !p.as_os_str().is_empty())
            .or_else(|| env_root.filter(|v| !v.is_empty()).map(PathBuf::from))
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "Couldn't find Sentech SDK. Pass an SDK root or set the {SDK_PATH_ENV} environment variable."
                ))
            })?;
        let header = root.join("include").join(HEADER_FILE);
        if !header.is_file() {
            return Err(Error::Configuration(format!(
                "No header file located @ {}",
                header.display()
            )));
        }
        let library = match &self.library_path {
            Some(path) => path.clone(),
            None => find_library(&header)?,
        };
        Ok(SdkPaths {
            root,
            header,
            library,
        })
    }
}

/// Architecture directory matching the pointer width of this process.
pub fn arch_dir() -> &'static str {
    if cfg!(target_pointer_width = "64") {
        "x64"
    } else {
        "x32"
    }
}

/// Finds `StCamD.dll` for this architecture relative to the header:
/// `<root>/include/StCamD.h` → `<root>/bin/x{32|64}/StCamD.dll`.
pub fn find_library(header: &Path) -> Result<PathBuf> {
    let header = std::path::absolute(header).map_err(|source| Error::Io {
        path: header.to_path_buf(),
        source,
    })?;
    let root = header
        .parent()
        .and_then(Path::parent)
        .ok_or_else(|| Error::Configuration(format!("{} has no SDK root above it", header.display())))?;
    let library = root.join("bin").join(arch_dir()).join(LIBRARY_FILE);
    if library.is_file() {
        Ok(library)
    } else {
        Err(Error::Configuration(format!(
            "Couldn't find {LIBRARY_FILE} at {}. Pass its path explicitly.",
            library.display()
        )))
    }
}

/// Scans the header, opens the library and builds the binding table.
pub fn load(config: &SdkConfig) -> Result<BindingTable> {
    let paths = config.resolve()?;
    info!(
        "Loading Sentech SDK: header {}, library {}",
        paths.header.display(),
        paths.library.display()
    );
    let header = Header::from_path(&paths.header)?;
    let library = DynamicLibrary::open(&paths.library)?;
    Ok(BindingTable::build(Arc::new(library), header))
}
