//! Module source addresses
//!
//! An address is either an http(s) URL or a filesystem path (optionally
//! written as a `file://` URL).

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::module::traits::ModuleError;

/// Where a module source (or adapter bootstrap resource) lives
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModuleAddress {
    /// Remote resource fetched over http or https
    Http(String),
    /// Local file
    File(PathBuf),
}

impl ModuleAddress {
    /// Short name used for logging and thread names
    pub fn module_name(&self) -> String {
        let stem = match self {
            ModuleAddress::File(path) => path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string()),
            ModuleAddress::Http(url) => {
                let rest = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
                let rest = rest.split(['?', '#']).next().unwrap_or("");
                let path = rest.split_once('/').map(|(_, path)| path).unwrap_or("");
                path.rsplit('/')
                    .find(|segment| !segment.is_empty())
                    .map(|segment| {
                        Path::new(segment)
                            .file_stem()
                            .map(|s| s.to_string_lossy().to_string())
                            .unwrap_or_else(|| segment.to_string())
                    })
            }
        };

        stem.filter(|s| !s.is_empty())
            .unwrap_or_else(|| "module".to_string())
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, ModuleAddress::Http(_))
    }
}

impl FromStr for ModuleAddress {
    type Err = ModuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ModuleError::InvalidAddress("empty address".to_string()));
        }

        // Addresses name threads and log lines, neither of which accept these
        if trimmed.chars().any(char::is_control) {
            return Err(ModuleError::InvalidAddress(format!(
                "control character in {:?}",
                trimmed
            )));
        }

        let lower = trimmed.to_ascii_lowercase();
        for scheme in ["http://", "https://"] {
            if lower.starts_with(scheme) {
                let host = trimmed[scheme.len()..].split('/').next().unwrap_or("");
                if host.is_empty() {
                    return Err(ModuleError::InvalidAddress(format!(
                        "missing host in {}",
                        trimmed
                    )));
                }
                return Ok(ModuleAddress::Http(trimmed.to_string()));
            }
        }

        if lower.starts_with("file://") {
            let path = &trimmed["file://".len()..];
            if path.is_empty() {
                return Err(ModuleError::InvalidAddress(format!(
                    "missing path in {}",
                    trimmed
                )));
            }
            return Ok(ModuleAddress::File(PathBuf::from(path)));
        }

        if let Some((scheme, _)) = trimmed.split_once("://") {
            return Err(ModuleError::InvalidAddress(format!(
                "unsupported scheme: {}",
                scheme
            )));
        }

        Ok(ModuleAddress::File(PathBuf::from(trimmed)))
    }
}

impl From<PathBuf> for ModuleAddress {
    fn from(path: PathBuf) -> Self {
        ModuleAddress::File(path)
    }
}

impl From<&Path> for ModuleAddress {
    fn from(path: &Path) -> Self {
        ModuleAddress::File(path.to_path_buf())
    }
}

impl fmt::Display for ModuleAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleAddress::Http(url) => write!(f, "{}", url),
            ModuleAddress::File(path) => write!(f, "{}", path.display()),
        }
    }
}
