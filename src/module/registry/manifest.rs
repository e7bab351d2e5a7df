//! Adapter bootstrap manifest parsing and validation
//!
//! The bootstrap resource is a small TOML document naming the runtime adapter
//! to prime and how that adapter should drive the module.

use serde::{Deserialize, Serialize};

use crate::module::adapter::bridge::{DEFAULT_ENTRY_POINT, DEFAULT_IMPORT_MODULE};
use crate::module::traits::ModuleError;

/// Largest bootstrap manifest accepted
pub const MAX_MANIFEST_BYTES: usize = 64 * 1024;

/// Adapter manifest (adapter.toml structure)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterManifest {
    /// Registered adapter name
    pub adapter: String,
    /// Export started by the adapter
    #[serde(default = "default_entry_point")]
    pub entry_point: String,
    /// Import module the host bindings are defined under
    #[serde(default = "default_import_module")]
    pub import_module: String,
    /// Namespace the module must publish its capabilities under, if fixed
    #[serde(default)]
    pub namespace: Option<String>,
    /// Human-readable description
    #[serde(default)]
    pub description: Option<String>,
}

fn default_entry_point() -> String {
    DEFAULT_ENTRY_POINT.to_string()
}

fn default_import_module() -> String {
    DEFAULT_IMPORT_MODULE.to_string()
}

impl AdapterManifest {
    /// Manifest for `adapter` with every other field defaulted
    pub fn named(adapter: impl Into<String>) -> Self {
        Self {
            adapter: adapter.into(),
            entry_point: default_entry_point(),
            import_module: default_import_module(),
            namespace: None,
            description: None,
        }
    }

    /// Parse and validate a manifest from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ModuleError> {
        let contents = std::str::from_utf8(bytes).map_err(|e| {
            ModuleError::AdapterBootstrap(format!("Manifest is not valid UTF-8: {}", e))
        })?;
        Self::from_toml_str(contents)
    }

    /// Parse and validate a manifest from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, ModuleError> {
        let manifest: AdapterManifest = toml::from_str(contents).map_err(|e| {
            ModuleError::AdapterBootstrap(format!("Failed to parse manifest TOML: {}", e))
        })?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Check required fields
    pub fn validate(&self) -> Result<(), ModuleError> {
        if self.adapter.trim().is_empty() {
            return Err(ModuleError::AdapterBootstrap(
                "Adapter name cannot be empty".to_string(),
            ));
        }
        if self.entry_point.trim().is_empty() {
            return Err(ModuleError::AdapterBootstrap(
                "Entry point cannot be empty".to_string(),
            ));
        }
        if self.import_module.trim().is_empty() {
            return Err(ModuleError::AdapterBootstrap(
                "Import module cannot be empty".to_string(),
            ));
        }
        if matches!(&self.namespace, Some(ns) if ns.trim().is_empty()) {
            return Err(ModuleError::AdapterBootstrap(
                "Namespace, when set, cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let manifest = AdapterManifest::from_toml_str(r#"adapter = "bridge""#).unwrap();
        assert_eq!(manifest, AdapterManifest::named("bridge"));
        assert_eq!(manifest.entry_point, "_start");
        assert_eq!(manifest.import_module, "bridge");
    }

    #[test]
    fn test_full_manifest() {
        let manifest = AdapterManifest::from_bytes(
            br#"
            adapter = "bridge"
            entry_point = "run"
            import_module = "host"
            namespace = "gophers"
            description = "dataframe module"
            "#,
        )
        .unwrap();
        assert_eq!(manifest.namespace.as_deref(), Some("gophers"));
        assert_eq!(manifest.entry_point, "run");
    }

    #[test]
    fn test_invalid_manifests() {
        assert!(matches!(
            AdapterManifest::from_toml_str(""),
            Err(ModuleError::AdapterBootstrap(_))
        ));
        assert!(AdapterManifest::from_toml_str(r#"adapter = """#).is_err());
        assert!(AdapterManifest::from_toml_str("adapter = \"bridge\"\nnamespace = \" \"").is_err());
        assert!(AdapterManifest::from_bytes(&[0xff, 0xfe]).is_err());
    }
}
