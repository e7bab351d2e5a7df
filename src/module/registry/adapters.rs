//! Runtime adapter registry
//!
//! Maps adapter names (as written in the bootstrap manifest) to constructors.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::module::adapter::BridgeAdapter;
use crate::module::registry::manifest::AdapterManifest;
use crate::module::traits::{ModuleError, RuntimeAdapter};

/// Builds an adapter from its manifest
pub type AdapterConstructor =
    Arc<dyn Fn(&AdapterManifest) -> Result<Arc<dyn RuntimeAdapter>, ModuleError> + Send + Sync>;

/// Registry of constructible adapters
#[derive(Clone)]
pub struct AdapterRegistry {
    constructors: HashMap<String, AdapterConstructor>,
}

impl AdapterRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Registry with the built-in `bridge` adapter
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(BridgeAdapter::NAME, |manifest| {
            Ok(Arc::new(BridgeAdapter::from_manifest(manifest)) as Arc<dyn RuntimeAdapter>)
        });
        registry
    }

    /// Register (or replace) a constructor
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn(&AdapterManifest) -> Result<Arc<dyn RuntimeAdapter>, ModuleError>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        debug!("Registering runtime adapter {}", name);
        self.constructors.insert(name, Arc::new(constructor));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered adapter names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.constructors.keys().cloned().collect();
        names.sort();
        names
    }

    /// Construct the adapter `manifest` names
    pub fn construct(
        &self,
        manifest: &AdapterManifest,
    ) -> Result<Arc<dyn RuntimeAdapter>, ModuleError> {
        let constructor = self.constructors.get(&manifest.adapter).ok_or_else(|| {
            ModuleError::AdapterBootstrap(format!(
                "Adapter {} is not defined (known: {})",
                manifest.adapter,
                self.names().join(", ")
            ))
        })?;
        constructor(manifest)
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("adapters", &self.names())
            .finish()
    }
}
