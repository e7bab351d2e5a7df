//! modbridge - WebAssembly module loader and readiness bridge
//!
//! Loads a precompiled WebAssembly module into the host, starts its entry
//! point on a dedicated thread, and resolves once the module has published
//! the set of operations it exposes.
//!
//! ## Load sequence
//!
//! 1. Prime the runtime adapter named by the bootstrap manifest (once)
//! 2. Fetch and compile the module, streaming first with a buffered fallback
//! 3. Instantiate against the adapter's import table and start the module
//! 4. Await the module's readiness signal, bounded by a configurable timeout
//!
//! ```rust,no_run
//! # async fn demo() -> Result<(), modbridge::ModuleError> {
//! use modbridge::{LoaderConfig, ModuleLoader, Value};
//!
//! let loader = ModuleLoader::new(LoaderConfig::with_adapter("adapter.toml"))?;
//! let capabilities = loader.load("modules/gophers.wasm").await?;
//! let _sum = capabilities
//!     .call("op1", vec![Value::I32(2), Value::I32(3)])
//!     .await?;
//! # Ok(())
//! # }
//! ```

// Memory allocator optimization using mimalloc (faster than default allocator)
#[cfg(all(feature = "mimalloc", not(target_os = "windows")))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod config;
pub mod module;
pub mod utils;

// Re-export config module
pub use config::{LoaderConfig, LoggingConfig};

pub use module::{
    AdapterManifest, AdapterRegistry, Capability, CapabilitySet, FallbackPolicy,
    InstantiationPath, LoadedModule, ModuleAddress, ModuleError, ModuleLoader, RuntimeAdapter,
    Value,
};
