//! Module system
//!
//! Loads a compiled WebAssembly module, starts it on its own thread, and
//! bridges the module's one-shot readiness signal into a single awaitable
//! result.
//!
//! ## Architecture
//!
//! - **Source**: addresses and fetchers yielding streamed or buffered bytes
//! - **Registry**: the bootstrap manifest and the adapters it can name
//! - **Adapter**: import table and run loop for a started instance
//! - **Readiness**: single-producer slot the module publishes its capabilities to
//! - **Process**: the dedicated thread a module lives on
//! - **Loader**: composes the above into `load(address) -> CapabilitySet`

pub mod adapter;
pub mod api;
pub mod loader;
pub mod process;
pub mod readiness;
pub mod registry;
pub mod source;
pub mod traits;

pub use adapter::{BridgeAdapter, HostState, ImportTable, InstanceHandle};
pub use api::{Capability, CapabilitySet, Value};
pub use loader::{LoadedModule, ModuleLoader};
pub use process::ModuleRunner;
pub use readiness::{ReadinessPublisher, ReadinessWatcher};
pub use registry::{AdapterManifest, AdapterRegistry};
pub use source::{Fetcher, ModuleAddress, SourceFetcher};
pub use traits::{FallbackPolicy, InstantiationPath, ModuleError, RuntimeAdapter, StreamingFailure};
