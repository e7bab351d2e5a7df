//! Module loading system
//!
//! Handles adapter priming, module acquisition, start, and readiness.

pub mod loader;

pub use loader::{LoadedModule, ModuleLoader};
