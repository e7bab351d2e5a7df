//! Runtime adapter registry
//!
//! Handles the adapter bootstrap manifest and adapter construction.

pub mod adapters;
pub mod manifest;

pub use adapters::{AdapterConstructor, AdapterRegistry};
pub use manifest::AdapterManifest;
