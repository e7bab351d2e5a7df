//! Module API surface
//!
//! The capability set a module publishes and the values its calls exchange.

pub mod capabilities;
pub mod value;

pub use capabilities::{CallRequest, Capability, CapabilitySet};
pub use value::Value;
