//! Module execution contexts
//!
//! Runs started modules on dedicated threads and services their calls.

pub mod runner;

pub use runner::{serve_calls, ModuleRunner};
