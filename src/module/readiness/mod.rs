//! Readiness signalling between a started module and the loader

pub mod slot;

pub use slot::{channel, PublishError, ReadinessPublisher, ReadinessWatcher};
