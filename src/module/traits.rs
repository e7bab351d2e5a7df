//! Module system traits and interfaces
//!
//! Defines the runtime adapter seam, the instantiation path vocabulary, and the
//! error type shared by every phase of a load.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::module::adapter::{HostState, ImportTable, InstanceHandle};
use crate::module::api::CallRequest;
use crate::module::process::ModuleRunner;
use crate::module::readiness::ReadinessPublisher;

/// Which acquisition path produced the compiled module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstantiationPath {
    /// Compiled directly from the fetch stream
    Streaming,
    /// Compiled from a fully buffered fetch after the streaming path failed
    Buffered,
}

impl fmt::Display for InstantiationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstantiationPath::Streaming => write!(f, "streaming"),
            InstantiationPath::Buffered => write!(f, "buffered"),
        }
    }
}

/// Why the streaming path failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamingFailure {
    /// The transport could not feed a streaming compile (content type,
    /// fetch error, I/O error mid-stream, timeout)
    Transport(String),
    /// The bytes arrived but did not compile
    Compile(String),
}

impl fmt::Display for StreamingFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamingFailure::Transport(msg) => write!(f, "transport: {}", msg),
            StreamingFailure::Compile(msg) => write!(f, "compile: {}", msg),
        }
    }
}

/// Which streaming failures the buffered path is allowed to absorb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Fall back only on transport failures; compile failures surface directly
    #[default]
    TransportOnly,
    /// Fall back on any streaming failure
    Any,
}

impl FallbackPolicy {
    /// Whether this policy lets the buffered path run after `failure`
    pub fn admits(&self, failure: &StreamingFailure) -> bool {
        match self {
            FallbackPolicy::Any => true,
            FallbackPolicy::TransportOnly => matches!(failure, StreamingFailure::Transport(_)),
        }
    }
}

impl FromStr for FallbackPolicy {
    type Err = ModuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "transport_only" | "transport-only" | "transport" => Ok(FallbackPolicy::TransportOnly),
            "any" => Ok(FallbackPolicy::Any),
            other => Err(ModuleError::Config(format!(
                "Unknown fallback policy: {}",
                other
            ))),
        }
    }
}

/// Host runtime adapter
///
/// The adapter owns the shape of the import table a module is instantiated
/// against and the way a started module is driven. The loader treats it as an
/// opaque collaborator: it asks for an import table and a host state,
/// instantiates, and hands the live instance to [`RuntimeAdapter::run`]
/// without awaiting it.
pub trait RuntimeAdapter: Send + Sync {
    /// Registered adapter name
    fn name(&self) -> &str;

    /// Build the import table for a fresh instance
    fn import_table(&self, engine: &wasmtime::Engine) -> Result<ImportTable, ModuleError>;

    /// Build the state a fresh instance's store carries
    ///
    /// The loader supplies the readiness publisher and the sender half of the
    /// instance's call inbox; both must end up in the returned state.
    fn host_state(
        &self,
        module_name: &str,
        publisher: ReadinessPublisher,
        inbox: mpsc::Sender<CallRequest>,
    ) -> HostState {
        HostState::new(module_name, publisher, inbox)
    }

    /// Start the instance on its own execution context
    ///
    /// Must return as soon as the module is started. Under normal operation the
    /// module never finishes; the returned runner is detached by the loader.
    fn run(&self, handle: InstanceHandle) -> Result<ModuleRunner, ModuleError>;
}

/// Module system errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModuleError {
    #[error("Adapter bootstrap failed: {0}")]
    AdapterBootstrap(String),

    #[error("Module unavailable: {0}")]
    ModuleUnavailable(String),

    #[error("Timed out after {0:?} waiting for module readiness")]
    ReadinessTimeout(Duration),

    #[error("Module exited before signalling readiness: {0}")]
    ModuleExited(String),

    #[error("Invalid module address: {0}")]
    InvalidAddress(String),

    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Module failed to start: {0}")]
    StartFailed(String),

    #[error("Capability not found: {0}")]
    CapabilityNotFound(String),

    #[error("Capability call failed: {0}")]
    CallFailed(String),

    #[error("Module is no longer servicing calls")]
    ModuleStopped,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for ModuleError {
    fn from(e: serde_json::Error) -> Self {
        ModuleError::SerializationError(e.to_string())
    }
}

impl From<toml::de::Error> for ModuleError {
    fn from(e: toml::de::Error) -> Self {
        ModuleError::SerializationError(e.to_string())
    }
}

impl From<anyhow::Error> for ModuleError {
    fn from(e: anyhow::Error) -> Self {
        ModuleError::Config(format!("{:#}", e))
    }
}

impl From<std::io::Error> for ModuleError {
    fn from(e: std::io::Error) -> Self {
        ModuleError::Fetch(e.to_string())
    }
}
