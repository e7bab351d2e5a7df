//! Configuration management for the module loader
//!
//! Handles configuration loading, validation, and environment overrides.

use crate::module::traits::FallbackPolicy;
use crate::utils::env::{env_int, env_opt};
use crate::utils::timeout::{DEFAULT_FETCH_TIMEOUT, DEFAULT_READINESS_TIMEOUT};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log filter (e.g., "info", "modbridge=debug,modbridge::guest=trace").
    /// RUST_LOG takes precedence when set.
    #[serde(default)]
    pub filter: Option<String>,

    /// Emit JSON lines (requires the `json-logging` feature)
    #[serde(default)]
    pub json_format: bool,
}

/// Loader configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Address of the adapter bootstrap manifest (path or http(s) URL)
    #[serde(default = "default_adapter_address")]
    pub adapter_address: String,

    /// Which streaming failures may fall back to the buffered path
    #[serde(default)]
    pub fallback_policy: FallbackPolicy,

    /// Readiness timeout in milliseconds (0 = wait without bound)
    #[serde(default = "default_readiness_timeout_millis")]
    pub readiness_timeout_millis: u64,

    /// Timeout for each fetch in seconds
    #[serde(default = "default_fetch_timeout_seconds")]
    pub fetch_timeout_seconds: u64,

    /// Largest module binary accepted
    #[serde(default = "default_max_module_bytes")]
    pub max_module_bytes: usize,

    /// Pending calls a module's inbox holds before callers wait
    #[serde(default = "default_call_queue_depth")]
    pub call_queue_depth: usize,

    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

fn default_adapter_address() -> String {
    "adapter.toml".to_string()
}

fn default_readiness_timeout_millis() -> u64 {
    DEFAULT_READINESS_TIMEOUT.as_millis() as u64
}

fn default_fetch_timeout_seconds() -> u64 {
    DEFAULT_FETCH_TIMEOUT.as_secs()
}

fn default_max_module_bytes() -> usize {
    256 * 1024 * 1024
}

fn default_call_queue_depth() -> usize {
    64
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            adapter_address: default_adapter_address(),
            fallback_policy: FallbackPolicy::default(),
            readiness_timeout_millis: default_readiness_timeout_millis(),
            fetch_timeout_seconds: default_fetch_timeout_seconds(),
            max_module_bytes: default_max_module_bytes(),
            call_queue_depth: default_call_queue_depth(),
            logging: None,
        }
    }
}

impl LoaderConfig {
    /// Config pointing at a specific bootstrap manifest, defaults elsewhere
    pub fn with_adapter(adapter_address: impl Into<String>) -> Self {
        Self {
            adapter_address: adapter_address.into(),
            ..Self::default()
        }
    }

    /// Readiness timeout, `None` when unbounded
    pub fn readiness_timeout(&self) -> Option<Duration> {
        match self.readiness_timeout_millis {
            0 => None,
            millis => Some(Duration::from_millis(millis)),
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }

    /// Load configuration from TOML file
    pub fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: LoaderConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from JSON file
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: LoaderConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to JSON file
    pub fn to_json_file(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply MODBRIDGE_* environment overrides
    ///
    /// - `MODBRIDGE_ADAPTER`: bootstrap manifest address
    /// - `MODBRIDGE_READINESS_TIMEOUT_MS`: readiness timeout in milliseconds
    /// - `MODBRIDGE_FALLBACK_POLICY`: `transport_only` or `any`
    ///
    /// Unparseable values are logged and ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Some(address) = env_opt("MODBRIDGE_ADAPTER") {
            self.adapter_address = address;
        }

        if let Some(millis) = env_int::<u64>("MODBRIDGE_READINESS_TIMEOUT_MS") {
            self.readiness_timeout_millis = millis;
        } else if env_opt("MODBRIDGE_READINESS_TIMEOUT_MS").is_some() {
            warn!("Ignoring unparseable MODBRIDGE_READINESS_TIMEOUT_MS");
        }

        if let Some(policy) = env_opt("MODBRIDGE_FALLBACK_POLICY") {
            match policy.parse() {
                Ok(policy) => self.fallback_policy = policy,
                Err(e) => warn!("Ignoring MODBRIDGE_FALLBACK_POLICY: {}", e),
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.adapter_address.trim().is_empty() {
            return Err(anyhow::anyhow!("adapter_address must not be empty"));
        }

        if self.fetch_timeout_seconds == 0 {
            return Err(anyhow::anyhow!(
                "fetch_timeout_seconds must be greater than 0"
            ));
        }

        if self.max_module_bytes == 0 {
            return Err(anyhow::anyhow!("max_module_bytes must be greater than 0"));
        }

        // tokio's mpsc panics on a zero-capacity channel
        if self.call_queue_depth == 0 {
            return Err(anyhow::anyhow!("call_queue_depth must be greater than 0"));
        }

        Ok(())
    }
}
