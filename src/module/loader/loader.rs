//! Module loader implementation
//!
//! A load runs three phases in order:
//!
//! 1. Acquire the module bytes and compile them, streaming first with a
//!    buffered fallback governed by [`FallbackPolicy`].
//! 2. Instantiate against the primed adapter's import table and start the
//!    module on its own thread without waiting for it.
//! 3. Wait on the module's readiness slot and resolve with the capability set
//!    it published.
//!
//! The runtime adapter is primed once per loader from the bootstrap manifest
//! at [`LoaderConfig::adapter_address`].

use bytes::Bytes;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, OnceCell};
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;
use wasmtime::{Engine, Module, Store};

use crate::config::LoaderConfig;
use crate::module::adapter::InstanceHandle;
use crate::module::api::CapabilitySet;
use crate::module::readiness::{self, ReadinessWatcher};
use crate::module::registry::manifest::MAX_MANIFEST_BYTES;
use crate::module::registry::{AdapterManifest, AdapterRegistry};
use crate::module::source::{Fetcher, ModuleAddress, SourceFetcher};
use crate::module::traits::{
    FallbackPolicy, InstantiationPath, ModuleError, RuntimeAdapter, StreamingFailure,
};
use crate::utils::error::{with_fallback_if_async, FallbackFailure};
use crate::utils::timeout::{with_custom_timeout, with_optional_timeout};

/// Adapter constructed from the bootstrap manifest
struct PrimedAdapter {
    manifest: AdapterManifest,
    adapter: Arc<dyn RuntimeAdapter>,
}

/// Result of a successful load
#[derive(Debug, Clone)]
pub struct LoadedModule {
    /// Capabilities exactly as the module published them
    pub capabilities: CapabilitySet,
    /// Which acquisition path produced the compiled module
    pub path: InstantiationPath,
    /// Identifier carried by this load's log lines
    pub load_id: Uuid,
    /// Time from the start of the load to readiness
    pub elapsed: Duration,
}

/// Module loader for fetching, starting, and awaiting modules
pub struct ModuleLoader {
    config: LoaderConfig,
    engine: Engine,
    fetcher: Arc<dyn Fetcher>,
    registry: AdapterRegistry,
    primed: OnceCell<PrimedAdapter>,
}

impl ModuleLoader {
    /// Create a loader with the default fetcher and adapter registry
    pub fn new(config: LoaderConfig) -> Result<Self, ModuleError> {
        config.validate()?;
        Ok(Self {
            config,
            engine: Engine::default(),
            fetcher: Arc::new(SourceFetcher::new()),
            registry: AdapterRegistry::default(),
            primed: OnceCell::new(),
        })
    }

    /// Replace the byte fetcher used for both the bootstrap and modules
    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Replace the adapter registry consulted while priming
    pub fn with_registry(mut self, registry: AdapterRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Compile with a caller-configured engine
    pub fn with_engine(mut self, engine: Engine) -> Self {
        self.engine = engine;
        self
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Whether the runtime adapter has been primed
    pub fn is_primed(&self) -> bool {
        self.primed.initialized()
    }

    /// Prime the runtime adapter
    ///
    /// Fetches and parses the bootstrap manifest and constructs the adapter
    /// it names. Idempotent: once primed, later calls (including concurrent
    /// ones) return without fetching again. A failed attempt leaves the loader
    /// unprimed.
    pub async fn prime(&self) -> Result<(), ModuleError> {
        self.primed_adapter().await.map(|_| ())
    }

    async fn primed_adapter(&self) -> Result<&PrimedAdapter, ModuleError> {
        self.primed.get_or_try_init(|| self.bootstrap()).await
    }

    async fn bootstrap(&self) -> Result<PrimedAdapter, ModuleError> {
        let address: ModuleAddress = self
            .config
            .adapter_address
            .parse()
            .map_err(|e: ModuleError| ModuleError::AdapterBootstrap(e.to_string()))?;
        debug!("Fetching adapter bootstrap from {}", address);

        let bytes = with_custom_timeout(
            self.fetcher.fetch_bytes(&address, MAX_MANIFEST_BYTES),
            self.config.fetch_timeout(),
        )
        .await
        .map_err(|_| {
            ModuleError::AdapterBootstrap(format!("Timed out fetching {}", address))
        })?
        .map_err(|e| ModuleError::AdapterBootstrap(format!("{}: {}", address, e)))?;

        let manifest = AdapterManifest::from_bytes(&bytes)?;
        let adapter = self.registry.construct(&manifest)?;
        info!("Primed runtime adapter {} from {}", adapter.name(), address);

        Ok(PrimedAdapter { manifest, adapter })
    }

    /// Load a module and resolve with its capability set
    pub async fn load(&self, module_address: &str) -> Result<CapabilitySet, ModuleError> {
        self.load_detailed(module_address)
            .await
            .map(|loaded| loaded.capabilities)
    }

    /// Load a module, also reporting how it was acquired
    pub async fn load_detailed(&self, module_address: &str) -> Result<LoadedModule, ModuleError> {
        let load_id = Uuid::new_v4();
        let span = info_span!("load", id = %load_id, module = %module_address);
        self.run_load(module_address, load_id).instrument(span).await
    }

    async fn run_load(&self, module_address: &str, load_id: Uuid) -> Result<LoadedModule, ModuleError> {
        let started = Instant::now();
        let address: ModuleAddress = module_address.parse()?;
        let primed = self.primed_adapter().await?;

        let (module, path) = self.acquire(&address).await?;
        info!("Compiled module {} via {} path", address, path);

        let watcher = self.start(&address, module, primed).await?;
        let capabilities = self.await_ready(watcher).await?;

        let elapsed = started.elapsed();
        info!(
            "Module {} ready after {:?} with {} capabilities under {}",
            address,
            elapsed,
            capabilities.len(),
            capabilities.namespace()
        );

        Ok(LoadedModule {
            capabilities,
            path,
            load_id,
            elapsed,
        })
    }

    /// Fetch and compile, streaming first
    async fn acquire(
        &self,
        address: &ModuleAddress,
    ) -> Result<(Module, InstantiationPath), ModuleError> {
        let policy: FallbackPolicy = self.config.fallback_policy;

        let result = with_fallback_if_async(
            move || async move {
                self.compile_streaming(address)
                    .await
                    .map(|module| (module, InstantiationPath::Streaming))
            },
            |failure: &StreamingFailure| policy.admits(failure),
            move || async move {
                self.compile_buffered(address)
                    .await
                    .map(|module| (module, InstantiationPath::Buffered))
            },
            "Streaming instantiation failed, falling back to buffered",
        )
        .await;

        result.map_err(|failure| match failure {
            FallbackFailure::Rejected(streaming) => ModuleError::ModuleUnavailable(format!(
                "{}: streaming instantiation failed ({}), fallback not permitted by {:?} policy",
                address, streaming, policy
            )),
            FallbackFailure::Exhausted { primary, fallback } => {
                ModuleError::ModuleUnavailable(format!(
                    "{}: streaming instantiation failed ({}); buffered instantiation failed ({})",
                    address, primary, fallback
                ))
            }
        })
    }

    async fn compile_streaming(&self, address: &ModuleAddress) -> Result<Module, StreamingFailure> {
        let fetch_timeout = self.config.fetch_timeout();

        let stream = with_custom_timeout(self.fetcher.fetch_stream(address), fetch_timeout)
            .await
            .map_err(|_| StreamingFailure::Transport("timed out opening stream".to_string()))?
            .map_err(|e| StreamingFailure::Transport(e.to_string()))?;

        if !stream.is_wasm() {
            return Err(StreamingFailure::Transport(format!(
                "content type {} does not support streaming compilation",
                stream.content_type.as_deref().unwrap_or("(none)")
            )));
        }

        let bytes = with_custom_timeout(stream.collect(self.config.max_module_bytes), fetch_timeout)
            .await
            .map_err(|_| StreamingFailure::Transport("timed out reading stream".to_string()))?
            .map_err(|e| StreamingFailure::Transport(e.to_string()))?;

        compile(&self.engine, bytes)
            .await
            .map_err(StreamingFailure::Compile)
    }

    async fn compile_buffered(&self, address: &ModuleAddress) -> Result<Module, ModuleError> {
        let bytes = with_custom_timeout(
            self.fetcher.fetch_bytes(address, self.config.max_module_bytes),
            self.config.fetch_timeout(),
        )
        .await
        .map_err(|_| ModuleError::Fetch(format!("Timed out fetching {}", address)))??;

        compile(&self.engine, bytes)
            .await
            .map_err(|e| ModuleError::ModuleUnavailable(format!("compile: {}", e)))
    }

    /// Instantiate and hand the instance to the adapter without waiting
    ///
    /// Instantiation runs the module's start section, if any, so it happens
    /// on the blocking pool.
    async fn start(
        &self,
        address: &ModuleAddress,
        module: Module,
        primed: &PrimedAdapter,
    ) -> Result<ReadinessWatcher, ModuleError> {
        let (publisher, watcher) = readiness::channel(primed.manifest.namespace.clone());
        let (inbox_tx, inbox_rx) = mpsc::channel(self.config.call_queue_depth);
        let state = primed
            .adapter
            .host_state(&address.module_name(), publisher, inbox_tx);
        let linker = primed.adapter.import_table(&self.engine)?;

        let mut store = Store::new(&self.engine, state);
        let (store, instance) = tokio::task::spawn_blocking(move || {
            linker
                .instantiate(&mut store, &module)
                .map(|instance| (store, instance))
        })
        .await
        .map_err(|e| ModuleError::StartFailed(format!("{}: instantiation task: {}", address, e)))?
        .map_err(|e| {
            ModuleError::ModuleUnavailable(format!("{}: instantiation failed: {:#}", address, e))
        })?;

        primed
            .adapter
            .run(InstanceHandle::new(store, instance, inbox_rx))?
            .detach();

        Ok(watcher)
    }

    async fn await_ready(&self, watcher: ReadinessWatcher) -> Result<CapabilitySet, ModuleError> {
        let timeout = self.config.readiness_timeout();
        with_optional_timeout(watcher.wait_ready(), timeout)
            .await
            .map_err(|_| ModuleError::ReadinessTimeout(timeout.unwrap_or_default()))?
    }
}

/// Compile off the async runtime
async fn compile(engine: &Engine, bytes: Bytes) -> Result<Module, String> {
    tokio::task::spawn_blocking({
        let engine = engine.clone();
        move || Module::from_binary(&engine, &bytes).map_err(|e| format!("{:#}", e))
    })
    .await
    .map_err(|e| format!("Task join error: {e}"))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const READY_WAT: &str = r#"
        (module
          (import "bridge" "register" (func $register (param i32 i32)))
          (import "bridge" "ready" (func $ready (param i32 i32)))
          (memory (export "memory") 1)
          (data (i32.const 0) "op1")
          (data (i32.const 16) "gophers")
          (func (export "op1") (param i32 i32) (result i32)
            local.get 0
            local.get 1
            i32.add)
          (func (export "_start")
            (call $register (i32.const 0) (i32.const 3))
            (call $ready (i32.const 16) (i32.const 7))))
    "#;

    fn fixture(dir: &TempDir, module_file: &str, bytes: &[u8]) -> (LoaderConfig, String) {
        let adapter = dir.path().join("adapter.toml");
        std::fs::write(&adapter, "adapter = \"bridge\"\n").unwrap();
        let module = dir.path().join(module_file);
        std::fs::write(&module, bytes).unwrap();

        (
            LoaderConfig::with_adapter(adapter.display().to_string()),
            module.display().to_string(),
        )
    }

    #[tokio::test]
    async fn test_load_wasm_file_streams() {
        let dir = TempDir::new().unwrap();
        let wasm = wat::parse_str(READY_WAT).unwrap();
        let (config, module) = fixture(&dir, "gophers.wasm", &wasm);

        let loader = ModuleLoader::new(config).unwrap();
        assert!(!loader.is_primed());

        let loaded = loader.load_detailed(&module).await.unwrap();
        assert!(loader.is_primed());
        assert_eq!(loaded.path, InstantiationPath::Streaming);
        assert_eq!(loaded.capabilities.namespace(), "gophers");
        assert_eq!(loaded.capabilities.names().collect::<Vec<_>>(), vec!["op1"]);
    }

    #[tokio::test]
    async fn test_load_other_extension_buffers() {
        let dir = TempDir::new().unwrap();
        let wasm = wat::parse_str(READY_WAT).unwrap();
        let (config, module) = fixture(&dir, "gophers.bin", &wasm);

        let loaded = ModuleLoader::new(config)
            .unwrap()
            .load_detailed(&module)
            .await
            .unwrap();
        assert_eq!(loaded.path, InstantiationPath::Buffered);
        assert!(loaded.capabilities.contains("op1"));
    }

    #[tokio::test]
    async fn test_compile_failure_skips_fallback_by_default() {
        let dir = TempDir::new().unwrap();
        let (config, module) = fixture(&dir, "broken.wasm", b"\0asm\x01\0\0\0garbage");

        let err = ModuleLoader::new(config)
            .unwrap()
            .load(&module)
            .await
            .unwrap_err();
        match err {
            ModuleError::ModuleUnavailable(msg) => assert!(msg.contains("not permitted")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let config = LoaderConfig {
            call_queue_depth: 0,
            ..LoaderConfig::default()
        };
        assert!(matches!(
            ModuleLoader::new(config),
            Err(ModuleError::Config(_))
        ));
    }
}
