//! Test utilities for loader testing
//!
//! Provides WAT fixtures, an isolated bootstrap/module directory, a fetcher
//! that counts what it was asked for, and an adapter that delays the module
//! before running it.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use modbridge::module::adapter::bridge::{run_module, BridgeAdapter};
use modbridge::module::adapter::{ImportTable, InstanceHandle};
use modbridge::module::process::ModuleRunner;
use modbridge::module::source::{ByteStream, Fetcher, ModuleAddress, SourceFetcher};
use modbridge::{AdapterManifest, AdapterRegistry, LoaderConfig, ModuleError, RuntimeAdapter};

/// Registers `op1` (i32 addition) and signals readiness under `gophers`
pub const OP1_WAT: &str = r#"
    (module
      (import "bridge" "register" (func $register (param i32 i32)))
      (import "bridge" "ready" (func $ready (param i32 i32)))
      (import "bridge" "log" (func $log (param i32 i32 i32)))
      (memory (export "memory") 1)
      (data (i32.const 0) "op1")
      (data (i32.const 16) "gophers")
      (data (i32.const 32) "registering op1")
      (func (export "op1") (param i32 i32) (result i32)
        local.get 0
        local.get 1
        i32.add)
      (func (export "_start")
        (call $log (i32.const 2) (i32.const 32) (i32.const 15))
        (call $register (i32.const 0) (i32.const 3))
        (call $ready (i32.const 16) (i32.const 7))))
"#;

/// Registers two operations with different signatures
pub const JSON_WAT: &str = r#"
    (module
      (import "bridge" "register" (func $register (param i32 i32)))
      (import "bridge" "ready" (func $ready (param i32 i32)))
      (memory (export "memory") 1)
      (data (i32.const 0) "ReadJSON")
      (data (i32.const 16) "Free")
      (data (i32.const 32) "gophers")
      (global $next (mut i64) (i64.const 0))
      (func (export "ReadJSON") (param i32 i32) (result i64)
        global.get $next
        i64.const 1
        i64.add
        global.set $next
        global.get $next)
      (func (export "Free") (param i64))
      (func (export "_start")
        (call $register (i32.const 0) (i32.const 8))
        (call $register (i32.const 16) (i32.const 4))
        (call $ready (i32.const 32) (i32.const 7))))
"#;

/// Returns from its entry point without ever signalling readiness
pub const SILENT_WAT: &str = r#"
    (module
      (import "bridge" "register" (func $register (param i32 i32)))
      (memory (export "memory") 1)
      (data (i32.const 0) "op1")
      (func (export "_start")
        (call $register (i32.const 0) (i32.const 3))))
"#;

/// Signals readiness under `badgers`
pub const BADGERS_WAT: &str = r#"
    (module
      (import "bridge" "ready" (func $ready (param i32 i32)))
      (memory (export "memory") 1)
      (data (i32.const 0) "badgers")
      (func (export "_start")
        (call $ready (i32.const 0) (i32.const 7))))
"#;

/// Valid header, invalid body
pub const MALFORMED_MODULE: &[u8] = b"\0asm\x01\0\0\0this is not a section";

pub fn compile_wat(wat: &str) -> Vec<u8> {
    wat::parse_str(wat).unwrap()
}

/// Install a test subscriber once; later calls are no-ops
pub fn init_test_logging() {
    modbridge::utils::init_logging(Some("modbridge=debug"));
}

/// Test fixture for loader tests
pub struct LoaderTestFixture {
    /// Temporary directory for test data
    pub temp_dir: TempDir,
    /// Bootstrap manifest path
    pub adapter_path: PathBuf,
    /// Modules directory path
    pub modules_dir: PathBuf,
}

impl LoaderTestFixture {
    /// Create a fixture whose bootstrap names the built-in bridge adapter
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        Self::with_manifest("adapter = \"bridge\"\n")
    }

    /// Create a fixture with a custom bootstrap manifest
    pub fn with_manifest(manifest: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let temp_dir = TempDir::new()?;
        let adapter_path = temp_dir.path().join("adapter.toml");
        let modules_dir = temp_dir.path().join("modules");

        std::fs::write(&adapter_path, manifest)?;
        std::fs::create_dir_all(&modules_dir)?;

        Ok(Self {
            temp_dir,
            adapter_path,
            modules_dir,
        })
    }

    /// Loader config pointing at this fixture's bootstrap
    pub fn config(&self) -> LoaderConfig {
        LoaderConfig::with_adapter(self.adapter_path.display().to_string())
    }

    /// Compile `wat` and write it under the modules directory
    pub fn write_module(&self, file_name: &str, wat: &str) -> String {
        self.write_bytes(file_name, &compile_wat(wat))
    }

    /// Write raw module bytes under the modules directory
    pub fn write_bytes(&self, file_name: &str, bytes: &[u8]) -> String {
        let path = self.modules_dir.join(file_name);
        std::fs::write(&path, bytes).unwrap();
        path.display().to_string()
    }
}

/// Fetcher recording every stream and buffer request by address
#[derive(Default)]
pub struct CountingFetcher {
    inner: SourceFetcher,
    streams: Mutex<HashMap<String, usize>>,
    buffers: Mutex<HashMap<String, usize>>,
}

impl CountingFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn streamed(&self, address: impl AsRef<Path>) -> usize {
        Self::count(&self.streams, address.as_ref())
    }

    pub fn buffered(&self, address: impl AsRef<Path>) -> usize {
        Self::count(&self.buffers, address.as_ref())
    }

    fn count(counts: &Mutex<HashMap<String, usize>>, address: &Path) -> usize {
        let key = address.display().to_string();
        counts.lock().unwrap().get(&key).copied().unwrap_or(0)
    }

    fn record(counts: &Mutex<HashMap<String, usize>>, address: &ModuleAddress) {
        *counts
            .lock()
            .unwrap()
            .entry(address.to_string())
            .or_insert(0) += 1;
    }
}

#[async_trait]
impl Fetcher for CountingFetcher {
    async fn fetch_stream(&self, address: &ModuleAddress) -> Result<ByteStream, ModuleError> {
        Self::record(&self.streams, address);
        self.inner.fetch_stream(address).await
    }

    async fn fetch_bytes(&self, address: &ModuleAddress, limit: usize) -> Result<Bytes, ModuleError> {
        Self::record(&self.buffers, address);
        self.inner.fetch_bytes(address, limit).await
    }
}

/// How many modules a [`DelayedAdapter`] started, and how many of their
/// threads have since ended
#[derive(Clone, Default)]
pub struct RunCounters {
    runs: Arc<AtomicUsize>,
    exits: Arc<AtomicUsize>,
}

impl RunCounters {
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn exits(&self) -> usize {
        self.exits.load(Ordering::SeqCst)
    }

    /// Poll until `expected` module threads have ended or `within` elapses
    pub async fn wait_for_exits(&self, expected: usize, within: Duration) -> usize {
        let deadline = tokio::time::Instant::now() + within;
        while self.exits() < expected && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.exits()
    }
}

/// Bridge adapter that waits before running the module and counts runs
pub struct DelayedAdapter {
    inner: BridgeAdapter,
    delay: Duration,
    counters: RunCounters,
}

impl DelayedAdapter {
    pub const NAME: &'static str = "delayed";
}

impl RuntimeAdapter for DelayedAdapter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn import_table(&self, engine: &wasmtime::Engine) -> Result<ImportTable, ModuleError> {
        self.inner.import_table(engine)
    }

    fn run(&self, handle: InstanceHandle) -> Result<ModuleRunner, ModuleError> {
        self.counters.runs.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay;
        let entry_point = self.inner.entry_point().to_string();
        let module_name = handle.module_name().to_string();
        let exits = Arc::clone(&self.counters.exits);
        ModuleRunner::spawn(&module_name, move || {
            std::thread::sleep(delay);
            run_module(handle, &entry_point);
            exits.fetch_add(1, Ordering::SeqCst);
        })
    }
}

/// Registry exposing `delayed`, plus the counters of its runs
pub fn delayed_registry(delay: Duration) -> (AdapterRegistry, RunCounters) {
    let counters = RunCounters::default();
    let mut registry = AdapterRegistry::with_builtin();
    let shared = counters.clone();
    registry.register(DelayedAdapter::NAME, move |manifest: &AdapterManifest| {
        Ok(Arc::new(DelayedAdapter {
            inner: BridgeAdapter::from_manifest(manifest),
            delay,
            counters: shared.clone(),
        }) as Arc<dyn RuntimeAdapter>)
    });
    (registry, counters)
}
