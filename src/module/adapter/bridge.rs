//! Built-in `bridge` adapter
//!
//! Import table (all under the manifest's `import_module`, `bridge` by default):
//!
//! - `register(name_ptr: i32, name_len: i32)` declares an exported function as
//!   a capability. The name is read as UTF-8 from the exported `memory`.
//! - `ready(ns_ptr: i32, ns_len: i32)` publishes every registered capability
//!   under the given namespace. This is the readiness signal.
//! - `log(level: i32, ptr: i32, len: i32)` forwards a line to `tracing`
//!   (0 error, 1 warn, 2 info, 3 debug, anything else trace).
//!
//! Running a module calls its entry point on a dedicated thread, then parks
//! that thread servicing capability calls for as long as the process lives.
//! A module whose loader stopped waiting is released instead.

use tracing::{debug, error, info, trace, warn};
use wasmtime::{Caller, Engine, Extern, Linker};

use crate::module::adapter::{HostState, ImportTable, InstanceHandle};
use crate::module::process::{serve_calls, ModuleRunner};
use crate::module::readiness::PublishError;
use crate::module::registry::AdapterManifest;
use crate::module::traits::{ModuleError, RuntimeAdapter};

/// Default import module name
pub const DEFAULT_IMPORT_MODULE: &str = "bridge";

/// Default entry point export
pub const DEFAULT_ENTRY_POINT: &str = "_start";

/// Adapter for modules speaking the register/ready ABI
#[derive(Debug, Clone)]
pub struct BridgeAdapter {
    import_module: String,
    entry_point: String,
}

impl BridgeAdapter {
    /// Registered adapter name
    pub const NAME: &'static str = "bridge";

    pub fn new() -> Self {
        Self {
            import_module: DEFAULT_IMPORT_MODULE.to_string(),
            entry_point: DEFAULT_ENTRY_POINT.to_string(),
        }
    }

    pub fn from_manifest(manifest: &AdapterManifest) -> Self {
        Self {
            import_module: manifest.import_module.clone(),
            entry_point: manifest.entry_point.clone(),
        }
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub fn import_module(&self) -> &str {
        &self.import_module
    }
}

impl Default for BridgeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeAdapter for BridgeAdapter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn import_table(&self, engine: &Engine) -> Result<ImportTable, ModuleError> {
        let mut linker: Linker<HostState> = Linker::new(engine);
        let module = self.import_module.as_str();
        let define_err =
            |e: wasmtime::Error| ModuleError::AdapterBootstrap(format!("import table: {:#}", e));

        linker
            .func_wrap(
                module,
                "register",
                |mut caller: Caller<'_, HostState>, ptr: i32, len: i32| -> wasmtime::Result<()> {
                    let name = read_guest_str(&mut caller, ptr, len)?;
                    caller.data_mut().register(name);
                    Ok(())
                },
            )
            .map_err(define_err)?;

        linker
            .func_wrap(
                module,
                "ready",
                |mut caller: Caller<'_, HostState>, ptr: i32, len: i32| -> wasmtime::Result<()> {
                    let namespace = read_guest_str(&mut caller, ptr, len)?;
                    match caller.data_mut().publish(&namespace) {
                        Ok(()) | Err(PublishError::AlreadyPublished) => Ok(()),
                        Err(e) => Err(wasmtime::Error::msg(e.to_string())),
                    }
                },
            )
            .map_err(define_err)?;

        linker
            .func_wrap(
                module,
                "log",
                |mut caller: Caller<'_, HostState>,
                 level: i32,
                 ptr: i32,
                 len: i32|
                 -> wasmtime::Result<()> {
                    let line = read_guest_str(&mut caller, ptr, len)?;
                    let guest = caller.data().module_name();
                    match level {
                        0 => error!(target: "modbridge::guest", guest, "{}", line),
                        1 => warn!(target: "modbridge::guest", guest, "{}", line),
                        2 => info!(target: "modbridge::guest", guest, "{}", line),
                        3 => debug!(target: "modbridge::guest", guest, "{}", line),
                        _ => trace!(target: "modbridge::guest", guest, "{}", line),
                    }
                    Ok(())
                },
            )
            .map_err(define_err)?;

        Ok(linker)
    }

    fn run(&self, handle: InstanceHandle) -> Result<ModuleRunner, ModuleError> {
        let entry_point = self.entry_point.clone();
        let module_name = handle.module_name().to_string();
        ModuleRunner::spawn(&module_name, move || run_module(handle, &entry_point))
    }
}

/// Drive a started instance: call `entry_point`, then service calls forever
///
/// Returns if the entry point is missing or traps, if it returns without
/// signalling readiness, or if the loader gave up waiting before it took the
/// capability set. Once claimed, the host state keeps its own inbox sender,
/// so the module services calls for the life of the process. Returning early
/// drops the instance and with it the readiness publisher, which a waiting
/// loader observes as an early exit.
pub fn run_module(handle: InstanceHandle, entry_point: &str) {
    let (mut store, instance, mut inbox) = handle.into_parts();
    let module_name = store.data().module_name().to_string();

    let entry = match instance.get_typed_func::<(), ()>(&mut store, entry_point) {
        Ok(entry) => entry,
        Err(e) => {
            error!("Module {} has no usable entry point {}: {:#}", module_name, entry_point, e);
            return;
        }
    };

    info!("Starting module {} at {}", module_name, entry_point);
    if let Err(e) = entry.call(&mut store, ()) {
        error!("Module {} trapped in {}: {:#}", module_name, entry_point, e);
        return;
    }

    if !store.data().is_ready() {
        warn!(
            "Module {} returned from {} without signalling readiness",
            module_name, entry_point
        );
        return;
    }

    if !store.data().wait_claimed() {
        warn!(
            "Module {} signalled readiness after the loader stopped waiting, releasing it",
            module_name
        );
        return;
    }

    serve_calls(&mut store, instance, &mut inbox);
    debug!("Module {} inbox closed", module_name);
}

/// Read a UTF-8 string out of the caller's exported memory
fn read_guest_str(caller: &mut Caller<'_, HostState>, ptr: i32, len: i32) -> wasmtime::Result<String> {
    let memory = caller
        .get_export("memory")
        .and_then(Extern::into_memory)
        .ok_or_else(|| wasmtime::Error::msg("module does not export memory"))?;

    let start = usize::try_from(ptr).map_err(|_| wasmtime::Error::msg("negative pointer"))?;
    let len = usize::try_from(len).map_err(|_| wasmtime::Error::msg("negative length"))?;
    let end = start
        .checked_add(len)
        .ok_or_else(|| wasmtime::Error::msg("string range overflows"))?;

    let bytes = memory
        .data(&*caller)
        .get(start..end)
        .ok_or_else(|| wasmtime::Error::msg("string out of bounds"))?;

    String::from_utf8(bytes.to_vec()).map_err(|_| wasmtime::Error::msg("string is not valid UTF-8"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::readiness;
    use tokio::sync::mpsc;
    use wasmtime::Store;

    #[test]
    fn test_import_table_defines_bridge_abi() {
        let engine = Engine::default();
        let linker = BridgeAdapter::new().import_table(&engine).unwrap();

        let (publisher, _watcher) = readiness::channel(None);
        let (inbox, _rx) = mpsc::channel(1);
        let mut store = Store::new(&engine, HostState::new("gophers", publisher, inbox));
        let names: Vec<String> = linker
            .iter(&mut store)
            .map(|(module, name, _)| format!("{}.{}", module, name))
            .collect();

        for expected in ["bridge.register", "bridge.ready", "bridge.log"] {
            assert!(names.iter().any(|n| n == expected), "missing {}", expected);
        }
    }

    #[test]
    fn test_manifest_overrides() {
        let manifest: AdapterManifest = toml::from_str(
            r#"
            adapter = "bridge"
            entry_point = "main"
            import_module = "gophers"
            "#,
        )
        .unwrap();
        let adapter = BridgeAdapter::from_manifest(&manifest);
        assert_eq!(adapter.entry_point(), "main");
        assert_eq!(adapter.import_module(), "gophers");
        assert_eq!(adapter.name(), "bridge");
    }
}
