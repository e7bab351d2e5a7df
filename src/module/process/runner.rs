//! Module execution context
//!
//! A started module lives on its own OS thread for the lifetime of the
//! process. The loader never joins or cancels it. The thread ends when the
//! module gives up before signalling readiness, or when it signals only after
//! the loader has stopped waiting.

use std::thread::JoinHandle;
use tokio::sync::mpsc;
use tracing::{debug, warn, Span};
use wasmtime::{Instance, Store, Val};

use crate::module::adapter::HostState;
use crate::module::api::{CallRequest, Value};
use crate::module::traits::ModuleError;

/// Handle to a started module's thread
#[derive(Debug)]
pub struct ModuleRunner {
    module_name: String,
    thread: JoinHandle<()>,
}

impl ModuleRunner {
    /// Start `body` on a dedicated thread named after the module
    ///
    /// The caller's tracing span is re-entered on the new thread so module
    /// logs stay attached to the load that started them. Control characters
    /// are dropped from the thread name.
    pub fn spawn<F>(module_name: &str, body: F) -> Result<Self, ModuleError>
    where
        F: FnOnce() + Send + 'static,
    {
        let span = Span::current();
        let thread_name: String = module_name.chars().filter(|c| !c.is_control()).collect();
        let thread = std::thread::Builder::new()
            .name(format!("modbridge-{}", thread_name))
            .spawn(move || {
                let _entered = span.enter();
                body();
            })
            .map_err(|e| {
                ModuleError::StartFailed(format!(
                    "Failed to spawn thread for module {}: {}",
                    module_name, e
                ))
            })?;

        debug!("Module {} started on its own thread", module_name);
        Ok(Self {
            module_name: module_name.to_string(),
            thread,
        })
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    /// Whether the module's thread has ended
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Let the module run unobserved for the rest of the process
    pub fn detach(self) {
        debug!("Detaching module {}", self.module_name);
    }
}

/// Service capability calls until the inbox closes
///
/// Calls run one at a time on the module's thread, in arrival order.
pub fn serve_calls(
    store: &mut Store<HostState>,
    instance: Instance,
    inbox: &mut mpsc::Receiver<CallRequest>,
) {
    while let Some(request) = inbox.blocking_recv() {
        let CallRequest {
            operation,
            args,
            reply,
        } = request;

        let result = dispatch(store, instance, &operation, &args);
        if let Err(e) = &result {
            warn!("Call to {} failed: {}", operation, e);
        }
        if reply.send(result).is_err() {
            debug!("Caller of {} went away before the reply", operation);
        }
    }
}

fn dispatch(
    store: &mut Store<HostState>,
    instance: Instance,
    operation: &str,
    args: &[Value],
) -> Result<Vec<Value>, ModuleError> {
    let func = instance
        .get_func(&mut *store, operation)
        .ok_or_else(|| ModuleError::CapabilityNotFound(operation.to_string()))?;

    let params: Vec<Val> = args.iter().copied().map(Val::from).collect();
    let result_count = func.ty(&*store).results().len();
    let mut results = vec![Val::I32(0); result_count];

    func.call(&mut *store, &params, &mut results)
        .map_err(|e| ModuleError::CallFailed(format!("{}: {:#}", operation, e)))?;

    results.iter().map(Value::try_from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_spawn_runs_body_on_named_thread() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let runner = ModuleRunner::spawn("gophers", move || {
            assert_eq!(std::thread::current().name(), Some("modbridge-gophers"));
            flag.store(true, Ordering::SeqCst);
        })
        .unwrap();

        assert_eq!(runner.module_name(), "gophers");
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !runner.is_finished() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(runner.is_finished());
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_spawn_strips_nul_from_thread_name() {
        let (tx, rx) = std::sync::mpsc::channel();
        let runner = ModuleRunner::spawn("a\0b", move || {
            let _ = tx.send(std::thread::current().name().map(str::to_string));
        })
        .unwrap();

        assert_eq!(runner.module_name(), "a\0b");
        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some("modbridge-ab"));
    }
}
