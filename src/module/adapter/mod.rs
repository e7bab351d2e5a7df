//! Host runtime adapters
//!
//! An adapter supplies the import table a module is instantiated against and
//! drives the started instance. The state every instance carries is
//! [`HostState`]: the readiness publisher, the registered capability names,
//! and a sender into the instance's own call inbox.

pub mod bridge;

use tokio::sync::mpsc;
use tracing::debug;
use wasmtime::{Instance, Linker, Store};

use crate::module::api::{CallRequest, CapabilitySet};
use crate::module::readiness::{PublishError, ReadinessPublisher};

pub use bridge::BridgeAdapter;

/// Host bindings a module is instantiated against
pub type ImportTable = Linker<HostState>;

/// Per-instance host state
pub struct HostState {
    module_name: String,
    publisher: ReadinessPublisher,
    inbox: mpsc::Sender<CallRequest>,
    registered: Vec<String>,
}

impl HostState {
    pub fn new(
        module_name: impl Into<String>,
        publisher: ReadinessPublisher,
        inbox: mpsc::Sender<CallRequest>,
    ) -> Self {
        Self {
            module_name: module_name.into(),
            publisher,
            inbox,
            registered: Vec::new(),
        }
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    /// Record an operation the module will expose
    pub fn register(&mut self, name: impl Into<String>) {
        let name = name.into();
        if self.registered.contains(&name) {
            debug!("Module {} re-registered {}", self.module_name, name);
            return;
        }
        debug!("Module {} registered {}", self.module_name, name);
        self.registered.push(name);
    }

    pub fn registered(&self) -> &[String] {
        &self.registered
    }

    /// Publish every registered operation under `namespace`
    pub fn publish(&mut self, namespace: &str) -> Result<(), PublishError> {
        let capabilities =
            CapabilitySet::from_names(namespace, self.registered.iter().cloned(), &self.inbox);
        self.publisher.publish(capabilities)
    }

    pub fn is_ready(&self) -> bool {
        self.publisher.is_published()
    }

    /// Block until the loader resolves or abandons this module's readiness
    ///
    /// See [`ReadinessPublisher::wait_claimed`].
    pub fn wait_claimed(&self) -> bool {
        self.publisher.wait_claimed()
    }
}

/// A live, not yet started module instance
pub struct InstanceHandle {
    store: Store<HostState>,
    instance: Instance,
    inbox: mpsc::Receiver<CallRequest>,
}

impl InstanceHandle {
    pub(crate) fn new(
        store: Store<HostState>,
        instance: Instance,
        inbox: mpsc::Receiver<CallRequest>,
    ) -> Self {
        Self {
            store,
            instance,
            inbox,
        }
    }

    pub fn module_name(&self) -> &str {
        self.store.data().module_name()
    }

    /// Split into the store, the instance, and the call inbox
    pub fn into_parts(self) -> (Store<HostState>, Instance, mpsc::Receiver<CallRequest>) {
        (self.store, self.instance, self.inbox)
    }
}
