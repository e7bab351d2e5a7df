//! Capability set published by a loaded module
//!
//! A capability is a named entry point the module registered before signalling
//! readiness. Calls are not executed on the caller's task: each call is queued
//! on the module's inbox and serviced by the module's own execution context,
//! which replies on a oneshot channel.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::module::api::value::Value;
use crate::module::traits::ModuleError;

/// A queued call into the module
#[derive(Debug)]
pub struct CallRequest {
    /// Export name to invoke
    pub operation: String,
    /// Call arguments
    pub args: Vec<Value>,
    /// Reply channel
    pub reply: oneshot::Sender<Result<Vec<Value>, ModuleError>>,
}

/// A single callable entry point
#[derive(Debug, Clone)]
pub struct Capability {
    name: String,
    inbox: mpsc::Sender<CallRequest>,
}

impl Capability {
    pub(crate) fn new(name: impl Into<String>, inbox: mpsc::Sender<CallRequest>) -> Self {
        Self {
            name: name.into(),
            inbox,
        }
    }

    /// Operation name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the capability and wait for its results
    pub async fn call(&self, args: Vec<Value>) -> Result<Vec<Value>, ModuleError> {
        debug!("Calling capability {} with {} args", self.name, args.len());

        let (reply, response) = oneshot::channel();
        self.inbox
            .send(CallRequest {
                operation: self.name.clone(),
                args,
                reply,
            })
            .await
            .map_err(|_| ModuleError::ModuleStopped)?;

        response.await.map_err(|_| ModuleError::ModuleStopped)?
    }
}

/// Mapping from operation name to callable, as published by the module
///
/// Cloning is cheap and shares the same underlying mapping; the set is never
/// mutated after publication.
#[derive(Debug, Clone)]
pub struct CapabilitySet {
    namespace: Arc<str>,
    entries: Arc<BTreeMap<String, Capability>>,
}

impl CapabilitySet {
    /// Build a set from registered operation names, all routed to `inbox`
    pub(crate) fn from_names<I, S>(
        namespace: &str,
        names: I,
        inbox: &mpsc::Sender<CallRequest>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries = names
            .into_iter()
            .map(|name| {
                let name = name.into();
                (name.clone(), Capability::new(name, inbox.clone()))
            })
            .collect();

        Self {
            namespace: Arc::from(namespace),
            entries: Arc::new(entries),
        }
    }

    /// Namespace the module published under
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn get(&self, name: &str) -> Option<&Capability> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Operation names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up `name` and call it
    pub async fn call(&self, name: &str, args: Vec<Value>) -> Result<Vec<Value>, ModuleError> {
        let capability = self
            .get(name)
            .ok_or_else(|| ModuleError::CapabilityNotFound(name.to_string()))?;
        capability.call(args).await
    }

    /// Whether two sets share the same underlying mapping
    pub fn ptr_eq(&self, other: &CapabilitySet) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }
}
