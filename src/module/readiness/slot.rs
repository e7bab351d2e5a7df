//! Readiness slot
//!
//! A single-producer/single-consumer slot the started module writes exactly
//! once. Until written, the slot reads as "not ready"; that is never an error.
//! Waiting suspends on the channel between checks, so the watcher never spins.
//!
//! A watcher that goes away without taking the published set abandons the
//! module. The publisher can find out which happened with
//! [`ReadinessPublisher::wait_claimed`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::module::api::CapabilitySet;
use crate::module::traits::ModuleError;

/// Why a publish was refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    #[error("readiness already signalled")]
    AlreadyPublished,
    #[error("namespace mismatch: expected {expected}, module published {actual}")]
    NamespaceMismatch { expected: String, actual: String },
}

/// Create a fresh, empty slot
///
/// `expected_namespace`, when set, is the only namespace the publisher accepts.
pub fn channel(expected_namespace: Option<String>) -> (ReadinessPublisher, ReadinessWatcher) {
    let (tx, rx) = watch::channel(None);
    let claimed = Arc::new(AtomicBool::new(false));
    (
        ReadinessPublisher {
            tx,
            expected_namespace,
            claimed: Arc::clone(&claimed),
        },
        ReadinessWatcher { rx, claimed },
    )
}

/// Writer half, owned by the module's host state
#[derive(Debug)]
pub struct ReadinessPublisher {
    tx: watch::Sender<Option<CapabilitySet>>,
    expected_namespace: Option<String>,
    claimed: Arc<AtomicBool>,
}

impl ReadinessPublisher {
    /// Write the capability set into the slot
    ///
    /// Succeeds at most once per slot.
    pub fn publish(&self, capabilities: CapabilitySet) -> Result<(), PublishError> {
        if let Some(expected) = &self.expected_namespace {
            if expected != capabilities.namespace() {
                return Err(PublishError::NamespaceMismatch {
                    expected: expected.clone(),
                    actual: capabilities.namespace().to_string(),
                });
            }
        }

        let namespace = capabilities.namespace().to_string();
        let count = capabilities.len();
        let mut pending = Some(capabilities);
        let written = self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = pending.take();
            true
        });

        if written {
            debug!(
                "Readiness signalled: {} capabilities under {}",
                count, namespace
            );
            Ok(())
        } else {
            warn!("Ignoring second readiness signal for {}", namespace);
            Err(PublishError::AlreadyPublished)
        }
    }

    pub fn is_published(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Block until the watcher is gone, then report whether it took the set
    ///
    /// `false` means the watcher was dropped without resolving: the loader
    /// timed out or was cancelled, and no caller will ever hold this module's
    /// capabilities. Blocks the calling thread, so call it from the module's
    /// own thread and never from inside the async runtime.
    pub fn wait_claimed(&self) -> bool {
        futures::executor::block_on(self.tx.closed());
        self.claimed.load(Ordering::Acquire)
    }
}

/// Reader half, owned by the loader
#[derive(Debug)]
pub struct ReadinessWatcher {
    rx: watch::Receiver<Option<CapabilitySet>>,
    claimed: Arc<AtomicBool>,
}

impl ReadinessWatcher {
    /// Check the slot without waiting
    ///
    /// Returns `None` while the module has not signalled. Has no side effect.
    pub fn poll(&self) -> Option<CapabilitySet> {
        self.rx.borrow().clone()
    }

    /// Wait until the slot is written, then return its contents
    ///
    /// Consumes the watcher, so a slot resolves a load at most once. Fails with
    /// [`ModuleError::ModuleExited`] if the publisher is dropped without ever
    /// writing, which happens when the module's execution context ends early.
    pub async fn wait_ready(mut self) -> Result<CapabilitySet, ModuleError> {
        let guard = self.rx.wait_for(Option::is_some).await.map_err(|_| {
            ModuleError::ModuleExited("readiness slot closed before the module published".to_string())
        })?;
        let published = guard.as_ref().cloned();
        drop(guard);

        let published = published.ok_or_else(|| {
            ModuleError::ModuleExited("readiness slot observed empty after signal".to_string())
        })?;
        self.claimed.store(true, Ordering::Release);
        Ok(published)
    }
}
