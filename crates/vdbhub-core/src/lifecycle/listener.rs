//! Lifecycle listeners and their broadcaster.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tracing::warn;

use crate::composite::CompositeUnit;
use crate::metrics::SharedRuntimeMetrics;

/// Handle returned when a listener is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Failure reported by a listener callback.
///
/// Listener failures are logged and counted; they never abort the registry
/// operation that raised the event.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ListenerError {
    message: String,
}

impl ListenerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Internal registry notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    Added,
    BeforeRemove,
    Removed,
    FinishedDeployment,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleEvent::Added => write!(f, "added"),
            LifecycleEvent::BeforeRemove => write!(f, "before_remove"),
            LifecycleEvent::Removed => write!(f, "removed"),
            LifecycleEvent::FinishedDeployment => write!(f, "finished_deployment"),
        }
    }
}

/// Observer of registry changes.
///
/// Callbacks run synchronously on the thread performing the registry
/// operation; hand long work off to a task.
pub trait VdbLifecycleListener: Send + Sync {
    /// A VDB was published, or re-published after a repair.
    fn added(&self, _unit: &Arc<CompositeUnit>) -> Result<(), ListenerError> {
        Ok(())
    }

    /// A VDB is about to be removed.
    fn before_remove(&self, _unit: &Arc<CompositeUnit>) -> Result<(), ListenerError> {
        Ok(())
    }

    /// A VDB was removed, or is about to be repaired.
    fn removed(&self, _unit: &Arc<CompositeUnit>) -> Result<(), ListenerError> {
        Ok(())
    }

    /// Validation finished and the status was set.
    fn finished_deployment(&self, _unit: &Arc<CompositeUnit>) -> Result<(), ListenerError> {
        Ok(())
    }
}

/// Registration-ordered listener list shared by the broadcaster and the
/// public event adapter.
pub(crate) struct ListenerSet<L: ?Sized> {
    entries: RwLock<Vec<(ListenerId, Arc<L>)>>,
    next_id: AtomicU64,
}

impl<L: ?Sized> ListenerSet<L> {
    pub(crate) fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn add(&self, listener: Arc<L>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.write().push((id, listener));
        id
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        entries.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Copy of the list; callbacks run without holding the lock.
    pub(crate) fn snapshot(&self) -> Vec<(ListenerId, Arc<L>)> {
        self.entries.read().clone()
    }
}

/// Run one listener callback, containing errors and panics.
///
/// Returns false if the callback failed.
pub(crate) fn isolate<F>(id: ListenerId, event: &dyn fmt::Display, callback: F) -> bool
where
    F: FnOnce() -> Result<(), ListenerError>,
{
    match catch_unwind(AssertUnwindSafe(callback)) {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            warn!(listener = %id, event = %event, error = %err, "lifecycle listener failed");
            false
        }
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            warn!(listener = %id, event = %event, panic = %reason, "lifecycle listener panicked");
            false
        }
    }
}

/// Fans registry notifications out to every registered listener.
pub struct LifecycleBroadcaster {
    listeners: ListenerSet<dyn VdbLifecycleListener>,
    metrics: SharedRuntimeMetrics,
}

impl LifecycleBroadcaster {
    pub fn new(metrics: SharedRuntimeMetrics) -> Self {
        Self {
            listeners: ListenerSet::new(),
            metrics,
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn VdbLifecycleListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    /// Unregister a listener; returns false if the id is unknown.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Deliver `event` for `unit` to every listener in registration order.
    pub fn fire(&self, event: LifecycleEvent, unit: &Arc<CompositeUnit>) {
        for (id, listener) in self.listeners.snapshot() {
            let delivered = isolate(id, &event, || match event {
                LifecycleEvent::Added => listener.added(unit),
                LifecycleEvent::BeforeRemove => listener.before_remove(unit),
                LifecycleEvent::Removed => listener.removed(unit),
                LifecycleEvent::FinishedDeployment => listener.finished_deployment(unit),
            });
            if !delivered {
                self.metrics.record_listener_failure();
            }
        }
    }
}

impl fmt::Debug for LifecycleBroadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleBroadcaster")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
