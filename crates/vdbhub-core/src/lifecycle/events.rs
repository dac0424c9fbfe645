//! Public VDB events.

use std::sync::Arc;

use super::listener::{isolate, ListenerError, ListenerId, ListenerSet, VdbLifecycleListener};
use crate::composite::CompositeUnit;
use crate::key::VersionKey;
use crate::registry::VdbStatus;

/// Public observer of VDB deployments and data changes.
pub trait VdbEventListener: Send + Sync {
    fn vdb_deployed(&self, _key: &VersionKey) {}

    fn vdb_undeployed(&self, _key: &VersionKey) {}

    /// The VDB finished deployment and is ACTIVE.
    fn vdb_loaded(&self, _unit: &Arc<CompositeUnit>) {}

    /// The VDB finished deployment but is not ACTIVE.
    fn vdb_load_failed(&self, _unit: &Arc<CompositeUnit>) {}

    /// Rows of `tables` in `schema` changed outside the runtime.
    fn data_modified(&self, _key: &VersionKey, _schema: &str, _tables: &[String]) {}
}

/// Translates lifecycle notifications into [`VdbEventListener`] callbacks.
///
/// Register it with the registry as a lifecycle listener.
pub struct EventAdapter {
    listeners: ListenerSet<dyn VdbEventListener>,
}

impl EventAdapter {
    pub fn new() -> Self {
        Self {
            listeners: ListenerSet::new(),
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn VdbEventListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn data_modified(&self, key: &VersionKey, schema: &str, tables: &[String]) {
        self.each("data_modified", |l| l.data_modified(key, schema, tables));
    }

    fn each<F>(&self, event: &'static str, callback: F)
    where
        F: Fn(&dyn VdbEventListener),
    {
        for (id, listener) in self.listeners.snapshot() {
            isolate(id, &event, || {
                callback(listener.as_ref());
                Ok(())
            });
        }
    }
}

impl Default for EventAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl VdbLifecycleListener for EventAdapter {
    fn added(&self, unit: &Arc<CompositeUnit>) -> Result<(), ListenerError> {
        self.each("vdb_deployed", |l| l.vdb_deployed(unit.key()));
        Ok(())
    }

    fn removed(&self, unit: &Arc<CompositeUnit>) -> Result<(), ListenerError> {
        self.each("vdb_undeployed", |l| l.vdb_undeployed(unit.key()));
        Ok(())
    }

    fn finished_deployment(&self, unit: &Arc<CompositeUnit>) -> Result<(), ListenerError> {
        if unit.status() == VdbStatus::Active {
            self.each("vdb_loaded", |l| l.vdb_loaded(unit));
        } else {
            self.each("vdb_load_failed", |l| l.vdb_load_failed(unit));
        }
        Ok(())
    }
}
