//! Cluster-coordinated materialized table loading.

use std::fmt;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use super::state::MatTableState;
use super::store::{GlobalTableStore, Row};

/// Cluster-wide load ownership for materialized tables.
pub trait ClusterReplicator: Send + Sync + fmt::Debug {
    /// Take ownership of loading `table` for `address`.
    ///
    /// Returns true if `address` owns the load afterwards.
    fn claim(&self, table: &str, address: &str) -> bool;

    /// Take ownership of loading `table` for `address` regardless of the
    /// current owner, returning the owner it replaced.
    fn reclaim(&self, table: &str, address: &str) -> Option<String>;

    /// Give up ownership held by `address`; a no-op for other owners.
    fn release(&self, table: &str, address: &str);

    /// Current owner of the load, if any.
    fn owner(&self, table: &str) -> Option<String>;
}

/// Process-local replicator for tests and single-node deployments.
#[derive(Debug, Default)]
pub struct InMemoryCluster {
    owners: DashMap<String, String>,
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClusterReplicator for InMemoryCluster {
    fn claim(&self, table: &str, address: &str) -> bool {
        match self.owners.entry(table.to_string()) {
            Entry::Occupied(owner) => owner.get() == address,
            Entry::Vacant(slot) => {
                slot.insert(address.to_string());
                true
            }
        }
    }

    fn reclaim(&self, table: &str, address: &str) -> Option<String> {
        self.owners.insert(table.to_string(), address.to_string())
    }

    fn release(&self, table: &str, address: &str) {
        self.owners.remove_if(table, |_, owner| owner == address);
    }

    fn owner(&self, table: &str) -> Option<String> {
        self.owners.get(table).map(|o| o.value().clone())
    }
}

/// Wraps a store so that at most one node loads each table at a time.
#[derive(Debug)]
pub struct ReplicatedTableStore {
    inner: Arc<dyn GlobalTableStore>,
    replicator: Arc<dyn ClusterReplicator>,
    /// Distinguishes tables of different VDBs sharing one replicator.
    scope: String,
}

impl ReplicatedTableStore {
    pub fn new(
        inner: Arc<dyn GlobalTableStore>,
        replicator: Arc<dyn ClusterReplicator>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            inner,
            replicator,
            scope: scope.into().to_lowercase(),
        }
    }

    fn cluster_key(&self, name: &str) -> String {
        format!("{}/{}", self.scope, name.to_lowercase())
    }
}

impl GlobalTableStore for ReplicatedTableStore {
    fn create_mat_table(&self, name: &str, columns: &[String], key_columns: &[String]) {
        self.inner.create_mat_table(name, columns, key_columns);
    }

    fn needs_loading(
        &self,
        name: &str,
        address: &str,
        first_pass: bool,
        refresh: bool,
        invalidate: bool,
    ) -> bool {
        if !self.inner.needs_loading(name, address, true, refresh, invalidate) {
            return false;
        }
        let key = self.cluster_key(name);
        let forced = refresh || invalidate;
        if first_pass {
            return forced
                || self
                    .replicator
                    .owner(&key)
                    .map_or(true, |owner| owner == address);
        }
        if forced {
            if let Some(previous) = self.replicator.reclaim(&key, address) {
                if previous != address {
                    debug!(table = name, address, previous = %previous, "materialized table load reclaimed");
                }
            }
        } else if !self.replicator.claim(&key, address) {
            debug!(table = name, address, "materialized table load held by another node");
            return false;
        }
        // The table may have been loaded between the check and the claim.
        if !self.inner.needs_loading(name, address, false, refresh, invalidate) {
            self.replicator.release(&key, address);
            return false;
        }
        true
    }

    fn loaded(&self, name: &str, address: &str) {
        self.inner.loaded(name, address);
        self.replicator.release(&self.cluster_key(name), address);
    }

    fn failed_load(&self, name: &str, address: &str) {
        self.inner.failed_load(name, address);
        self.replicator.release(&self.cluster_key(name), address);
    }

    fn update_mat_view_row(&self, name: &str, row: Row, delete: bool) -> Option<Row> {
        self.inner.update_mat_view_row(name, row, delete)
    }

    fn mat_table_info(&self, name: &str) -> Option<MatTableState> {
        self.inner.mat_table_info(name)
    }
}
