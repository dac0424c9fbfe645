//! Runtime configuration for the VDB registry.

use std::sync::Arc;
use std::time::Duration;

use crate::matview::{ClusterReplicator, DEFAULT_MAT_PREFIX};

/// Default name of the multi-source pseudo column.
pub const DEFAULT_MULTI_SOURCE_COLUMN: &str = "SOURCE_NAME";

/// Registry-wide settings.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Allow identical connector bindings to be declared by more than one
    /// constituent of a composite VDB.
    pub share_connectors: bool,

    /// Prefix of internal materialized table names.
    pub mat_table_prefix: String,

    /// Address this node uses when claiming materialized table loads.
    pub node_address: String,

    /// Cluster coordination for materialized table loads. None means loads
    /// are coordinated only within this process.
    pub replicator: Option<Arc<dyn ClusterReplicator>>,

    /// TTL of materialized tables. None means tables never expire.
    pub default_mat_ttl: Option<Duration>,

    /// Pseudo column added to the tables of multi-source models.
    pub multi_source_column: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            share_connectors: false,
            mat_table_prefix: DEFAULT_MAT_PREFIX.to_string(),
            node_address: "local".to_string(),
            replicator: None,
            default_mat_ttl: None,
            multi_source_column: DEFAULT_MULTI_SOURCE_COLUMN.to_string(),
        }
    }
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_share_connectors(mut self, share: bool) -> Self {
        self.share_connectors = share;
        self
    }

    pub fn with_mat_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.mat_table_prefix = prefix.into();
        self
    }

    pub fn with_node_address(mut self, address: impl Into<String>) -> Self {
        self.node_address = address.into();
        self
    }

    pub fn with_replicator(mut self, replicator: Arc<dyn ClusterReplicator>) -> Self {
        self.replicator = Some(replicator);
        self
    }

    pub fn with_default_mat_ttl(mut self, ttl: Duration) -> Self {
        self.default_mat_ttl = Some(ttl);
        self
    }

    pub fn with_multi_source_column(mut self, column: impl Into<String>) -> Self {
        self.multi_source_column = column.into();
        self
    }
}
