//! Materialized view ("global table") storage, load coordination, and routing.

mod replicated;
mod router;
mod state;
mod store;

pub use replicated::{ClusterReplicator, InMemoryCluster, ReplicatedTableStore};
pub use router::{GlobalTableRouter, DEFAULT_MAT_PREFIX};
pub use state::{current_timestamp, LoadStatus, MatTableState};
pub use store::{GlobalTableStore, LocalTableStore, Row};
