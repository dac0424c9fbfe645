//! Logs public VDB events.

use std::sync::Arc;

use tracing::{debug, info, warn};
use vdbhub_core::{CompositeUnit, VdbEventListener, VersionKey};

#[derive(Debug, Default)]
pub struct LoggingEventListener;

impl VdbEventListener for LoggingEventListener {
    fn vdb_deployed(&self, key: &VersionKey) {
        info!(vdb = %key, "vdb deployed");
    }

    fn vdb_undeployed(&self, key: &VersionKey) {
        info!(vdb = %key, "vdb undeployed");
    }

    fn vdb_loaded(&self, unit: &Arc<CompositeUnit>) {
        let schemas = unit.metadata().map_or(0, |m| m.schema_names().len());
        info!(vdb = %unit.key(), status = %unit.status(), schemas, "vdb loaded");
    }

    fn vdb_load_failed(&self, unit: &Arc<CompositeUnit>) {
        let report = unit.validation_report();
        warn!(
            vdb = %unit.key(),
            status = %unit.status(),
            errors = report.errors().count(),
            "vdb not loaded"
        );
    }

    fn data_modified(&self, key: &VersionKey, schema: &str, tables: &[String]) {
        debug!(vdb = %key, schema, tables = ?tables, "vdb data modified");
    }
}
