//! Global table stores holding materialized view contents.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, trace};

use super::state::{current_timestamp, MatTableState};
use crate::metrics::SharedRuntimeMetrics;

/// One row of a materialized table, in column order.
pub type Row = Vec<Value>;

/// Operations the query engine performs on materialized tables.
pub trait GlobalTableStore: Send + Sync + fmt::Debug {
    /// Create the table, or return silently if it exists.
    fn create_mat_table(&self, name: &str, columns: &[String], key_columns: &[String]);

    /// Decide whether `address` should (re)load the table.
    fn needs_loading(
        &self,
        name: &str,
        address: &str,
        first_pass: bool,
        refresh: bool,
        invalidate: bool,
    ) -> bool;

    /// Record a successful load by `address`. Ignored when another address
    /// has since taken over the load.
    fn loaded(&self, name: &str, address: &str);

    /// Record a failed load by `address`, with the same ownership rule as
    /// [`GlobalTableStore::loaded`].
    fn failed_load(&self, name: &str, address: &str);

    /// Insert, replace, or delete a row by key; returns the previous row.
    fn update_mat_view_row(&self, name: &str, row: Row, delete: bool) -> Option<Row>;

    /// Snapshot of the table's load state.
    fn mat_table_info(&self, name: &str) -> Option<MatTableState>;
}

#[derive(Debug)]
struct MatTable {
    columns: Vec<String>,
    /// Positions of the key columns within `columns`.
    key_positions: Vec<usize>,
    state: Mutex<MatTableState>,
    rows: Mutex<BTreeMap<String, Row>>,
}

impl MatTable {
    fn row_key(&self, row: &Row) -> String {
        if self.key_positions.is_empty() {
            return Value::Array(row.clone()).to_string();
        }
        let key: Vec<Value> = self
            .key_positions
            .iter()
            .map(|&i| row.get(i).cloned().unwrap_or(Value::Null))
            .collect();
        Value::Array(key).to_string()
    }
}

/// Process-local materialized tables for one VDB.
#[derive(Debug, Default)]
pub struct LocalTableStore {
    tables: DashMap<String, Arc<MatTable>>,
    default_ttl: Option<Duration>,
    metrics: Option<SharedRuntimeMetrics>,
}

impl LocalTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// TTL applied to tables created from now on.
    pub fn with_default_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_metrics(mut self, metrics: SharedRuntimeMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Names of all tables.
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Number of rows in a table.
    pub fn row_count(&self, name: &str) -> Option<usize> {
        self.table(name).map(|t| t.rows.lock().len())
    }

    /// Column names of a table.
    pub fn columns(&self, name: &str) -> Option<Vec<String>> {
        self.table(name).map(|t| t.columns.clone())
    }

    fn table(&self, name: &str) -> Option<Arc<MatTable>> {
        self.tables
            .get(&name.to_lowercase())
            .map(|e| Arc::clone(e.value()))
    }
}

impl GlobalTableStore for LocalTableStore {
    fn create_mat_table(&self, name: &str, columns: &[String], key_columns: &[String]) {
        let default_ttl = self.default_ttl;
        self.tables.entry(name.to_lowercase()).or_insert_with(|| {
            let key_positions = key_columns
                .iter()
                .filter_map(|k| columns.iter().position(|c| c.eq_ignore_ascii_case(k)))
                .collect();
            debug!(table = name, "materialized table created");
            Arc::new(MatTable {
                columns: columns.to_vec(),
                key_positions,
                state: Mutex::new(MatTableState::new(default_ttl)),
                rows: Mutex::new(BTreeMap::new()),
            })
        });
    }

    fn needs_loading(
        &self,
        name: &str,
        address: &str,
        first_pass: bool,
        refresh: bool,
        invalidate: bool,
    ) -> bool {
        let Some(table) = self.table(name) else {
            return false;
        };
        let mut state = table.state.lock();
        let was_owner = state.loader_address.as_deref() == Some(address);
        let load = state.try_claim(address, first_pass, refresh, invalidate, current_timestamp());
        if load && !first_pass && !was_owner {
            trace!(table = name, address, "materialized table load claimed");
            if let Some(metrics) = &self.metrics {
                metrics.record_load_claim();
            }
        }
        load
    }

    fn loaded(&self, name: &str, address: &str) {
        if let Some(table) = self.table(name) {
            if table.state.lock().loaded(address, current_timestamp()) {
                debug!(table = name, address, "materialized table loaded");
            } else {
                debug!(table = name, address, "stale materialized table load ignored");
            }
        }
    }

    fn failed_load(&self, name: &str, address: &str) {
        if let Some(table) = self.table(name) {
            let mut state = table.state.lock();
            if state.failed_load(address) {
                debug!(table = name, address, status = %state.status, "materialized table load failed");
            } else {
                debug!(table = name, address, "stale materialized table failure ignored");
            }
        }
    }

    fn update_mat_view_row(&self, name: &str, row: Row, delete: bool) -> Option<Row> {
        let table = self.table(name)?;
        let key = table.row_key(&row);
        let mut rows = table.rows.lock();
        if delete {
            rows.remove(&key)
        } else {
            rows.insert(key, row)
        }
    }

    fn mat_table_info(&self, name: &str) -> Option<MatTableState> {
        self.table(name).map(|t| t.state.lock().clone())
    }
}
