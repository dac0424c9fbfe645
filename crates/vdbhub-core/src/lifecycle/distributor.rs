//! Live metadata and data mutations addressed by VDB name and version.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::events::EventAdapter;
use crate::composite::CompositeUnit;
use crate::error::{Error, Result};
use crate::key::VersionKey;
use crate::matview::Row;
use crate::metadata::{ColumnStats, Schema, SharedSchema, TableStats, TriggerEvent};
use crate::registry::Registry;

/// A metadata record that can carry properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordRef {
    Schema { schema: String },
    Table { schema: String, table: String },
    Column { schema: String, table: String, column: String },
    Procedure { schema: String, procedure: String },
}

impl RecordRef {
    pub fn schema(schema: impl Into<String>) -> Self {
        RecordRef::Schema {
            schema: schema.into(),
        }
    }

    pub fn table(schema: impl Into<String>, table: impl Into<String>) -> Self {
        RecordRef::Table {
            schema: schema.into(),
            table: table.into(),
        }
    }

    pub fn column(
        schema: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        RecordRef::Column {
            schema: schema.into(),
            table: table.into(),
            column: column.into(),
        }
    }

    pub fn procedure(schema: impl Into<String>, procedure: impl Into<String>) -> Self {
        RecordRef::Procedure {
            schema: schema.into(),
            procedure: procedure.into(),
        }
    }

    fn schema_name(&self) -> &str {
        match self {
            RecordRef::Schema { schema }
            | RecordRef::Table { schema, .. }
            | RecordRef::Column { schema, .. }
            | RecordRef::Procedure { schema, .. } => schema,
        }
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordRef::Schema { schema } => write!(f, "{}", schema),
            RecordRef::Table { schema, table } => write!(f, "{}.{}", schema, table),
            RecordRef::Column {
                schema,
                table,
                column,
            } => write!(f, "{}.{}.{}", schema, table, column),
            RecordRef::Procedure { schema, procedure } => write!(f, "{}.{}", schema, procedure),
        }
    }
}

/// Applies live changes to deployed VDBs.
///
/// The VDB is looked up on every call, so a change always lands on the
/// version deployed at that moment. Schema changes go through shared schema
/// handles and are visible in every composite VDB that imports the schema.
pub struct EventDistributor {
    registry: Arc<Registry>,
    events: Arc<EventAdapter>,
}

impl EventDistributor {
    pub fn new(registry: Arc<Registry>, events: Arc<EventAdapter>) -> Self {
        Self { registry, events }
    }

    fn unit(&self, key: &VersionKey) -> Result<Arc<CompositeUnit>> {
        self.registry
            .get_by_key(key)
            .ok_or_else(|| Error::VdbNotFound { key: key.clone() })
    }

    fn schema(&self, key: &VersionKey, record: &RecordRef) -> Result<SharedSchema> {
        self.unit(key)?
            .schema(record.schema_name())
            .ok_or_else(|| not_found(key, record))
    }

    /// Change a schema record in place.
    fn with_schema<T, F>(&self, key: &VersionKey, record: RecordRef, change: F) -> Result<T>
    where
        F: FnOnce(&mut Schema) -> Option<T>,
    {
        let handle = self.schema(key, &record)?;
        let mut schema = handle.write();
        let result = change(&mut schema).ok_or_else(|| not_found(key, &record))?;
        debug!(vdb = %key, record = %record, "metadata record updated");
        Ok(result)
    }

    /// Insert, replace, or delete a row of a materialized view.
    pub fn update_mat_view_row(
        &self,
        key: &VersionKey,
        schema: &str,
        view: &str,
        row: Row,
        delete: bool,
    ) -> Result<Option<Row>> {
        let unit = self.unit(key)?;
        let name = format!("{}{}.{}", self.registry.config().mat_table_prefix, schema, view);
        Ok(unit.global_table_store().update_mat_view_row(&name, row, delete))
    }

    pub fn set_column_stats(
        &self,
        key: &VersionKey,
        schema: &str,
        table: &str,
        column: &str,
        stats: ColumnStats,
    ) -> Result<()> {
        let record = RecordRef::column(schema, table, column);
        self.with_schema(key, record, |s| {
            let column = s.table_mut(table)?.column_mut(column)?;
            column.stats = stats;
            Some(())
        })
    }

    pub fn set_table_stats(
        &self,
        key: &VersionKey,
        schema: &str,
        table: &str,
        stats: TableStats,
    ) -> Result<()> {
        self.with_schema(key, RecordRef::table(schema, table), |s| {
            s.table_mut(table)?.stats = stats;
            Some(())
        })
    }

    pub fn set_view_definition(
        &self,
        key: &VersionKey,
        schema: &str,
        view: &str,
        definition: &str,
    ) -> Result<()> {
        self.with_schema(key, RecordRef::table(schema, view), |s| {
            let table = s.table_mut(view)?;
            table.is_virtual = true;
            table.select_definition = Some(definition.to_string());
            Some(())
        })
    }

    pub fn set_procedure_definition(
        &self,
        key: &VersionKey,
        schema: &str,
        procedure: &str,
        definition: &str,
    ) -> Result<()> {
        self.with_schema(key, RecordRef::procedure(schema, procedure), |s| {
            s.procedure_mut(procedure)?.definition = Some(definition.to_string());
            Some(())
        })
    }

    pub fn set_instead_of_trigger_definition(
        &self,
        key: &VersionKey,
        schema: &str,
        view: &str,
        event: TriggerEvent,
        definition: &str,
    ) -> Result<()> {
        self.with_schema(key, RecordRef::table(schema, view), |s| {
            s.table_mut(view)?.set_trigger(event, definition);
            Some(())
        })
    }

    /// Set or clear (`value = None`) a property; returns the previous value.
    pub fn set_property(
        &self,
        key: &VersionKey,
        record: RecordRef,
        name: &str,
        value: Option<&str>,
    ) -> Result<Option<String>> {
        let target = record.clone();
        self.with_schema(key, record, |s| {
            let properties = match &target {
                RecordRef::Schema { .. } => &mut s.properties,
                RecordRef::Table { table, .. } => &mut s.table_mut(table)?.properties,
                RecordRef::Column { table, column, .. } => {
                    &mut s.table_mut(table)?.column_mut(column)?.properties
                }
                RecordRef::Procedure { procedure, .. } => &mut s.procedure_mut(procedure)?.properties,
            };
            Some(match value {
                Some(value) => properties.insert(name.to_string(), value.to_string()),
                None => properties.remove(name),
            })
        })
    }

    /// Tell event listeners that rows of `tables` changed.
    pub fn data_modification(&self, key: &VersionKey, schema: &str, tables: &[String]) -> Result<()> {
        let unit = self.unit(key)?;
        self.events.data_modified(unit.key(), schema, tables);
        Ok(())
    }
}

fn not_found(key: &VersionKey, record: &RecordRef) -> Error {
    Error::RecordNotFound {
        vdb: key.clone(),
        record: record.to_string(),
    }
}
