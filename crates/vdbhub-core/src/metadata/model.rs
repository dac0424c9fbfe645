//! Metadata records: schemas, tables, columns, procedures, and functions.
//!
//! Record names are matched case-insensitively; the declared casing is kept.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A named datatype known to the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Datatype {
    pub name: String,
    /// Runtime type the datatype maps onto, e.g. `string` or `long`.
    pub runtime_type: String,
    #[serde(default)]
    pub length: Option<u32>,
}

impl Datatype {
    pub fn new(name: impl Into<String>, runtime_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            runtime_type: runtime_type.into(),
            length: None,
        }
    }
}

/// Optimizer statistics for a column.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ColumnStats {
    #[serde(default)]
    pub distinct_values: Option<u64>,
    #[serde(default)]
    pub null_values: Option<u64>,
    #[serde(default)]
    pub min_value: Option<String>,
    #[serde(default)]
    pub max_value: Option<String>,
}

/// Optimizer statistics for a table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableStats {
    #[serde(default)]
    pub cardinality: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub datatype: String,
    #[serde(default)]
    pub stats: ColumnStats,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Column {
    pub fn new(name: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            datatype: datatype.into(),
            stats: ColumnStats::default(),
            properties: BTreeMap::new(),
        }
    }
}

/// DML event an instead-of trigger handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerEvent {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerEvent::Insert => write!(f, "INSERT"),
            TriggerEvent::Update => write!(f, "UPDATE"),
            TriggerEvent::Delete => write!(f, "DELETE"),
        }
    }
}

/// A table or view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<Column>,
    /// Virtual tables are views defined by `select_definition`.
    #[serde(default)]
    pub is_virtual: bool,
    #[serde(default)]
    pub select_definition: Option<String>,
    #[serde(default)]
    pub materialized: bool,
    /// `schema.table` holding materialized rows; `None` means an internal
    /// (global temporary) materialization.
    #[serde(default)]
    pub materialized_table: Option<String>,
    #[serde(default)]
    pub triggers: BTreeMap<String, String>,
    #[serde(default)]
    pub stats: TableStats,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Table {
    /// Create a physical table.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            is_virtual: false,
            select_definition: None,
            materialized: false,
            materialized_table: None,
            triggers: BTreeMap::new(),
            stats: TableStats::default(),
            properties: BTreeMap::new(),
        }
    }

    /// Create a view over `definition`.
    pub fn view(name: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            is_virtual: true,
            select_definition: Some(definition.into()),
            ..Self::new(name)
        }
    }

    pub fn with_column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Mark the view materialized, optionally into an external table.
    pub fn materialized(mut self, target: Option<&str>) -> Self {
        self.materialized = true;
        self.materialized_table = target.map(str::to_string);
        self
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns
            .iter_mut()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Instead-of trigger definition for an event.
    pub fn trigger(&self, event: TriggerEvent) -> Option<&str> {
        self.triggers.get(&event.to_string()).map(|s| s.as_str())
    }

    pub fn set_trigger(&mut self, event: TriggerEvent, definition: impl Into<String>) {
        self.triggers.insert(event.to_string(), definition.into());
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    pub name: String,
    #[serde(default)]
    pub is_virtual: bool,
    #[serde(default)]
    pub definition: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Procedure {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_virtual: false,
            definition: None,
            properties: BTreeMap::new(),
        }
    }

    /// Create a virtual procedure with a body.
    pub fn with_definition(name: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            is_virtual: true,
            definition: Some(definition.into()),
            ..Self::new(name)
        }
    }
}

/// A user-defined function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionMethod {
    pub name: String,
    #[serde(default)]
    pub parameter_types: Vec<String>,
    pub return_type: String,
    /// Library holding the implementation; `None` for pushdown-only functions.
    #[serde(default)]
    pub invocation_library: Option<String>,
    #[serde(default)]
    pub invocation_method: Option<String>,
}

impl FunctionMethod {
    /// A function evaluated by the source, never locally.
    pub fn pushdown(
        name: impl Into<String>,
        parameter_types: Vec<String>,
        return_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            parameter_types,
            return_type: return_type.into(),
            invocation_library: None,
            invocation_method: None,
        }
    }

    /// A function implemented by `method` in `library`.
    pub fn with_invocation(
        mut self,
        library: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        self.invocation_library = Some(library.into());
        self.invocation_method = Some(method.into());
        self
    }

    pub fn is_pushdown(&self) -> bool {
        self.invocation_library.is_none()
    }
}

/// Metadata for one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    #[serde(default)]
    pub tables: Vec<Table>,
    #[serde(default)]
    pub procedures: Vec<Procedure>,
    #[serde(default)]
    pub functions: Vec<FunctionMethod>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: Vec::new(),
            procedures: Vec::new(),
            functions: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    /// Add a table, replacing one with the same name.
    pub fn with_table(mut self, table: Table) -> Self {
        self.tables.retain(|t| !t.name.eq_ignore_ascii_case(&table.name));
        self.tables.push(table);
        self
    }

    /// Add a procedure, replacing one with the same name.
    pub fn with_procedure(mut self, procedure: Procedure) -> Self {
        self.procedures
            .retain(|p| !p.name.eq_ignore_ascii_case(&procedure.name));
        self.procedures.push(procedure);
        self
    }

    pub fn with_function(mut self, function: FunctionMethod) -> Self {
        self.functions.push(function);
        self
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables
            .iter_mut()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn procedure(&self, name: &str) -> Option<&Procedure> {
        self.procedures
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn procedure_mut(&mut self, name: &str) -> Option<&mut Procedure> {
        self.procedures
            .iter_mut()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }
}
