//! Query-time view over the merged metadata of one composite VDB.

use std::collections::HashMap;

use super::{Column, Datatype, FunctionMethod, FunctionTree, MetadataStore, SharedSchema};

/// Model property that overrides the multi-source pseudo column name.
pub const MULTI_SOURCE_COLUMN_PROPERTY: &str = "multisource.columnName";

/// Metadata the query engine resolves names against.
///
/// Built once per merged view. Tables of multi-source models gain a
/// pseudo column naming the source a row came from.
#[derive(Debug)]
pub struct QueryMetadata {
    store: MetadataStore,
    functions: FunctionTree,
    /// Lower-cased schema name to pseudo column name.
    multi_source: HashMap<String, String>,
}

impl QueryMetadata {
    /// Wrap a merged store.
    ///
    /// `multi_source` lists `(schema, pseudo column)` pairs for the models
    /// that bind several sources.
    pub fn new<I>(store: MetadataStore, multi_source: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let functions = FunctionTree::from_store(&store);
        Self {
            store,
            functions,
            multi_source: multi_source
                .into_iter()
                .map(|(schema, column)| (schema.to_lowercase(), column))
                .collect(),
        }
    }

    /// The merged store.
    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    pub fn schema(&self, name: &str) -> Option<SharedSchema> {
        self.store.schema(name)
    }

    pub fn schema_names(&self) -> Vec<String> {
        self.store.schema_names()
    }

    /// Whether `schema.table` exists.
    pub fn has_table(&self, schema: &str, table: &str) -> bool {
        self.store
            .schema(schema)
            .is_some_and(|s| s.read().table(table).is_some())
    }

    /// Columns of `schema.table` as the query engine sees them.
    pub fn columns(&self, schema: &str, table: &str) -> Option<Vec<Column>> {
        let handle = self.store.schema(schema)?;
        let guard = handle.read();
        let mut columns = guard.table(table)?.columns.clone();
        if let Some(pseudo) = self.multi_source.get(&schema.to_lowercase()) {
            if !columns.iter().any(|c| c.name.eq_ignore_ascii_case(pseudo)) {
                columns.push(Column::new(pseudo.clone(), "string"));
            }
        }
        Some(columns)
    }

    /// Pseudo column name for a multi-source schema.
    pub fn multi_source_column(&self, schema: &str) -> Option<&str> {
        self.multi_source
            .get(&schema.to_lowercase())
            .map(|s| s.as_str())
    }

    pub fn functions(&self) -> &FunctionTree {
        &self.functions
    }

    pub fn function(&self, name: &str, argument_types: &[&str]) -> Option<&FunctionMethod> {
        self.functions.resolve(name, argument_types)
    }

    pub fn datatype(&self, name: &str) -> Option<&Datatype> {
        self.store.datatype(name)
    }
}
