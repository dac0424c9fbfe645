//! Raw metadata store produced by a deployer.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{Datatype, Schema};

/// A schema handle shared between every view that includes it.
///
/// Live mutations (statistics, view definitions) go through the lock, so a
/// change made through one composite VDB is seen by all others that import
/// the same schema.
pub type SharedSchema = Arc<RwLock<Schema>>;

/// Schemas in declaration order plus the datatypes they use.
#[derive(Debug, Clone, Default)]
pub struct MetadataStore {
    schemas: Vec<SharedSchema>,
    datatypes: BTreeMap<String, Datatype>,
}

impl MetadataStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a schema, replacing one with the same name.
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.add_schema(schema);
        self
    }

    /// Add a datatype.
    pub fn with_datatype(mut self, datatype: Datatype) -> Self {
        self.add_datatype(datatype);
        self
    }

    /// Add a schema, replacing one with the same name in place.
    pub fn add_schema(&mut self, schema: Schema) {
        let handle = Arc::new(RwLock::new(schema));
        self.add_shared_schema(handle);
    }

    /// Add an existing schema handle, replacing one with the same name in place.
    pub fn add_shared_schema(&mut self, handle: SharedSchema) {
        let name = handle.read().name.clone();
        match self.position(&name) {
            Some(pos) => self.schemas[pos] = handle,
            None => self.schemas.push(handle),
        }
    }

    /// Add a datatype, keyed case-insensitively.
    pub fn add_datatype(&mut self, datatype: Datatype) {
        self.datatypes.insert(datatype.name.to_lowercase(), datatype);
    }

    /// Look up a schema handle by name.
    pub fn schema(&self, name: &str) -> Option<SharedSchema> {
        self.position(name).map(|pos| Arc::clone(&self.schemas[pos]))
    }

    /// Whether a schema with this name exists.
    pub fn contains_schema(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Schema handles in order.
    pub fn schemas(&self) -> &[SharedSchema] {
        &self.schemas
    }

    /// Schema names in order.
    pub fn schema_names(&self) -> Vec<String> {
        self.schemas.iter().map(|s| s.read().name.clone()).collect()
    }

    /// Look up a datatype by name.
    pub fn datatype(&self, name: &str) -> Option<&Datatype> {
        self.datatypes.get(&name.to_lowercase())
    }

    /// All datatypes.
    pub fn datatypes(&self) -> impl Iterator<Item = &Datatype> {
        self.datatypes.values()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.schemas
            .iter()
            .position(|s| s.read().name.eq_ignore_ascii_case(name))
    }
}
