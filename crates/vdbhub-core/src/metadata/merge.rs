//! Combining metadata stores from a VDB and its imports.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use super::{MetadataStore, SharedSchema};

/// Merges several stores into one, ordering schemas by model declaration.
///
/// Schemas named in `model_order` come first, in that order. Any other schema
/// follows in the order it was first added. The first store to provide a
/// schema name wins; later duplicates are skipped with a warning.
#[derive(Debug)]
pub struct MetadataStoreMerge {
    model_order: Vec<String>,
    schemas: HashMap<String, SharedSchema>,
    arrival: Vec<String>,
    merged: MetadataStore,
}

impl MetadataStoreMerge {
    /// Start a merge that orders schemas by `model_order`.
    pub fn new<I, S>(model_order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            model_order: model_order
                .into_iter()
                .map(|m| m.as_ref().to_lowercase())
                .collect(),
            schemas: HashMap::new(),
            arrival: Vec::new(),
            merged: MetadataStore::new(),
        }
    }

    /// Add every schema and datatype of `store`.
    pub fn add_store(&mut self, store: &MetadataStore) -> &mut Self {
        for handle in store.schemas() {
            let key = handle.read().name.to_lowercase();
            if self.schemas.contains_key(&key) {
                warn!(schema = %key, "duplicate schema skipped during metadata merge");
                continue;
            }
            self.arrival.push(key.clone());
            self.schemas.insert(key, Arc::clone(handle));
        }
        for datatype in store.datatypes() {
            if self.merged.datatype(&datatype.name).is_none() {
                self.merged.add_datatype(datatype.clone());
            }
        }
        self
    }

    /// Produce the merged store.
    pub fn build(mut self) -> MetadataStore {
        for name in self.model_order.iter().chain(self.arrival.iter()) {
            if let Some(handle) = self.schemas.remove(name) {
                self.merged.add_shared_schema(handle);
            }
        }
        self.merged
    }
}
