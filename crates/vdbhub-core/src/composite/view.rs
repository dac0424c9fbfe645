//! Immutable merged view of a VDB and its imports.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use tracing::debug;

use super::CompositeUnit;
use crate::connector::ConnectorManagerRepository;
use crate::key::VersionKey;
use crate::matview::GlobalTableStore;
use crate::metadata::{MetadataStore, MetadataStoreMerge, QueryMetadata, MULTI_SOURCE_COLUMN_PROPERTY};
use crate::metrics::RuntimeMetrics;
use crate::vdb::VdbDefinition;

/// A resolved import.
#[derive(Clone)]
pub struct ChildLink {
    pub unit: Arc<CompositeUnit>,
    pub import_data_policies: bool,
}

impl ChildLink {
    pub fn new(unit: Arc<CompositeUnit>, import_data_policies: bool) -> Self {
        Self {
            unit,
            import_data_policies,
        }
    }

    pub fn key(&self) -> &VersionKey {
        self.unit.key()
    }
}

impl fmt::Debug for ChildLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildLink")
            .field("key", self.unit.key())
            .field("import_data_policies", &self.import_data_policies)
            .finish()
    }
}

/// Ordered UDF and resource libraries, parent first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryChain {
    entries: Vec<String>,
}

impl LibraryChain {
    /// Chain holding a VDB's own libraries.
    pub fn new<I, S>(libraries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut chain = Self::default();
        for library in libraries {
            chain.push(library.into());
        }
        chain
    }

    fn push(&mut self, library: String) {
        if !self.contains(&library) {
            self.entries.push(library);
        }
    }

    /// Append an import's chain after this one, dropping duplicates.
    pub fn append(&mut self, other: &LibraryChain) {
        for library in &other.entries {
            self.push(library.clone());
        }
    }

    pub fn contains(&self, library: &str) -> bool {
        self.entries.iter().any(|l| l == library)
    }

    /// Libraries in lookup order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Everything the query engine sees of one composite VDB.
///
/// A view never changes once built; repair and merge produce a new one.
/// The query metadata facade is computed on first use.
pub struct MergedView {
    pub(crate) definition: Arc<VdbDefinition>,
    pub(crate) own_store: MetadataStore,
    pub(crate) children: Vec<ChildLink>,
    pub(crate) imported_models: BTreeSet<String>,
    pub(crate) connectors: Arc<ConnectorManagerRepository>,
    pub(crate) libraries: LibraryChain,
    pub(crate) table_store: Arc<dyn GlobalTableStore>,
    pub(crate) multi_source_column: String,
    pub(crate) metadata: OnceLock<Arc<QueryMetadata>>,
}

impl MergedView {
    /// The merged definition: own models first, then each import's.
    pub fn definition(&self) -> &Arc<VdbDefinition> {
        &self.definition
    }

    pub fn children(&self) -> &[ChildLink] {
        &self.children
    }

    pub fn child(&self, key: &VersionKey) -> Option<&ChildLink> {
        self.children.iter().find(|c| c.key() == key)
    }

    /// Whether `model` came from an import rather than this VDB.
    pub fn is_imported_model(&self, model: &str) -> bool {
        self.imported_models.contains(&model.to_lowercase())
    }

    pub fn imported_models(&self) -> impl Iterator<Item = &str> {
        self.imported_models.iter().map(|s| s.as_str())
    }

    pub fn connectors(&self) -> &Arc<ConnectorManagerRepository> {
        &self.connectors
    }

    pub fn libraries(&self) -> &LibraryChain {
        &self.libraries
    }

    /// Materialized table store, routing to imports where they own the schema.
    pub fn table_store(&self) -> &Arc<dyn GlobalTableStore> {
        &self.table_store
    }

    /// The metadata facade if it has been built.
    pub fn metadata(&self) -> Option<Arc<QueryMetadata>> {
        self.metadata.get().cloned()
    }

    /// Build the metadata facade, or return the one already built.
    ///
    /// Concurrent first callers wait on a single build.
    pub(crate) fn finalize(&self, metrics: &RuntimeMetrics) -> Arc<QueryMetadata> {
        let facade = self.metadata.get_or_init(|| {
            let started = Instant::now();
            let facade = Arc::new(self.build_metadata());
            metrics.record_finalize(started.elapsed());
            debug!(
                vdb = %self.definition.key(),
                schemas = facade.store().schemas().len(),
                "metadata finalized"
            );
            facade
        });
        Arc::clone(facade)
    }

    fn build_metadata(&self) -> QueryMetadata {
        let mut merge = MetadataStoreMerge::new(self.definition.model_names());
        merge.add_store(&self.own_store);
        for child in &self.children {
            let child_metadata = child.unit.finalize_metadata();
            merge.add_store(child_metadata.store());
        }
        let multi_source = self
            .definition
            .models
            .iter()
            .filter(|m| m.multi_source)
            .map(|m| {
                let column = m
                    .properties
                    .get(MULTI_SOURCE_COLUMN_PROPERTY)
                    .cloned()
                    .unwrap_or_else(|| self.multi_source_column.clone());
                (m.name.clone(), column)
            });
        QueryMetadata::new(merge.build(), multi_source)
    }
}

impl fmt::Debug for MergedView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergedView")
            .field("vdb", &self.definition.key())
            .field("models", &self.definition.model_names())
            .field("children", &self.children)
            .field("libraries", &self.libraries)
            .field("finalized", &self.metadata.get().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_chain_parent_first() {
        let mut chain = LibraryChain::new(["reports-udf.jar", "common.jar"]);
        chain.append(&LibraryChain::new(["common.jar", "market-udf.jar"]));
        chain.append(&LibraryChain::new(["reports-udf.jar"]));

        assert_eq!(
            chain.entries(),
            &["reports-udf.jar".to_string(), "common.jar".to_string(), "market-udf.jar".to_string()]
        );
        assert!(chain.contains("market-udf.jar"));
        assert_eq!(chain.len(), 3);
    }

    #[test]
    fn test_empty_chain() {
        let chain = LibraryChain::new(Vec::<String>::new());
        assert!(chain.is_empty());
    }
}
