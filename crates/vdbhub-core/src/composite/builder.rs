//! Composing a VDB with its imports.

use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};

use tracing::warn;

use super::view::{ChildLink, LibraryChain, MergedView};
use crate::config::RuntimeConfig;
use crate::connector::ConnectorManagerRepository;
use crate::error::{Error, Result};
use crate::key::VersionKey;
use crate::matview::{GlobalTableRouter, GlobalTableStore};
use crate::metadata::MetadataStore;
use crate::vdb::{ImportDecl, VdbDefinition};

/// Builds a [`MergedView`] from a VDB's own inputs and its resolved imports.
///
/// Inputs are only read; on error nothing has been changed anywhere.
pub struct MergedViewBuilder<'a> {
    definition: &'a Arc<VdbDefinition>,
    store: &'a MetadataStore,
    connectors: &'a Arc<ConnectorManagerRepository>,
    table_store: &'a Arc<dyn GlobalTableStore>,
    children: Vec<ChildLink>,
}

impl<'a> MergedViewBuilder<'a> {
    pub fn new(
        definition: &'a Arc<VdbDefinition>,
        store: &'a MetadataStore,
        connectors: &'a Arc<ConnectorManagerRepository>,
        table_store: &'a Arc<dyn GlobalTableStore>,
    ) -> Self {
        Self {
            definition,
            store,
            connectors,
            table_store,
            children: Vec::new(),
        }
    }

    /// Add a resolved import. Imports merge in the order they are added.
    pub fn with_child(mut self, child: ChildLink) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = ChildLink>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn build(self, config: &RuntimeConfig) -> Result<MergedView> {
        let key = self.definition.key();

        if self.children.is_empty() {
            let definition = if self.definition.imports.is_empty() {
                Arc::clone(self.definition)
            } else {
                // Every import was detached by repair.
                Arc::new(VdbDefinition {
                    imports: Vec::new(),
                    ..VdbDefinition::clone(self.definition)
                })
            };
            return Ok(MergedView {
                definition,
                own_store: self.store.clone(),
                children: Vec::new(),
                imported_models: BTreeSet::new(),
                connectors: Arc::clone(self.connectors),
                libraries: LibraryChain::new(self.definition.libraries.iter().cloned()),
                table_store: Arc::clone(self.table_store),
                multi_source_column: config.multi_source_column.clone(),
                metadata: OnceLock::new(),
            });
        }

        let mut definition = VdbDefinition::clone(self.definition);
        definition
            .imports
            .retain(|import| self.children.iter().any(|c| c.key() == &import.key()));
        let mut connectors = ConnectorManagerRepository::clone(self.connectors);
        let mut libraries = LibraryChain::new(self.definition.libraries.iter().cloned());
        let mut imported_models = BTreeSet::new();
        let mut router =
            GlobalTableRouter::new(Arc::clone(self.table_store), config.mat_table_prefix.clone());

        for child in &self.children {
            let child_key = child.key().clone();
            let child_view = child.unit.merged_view();
            let child_def = child_view.definition();

            for model in &child_def.models {
                if definition.model(&model.name).is_some() {
                    return Err(Error::DuplicateModel {
                        vdb: key,
                        model: model.name.clone(),
                        import: child_key,
                    });
                }
                definition.models.push(model.clone());
                imported_models.insert(model.name.to_lowercase());
                router = router.with_route(&model.name, Arc::clone(child_view.table_store()));
            }

            if child.import_data_policies {
                let child_models = child_def.model_names();
                for policy in &child_def.data_policies {
                    if definition.data_policy(&policy.name).is_some() {
                        return Err(Error::DuplicatePolicy {
                            vdb: key,
                            policy: policy.name.clone(),
                            import: child_key,
                        });
                    }
                    definition
                        .data_policies
                        .push(policy.scoped_to(child_models.iter().copied()));
                }
            }

            if let Err(binding) = connectors.merge_from(child_view.connectors(), config.share_connectors)
            {
                return Err(Error::DuplicateConnector {
                    vdb: key,
                    binding,
                    import: child_key,
                });
            }

            libraries.append(child_view.libraries());

            if !declares_import(&definition, &child_key) {
                definition.imports.push(ImportDecl {
                    name: child_key.name().to_string(),
                    version: child_key.version().clone(),
                    import_data_policies: child.import_data_policies,
                });
            }
        }

        Ok(MergedView {
            definition: Arc::new(definition),
            own_store: self.store.clone(),
            children: self.children,
            imported_models,
            connectors: Arc::new(connectors),
            libraries,
            table_store: Arc::new(router),
            multi_source_column: config.multi_source_column.clone(),
            metadata: OnceLock::new(),
        })
    }
}

fn declares_import(definition: &VdbDefinition, key: &VersionKey) -> bool {
    definition.imports.iter().any(|i| &i.key() == key)
}

/// Log and pass through a composition error.
pub(crate) fn log_rejection(key: &VersionKey, err: Error) -> Error {
    warn!(vdb = %key, error = %err, "VDB composition rejected");
    err
}
