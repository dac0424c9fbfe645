//! Connector manager repository.
//!
//! One [`ConnectorManager`] per bound source name. A VDB without imports uses
//! the repository its deployer built; a composite VDB gets a copy extended
//! with every import's managers.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::ConnectorBinding;
use crate::vdb::VdbDefinition;

/// Runtime handle for one bound source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorManager {
    binding: ConnectorBinding,
}

impl ConnectorManager {
    /// Create a manager for a binding.
    pub fn new(binding: ConnectorBinding) -> Self {
        Self { binding }
    }

    /// The binding this manager serves.
    pub fn binding(&self) -> &ConnectorBinding {
        &self.binding
    }

    /// Source name.
    pub fn source_name(&self) -> &str {
        &self.binding.source_name
    }

    /// Translator name.
    pub fn translator_name(&self) -> &str {
        &self.binding.translator_name
    }

    /// Connection reference, if bound.
    pub fn connection_ref(&self) -> Option<&str> {
        self.binding.connection_ref.as_deref()
    }
}

/// Source names keyed case-insensitively to their connector managers.
#[derive(Debug, Clone, Default)]
pub struct ConnectorManagerRepository {
    managers: BTreeMap<String, Arc<ConnectorManager>>,
}

impl ConnectorManagerRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a repository holding one manager per source bound by `def`'s models.
    ///
    /// Models that bind the same source name to the same binding share a
    /// manager; the first declaration wins otherwise.
    pub fn from_definition(def: &VdbDefinition) -> Self {
        let mut repo = Self::new();
        for model in &def.models {
            for binding in &model.sources {
                let key = binding.source_name.to_lowercase();
                repo.managers
                    .entry(key)
                    .or_insert_with(|| Arc::new(ConnectorManager::new(binding.clone())));
            }
        }
        repo
    }

    /// Add a manager, replacing any manager with the same source name.
    pub fn insert(&mut self, manager: ConnectorManager) {
        self.managers
            .insert(manager.source_name().to_lowercase(), Arc::new(manager));
    }

    /// Look up a manager by source name.
    pub fn get(&self, source_name: &str) -> Option<&Arc<ConnectorManager>> {
        self.managers.get(&source_name.to_lowercase())
    }

    /// Number of managers.
    pub fn len(&self) -> usize {
        self.managers.len()
    }

    /// Whether the repository is empty.
    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }

    /// All managers in source-name order.
    pub fn managers(&self) -> impl Iterator<Item = &Arc<ConnectorManager>> {
        self.managers.values()
    }

    /// Whether any manager is bound to `connection`.
    pub fn references_connection(&self, connection: &str) -> bool {
        self.managers
            .values()
            .any(|m| m.connection_ref() == Some(connection))
    }

    /// Merge another repository's managers into this one.
    ///
    /// On a source-name collision the merge stops and returns the colliding
    /// name, unless `share` is set and both managers carry the same binding.
    pub fn merge_from(&mut self, other: &Self, share: bool) -> Result<(), String> {
        for (key, manager) in &other.managers {
            match self.managers.get(key) {
                Some(existing) if Arc::ptr_eq(existing, manager) => {}
                Some(existing) if share && existing.binding() == manager.binding() => {}
                Some(_) => return Err(manager.source_name().to_string()),
                None => {
                    self.managers.insert(key.clone(), Arc::clone(manager));
                }
            }
        }
        Ok(())
    }
}
