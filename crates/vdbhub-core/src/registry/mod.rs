//! The process-wide VDB registry.
//!
//! Units are published with a single insert-if-absent into a lock-free sorted
//! map, so a VDB is either fully visible or not visible at all. Writers for one
//! key are expected to be serialized by the deployer.

mod resolve;
mod status;
mod validation;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crossbeam_skiplist::SkipMap;
use tracing::{debug, info, warn};

use crate::composite::{ChildLink, CompositeUnit};
use crate::config::RuntimeConfig;
use crate::connector::{
    ConnectorManagerRepository, DataSourceProvider, InMemoryDataSources, TranslatorRegistry,
};
use crate::error::{Error, Result};
use crate::key::{Version, VersionKey};
use crate::lifecycle::{LifecycleBroadcaster, LifecycleEvent, ListenerId, VdbLifecycleListener};
use crate::metadata::MetadataStore;
use crate::metrics::{RuntimeMetrics, SharedRuntimeMetrics};
use crate::vdb::{ConnectionType, VdbDefinition};

pub use status::VdbStatus;
pub use validation::{Finding, Severity, ValidationReport, Validator};

/// Catalog of deployed VDBs keyed by name and version.
pub struct Registry {
    units: SkipMap<VersionKey, Arc<CompositeUnit>>,
    config: RuntimeConfig,
    translators: TranslatorRegistry,
    data_sources: Arc<dyn DataSourceProvider>,
    broadcaster: LifecycleBroadcaster,
    metrics: SharedRuntimeMetrics,
}

impl Registry {
    /// Create an empty registry with the builtin translators and no
    /// available data sources.
    pub fn new(config: RuntimeConfig) -> Self {
        let metrics = Arc::new(RuntimeMetrics::new());
        Self {
            units: SkipMap::new(),
            config,
            translators: TranslatorRegistry::builtin(),
            data_sources: Arc::new(InMemoryDataSources::new()),
            broadcaster: LifecycleBroadcaster::new(Arc::clone(&metrics)),
            metrics,
        }
    }

    pub fn with_translators(mut self, translators: TranslatorRegistry) -> Self {
        self.translators = translators;
        self
    }

    pub fn with_data_sources(mut self, data_sources: Arc<dyn DataSourceProvider>) -> Self {
        self.data_sources = data_sources;
        self
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn metrics(&self) -> &SharedRuntimeMetrics {
        &self.metrics
    }

    pub fn translators(&self) -> &TranslatorRegistry {
        &self.translators
    }

    pub fn add_listener(&self, listener: Arc<dyn VdbLifecycleListener>) -> ListenerId {
        self.broadcaster.add_listener(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.broadcaster.remove_listener(id)
    }

    /// Compose and publish a VDB.
    ///
    /// Imports must already be deployed. Nothing is published unless
    /// composition succeeds.
    pub fn add(
        &self,
        definition: VdbDefinition,
        store: MetadataStore,
        connectors: ConnectorManagerRepository,
    ) -> Result<Arc<CompositeUnit>> {
        let key = definition.key();
        if self.units.contains_key(&key) {
            self.metrics.record_composition_failure();
            return Err(Error::DuplicateVdb { key });
        }

        let unit = match CompositeUnit::build(definition, store, connectors, self) {
            Ok(unit) => Arc::new(unit),
            Err(err) => {
                self.metrics.record_composition_failure();
                return Err(err);
            }
        };

        let entry = self.units.get_or_insert(key.clone(), Arc::clone(&unit));
        if !Arc::ptr_eq(entry.value(), &unit) {
            self.metrics.record_composition_failure();
            return Err(Error::DuplicateVdb { key });
        }

        self.metrics.record_deployment();
        info!(
            vdb = %key,
            models = unit.merged_view().definition().models.len(),
            imports = unit.merged_view().children().len(),
            "VDB added"
        );
        self.broadcaster.fire(LifecycleEvent::Added, &unit);
        Ok(unit)
    }

    /// Look up a VDB by exact name and version.
    pub fn get(&self, name: &str, version: impl Into<Version>) -> Option<Arc<CompositeUnit>> {
        self.get_by_key(&VersionKey::new(name, version))
    }

    pub fn get_by_key(&self, key: &VersionKey) -> Option<Arc<CompositeUnit>> {
        self.units.get(key).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, key: &VersionKey) -> bool {
        self.units.contains_key(key)
    }

    /// Snapshot of every deployed VDB in key order.
    pub fn vdbs(&self) -> Vec<Arc<CompositeUnit>> {
        self.units.iter().map(|entry| Arc::clone(entry.value())).collect()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Undeploy a VDB and repair every VDB that imported it.
    ///
    /// Returns false if nothing was deployed under the key.
    pub fn remove(&self, name: &str, version: impl Into<Version>) -> bool {
        self.remove_by_key(&VersionKey::new(name, version))
    }

    pub fn remove_by_key(&self, key: &VersionKey) -> bool {
        let Some(unit) = self.get_by_key(key) else {
            return false;
        };
        self.broadcaster.fire(LifecycleEvent::BeforeRemove, &unit);
        if self.units.remove(key).is_none() {
            return false;
        }
        self.metrics.record_undeployment();
        info!(vdb = %key, "VDB removed");
        self.broadcaster.fire(LifecycleEvent::Removed, &unit);

        self.repair_dependents(key);
        true
    }

    /// Rebuild every VDB that imports `removed`, directly or transitively,
    /// without it. Imports are repaired before the VDBs importing them.
    fn repair_dependents(&self, removed: &VersionKey) {
        let mut affected: Vec<Arc<CompositeUnit>> = Vec::new();
        let mut seen: HashSet<VersionKey> = HashSet::new();
        let mut frontier = vec![removed.clone()];
        while let Some(key) = frontier.pop() {
            for entry in self.units.iter() {
                let unit = entry.value();
                if unit.has_child(&key) && seen.insert(unit.key().clone()) {
                    frontier.push(unit.key().clone());
                    affected.push(Arc::clone(unit));
                }
            }
        }

        while !affected.is_empty() {
            let ready = affected
                .iter()
                .position(|unit| {
                    !affected
                        .iter()
                        .any(|other| !Arc::ptr_eq(other, unit) && unit.has_child(other.key()))
                })
                .unwrap_or(0);
            let unit = affected.remove(ready);
            self.repair(&unit, removed);
        }
    }

    fn repair(&self, unit: &Arc<CompositeUnit>, removed: &VersionKey) {
        self.broadcaster.fire(LifecycleEvent::Removed, unit);

        let current = unit.merged_view();
        let links: Vec<ChildLink> = current
            .children()
            .iter()
            .filter(|child| child.key() != removed)
            .cloned()
            .collect();
        match unit.rebuild(links, &self.config) {
            Ok(view) => {
                if current.metadata().is_some() {
                    view.finalize(&self.metrics);
                }
                unit.replace_view(view);
                self.metrics.record_repair();
                info!(vdb = %unit.key(), removed = %removed, "VDB repaired after import removal");
            }
            Err(err) => {
                warn!(vdb = %unit.key(), removed = %removed, error = %err, "VDB repair failed, keeping previous view");
            }
        }

        self.broadcaster.fire(LifecycleEvent::Added, unit);
    }

    /// Add `source` to `target` as an extra import.
    pub fn merge_into(&self, source: &VersionKey, target: &VersionKey) -> Result<()> {
        let merged = self
            .get_by_key(source)
            .ok_or_else(|| Error::VdbNotFound { key: source.clone() })?;
        let receiver = self
            .get_by_key(target)
            .ok_or_else(|| Error::VdbNotFound { key: target.clone() })?;

        if source == target || merged.depends_on(target) {
            warn!(merged = %source, target = %target, "merge rejected: import cycle");
            return Err(Error::CyclicImport {
                merged: source.clone(),
                target: target.clone(),
            });
        }

        let current = receiver.merged_view();
        let mut links = current.children().to_vec();
        links.push(ChildLink::new(merged, false));
        let view = receiver.rebuild(links, &self.config).map_err(|err| {
            warn!(merged = %source, target = %target, error = %err, "merge rejected");
            self.metrics.record_composition_failure();
            err
        })?;
        if current.metadata().is_some() {
            view.finalize(&self.metrics);
        }
        receiver.replace_view(view);
        info!(merged = %source, target = %target, "VDB merged");

        self.finish_deployment(target)?;
        Ok(())
    }

    /// Finalize metadata, validate, and set the VDB's status.
    ///
    /// A FAILED VDB is left as is. Safe to call again after the VDB's
    /// environment changed.
    pub fn finish_deployment(&self, key: &VersionKey) -> Result<VdbStatus> {
        let unit = self
            .get_by_key(key)
            .ok_or_else(|| Error::VdbNotFound { key: key.clone() })?;
        if unit.status() == VdbStatus::Failed {
            debug!(vdb = %key, "finish_deployment skipped for failed VDB");
            return Ok(VdbStatus::Failed);
        }

        let metadata = unit.finalize_metadata();
        let view = unit.merged_view();
        let report = Validator::new(&self.translators, self.data_sources.as_ref()).validate(
            unit.definition(),
            unit.own_store(),
            &view,
            &metadata,
        );

        let target = if report.has_errors() {
            VdbStatus::Inactive
        } else {
            VdbStatus::Active
        };
        for finding in report.findings() {
            warn!(vdb = %key, severity = %finding.severity, model = ?finding.model, "{}", finding.message);
        }
        unit.set_validation_report(report);

        let previous = unit.transition(target);
        if previous == VdbStatus::Failed {
            return Ok(VdbStatus::Failed);
        }
        if previous != target {
            match target {
                VdbStatus::Active => self.metrics.record_activation(),
                _ => self.metrics.record_inactivation(),
            }
            info!(vdb = %key, from = %previous, status = %target, "VDB status changed");
        }

        self.broadcaster.fire(LifecycleEvent::FinishedDeployment, &unit);
        Ok(target)
    }

    /// Record a metadata load failure reported by the deployer.
    pub fn mark_metadata_failed(&self, key: &VersionKey, reason: &str) -> Result<()> {
        let unit = self
            .get_by_key(key)
            .ok_or_else(|| Error::VdbNotFound { key: key.clone() })?;
        let mut report = ValidationReport::new();
        report.error(None, reason);
        unit.set_validation_report(report);
        let previous = unit.fail();
        self.metrics.record_load_failure();
        warn!(vdb = %key, from = %previous, reason, "VDB metadata load failed");

        self.broadcaster.fire(LifecycleEvent::FinishedDeployment, &unit);
        Ok(())
    }

    /// Change how unversioned requests resolve to this VDB.
    pub fn change_connection_type(
        &self,
        key: &VersionKey,
        connection_type: ConnectionType,
    ) -> Result<()> {
        let unit = self
            .get_by_key(key)
            .ok_or_else(|| Error::VdbNotFound { key: key.clone() })?;
        unit.set_connection_type(connection_type);
        info!(vdb = %key, connection_type = %connection_type, "connection type changed");
        Ok(())
    }

    /// Re-validate every VDB bound to `connection`.
    ///
    /// Returns the keys that were rechecked.
    pub fn data_source_changed(&self, connection: &str) -> Vec<VersionKey> {
        let mut rechecked = Vec::new();
        for unit in self.vdbs() {
            if unit.status() == VdbStatus::Failed
                || !unit.merged_view().connectors().references_connection(connection)
            {
                continue;
            }
            if self.finish_deployment(unit.key()).is_ok() {
                rechecked.push(unit.key().clone());
            }
        }
        debug!(connection, rechecked = rechecked.len(), "data source change processed");
        rechecked
    }

    /// Re-validate every INACTIVE VDB; returns each one's new status.
    pub fn recheck_inactive(&self) -> Vec<(VersionKey, VdbStatus)> {
        self.vdbs()
            .into_iter()
            .filter(|unit| unit.status() == VdbStatus::Inactive)
            .filter_map(|unit| {
                self.finish_deployment(unit.key())
                    .ok()
                    .map(|status| (unit.key().clone(), status))
            })
            .collect()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("vdbs", &self.units.len())
            .field("config", &self.config)
            .field("translators", &self.translators)
            .field("broadcaster", &self.broadcaster)
            .finish()
    }
}
