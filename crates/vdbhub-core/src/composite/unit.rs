//! A deployed VDB.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;

use super::builder::{log_rejection, MergedViewBuilder};
use super::view::{ChildLink, MergedView};
use crate::config::RuntimeConfig;
use crate::connector::ConnectorManagerRepository;
use crate::error::{Error, Result};
use crate::key::VersionKey;
use crate::matview::{current_timestamp, GlobalTableStore, LocalTableStore, ReplicatedTableStore};
use crate::metadata::{MetadataStore, QueryMetadata, SharedSchema};
use crate::metrics::SharedRuntimeMetrics;
use crate::registry::{Registry, ValidationReport, VdbStatus};
use crate::vdb::{ConnectionType, VdbDefinition};

/// One deployed VDB together with its merged view of all imports.
///
/// The identity and own inputs never change. The merged view is replaced
/// whole when an import is removed or merged in.
pub struct CompositeUnit {
    key: VersionKey,
    definition: Arc<VdbDefinition>,
    store: MetadataStore,
    connectors: Arc<ConnectorManagerRepository>,
    /// This VDB's own materialized tables; wrapped for the cluster when configured.
    local_tables: Arc<dyn GlobalTableStore>,
    view: RwLock<Arc<MergedView>>,
    connection_type: Mutex<ConnectionType>,
    metadata_load_finished: AtomicBool,
    status: watch::Sender<VdbStatus>,
    report: RwLock<ValidationReport>,
    metrics: SharedRuntimeMetrics,
    /// Microseconds since the Unix epoch.
    deployed_at: u64,
}

impl CompositeUnit {
    /// Compose a VDB against the imports already published in `registry`.
    ///
    /// Fails with [`Error::ImportNotFound`] or a merge conflict; nothing is
    /// published either way.
    pub fn build(
        definition: VdbDefinition,
        store: MetadataStore,
        connectors: ConnectorManagerRepository,
        registry: &Registry,
    ) -> Result<Self> {
        let key = definition.key();
        let config = registry.config();
        let definition = Arc::new(definition);
        let connectors = Arc::new(connectors);
        let local_tables = own_table_store(&key, config, registry.metrics());

        let mut children = Vec::with_capacity(definition.imports.len());
        for import in &definition.imports {
            let import_key = import.key();
            let Some(child) = registry.get_by_key(&import_key) else {
                return Err(log_rejection(
                    &key,
                    Error::ImportNotFound {
                        vdb: key.clone(),
                        import: import_key,
                    },
                ));
            };
            children.push(ChildLink::new(child, import.import_data_policies));
        }

        let view = MergedViewBuilder::new(&definition, &store, &connectors, &local_tables)
            .with_children(children)
            .build(config)
            .map_err(|err| log_rejection(&key, err))?;

        Ok(Self {
            connection_type: Mutex::new(definition.connection_type),
            key,
            definition,
            store,
            connectors,
            local_tables,
            view: RwLock::new(Arc::new(view)),
            metadata_load_finished: AtomicBool::new(false),
            status: watch::channel(VdbStatus::Loading).0,
            report: RwLock::new(ValidationReport::new()),
            metrics: Arc::clone(registry.metrics()),
            deployed_at: current_timestamp(),
        })
    }

    /// Build a replacement view from this VDB's own inputs and `children`.
    pub(crate) fn rebuild(
        &self,
        children: impl IntoIterator<Item = ChildLink>,
        config: &RuntimeConfig,
    ) -> Result<MergedView> {
        MergedViewBuilder::new(&self.definition, &self.store, &self.connectors, &self.local_tables)
            .with_children(children)
            .build(config)
    }

    /// Swap in a new merged view. Readers holding the old one keep it.
    pub(crate) fn replace_view(&self, view: MergedView) {
        *self.view.write() = Arc::new(view);
    }

    pub fn key(&self) -> &VersionKey {
        &self.key
    }

    pub fn name(&self) -> &str {
        self.key.name()
    }

    /// The VDB's own definition as deployed.
    pub fn definition(&self) -> &Arc<VdbDefinition> {
        &self.definition
    }

    /// The VDB's own metadata as deployed.
    pub fn own_store(&self) -> &MetadataStore {
        &self.store
    }

    /// The current merged view.
    pub fn merged_view(&self) -> Arc<MergedView> {
        self.view.read().clone()
    }

    /// Materialized table store the query engine should use for this VDB.
    pub fn global_table_store(&self) -> Arc<dyn GlobalTableStore> {
        Arc::clone(self.merged_view().table_store())
    }

    /// This VDB's own materialized table store, without routing.
    pub fn local_table_store(&self) -> &Arc<dyn GlobalTableStore> {
        &self.local_tables
    }

    /// Resolved imports of the current view.
    pub fn children(&self) -> Vec<Arc<CompositeUnit>> {
        self.merged_view()
            .children()
            .iter()
            .map(|c| Arc::clone(&c.unit))
            .collect()
    }

    /// Whether `key` is a direct import of the current view.
    pub fn has_child(&self, key: &VersionKey) -> bool {
        self.merged_view().child(key).is_some()
    }

    /// Whether this VDB imports `key`, directly or through another import.
    pub fn depends_on(&self, key: &VersionKey) -> bool {
        self.merged_view()
            .children()
            .iter()
            .any(|c| c.key() == key || c.unit.depends_on(key))
    }

    /// Build the query metadata facade for the current view, once.
    ///
    /// Imports are finalized first. Repeated and concurrent calls return the
    /// same facade for as long as the view is current.
    pub fn finalize_metadata(&self) -> Arc<QueryMetadata> {
        let facade = self.merged_view().finalize(&self.metrics);
        self.metadata_load_finished.store(true, Ordering::Release);
        facade
    }

    /// The query metadata facade, if finalized.
    pub fn metadata(&self) -> Option<Arc<QueryMetadata>> {
        self.merged_view().metadata()
    }

    /// Whether metadata has been finalized at least once.
    pub fn is_metadata_loaded(&self) -> bool {
        self.metadata_load_finished.load(Ordering::Acquire)
    }

    /// Find a schema handle without finalizing metadata.
    pub fn schema(&self, name: &str) -> Option<SharedSchema> {
        let view = self.merged_view();
        if let Some(metadata) = view.metadata() {
            return metadata.schema(name);
        }
        self.store.schema(name).or_else(|| {
            view.children()
                .iter()
                .find_map(|child| child.unit.schema(name))
        })
    }

    pub fn connection_type(&self) -> ConnectionType {
        *self.connection_type.lock()
    }

    pub(crate) fn set_connection_type(&self, connection_type: ConnectionType) {
        *self.connection_type.lock() = connection_type;
    }

    pub fn status(&self) -> VdbStatus {
        *self.status.borrow()
    }

    /// Receive every status change from now on.
    pub fn subscribe_status(&self) -> watch::Receiver<VdbStatus> {
        self.status.subscribe()
    }

    /// Set the status unless the VDB has failed; returns the previous status.
    pub(crate) fn transition(&self, status: VdbStatus) -> VdbStatus {
        let mut previous = status;
        self.status.send_if_modified(|current| {
            previous = *current;
            if *current == VdbStatus::Failed || *current == status {
                return false;
            }
            *current = status;
            true
        });
        previous
    }

    /// Mark the VDB failed; returns the previous status.
    pub(crate) fn fail(&self) -> VdbStatus {
        self.status.send_replace(VdbStatus::Failed)
    }

    /// Findings of the last validation run.
    pub fn validation_report(&self) -> ValidationReport {
        self.report.read().clone()
    }

    pub(crate) fn set_validation_report(&self, report: ValidationReport) {
        *self.report.write() = report;
    }

    pub fn deployed_at(&self) -> u64 {
        self.deployed_at
    }

    /// Wait until the VDB leaves LOADING.
    pub async fn wait_until_loaded(&self, timeout: Duration) -> Result<VdbStatus> {
        let mut receiver = self.status.subscribe();
        let waited = tokio::time::timeout(timeout, receiver.wait_for(|s| *s != VdbStatus::Loading)).await;
        match waited {
            Ok(Ok(status)) => Ok(*status),
            Ok(Err(_)) => Ok(self.status()),
            Err(_) => Err(Error::Timeout {
                key: self.key.clone(),
                waited: timeout,
            }),
        }
    }
}

impl fmt::Debug for CompositeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeUnit")
            .field("key", &self.key)
            .field("status", &self.status())
            .field("connection_type", &self.connection_type())
            .field("metadata_loaded", &self.is_metadata_loaded())
            .field("view", &self.merged_view())
            .finish()
    }
}

fn own_table_store(
    key: &VersionKey,
    config: &RuntimeConfig,
    metrics: &SharedRuntimeMetrics,
) -> Arc<dyn GlobalTableStore> {
    let local: Arc<dyn GlobalTableStore> = Arc::new(
        LocalTableStore::new()
            .with_default_ttl(config.default_mat_ttl)
            .with_metrics(Arc::clone(metrics)),
    );
    match &config.replicator {
        Some(replicator) => Arc::new(ReplicatedTableStore::new(
            local,
            Arc::clone(replicator),
            key.to_string(),
        )),
        None => local,
    }
}
