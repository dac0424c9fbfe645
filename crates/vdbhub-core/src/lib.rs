//! vdbhub core - VDB composition, registry, and lifecycle.
//!
//! A deployer hands a [`VdbDefinition`] and its raw [`MetadataStore`] to the
//! [`Registry`], which composes it with the VDBs it imports, publishes it,
//! validates it, and keeps composite VDBs consistent as their imports come
//! and go.

pub mod composite;
pub mod config;
pub mod connector;
pub mod error;
pub mod key;
pub mod lifecycle;
pub mod matview;
pub mod metadata;
pub mod metrics;
pub mod registry;
pub mod vdb;

pub use composite::{ChildLink, CompositeUnit, LibraryChain, MergedView, MergedViewBuilder};
pub use config::RuntimeConfig;
pub use connector::{
    ConnectorBinding, ConnectorManager, ConnectorManagerRepository, DataSourceProvider,
    InMemoryDataSources, Translator, TranslatorCapabilities, TranslatorRegistry,
};
pub use error::{Error, Result};
pub use key::{Version, VersionKey};
pub use lifecycle::{
    EventAdapter, EventDistributor, LifecycleBroadcaster, LifecycleEvent, ListenerError,
    ListenerId, RecordRef, VdbEventListener, VdbLifecycleListener,
};
pub use matview::{
    ClusterReplicator, GlobalTableRouter, GlobalTableStore, InMemoryCluster, LoadStatus,
    LocalTableStore, MatTableState, ReplicatedTableStore, Row,
};
pub use metadata::{
    Column, ColumnStats, Datatype, FunctionMethod, MetadataStore, MetadataStoreMerge, Procedure,
    QueryMetadata, Schema, Table, TableStats, TriggerEvent,
};
pub use metrics::{Histogram, RuntimeMetrics, SharedRuntimeMetrics};
pub use registry::{Finding, Registry, Severity, ValidationReport, Validator, VdbStatus};
pub use vdb::{ConnectionType, DataPolicy, ImportDecl, ModelDef, ModelKind, Permission, VdbDefinition};
