//! Integration tests for VDB composition, lifecycle, and routing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

use vdbhub_core::{
    Column, ColumnStats, CompositeUnit, ConnectionType, ConnectorBinding,
    ConnectorManagerRepository, DataPolicy, Error, EventAdapter, EventDistributor, ImportDecl,
    InMemoryCluster, InMemoryDataSources, LifecycleEvent, ListenerError, LoadStatus,
    MetadataStore, ModelDef, Permission, RecordRef, Registry, RuntimeConfig, Schema, Table,
    TableStats, VdbDefinition, VdbEventListener, VdbLifecycleListener, VdbStatus, Version,
    VersionKey,
};

struct TestContext {
    registry: Arc<Registry>,
    sources: Arc<InMemoryDataSources>,
}

impl TestContext {
    fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    fn with_config(config: RuntimeConfig) -> Self {
        let sources = Arc::new(InMemoryDataSources::with_sources(["quotes-api", "accounts-db"]));
        let registry = Registry::new(config).with_data_sources(sources.clone());
        Self {
            registry: Arc::new(registry),
            sources,
        }
    }

    fn try_deploy(&self, vdb: (VdbDefinition, MetadataStore)) -> vdbhub_core::Result<Arc<CompositeUnit>> {
        let (def, store) = vdb;
        let connectors = ConnectorManagerRepository::from_definition(&def);
        self.registry.add(def, store, connectors)
    }

    fn deploy(&self, vdb: (VdbDefinition, MetadataStore)) -> Arc<CompositeUnit> {
        self.try_deploy(vdb).unwrap()
    }
}

fn market() -> (VdbDefinition, MetadataStore) {
    let def = VdbDefinition::new("Market", 1)
        .with_model(
            ModelDef::physical("Quotes")
                .with_source(ConnectorBinding::new("quotes", "loopback", "quotes-api")),
        )
        .with_data_policy(DataPolicy::new("traders").with_grant_all())
        .with_library("market-udf.jar");
    let store = MetadataStore::new().with_schema(
        Schema::new("Quotes").with_table(
            Table::new("Daily")
                .with_column(Column::new("symbol", "string"))
                .with_column(Column::new("price", "double")),
        ),
    );
    (def, store)
}

fn portfolio() -> (VdbDefinition, MetadataStore) {
    let def = VdbDefinition::new("Portfolio", 1)
        .with_model(
            ModelDef::physical("Accounts")
                .with_source(ConnectorBinding::new("accounts", "loopback", "accounts-db")),
        )
        .with_import(ImportDecl::new("Market", 1).with_data_policies())
        .with_library("portfolio.jar")
        .with_library("market-udf.jar");
    let store = MetadataStore::new().with_schema(
        Schema::new("Accounts").with_table(
            Table::new("Balances")
                .with_column(Column::new("id", "long"))
                .with_column(Column::new("amount", "double")),
        ),
    );
    (def, store)
}

/// A VDB with one virtual model named after the VDB.
fn virtual_vdb(name: &str, version: u32, imports: &[(&str, u32)]) -> (VdbDefinition, MetadataStore) {
    let mut def = VdbDefinition::new(name, version).with_model(ModelDef::virtual_model(name));
    for (import, import_version) in imports {
        def = def.with_import(ImportDecl::new(*import, *import_version));
    }
    let store = MetadataStore::new().with_schema(
        Schema::new(name).with_table(
            Table::view("v", "SELECT 1 AS x").with_column(Column::new("x", "integer")),
        ),
    );
    (def, store)
}

#[derive(Default)]
struct RecordingListener {
    events: Mutex<Vec<(LifecycleEvent, String)>>,
}

impl RecordingListener {
    fn record(&self, event: LifecycleEvent, unit: &Arc<CompositeUnit>) -> Result<(), ListenerError> {
        self.events.lock().unwrap().push((event, unit.key().to_string()));
        Ok(())
    }

    fn take(&self) -> Vec<(LifecycleEvent, String)> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

impl VdbLifecycleListener for RecordingListener {
    fn added(&self, unit: &Arc<CompositeUnit>) -> Result<(), ListenerError> {
        self.record(LifecycleEvent::Added, unit)
    }

    fn before_remove(&self, unit: &Arc<CompositeUnit>) -> Result<(), ListenerError> {
        self.record(LifecycleEvent::BeforeRemove, unit)
    }

    fn removed(&self, unit: &Arc<CompositeUnit>) -> Result<(), ListenerError> {
        self.record(LifecycleEvent::Removed, unit)
    }

    fn finished_deployment(&self, unit: &Arc<CompositeUnit>) -> Result<(), ListenerError> {
        self.record(LifecycleEvent::FinishedDeployment, unit)
    }
}

#[test]
fn test_duplicate_vdb_rejected() {
    let ctx = TestContext::new();
    ctx.deploy(market());

    let (def, store) = market();
    let def = VdbDefinition { name: "MARKET".to_string(), ..def };
    let err = ctx.try_deploy((def, store)).unwrap_err();
    assert!(matches!(err, Error::DuplicateVdb { .. }));
    assert_eq!(ctx.registry.len(), 1);
    assert_eq!(ctx.registry.metrics().deployments(), 1);
    assert_eq!(ctx.registry.metrics().composition_failures(), 1);
}

#[test]
fn test_version_resolution() {
    let ctx = TestContext::new();
    let deploy = |name: &str, version: u32, connection_type: ConnectionType| {
        let (def, store) = virtual_vdb(name, version, &[]);
        ctx.deploy((def.with_connection_type(connection_type), store));
    };
    deploy("foo", 1, ConnectionType::Any);
    deploy("foo", 2, ConnectionType::Any);
    deploy("bar", 1, ConnectionType::ByVersion);
    deploy("bar", 2, ConnectionType::ByVersion);
    deploy("baz", 1, ConnectionType::ByVersion);
    deploy("baz", 2, ConnectionType::Any);
    deploy("qux", 1, ConnectionType::None);
    deploy("foo2", 7, ConnectionType::Any);

    assert_eq!(ctx.registry.resolve("foo"), Some(VersionKey::new("foo", 2)));
    assert_eq!(ctx.registry.resolve("FOO"), Some(VersionKey::new("foo", 2)));
    assert_eq!(ctx.registry.resolve("bar"), Some(VersionKey::new("bar", 1)));
    assert_eq!(ctx.registry.resolve("baz"), Some(VersionKey::new("baz", 2)));
    assert_eq!(ctx.registry.resolve("qux"), None);
    assert_eq!(ctx.registry.resolve("missing"), None);

    assert_eq!(ctx.registry.get_latest("foo").unwrap().key().version(), &Version::from(2));
    assert_eq!(
        ctx.registry.versions_of("foo"),
        vec![Version::from(1), Version::from(2)]
    );
    assert!(ctx.registry.get("Bar", 2).is_some());

    ctx.registry
        .change_connection_type(&VersionKey::new("bar", 2), ConnectionType::Any)
        .unwrap();
    assert_eq!(ctx.registry.resolve("bar"), Some(VersionKey::new("bar", 2)));
}

#[test]
fn test_import_composition() {
    let ctx = TestContext::new();
    ctx.deploy(market());
    let unit = ctx.deploy(portfolio());

    let view = unit.merged_view();
    assert_eq!(view.definition().model_names(), vec!["Accounts", "Quotes"]);
    assert!(view.is_imported_model("quotes"));
    assert!(!view.is_imported_model("Accounts"));
    assert_eq!(view.connectors().len(), 2);
    assert_eq!(
        view.libraries().entries(),
        &["portfolio.jar".to_string(), "market-udf.jar".to_string()]
    );

    let policy = view.definition().data_policy("traders").unwrap();
    assert!(!policy.grant_all);
    assert_eq!(policy.permission("Quotes"), Some(&Permission::all("Quotes")));

    assert!(unit.has_child(&VersionKey::new("Market", 1)));
    assert!(unit.depends_on(&VersionKey::new("market", 1)));
    // The deployed definition is untouched.
    assert_eq!(unit.definition().models.len(), 1);
}

#[test]
fn test_no_import_view_shares_inputs() {
    let ctx = TestContext::new();
    let unit = ctx.deploy(market());
    let view = unit.merged_view();
    assert!(Arc::ptr_eq(view.definition(), unit.definition()));
    assert!(view.children().is_empty());
}

#[test]
fn test_import_not_found() {
    let ctx = TestContext::new();
    let err = ctx.try_deploy(portfolio()).unwrap_err();
    assert!(matches!(err, Error::ImportNotFound { .. }));
    assert!(ctx.registry.get("Portfolio", 1).is_none());
    assert_eq!(ctx.registry.metrics().composition_failures(), 1);
}

#[test]
fn test_composition_conflicts() {
    let ctx = TestContext::new();
    ctx.deploy(market());

    let (def, store) = portfolio();
    let clash = def.clone().with_model(ModelDef::virtual_model("QUOTES"));
    let err = ctx.try_deploy((clash, store.clone())).unwrap_err();
    assert!(matches!(err, Error::DuplicateModel { ref model, .. } if model == "Quotes"));

    let clash = def.clone().with_data_policy(DataPolicy::new("Traders"));
    let err = ctx.try_deploy((clash, store.clone())).unwrap_err();
    assert!(matches!(err, Error::DuplicatePolicy { .. }));

    // Policies are only merged when asked for.
    let quiet = VdbDefinition {
        version: Version::from(2),
        imports: vec![ImportDecl::new("Market", 1)],
        ..def.with_data_policy(DataPolicy::new("Traders"))
    };
    ctx.deploy((quiet, store));

    assert!(ctx.registry.get("Portfolio", 1).is_none());
    assert_eq!(ctx.registry.len(), 2);
}

#[test]
fn test_sibling_imports_with_same_model() {
    let ctx = TestContext::new();
    for name in ["Left", "Right"] {
        let def = VdbDefinition::new(name, 1).with_model(ModelDef::virtual_model("M"));
        let store = MetadataStore::new().with_schema(
            Schema::new("M").with_table(
                Table::view("v", "SELECT 1 AS x").with_column(Column::new("x", "integer")),
            ),
        );
        ctx.deploy((def, store));
    }

    let (def, store) = virtual_vdb("Both", 1, &[("Left", 1), ("Right", 1)]);
    let err = ctx.try_deploy((def, store)).unwrap_err();
    assert!(matches!(
        err,
        Error::DuplicateModel { ref model, ref import, .. }
            if model == "M" && *import == VersionKey::new("Right", 1)
    ));
    assert!(ctx.registry.get("Both", 1).is_none());
    assert_eq!(ctx.registry.len(), 2);
}

#[test]
fn test_connector_sharing() {
    let shared = ConnectorBinding::new("quotes", "loopback", "quotes-api");
    let (def, store) = portfolio();
    let def = def.with_model(ModelDef::physical("Local").with_source(shared));

    let ctx = TestContext::new();
    ctx.deploy(market());
    let err = ctx.try_deploy((def.clone(), store.clone())).unwrap_err();
    assert!(matches!(err, Error::DuplicateConnector { ref binding, .. } if binding == "quotes"));

    let ctx = TestContext::with_config(RuntimeConfig::default().with_share_connectors(true));
    ctx.deploy(market());
    let unit = ctx.deploy((def, store));
    assert_eq!(unit.merged_view().connectors().len(), 2);
}

#[test]
fn test_atomic_publish_with_concurrent_reader() {
    let ctx = TestContext::new();
    ctx.deploy(market());
    let done = AtomicBool::new(false);

    thread::scope(|scope| {
        let reader = scope.spawn(|| {
            let mut observed = 0usize;
            while !done.load(Ordering::Acquire) {
                if let Some(unit) = ctx.registry.get("Portfolio", 1) {
                    let view = unit.merged_view();
                    assert_eq!(view.definition().models.len(), 2);
                    assert_eq!(view.children().len(), 1);
                    observed += 1;
                }
            }
            observed
        });

        for _ in 0..200 {
            ctx.deploy(portfolio());
            assert!(ctx.registry.remove("Portfolio", 1));
        }
        ctx.deploy(portfolio());
        thread::sleep(Duration::from_millis(10));
        done.store(true, Ordering::Release);
        assert!(reader.join().unwrap() > 0);
    });
}

#[test]
fn test_remove_repairs_dependents() {
    let ctx = TestContext::new();
    ctx.deploy(virtual_vdb("Base", 1, &[]));
    ctx.deploy(virtual_vdb("Mid", 1, &[("Base", 1)]));
    let top = ctx.deploy(virtual_vdb("Top", 1, &[("Mid", 1)]));
    for key in ["Base", "Mid", "Top"] {
        assert_eq!(
            ctx.registry.finish_deployment(&VersionKey::new(key, 1)).unwrap(),
            VdbStatus::Active
        );
    }
    assert_eq!(
        top.metadata().unwrap().schema_names(),
        vec!["Top".to_string(), "Mid".to_string(), "Base".to_string()]
    );

    let listener = Arc::new(RecordingListener::default());
    ctx.registry.add_listener(listener.clone());

    assert!(ctx.registry.remove("Base", 1));
    assert!(!ctx.registry.remove("Base", 1));

    let expected = vec![
        (LifecycleEvent::BeforeRemove, "Base.1".to_string()),
        (LifecycleEvent::Removed, "Base.1".to_string()),
        (LifecycleEvent::Removed, "Mid.1".to_string()),
        (LifecycleEvent::Added, "Mid.1".to_string()),
        (LifecycleEvent::Removed, "Top.1".to_string()),
        (LifecycleEvent::Added, "Top.1".to_string()),
    ];
    assert_eq!(listener.take(), expected);
    assert_eq!(ctx.registry.metrics().repairs(), 2);

    let mid = ctx.registry.get("Mid", 1).unwrap();
    assert!(mid.children().is_empty());
    assert_eq!(mid.merged_view().definition().model_names(), vec!["Mid"]);
    assert!(mid.merged_view().definition().imports.is_empty());
    assert_eq!(mid.definition().imports.len(), 1);
    assert_eq!(top.merged_view().definition().model_names(), vec!["Top", "Mid"]);
    assert_eq!(top.merged_view().definition().imports.len(), 1);
    assert_eq!(
        top.metadata().unwrap().schema_names(),
        vec!["Top".to_string(), "Mid".to_string()]
    );
    assert_eq!(top.status(), VdbStatus::Active);
}

#[test]
fn test_finalize_idempotent_and_concurrent() {
    let ctx = TestContext::new();
    ctx.deploy(market());
    let unit = ctx.deploy(portfolio());
    assert!(!unit.is_metadata_loaded());
    assert!(unit.metadata().is_none());

    let barrier = Barrier::new(8);
    let results: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    unit.finalize_metadata()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(results.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    assert!(Arc::ptr_eq(&results[0], &unit.finalize_metadata()));
    assert!(unit.is_metadata_loaded());
    assert!(ctx.registry.get("Market", 1).unwrap().is_metadata_loaded());
    assert_eq!(ctx.registry.metrics().finalize_latency().count(), 2);
    assert_eq!(
        results[0].schema_names(),
        vec!["Accounts".to_string(), "Quotes".to_string()]
    );
}

#[test]
fn test_schema_order_and_multi_source_column() {
    let ctx = TestContext::new();
    ctx.sources.add("accounts-east");
    ctx.sources.add("accounts-west");
    ctx.deploy(market());

    let def = VdbDefinition::new("Portfolio", 1)
        .with_model(
            ModelDef::physical("Accounts")
                .with_multi_source(true)
                .with_property("multisource.columnName", "region")
                .with_source(ConnectorBinding::new("east", "loopback", "accounts-east"))
                .with_source(ConnectorBinding::new("west", "loopback", "accounts-west")),
        )
        .with_import(ImportDecl::new("Market", 1));
    let store = MetadataStore::new()
        .with_schema(Schema::new("Extra"))
        .with_schema(
            Schema::new("Accounts")
                .with_table(Table::new("Balances").with_column(Column::new("id", "long"))),
        );
    let unit = ctx.deploy((def, store));

    let metadata = unit.finalize_metadata();
    assert_eq!(
        metadata.schema_names(),
        vec!["Accounts".to_string(), "Quotes".to_string(), "Extra".to_string()]
    );
    let columns = metadata.columns("Accounts", "Balances").unwrap();
    assert_eq!(columns.last().unwrap().name, "region");
    assert_eq!(metadata.columns("Quotes", "Daily").unwrap().len(), 2);

    assert_eq!(
        ctx.registry.finish_deployment(unit.key()).unwrap(),
        VdbStatus::Active
    );
}

#[test]
fn test_validation_inactive_then_active() {
    let ctx = TestContext::new();
    ctx.sources.remove("quotes-api");
    let unit = ctx.deploy(market());
    let key = unit.key().clone();

    assert_eq!(ctx.registry.finish_deployment(&key).unwrap(), VdbStatus::Inactive);
    let report = unit.validation_report();
    assert_eq!(report.errors().count(), 1);
    assert!(report.findings()[0].message.contains("quotes-api"));
    assert_eq!(report.findings()[0].model.as_deref(), Some("Quotes"));

    // Still inactive: nothing bound to this connection.
    assert!(ctx.registry.data_source_changed("accounts-db").is_empty());
    assert!(ctx.registry.recheck_inactive().contains(&(key.clone(), VdbStatus::Inactive)));

    ctx.sources.add("quotes-api");
    assert_eq!(ctx.registry.data_source_changed("quotes-api"), vec![key.clone()]);
    assert_eq!(unit.status(), VdbStatus::Active);
    assert!(unit.validation_report().is_empty());

    assert_eq!(ctx.registry.metrics().inactivations(), 1);
    assert_eq!(ctx.registry.metrics().activations(), 1);
}

#[test]
fn test_validation_rules() {
    let ctx = TestContext::new();
    let def = VdbDefinition::new("Checks", 1)
        .with_model(ModelDef::physical("NoSource"))
        .with_model(
            ModelDef::physical("TwoSources")
                .with_source(ConnectorBinding::new("a", "loopback", "accounts-db"))
                .with_source(ConnectorBinding::new("b", "loopback", "accounts-db")),
        )
        .with_model(
            ModelDef::physical("Odd").with_source(ConnectorBinding::new("c", "carrier-pigeon", "accounts-db")),
        )
        .with_model(ModelDef::virtual_model("Views"));
    let store = MetadataStore::new().with_schema(
        Schema::new("Views")
            .with_table(Table {
                is_virtual: true,
                ..Table::new("Undefined").with_column(Column::new("x", "integer"))
            })
            .with_table(
                Table::view("Cached", "SELECT 1 AS x")
                    .with_column(Column::new("x", "integer"))
                    .materialized(Some("Nowhere.cache")),
            )
            .with_table(
                Table::new("Twice")
                    .with_column(Column::new("x", "integer"))
                    .with_column(Column::new("X", "integer")),
            )
            .with_table(Table::new("Empty")),
    );
    let unit = ctx.deploy((def, store));

    assert_eq!(ctx.registry.finish_deployment(unit.key()).unwrap(), VdbStatus::Inactive);
    let report = unit.validation_report();
    let errors: Vec<String> = report.errors().map(|f| f.message.clone()).collect();
    assert_eq!(errors.len(), 6, "{:?}", errors);
    assert!(errors.iter().any(|m| m.contains("no source binding")));
    assert!(errors.iter().any(|m| m.contains("not multi-source")));
    assert!(errors.iter().any(|m| m.contains("carrier-pigeon")));
    assert!(errors.iter().any(|m| m.contains("no select definition")));
    assert!(errors.iter().any(|m| m.contains("Nowhere.cache")));
    assert!(errors.iter().any(|m| m.contains("more than once")));
    assert_eq!(report.warnings().count(), 1);
}

#[test]
fn test_metadata_failure_is_terminal() {
    let ctx = TestContext::new();
    let unit = ctx.deploy(market());
    let key = unit.key().clone();

    ctx.registry.mark_metadata_failed(&key, "DDL parse error").unwrap();
    assert_eq!(unit.status(), VdbStatus::Failed);
    assert_eq!(unit.validation_report().findings()[0].message, "DDL parse error");

    assert_eq!(ctx.registry.finish_deployment(&key).unwrap(), VdbStatus::Failed);
    assert!(ctx.registry.data_source_changed("quotes-api").is_empty());
    assert!(ctx.registry.recheck_inactive().is_empty());
    assert_eq!(ctx.registry.metrics().load_failures(), 1);

    let missing = VersionKey::new("Missing", 1);
    assert!(matches!(
        ctx.registry.mark_metadata_failed(&missing, "x"),
        Err(Error::VdbNotFound { .. })
    ));
}

#[test]
fn test_merge_into() {
    let ctx = TestContext::new();
    let a = ctx.deploy(virtual_vdb("A", 1, &[]));
    ctx.deploy(virtual_vdb("B", 1, &[]));
    let a_key = VersionKey::new("A", 1);
    let b_key = VersionKey::new("B", 1);
    ctx.registry.finish_deployment(&a_key).unwrap();

    ctx.registry.merge_into(&b_key, &a_key).unwrap();
    assert_eq!(a.merged_view().definition().model_names(), vec!["A", "B"]);
    assert!(a.metadata().unwrap().schema("B").is_some());
    assert_eq!(a.status(), VdbStatus::Active);

    assert!(matches!(
        ctx.registry.merge_into(&a_key, &b_key),
        Err(Error::CyclicImport { .. })
    ));
    assert!(matches!(
        ctx.registry.merge_into(&a_key, &a_key),
        Err(Error::CyclicImport { .. })
    ));
    assert!(matches!(
        ctx.registry.merge_into(&b_key, &a_key),
        Err(Error::DuplicateModel { .. })
    ));
    assert!(matches!(
        ctx.registry.merge_into(&VersionKey::new("C", 1), &a_key),
        Err(Error::VdbNotFound { .. })
    ));
    // A failed merge leaves the target as it was.
    assert_eq!(a.merged_view().children().len(), 1);
}

#[test]
fn test_router_routes_to_owner_and_falls_back() {
    let ctx = TestContext::new();
    let market = ctx.deploy(market());
    let portfolio = ctx.deploy(portfolio());
    let store = portfolio.global_table_store();
    let columns = vec!["symbol".to_string(), "price".to_string()];
    let keys = vec!["symbol".to_string()];

    store.create_mat_table("#MAT_Quotes.Daily", &columns, &keys);
    store.create_mat_table("#MAT_Accounts.Totals", &columns, &keys);
    store.create_mat_table("not-a-mat-table", &columns, &keys);

    assert!(market.local_table_store().mat_table_info("#MAT_Quotes.Daily").is_some());
    assert!(portfolio.local_table_store().mat_table_info("#MAT_Quotes.Daily").is_none());
    assert!(portfolio.local_table_store().mat_table_info("#MAT_Accounts.Totals").is_some());
    assert!(portfolio.local_table_store().mat_table_info("not-a-mat-table").is_some());
}

#[test]
fn test_cluster_single_loader() {
    let cluster = Arc::new(InMemoryCluster::new());
    let node = |address: &str| {
        TestContext::with_config(
            RuntimeConfig::default()
                .with_node_address(address)
                .with_replicator(cluster.clone()),
        )
    };
    let a = node("node-a");
    let b = node("node-b");
    let store_a = a.deploy(market()).global_table_store();
    let store_b = b.deploy(market()).global_table_store();
    let table = "#MAT_Quotes.Daily";
    for store in [&store_a, &store_b] {
        store.create_mat_table(table, &["symbol".to_string()], &[]);
    }

    let address_a = a.registry.config().node_address.clone();
    let address_b = b.registry.config().node_address.clone();
    assert!(store_a.needs_loading(table, &address_a, false, false, false));
    assert!(!store_b.needs_loading(table, &address_b, false, false, false));
    assert_eq!(a.registry.metrics().load_claims(), 1);
    assert_eq!(b.registry.metrics().load_claims(), 0);

    store_a.loaded(table, &address_a);
    assert_eq!(store_a.mat_table_info(table).unwrap().status, LoadStatus::Loaded);
    assert!(store_b.needs_loading(table, &address_b, false, false, false));

    // A refresh takes the load over from the node currently loading.
    assert!(!store_a.needs_loading(table, &address_a, false, false, false));
    assert!(store_a.needs_loading(table, &address_a, false, true, false));
    assert!(!store_b.needs_loading(table, &address_b, false, false, false));
    store_a.loaded(table, &address_a);
    assert_eq!(store_a.mat_table_info(table).unwrap().status, LoadStatus::Loaded);
}

#[derive(Default)]
struct PublicEvents {
    seen: Mutex<Vec<String>>,
}

impl VdbEventListener for PublicEvents {
    fn vdb_deployed(&self, key: &VersionKey) {
        self.seen.lock().unwrap().push(format!("deployed {}", key));
    }

    fn vdb_undeployed(&self, key: &VersionKey) {
        self.seen.lock().unwrap().push(format!("undeployed {}", key));
    }

    fn vdb_loaded(&self, unit: &Arc<CompositeUnit>) {
        self.seen.lock().unwrap().push(format!("loaded {}", unit.key()));
    }

    fn vdb_load_failed(&self, unit: &Arc<CompositeUnit>) {
        self.seen.lock().unwrap().push(format!("load_failed {}", unit.key()));
    }

    fn data_modified(&self, key: &VersionKey, schema: &str, tables: &[String]) {
        self.seen
            .lock()
            .unwrap()
            .push(format!("modified {} {} {}", key, schema, tables.join(",")));
    }
}

#[test]
fn test_event_adapter_and_distributor() {
    let ctx = TestContext::new();
    let events = Arc::new(EventAdapter::new());
    let public = Arc::new(PublicEvents::default());
    events.add_listener(public.clone());
    ctx.registry.add_listener(events.clone());

    let market = ctx.deploy(market());
    let portfolio = ctx.deploy(portfolio());
    ctx.registry.finish_deployment(market.key()).unwrap();
    ctx.sources.remove("accounts-db");
    ctx.registry.finish_deployment(portfolio.key()).unwrap();

    let distributor = EventDistributor::new(Arc::clone(&ctx.registry), events.clone());
    let key = portfolio.key().clone();

    // A change made through the composite lands in the imported schema.
    distributor
        .set_table_stats(&key, "quotes", "DAILY", TableStats { cardinality: Some(7) })
        .unwrap();
    let shared = market.own_store().schema("Quotes").unwrap();
    assert_eq!(shared.read().table("Daily").unwrap().stats.cardinality, Some(7));

    distributor
        .set_column_stats(
            &key,
            "Accounts",
            "Balances",
            "amount",
            ColumnStats {
                distinct_values: Some(3),
                ..ColumnStats::default()
            },
        )
        .unwrap();
    let previous = distributor
        .set_property(&key, RecordRef::column("Accounts", "Balances", "id"), "pk", Some("true"))
        .unwrap();
    assert!(previous.is_none());
    let previous = distributor
        .set_property(&key, RecordRef::column("Accounts", "Balances", "id"), "pk", None)
        .unwrap();
    assert_eq!(previous.as_deref(), Some("true"));

    distributor
        .set_view_definition(&key, "Quotes", "Daily", "SELECT * FROM Quotes.Raw")
        .unwrap();
    assert!(shared.read().table("Daily").unwrap().is_virtual);

    assert!(matches!(
        distributor.set_table_stats(&key, "Quotes", "Missing", TableStats::default()),
        Err(Error::RecordNotFound { .. })
    ));
    assert!(matches!(
        distributor.set_procedure_definition(&key, "Quotes", "refresh", "BEGIN END"),
        Err(Error::RecordNotFound { .. })
    ));
    assert!(matches!(
        distributor.data_modification(&VersionKey::new("Gone", 1), "Quotes", &[]),
        Err(Error::VdbNotFound { .. })
    ));

    distributor
        .data_modification(&key, "Quotes", &["Daily".to_string()])
        .unwrap();
    ctx.registry.remove("Portfolio", 1);

    let seen = public.seen.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![
            "deployed Market.1",
            "deployed Portfolio.1",
            "loaded Market.1",
            "load_failed Portfolio.1",
            "modified Portfolio.1 Quotes Daily",
            "undeployed Portfolio.1",
        ]
    );
}

struct PanickingListener;

impl VdbLifecycleListener for PanickingListener {
    fn added(&self, _unit: &Arc<CompositeUnit>) -> Result<(), ListenerError> {
        panic!("listener bug");
    }
}

struct FailingListener;

impl VdbLifecycleListener for FailingListener {
    fn added(&self, _unit: &Arc<CompositeUnit>) -> Result<(), ListenerError> {
        Err(ListenerError::new("downstream unavailable"))
    }
}

#[test]
fn test_listener_failures_are_isolated() {
    let ctx = TestContext::new();
    ctx.registry.add_listener(Arc::new(PanickingListener));
    ctx.registry.add_listener(Arc::new(FailingListener));
    let recorder = Arc::new(RecordingListener::default());
    let id = ctx.registry.add_listener(recorder.clone());

    ctx.deploy(market());
    assert_eq!(recorder.take(), vec![(LifecycleEvent::Added, "Market.1".to_string())]);
    assert_eq!(ctx.registry.metrics().listener_failures(), 2);

    assert!(ctx.registry.remove_listener(id));
    assert!(!ctx.registry.remove_listener(id));
    ctx.deploy(virtual_vdb("Other", 1, &[]));
    assert!(recorder.take().is_empty());
}

#[tokio::test]
async fn test_wait_until_loaded() {
    let ctx = TestContext::new();
    let unit = ctx.deploy(market());

    let err = unit
        .wait_until_loaded(Duration::from_millis(20))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }));

    let registry = Arc::clone(&ctx.registry);
    let key = unit.key().clone();
    let finish = tokio::spawn(async move { registry.finish_deployment(&key) });

    let status = unit.wait_until_loaded(Duration::from_secs(5)).await.unwrap();
    assert_eq!(status, VdbStatus::Active);
    assert_eq!(finish.await.unwrap().unwrap(), VdbStatus::Active);

    let mut changes = unit.subscribe_status();
    ctx.registry.mark_metadata_failed(unit.key(), "reload failed").unwrap();
    changes.changed().await.unwrap();
    assert_eq!(*changes.borrow(), VdbStatus::Failed);
}
