//! vdbhub server - standalone VDB deployer.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vdbhub_core::{
    EventAdapter, InMemoryDataSources, Registry, Translator, TranslatorCapabilities,
    TranslatorRegistry,
};
use vdbhub_server::{Args, Deployer, LoggingEventListener, ScanTask};

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn translators() -> TranslatorRegistry {
    TranslatorRegistry::builtin()
        .with_factory("jdbc", || {
            Translator::new("jdbc", "Relational sources over JDBC").with_capabilities(
                TranslatorCapabilities {
                    supports_joins: true,
                    supports_aggregates: true,
                    supports_updates: true,
                    max_in_criteria: Some(1000),
                },
            )
        })
        .with_factory("file", || Translator::new("file", "Delimited and fixed-width files"))
        .with_factory("rest", || {
            Translator::new("rest", "HTTP/JSON services").with_capabilities(TranslatorCapabilities {
                max_in_criteria: None,
                ..TranslatorCapabilities::default()
            })
        })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vdbhub_server=info,vdbhub_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting vdbhub server");

    // Parse command-line arguments
    let args = Args::parse();
    let config = args.into_config();
    config.validate()?;

    tracing::info!(
        deploy_dir = %config.deploy_dir.display(),
        scan_interval = ?config.scan_interval,
        recheck_interval = ?config.recheck_interval,
        data_sources = config.data_sources.len(),
        node_address = %config.node_address,
        "configuration loaded"
    );

    let data_sources = Arc::new(InMemoryDataSources::with_sources(
        config.data_sources.iter().cloned(),
    ));
    let registry = Arc::new(
        Registry::new(config.runtime_config())
            .with_translators(translators())
            .with_data_sources(data_sources),
    );

    let events = Arc::new(EventAdapter::new());
    events.add_listener(Arc::new(LoggingEventListener));
    registry.add_listener(events);

    // Initial deployment
    let mut deployer = Deployer::new(Arc::clone(&registry), &config.deploy_dir);
    let report = deployer.scan()?;
    tracing::info!(
        vdbs = registry.len(),
        active = report.statuses.iter().filter(|(_, s)| s.is_queryable()).count(),
        unresolved = report.unresolved.len(),
        failed = report.failed.len(),
        "initial deployment complete"
    );

    let task = config
        .has_background_work()
        .then(|| ScanTask::start(deployer, config.scan_interval, config.recheck_interval));

    tracing::info!("server ready, watching for descriptor changes");
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl+c");
    }
    tracing::info!("received shutdown signal");

    if let Some(task) = task {
        task.join().await;
    }

    let metrics = registry.metrics();
    tracing::info!(
        deployments = metrics.deployments(),
        undeployments = metrics.undeployments(),
        repairs = metrics.repairs(),
        "server shutdown complete"
    );
    tracing::debug!("{}", metrics.to_prometheus());

    Ok(())
}
