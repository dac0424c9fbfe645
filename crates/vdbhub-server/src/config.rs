//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use vdbhub_core::RuntimeConfig;

use crate::error::Error;

/// Default directory scanned for VDB descriptors.
pub const DEFAULT_DEPLOY_DIR: &str = "./deployments";

/// Default interval between directory scans in seconds.
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 5;

/// Default interval between rechecks of inactive VDBs in seconds.
pub const DEFAULT_RECHECK_INTERVAL_SECS: u64 = 30;

/// vdbhub server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory holding `*.vdb.json` descriptors.
    pub deploy_dir: PathBuf,

    /// Interval between directory scans. None disables rescans.
    pub scan_interval: Option<Duration>,

    /// Interval between rechecks of inactive VDBs. None disables rechecks.
    pub recheck_interval: Option<Duration>,

    /// Data source (connection) names available at startup.
    pub data_sources: Vec<String>,

    /// Let imported VDBs share identical connector bindings.
    pub share_connectors: bool,

    /// This node's address for materialized table load ownership.
    pub node_address: String,

    /// Time-to-live for materialized table contents.
    pub mat_ttl: Option<Duration>,
}

impl ServerConfig {
    /// Create a configuration scanning `deploy_dir`.
    pub fn new(deploy_dir: impl Into<PathBuf>) -> Self {
        Self {
            deploy_dir: deploy_dir.into(),
            scan_interval: Some(Duration::from_secs(DEFAULT_SCAN_INTERVAL_SECS)),
            recheck_interval: Some(Duration::from_secs(DEFAULT_RECHECK_INTERVAL_SECS)),
            data_sources: Vec::new(),
            share_connectors: false,
            node_address: "local".to_string(),
            mat_ttl: None,
        }
    }

    /// Set the scan interval.
    pub fn with_scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = Some(interval);
        self
    }

    /// Disable periodic rescans; only the startup scan runs.
    pub fn without_rescan(mut self) -> Self {
        self.scan_interval = None;
        self
    }

    /// Set the recheck interval.
    pub fn with_recheck_interval(mut self, interval: Duration) -> Self {
        self.recheck_interval = Some(interval);
        self
    }

    /// Disable periodic rechecks of inactive VDBs.
    pub fn without_recheck(mut self) -> Self {
        self.recheck_interval = None;
        self
    }

    /// Add an available data source.
    pub fn with_data_source(mut self, name: impl Into<String>) -> Self {
        self.data_sources.push(name.into());
        self
    }

    pub fn with_share_connectors(mut self, share: bool) -> Self {
        self.share_connectors = share;
        self
    }

    pub fn with_node_address(mut self, address: impl Into<String>) -> Self {
        self.node_address = address.into();
        self
    }

    /// Check if any background work is configured.
    pub fn has_background_work(&self) -> bool {
        self.scan_interval.is_some() || self.recheck_interval.is_some()
    }

    /// Check the configuration before starting.
    pub fn validate(&self) -> Result<(), Error> {
        if !self.deploy_dir.is_dir() {
            return Err(Error::Config(format!(
                "deployment directory {} does not exist",
                self.deploy_dir.display()
            )));
        }
        if self.node_address.trim().is_empty() {
            return Err(Error::Config("node address must not be empty".to_string()));
        }
        Ok(())
    }

    /// Registry settings derived from this configuration.
    pub fn runtime_config(&self) -> RuntimeConfig {
        let config = RuntimeConfig::new()
            .with_share_connectors(self.share_connectors)
            .with_node_address(self.node_address.clone());
        match self.mat_ttl {
            Some(ttl) => config.with_default_mat_ttl(ttl),
            None => config,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DEPLOY_DIR)
    }
}

/// Command-line arguments for the server.
#[derive(Parser, Debug)]
#[command(name = "vdbhub-server")]
#[command(version, about = "vdbhub VDB deployer", long_about = None)]
pub struct Args {
    /// Directory holding `*.vdb.json` descriptors.
    #[arg(short, long, default_value = DEFAULT_DEPLOY_DIR)]
    pub deploy_dir: PathBuf,

    /// Rescan interval in seconds. Set to 0 to scan only at startup.
    #[arg(long, default_value_t = DEFAULT_SCAN_INTERVAL_SECS)]
    pub scan_interval: u64,

    /// Inactive VDB recheck interval in seconds. Set to 0 to disable.
    #[arg(long, default_value_t = DEFAULT_RECHECK_INTERVAL_SECS)]
    pub recheck_interval: u64,

    /// Available data source names (repeat or comma-separate).
    #[arg(long = "data-source", value_delimiter = ',')]
    pub data_sources: Vec<String>,

    /// Let imported VDBs share identical connector bindings.
    #[arg(long)]
    pub share_connectors: bool,

    /// Node address used for materialized table load ownership.
    #[arg(long, default_value = "local")]
    pub node_address: String,

    /// Materialized table time-to-live in seconds (0 = never expires).
    #[arg(long, default_value_t = 0)]
    pub mat_ttl: u64,
}

impl Args {
    /// Convert command-line arguments to server configuration.
    pub fn into_config(self) -> ServerConfig {
        let seconds = |secs: u64| (secs > 0).then(|| Duration::from_secs(secs));

        ServerConfig {
            deploy_dir: self.deploy_dir,
            scan_interval: seconds(self.scan_interval),
            recheck_interval: seconds(self.recheck_interval),
            data_sources: self.data_sources,
            share_connectors: self.share_connectors,
            node_address: self.node_address,
            mat_ttl: seconds(self.mat_ttl),
        }
    }
}
