//! Directory-driven deployment.
//!
//! The deployer owns the mapping from descriptor files to deployed VDBs. Each
//! scan brings the registry in line with the directory: new files are
//! deployed once their imports are, changed files are redeployed, and files
//! that disappeared are undeployed.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};
use vdbhub_core::{ImportDecl, Registry, VdbStatus, VersionKey};

use crate::descriptor::{checksum, is_descriptor, VdbDescriptor};
use crate::error::Error;

/// Outcome of one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub deployed: Vec<VersionKey>,
    pub redeployed: Vec<VersionKey>,
    pub undeployed: Vec<VersionKey>,
    /// Descriptors still waiting for the listed imports.
    pub unresolved: Vec<(PathBuf, Vec<VersionKey>)>,
    /// Descriptors that could not be read, parsed, or composed.
    pub failed: Vec<(PathBuf, String)>,
    /// Status of every VDB this scan deployed or redeployed.
    pub statuses: Vec<(VersionKey, VdbStatus)>,
}

impl ScanReport {
    /// Whether the scan changed the registry.
    pub fn has_changes(&self) -> bool {
        !(self.deployed.is_empty() && self.redeployed.is_empty() && self.undeployed.is_empty())
    }

    /// Status a VDB ended up in after this scan.
    pub fn status(&self, key: &VersionKey) -> Option<VdbStatus> {
        self.statuses
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, status)| *status)
    }
}

/// A descriptor file that is currently deployed.
#[derive(Debug)]
struct Deployment {
    key: VersionKey,
    checksum: String,
    descriptor: VdbDescriptor,
}

/// A parsed descriptor waiting to be deployed.
struct Pending {
    path: PathBuf,
    checksum: String,
    descriptor: VdbDescriptor,
    redeploy: bool,
}

/// Keeps a registry in sync with a directory of descriptors.
pub struct Deployer {
    registry: Arc<Registry>,
    dir: PathBuf,
    deployments: BTreeMap<PathBuf, Deployment>,
}

impl Deployer {
    pub fn new(registry: Arc<Registry>, dir: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            dir: dir.into(),
            deployments: BTreeMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Keys deployed from descriptor files, in file name order.
    pub fn deployed_keys(&self) -> Vec<VersionKey> {
        self.deployments.values().map(|d| d.key.clone()).collect()
    }

    /// Scan the directory once.
    pub fn scan(&mut self) -> Result<ScanReport, Error> {
        let mut report = ScanReport::default();
        let found = self.list_descriptors()?;

        let vanished: Vec<PathBuf> = self
            .deployments
            .keys()
            .filter(|path| !found.contains(*path))
            .cloned()
            .collect();
        for path in vanished {
            if let Some(deployment) = self.deployments.remove(&path) {
                self.registry.remove_by_key(&deployment.key);
                info!(vdb = %deployment.key, path = %path.display(), "descriptor removed, VDB undeployed");
                report.undeployed.push(deployment.key);
            }
        }

        let mut pending = Vec::new();
        for path in found {
            let bytes = match fs::read(&path) {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "failed to read descriptor");
                    report.failed.push((path, err.to_string()));
                    continue;
                }
            };
            let sum = checksum(&bytes);
            if self.deployments.get(&path).is_some_and(|d| d.checksum == sum) {
                continue;
            }
            // A changed file that no longer parses leaves the old deployment running.
            let descriptor = match VdbDescriptor::parse(&path, &bytes) {
                Ok(descriptor) => descriptor,
                Err(err) => {
                    warn!(error = %err, "skipping descriptor");
                    report.failed.push((path, err.to_string()));
                    continue;
                }
            };
            let redeploy = match self.deployments.remove(&path) {
                Some(old) => {
                    debug!(vdb = %old.key, path = %path.display(), "descriptor changed");
                    self.registry.remove_by_key(&old.key);
                    true
                }
                None => false,
            };
            pending.push(Pending {
                path,
                checksum: sum,
                descriptor,
                redeploy,
            });
        }

        let mut touched = self.deploy_in_order(pending, &mut report);
        touched.extend(self.redeploy_stale(&mut report));

        let mut finished = HashSet::new();
        for key in touched {
            if !finished.insert(key.clone()) {
                continue;
            }
            match self.finish(&key) {
                Ok(status) => report.statuses.push((key, status)),
                Err(err) => warn!(vdb = %key, error = %err, "failed to finish deployment"),
            }
        }

        if report.has_changes() || !report.failed.is_empty() || !report.unresolved.is_empty() {
            info!(
                deployed = report.deployed.len(),
                redeployed = report.redeployed.len(),
                undeployed = report.undeployed.len(),
                unresolved = report.unresolved.len(),
                failed = report.failed.len(),
                "deployment scan completed"
            );
        }
        Ok(report)
    }

    fn list_descriptors(&self) -> Result<BTreeSet<PathBuf>, Error> {
        let mut found = BTreeSet::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() && is_descriptor(&path) {
                found.insert(path);
            }
        }
        Ok(found)
    }

    /// Deploy descriptors whose imports are available, repeating until no
    /// more can be deployed.
    fn deploy_in_order(&mut self, mut pending: Vec<Pending>, report: &mut ScanReport) -> Vec<VersionKey> {
        let mut deployed = Vec::new();
        while !pending.is_empty() {
            let (ready, waiting): (Vec<_>, Vec<_>) = pending
                .into_iter()
                .partition(|p| self.missing_imports(&p.descriptor).is_empty());
            pending = waiting;
            if ready.is_empty() {
                break;
            }
            for item in ready {
                match self.deploy(item.path.clone(), item.checksum, item.descriptor) {
                    Ok(key) => {
                        if item.redeploy {
                            report.redeployed.push(key.clone());
                        } else {
                            report.deployed.push(key.clone());
                        }
                        deployed.push(key);
                    }
                    Err(err) => {
                        warn!(path = %item.path.display(), error = %err, "descriptor rejected");
                        report.failed.push((item.path, err.to_string()));
                    }
                }
            }
        }

        for item in pending {
            let missing = self.missing_imports(&item.descriptor);
            warn!(
                vdb = %item.descriptor.definition.key(),
                missing = ?missing,
                "descriptor waiting for imports"
            );
            report.unresolved.push((item.path, missing));
        }
        deployed
    }

    fn missing_imports(&self, descriptor: &VdbDescriptor) -> Vec<VersionKey> {
        descriptor
            .definition
            .imports
            .iter()
            .map(ImportDecl::key)
            .filter(|key| !self.registry.contains(key))
            .collect()
    }

    fn deploy(&mut self, path: PathBuf, checksum: String, descriptor: VdbDescriptor) -> Result<VersionKey, Error> {
        let (definition, store, connectors) = descriptor.to_parts();
        let unit = self.registry.add(definition, store, connectors)?;
        let key = unit.key().clone();
        debug!(vdb = %key, path = %path.display(), "descriptor deployed");
        self.deployments.insert(
            path,
            Deployment {
                key: key.clone(),
                checksum,
                descriptor,
            },
        );
        Ok(key)
    }

    /// Files whose VDB lost a declared import that is deployed again.
    ///
    /// Removing an import repairs its importers without it; once the import
    /// comes back they have to be composed again.
    fn stale_paths(&self) -> Vec<PathBuf> {
        self.deployments
            .iter()
            .filter(|(_, deployment)| {
                self.registry.get_by_key(&deployment.key).is_some_and(|unit| {
                    let view = unit.merged_view();
                    unit.definition().imports.iter().any(|import| {
                        let key = import.key();
                        view.child(&key).is_none() && self.registry.contains(&key)
                    })
                })
            })
            .map(|(path, _)| path.clone())
            .collect()
    }

    fn redeploy_stale(&mut self, report: &mut ScanReport) -> Vec<VersionKey> {
        let mut redeployed = Vec::new();
        for _ in 0..=self.deployments.len() {
            let stale = self.stale_paths();
            let stale_keys: Vec<VersionKey> = stale
                .iter()
                .filter_map(|path| self.deployments.get(path))
                .map(|d| d.key.clone())
                .collect();
            // Imports before importers.
            let next = stale.iter().find(|path| {
                self.deployments.get(*path).is_some_and(|d| {
                    !d.descriptor
                        .definition
                        .imports
                        .iter()
                        .any(|import| stale_keys.contains(&import.key()))
                })
            });
            let Some(path) = next.or(stale.first()).cloned() else {
                break;
            };
            let Some(old) = self.deployments.remove(&path) else {
                break;
            };

            self.registry.remove_by_key(&old.key);
            match self.deploy(path.clone(), old.checksum, old.descriptor) {
                Ok(key) => {
                    info!(vdb = %key, "VDB recomposed after an import was redeployed");
                    report.redeployed.push(key.clone());
                    redeployed.push(key);
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "recomposition rejected");
                    report.failed.push((path, err.to_string()));
                }
            }
        }
        redeployed
    }

    /// Validate a freshly deployed VDB, or fail it if its metadata is unusable.
    fn finish(&self, key: &VersionKey) -> Result<VdbStatus, Error> {
        let orphans = self
            .deployments
            .values()
            .find(|d| &d.key == key)
            .map(|d| d.descriptor.orphan_schemas().join(", "))
            .unwrap_or_default();
        if !orphans.is_empty() {
            self.registry
                .mark_metadata_failed(key, &format!("schemas without a model: {}", orphans))?;
            return Ok(VdbStatus::Failed);
        }
        Ok(self.registry.finish_deployment(key)?)
    }
}
