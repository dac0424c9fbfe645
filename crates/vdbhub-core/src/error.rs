//! Core error types.

use std::time::Duration;

use thiserror::Error;

use crate::key::VersionKey;

/// Errors raised by the VDB registry.
///
/// Composition errors (`DuplicateVdb` through `CyclicImport`) are raised before
/// anything is published; a rejected VDB never appears in the registry.
#[derive(Debug, Error)]
pub enum Error {
    /// A VDB with the same name and version is already deployed.
    #[error("VDB {key} is already deployed")]
    DuplicateVdb {
        /// The conflicting key.
        key: VersionKey,
    },

    /// An import references a VDB that is not deployed.
    #[error("VDB {vdb} imports {import}, which is not deployed")]
    ImportNotFound {
        /// The importing VDB.
        vdb: VersionKey,
        /// The missing import.
        import: VersionKey,
    },

    /// Two constituents of a composite VDB declare the same model.
    #[error("VDB {vdb} cannot import model {model} from {import}: model name already in use")]
    DuplicateModel {
        /// The importing VDB.
        vdb: VersionKey,
        /// The colliding model name.
        model: String,
        /// The import that declared the model.
        import: VersionKey,
    },

    /// Two constituents of a composite VDB declare the same data policy.
    #[error("VDB {vdb} cannot import data policy {policy} from {import}: policy name already in use")]
    DuplicatePolicy {
        /// The importing VDB.
        vdb: VersionKey,
        /// The colliding policy name.
        policy: String,
        /// The import that declared the policy.
        import: VersionKey,
    },

    /// Two constituents of a composite VDB bind the same source name.
    #[error("VDB {vdb} cannot import connector binding {binding} from {import}: source name already bound")]
    DuplicateConnector {
        /// The importing VDB.
        vdb: VersionKey,
        /// The colliding source name.
        binding: String,
        /// The import that declared the binding.
        import: VersionKey,
    },

    /// Merging would make a VDB import itself.
    #[error("merging {merged} into {target} would create an import cycle")]
    CyclicImport {
        /// The VDB being merged in.
        merged: VersionKey,
        /// The VDB receiving the merge.
        target: VersionKey,
    },

    /// No VDB is deployed under the key.
    #[error("VDB {key} not found")]
    VdbNotFound {
        /// The requested key.
        key: VersionKey,
    },

    /// A metadata record addressed by a live mutation does not exist.
    #[error("record {record} not found in VDB {vdb}")]
    RecordNotFound {
        /// The VDB searched.
        vdb: VersionKey,
        /// Display form of the record path.
        record: String,
    },

    /// A version string could not be parsed.
    #[error("invalid version: {0}")]
    InvalidVersion(String),

    /// Waiting for a VDB to finish loading timed out.
    #[error("VDB {key} did not finish loading within {waited:?}")]
    Timeout {
        /// The VDB waited on.
        key: VersionKey,
        /// How long the caller waited.
        waited: Duration,
    },
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, Error>;
