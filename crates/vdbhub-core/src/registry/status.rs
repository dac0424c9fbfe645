//! VDB deployment status.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a deployed VDB is in its lifecycle.
///
/// ```text
/// LOADING  -> ACTIVE | INACTIVE      validation on finish_deployment
/// ACTIVE  <-> INACTIVE               data source rechecks
/// any      -> FAILED                 metadata load failure, until redeploy
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VdbStatus {
    #[default]
    Loading,
    Active,
    Inactive,
    Failed,
}

impl VdbStatus {
    /// Whether queries may run against the VDB.
    pub fn is_queryable(self) -> bool {
        self == VdbStatus::Active
    }
}

impl fmt::Display for VdbStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VdbStatus::Loading => write!(f, "LOADING"),
            VdbStatus::Active => write!(f, "ACTIVE"),
            VdbStatus::Inactive => write!(f, "INACTIVE"),
            VdbStatus::Failed => write!(f, "FAILED"),
        }
    }
}
