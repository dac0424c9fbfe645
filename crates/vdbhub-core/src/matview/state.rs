//! Load state of a materialized table.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Where a materialized table is in its load cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadStatus {
    NeedsLoad,
    Loading,
    Loaded,
    Failed,
}

impl fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadStatus::NeedsLoad => write!(f, "NEEDS_LOAD"),
            LoadStatus::Loading => write!(f, "LOADING"),
            LoadStatus::Loaded => write!(f, "LOADED"),
            LoadStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Load bookkeeping for one materialized table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatTableState {
    pub status: LoadStatus,
    /// Node currently loading the table.
    pub loader_address: Option<String>,
    /// Microseconds since the Unix epoch of the last successful load.
    pub last_refresh_time: Option<u64>,
    /// Whether the loaded content may be served.
    pub valid: bool,
    pub ttl: Option<Duration>,
}

impl MatTableState {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            status: LoadStatus::NeedsLoad,
            loader_address: None,
            last_refresh_time: None,
            valid: false,
            ttl,
        }
    }

    /// Decide whether `address` should load the table, claiming it if so.
    ///
    /// A `first_pass` call only asks; it never takes ownership.
    pub fn try_claim(
        &mut self,
        address: &str,
        first_pass: bool,
        refresh: bool,
        invalidate: bool,
        now: u64,
    ) -> bool {
        if invalidate {
            self.valid = false;
        }
        let load = match self.status {
            LoadStatus::NeedsLoad | LoadStatus::Failed => true,
            LoadStatus::Loading => {
                if self.loader_address.as_deref() == Some(address) {
                    return true;
                }
                refresh || invalidate
            }
            LoadStatus::Loaded => refresh || !self.valid || self.expired(now),
        };
        if load && !first_pass {
            self.status = LoadStatus::Loading;
            self.loader_address = Some(address.to_string());
        }
        load
    }

    /// Whether the TTL has elapsed since the last refresh.
    pub fn expired(&self, now: u64) -> bool {
        match (self.ttl, self.last_refresh_time) {
            (Some(ttl), Some(refreshed)) => {
                now.saturating_sub(refreshed) >= u64::try_from(ttl.as_micros()).unwrap_or(u64::MAX)
            }
            _ => false,
        }
    }

    /// Whether `address` may complete a load: it holds the claim or nobody does.
    pub fn may_complete(&self, address: &str) -> bool {
        self.loader_address
            .as_deref()
            .map_or(true, |owner| owner == address)
    }

    /// Record a successful load. Returns false, leaving the state untouched,
    /// when another address has taken over the load.
    pub fn loaded(&mut self, address: &str, now: u64) -> bool {
        if !self.may_complete(address) {
            return false;
        }
        self.status = LoadStatus::Loaded;
        self.loader_address = None;
        self.last_refresh_time = Some(now);
        self.valid = true;
        true
    }

    /// Record a failed load; previously valid content keeps being served.
    /// Ignored like [`MatTableState::loaded`] when another address owns the load.
    pub fn failed_load(&mut self, address: &str) -> bool {
        if !self.may_complete(address) {
            return false;
        }
        self.status = if self.valid && self.last_refresh_time.is_some() {
            LoadStatus::Loaded
        } else {
            LoadStatus::Failed
        };
        self.loader_address = None;
        true
    }
}

/// Current time in microseconds since the Unix epoch.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}
