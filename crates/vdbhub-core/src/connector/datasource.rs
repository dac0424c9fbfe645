//! Data source availability.

use dashmap::DashSet;

/// Answers whether a connection reference can currently be used.
///
/// Implemented by whatever owns the physical connection pools; the registry
/// only asks, it never opens connections.
pub trait DataSourceProvider: Send + Sync {
    /// Whether `connection` is deployed and usable.
    fn is_available(&self, connection: &str) -> bool;
}

/// A set of available connection names.
#[derive(Debug, Default)]
pub struct InMemoryDataSources {
    available: DashSet<String>,
}

impl InMemoryDataSources {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a set from connection names.
    pub fn with_sources<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let sources = Self::new();
        for name in names {
            sources.add(name);
        }
        sources
    }

    /// Mark a connection available. Returns false if it already was.
    pub fn add(&self, name: impl Into<String>) -> bool {
        self.available.insert(name.into())
    }

    /// Mark a connection unavailable. Returns false if it was not available.
    pub fn remove(&self, name: &str) -> bool {
        self.available.remove(name).is_some()
    }
}

impl DataSourceProvider for InMemoryDataSources {
    fn is_available(&self, connection: &str) -> bool {
        self.available.contains(connection)
    }
}
