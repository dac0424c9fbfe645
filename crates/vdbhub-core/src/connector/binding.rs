//! Source bindings.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Binds a model source name to a translator and a connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectorBinding {
    /// Source name; unique across a merged connector set.
    pub source_name: String,
    /// Translator handling the source.
    pub translator_name: String,
    /// Connection (data source) reference. `None` means unbound.
    #[serde(default)]
    pub connection_ref: Option<String>,
}

impl ConnectorBinding {
    /// Create a binding to a connection.
    pub fn new(
        source_name: impl Into<String>,
        translator_name: impl Into<String>,
        connection_ref: impl Into<String>,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            translator_name: translator_name.into(),
            connection_ref: Some(connection_ref.into()),
        }
    }

    /// Create a binding that has no connection.
    pub fn unbound(source_name: impl Into<String>, translator_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            translator_name: translator_name.into(),
            connection_ref: None,
        }
    }
}

impl fmt::Display for ConnectorBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.connection_ref {
            Some(conn) => write!(f, "{}({} -> {})", self.source_name, self.translator_name, conn),
            None => write!(f, "{}({})", self.source_name, self.translator_name),
        }
    }
}
