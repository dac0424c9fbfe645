//! Translator registration.
//!
//! Translators are registered by name at startup; validation only needs to
//! know which names exist and what they declare.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Capabilities a translator declares to the planner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatorCapabilities {
    pub supports_joins: bool,
    pub supports_aggregates: bool,
    pub supports_updates: bool,
    /// Largest IN list pushed down, `None` for unlimited.
    pub max_in_criteria: Option<usize>,
}

impl Default for TranslatorCapabilities {
    fn default() -> Self {
        Self {
            supports_joins: false,
            supports_aggregates: false,
            supports_updates: false,
            max_in_criteria: Some(1000),
        }
    }
}

/// A translator instance produced by a factory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translator {
    pub name: String,
    pub description: String,
    pub capabilities: TranslatorCapabilities,
}

impl Translator {
    /// Create a translator with default capabilities.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            capabilities: TranslatorCapabilities::default(),
        }
    }

    /// Replace the declared capabilities.
    pub fn with_capabilities(mut self, capabilities: TranslatorCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }
}

/// Constructor registered for a translator name.
pub type TranslatorFactory = Arc<dyn Fn() -> Translator + Send + Sync>;

/// Name → factory table, keyed case-insensitively.
#[derive(Clone, Default)]
pub struct TranslatorRegistry {
    factories: BTreeMap<String, TranslatorFactory>,
}

impl TranslatorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the `loopback` translator.
    pub fn builtin() -> Self {
        Self::new().with_factory("loopback", || {
            Translator::new("loopback", "Returns generated rows without a data source")
        })
    }

    /// Register a factory under `name`.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Translator + Send + Sync + 'static,
    {
        self.factories.insert(name.to_lowercase(), Arc::new(factory));
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_factory<F>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn() -> Translator + Send + Sync + 'static,
    {
        self.register(name, factory);
        self
    }

    /// Whether a translator is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(&name.to_lowercase())
    }

    /// Create a translator by name.
    pub fn create(&self, name: &str) -> Option<Translator> {
        self.factories.get(&name.to_lowercase()).map(|f| f())
    }

    /// Registered names, lower-cased, in order.
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(|k| k.as_str()).collect()
    }
}

impl fmt::Debug for TranslatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslatorRegistry")
            .field("names", &self.names())
            .finish()
    }
}
