//! Connector bindings, translators, and data source availability.

mod binding;
mod datasource;
mod repository;
mod translator;

pub use binding::ConnectorBinding;
pub use datasource::{DataSourceProvider, InMemoryDataSources};
pub use repository::{ConnectorManager, ConnectorManagerRepository};
pub use translator::{Translator, TranslatorCapabilities, TranslatorFactory, TranslatorRegistry};
