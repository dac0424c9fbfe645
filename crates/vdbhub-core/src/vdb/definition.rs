//! VDB definitions as handed over by a deployer.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::DataPolicy;
use crate::connector::ConnectorBinding;
use crate::key::{Version, VersionKey};

/// Policy governing whether an unversioned request may resolve to a VDB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionType {
    /// Any version may answer unversioned requests; the newest wins.
    Any,
    /// Only the earliest deployed version answers unversioned requests.
    #[default]
    ByVersion,
    /// The VDB never answers unversioned requests.
    None,
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionType::Any => write!(f, "ANY"),
            ConnectionType::ByVersion => write!(f, "BY_VERSION"),
            ConnectionType::None => write!(f, "NONE"),
        }
    }
}

/// Whether a model is backed by a data source or defined over other models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelKind {
    /// Backed by one or more data sources.
    #[default]
    Physical,
    /// Defined by transformations over other models.
    Virtual,
}

/// One schema unit of a VDB.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDef {
    /// Model (and schema) name.
    pub name: String,
    /// Physical or virtual.
    #[serde(default)]
    pub kind: ModelKind,
    /// Whether the model is visible to clients.
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// Whether the model fans out over several sources.
    #[serde(default)]
    pub multi_source: bool,
    /// Source bindings, in declaration order.
    #[serde(default)]
    pub sources: Vec<ConnectorBinding>,
    /// Free-form model properties.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

fn default_visible() -> bool {
    true
}

impl ModelDef {
    /// Create a physical model.
    pub fn physical(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ModelKind::Physical,
            visible: true,
            multi_source: false,
            sources: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    /// Create a virtual model.
    pub fn virtual_model(name: impl Into<String>) -> Self {
        Self {
            kind: ModelKind::Virtual,
            ..Self::physical(name)
        }
    }

    /// Add a source binding.
    pub fn with_source(mut self, binding: ConnectorBinding) -> Self {
        self.sources.push(binding);
        self
    }

    /// Mark the model as multi-source.
    pub fn with_multi_source(mut self, multi_source: bool) -> Self {
        self.multi_source = multi_source;
        self
    }

    /// Set a model property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Hide the model from clients.
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Whether the model is physical.
    pub fn is_physical(&self) -> bool {
        self.kind == ModelKind::Physical
    }
}

/// A declared dependency on another deployed VDB.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportDecl {
    /// Imported VDB name.
    pub name: String,
    /// Imported VDB version.
    pub version: Version,
    /// Whether the import's data policies are merged as well.
    #[serde(default)]
    pub import_data_policies: bool,
}

impl ImportDecl {
    /// Create an import declaration.
    pub fn new(name: impl Into<String>, version: impl Into<Version>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            import_data_policies: false,
        }
    }

    /// Also merge the imported VDB's data policies.
    pub fn with_data_policies(mut self) -> Self {
        self.import_data_policies = true;
        self
    }

    /// Registry key of the imported VDB.
    pub fn key(&self) -> VersionKey {
        VersionKey::new(self.name.clone(), self.version.clone())
    }
}

/// A virtual database definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VdbDefinition {
    /// VDB name.
    pub name: String,
    /// VDB version.
    #[serde(default)]
    pub version: Version,
    /// Human-readable description.
    #[serde(default)]
    pub description: Option<String>,
    /// Unversioned resolution policy.
    #[serde(default)]
    pub connection_type: ConnectionType,
    /// Models in declaration order.
    #[serde(default)]
    pub models: Vec<ModelDef>,
    /// Imported VDBs in declaration order.
    #[serde(default)]
    pub imports: Vec<ImportDecl>,
    /// Data policies.
    #[serde(default)]
    pub data_policies: Vec<DataPolicy>,
    /// UDF and resource libraries contributed by this VDB.
    #[serde(default)]
    pub libraries: Vec<String>,
    /// Free-form VDB properties.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl VdbDefinition {
    /// Create an empty definition.
    pub fn new(name: impl Into<String>, version: impl Into<Version>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: None,
            connection_type: ConnectionType::default(),
            models: Vec::new(),
            imports: Vec::new(),
            data_policies: Vec::new(),
            libraries: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    /// Registry key of this VDB.
    pub fn key(&self) -> VersionKey {
        VersionKey::new(self.name.clone(), self.version.clone())
    }

    /// Set the connection type.
    pub fn with_connection_type(mut self, connection_type: ConnectionType) -> Self {
        self.connection_type = connection_type;
        self
    }

    /// Add a model.
    pub fn with_model(mut self, model: ModelDef) -> Self {
        self.models.push(model);
        self
    }

    /// Add an import.
    pub fn with_import(mut self, import: ImportDecl) -> Self {
        self.imports.push(import);
        self
    }

    /// Add a data policy.
    pub fn with_data_policy(mut self, policy: DataPolicy) -> Self {
        self.data_policies.push(policy);
        self
    }

    /// Add a library to the chain.
    pub fn with_library(mut self, library: impl Into<String>) -> Self {
        self.libraries.push(library.into());
        self
    }

    /// Set a VDB property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Find a model by name, ignoring case.
    pub fn model(&self, name: &str) -> Option<&ModelDef> {
        self.models.iter().find(|m| m.name.eq_ignore_ascii_case(name))
    }

    /// Find a data policy by name, ignoring case.
    pub fn data_policy(&self, name: &str) -> Option<&DataPolicy> {
        self.data_policies
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Model names in declaration order.
    pub fn model_names(&self) -> Vec<&str> {
        self.models.iter().map(|m| m.name.as_str()).collect()
    }
}
