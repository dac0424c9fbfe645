//! VDB descriptor files.
//!
//! One JSON document per VDB: the definition fields at the top level, plus
//! the schemas and datatypes its models carry.

use std::path::Path;

use serde::{Deserialize, Serialize};
use vdbhub_core::{ConnectorManagerRepository, Datatype, MetadataStore, Schema, VdbDefinition};

use crate::error::Error;

/// File name suffix of descriptor files.
pub const DESCRIPTOR_SUFFIX: &str = ".vdb.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VdbDescriptor {
    #[serde(flatten)]
    pub definition: VdbDefinition,
    #[serde(default)]
    pub schemas: Vec<Schema>,
    #[serde(default)]
    pub datatypes: Vec<Datatype>,
}

impl VdbDescriptor {
    /// Parse the contents of the descriptor file at `path`.
    pub fn parse(path: &Path, bytes: &[u8]) -> Result<Self, Error> {
        serde_json::from_slice(bytes).map_err(|source| Error::Descriptor {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Schemas that no model of the definition declares.
    pub fn orphan_schemas(&self) -> Vec<&str> {
        self.schemas
            .iter()
            .filter(|s| self.definition.model(&s.name).is_none())
            .map(|s| s.name.as_str())
            .collect()
    }

    /// Split into the inputs `Registry::add` takes.
    pub fn to_parts(&self) -> (VdbDefinition, MetadataStore, ConnectorManagerRepository) {
        let mut store = MetadataStore::new();
        for schema in &self.schemas {
            store.add_schema(schema.clone());
        }
        for datatype in &self.datatypes {
            store.add_datatype(datatype.clone());
        }
        let connectors = ConnectorManagerRepository::from_definition(&self.definition);
        (self.definition.clone(), store, connectors)
    }
}

/// Whether a path names a descriptor file.
pub fn is_descriptor(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(DESCRIPTOR_SUFFIX))
}

/// Hex-encoded blake3 digest of a descriptor's bytes.
pub fn checksum(bytes: &[u8]) -> String {
    hex::encode(blake3::hash(bytes).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use vdbhub_core::{ConnectionType, Version};

    const MARKET: &str = r#"{
        "name": "Market",
        "version": 2,
        "connection_type": "ANY",
        "models": [
            {"name": "Quotes", "sources": [
                {"source_name": "quotes", "translator_name": "rest", "connection_ref": "quotes-api"}
            ]}
        ],
        "schemas": [
            {"name": "Quotes", "tables": [
                {"name": "Daily", "columns": [{"name": "symbol", "datatype": "string"}]}
            ]},
            {"name": "Scratch"}
        ],
        "datatypes": [{"name": "ticker", "runtime_type": "string"}]
    }"#;

    #[test]
    fn test_read_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("market.vdb.json");
        fs::write(&path, MARKET).unwrap();

        let bytes = fs::read(&path).unwrap();
        let descriptor = VdbDescriptor::parse(&path, &bytes).unwrap();
        let sum = checksum(&bytes);
        assert_eq!(descriptor.definition.name, "Market");
        assert_eq!(descriptor.definition.version, Version::from(2));
        assert_eq!(descriptor.definition.connection_type, ConnectionType::Any);
        assert_eq!(descriptor.schemas.len(), 2);
        assert_eq!(descriptor.orphan_schemas(), vec!["Scratch"]);
        assert_eq!(sum, checksum(MARKET.as_bytes()));
        assert_eq!(sum.len(), 64);

        let (def, store, connectors) = descriptor.to_parts();
        assert_eq!(def.key().to_string(), "Market.2");
        assert!(store.schema("quotes").is_some());
        assert!(store.datatype("TICKER").is_some());
        assert_eq!(connectors.len(), 1);
    }

    #[test]
    fn test_invalid_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.vdb.json");
        fs::write(&path, "{\"version\": 1}").unwrap();

        let err = VdbDescriptor::parse(&path, &fs::read(&path).unwrap()).unwrap_err();
        assert!(matches!(err, Error::Descriptor { .. }));
        assert!(err.to_string().contains("broken.vdb.json"));
    }

    #[test]
    fn test_is_descriptor() {
        assert!(is_descriptor(Path::new("/srv/market.vdb.json")));
        assert!(!is_descriptor(Path::new("/srv/market.json")));
        assert!(!is_descriptor(Path::new("/srv/notes.txt")));
    }
}
