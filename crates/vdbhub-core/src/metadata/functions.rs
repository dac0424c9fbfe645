//! UDF lookup tree.

use std::collections::BTreeMap;

use super::{FunctionMethod, MetadataStore};

/// User-defined functions of a merged view, by schema and by name.
#[derive(Debug, Clone, Default)]
pub struct FunctionTree {
    by_schema: BTreeMap<String, Vec<FunctionMethod>>,
    by_name: BTreeMap<String, Vec<(String, FunctionMethod)>>,
}

impl FunctionTree {
    /// Collect the functions of every schema in `store`.
    pub fn from_store(store: &MetadataStore) -> Self {
        let mut tree = Self::default();
        for handle in store.schemas() {
            let schema = handle.read();
            for function in &schema.functions {
                tree.insert(&schema.name, function.clone());
            }
        }
        tree
    }

    fn insert(&mut self, schema: &str, function: FunctionMethod) {
        self.by_name
            .entry(function.name.to_lowercase())
            .or_default()
            .push((schema.to_string(), function.clone()));
        self.by_schema
            .entry(schema.to_lowercase())
            .or_default()
            .push(function);
    }

    /// Functions declared by one schema.
    pub fn schema_functions(&self, schema: &str) -> &[FunctionMethod] {
        self.by_schema
            .get(&schema.to_lowercase())
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Every overload of `name`, with the declaring schema.
    pub fn find(&self, name: &str) -> &[(String, FunctionMethod)] {
        self.by_name
            .get(&name.to_lowercase())
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Resolve `name` for the given argument types.
    pub fn resolve(&self, name: &str, argument_types: &[&str]) -> Option<&FunctionMethod> {
        self.find(name)
            .iter()
            .map(|(_, f)| f)
            .find(|f| {
                f.parameter_types.len() == argument_types.len()
                    && f.parameter_types
                        .iter()
                        .zip(argument_types)
                        .all(|(p, a)| p.eq_ignore_ascii_case(a))
            })
    }

    /// Total number of functions.
    pub fn len(&self) -> usize {
        self.by_schema.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_schema.is_empty()
    }
}
