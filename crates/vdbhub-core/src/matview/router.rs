//! Routing materialized table operations to the owning VDB's store.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use super::state::MatTableState;
use super::store::{GlobalTableStore, Row};

/// Default prefix of internal materialized table names.
pub const DEFAULT_MAT_PREFIX: &str = "#MAT_";

/// Sends each operation to the store of the VDB that owns the table's schema.
///
/// Table names have the form `<prefix><schema>.<table>`. Schemas contributed
/// by an import are served by that import's store; everything else, including
/// names that do not parse, falls back to the primary store.
#[derive(Debug)]
pub struct GlobalTableRouter {
    primary: Arc<dyn GlobalTableStore>,
    routes: HashMap<String, Arc<dyn GlobalTableStore>>,
    prefix: String,
}

impl GlobalTableRouter {
    pub fn new(primary: Arc<dyn GlobalTableStore>, prefix: impl Into<String>) -> Self {
        Self {
            primary,
            routes: HashMap::new(),
            prefix: prefix.into(),
        }
    }

    /// Route `schema` to `store`. The first route for a schema wins.
    pub fn with_route(mut self, schema: &str, store: Arc<dyn GlobalTableStore>) -> Self {
        self.routes.entry(schema.to_lowercase()).or_insert(store);
        self
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Schema part of a materialized table name.
    pub fn parse_schema<'a>(&self, name: &'a str) -> Option<&'a str> {
        let head = name.get(..self.prefix.len())?;
        if !head.eq_ignore_ascii_case(&self.prefix) {
            return None;
        }
        let rest = &name[self.prefix.len()..];
        let dot = rest.find('.')?;
        Some(&rest[..dot]).filter(|s| !s.is_empty())
    }

    /// The store that owns `name`.
    pub fn store_for(&self, name: &str) -> &Arc<dyn GlobalTableStore> {
        let routed = self
            .parse_schema(name)
            .and_then(|schema| self.routes.get(&schema.to_lowercase()));
        match routed {
            Some(store) => {
                trace!(table = name, "materialized table routed to import");
                store
            }
            None => &self.primary,
        }
    }
}

impl GlobalTableStore for GlobalTableRouter {
    fn create_mat_table(&self, name: &str, columns: &[String], key_columns: &[String]) {
        self.store_for(name).create_mat_table(name, columns, key_columns);
    }

    fn needs_loading(
        &self,
        name: &str,
        address: &str,
        first_pass: bool,
        refresh: bool,
        invalidate: bool,
    ) -> bool {
        self.store_for(name)
            .needs_loading(name, address, first_pass, refresh, invalidate)
    }

    fn loaded(&self, name: &str, address: &str) {
        self.store_for(name).loaded(name, address);
    }

    fn failed_load(&self, name: &str, address: &str) {
        self.store_for(name).failed_load(name, address);
    }

    fn update_mat_view_row(&self, name: &str, row: Row, delete: bool) -> Option<Row> {
        self.store_for(name).update_mat_view_row(name, row, delete)
    }

    fn mat_table_info(&self, name: &str) -> Option<MatTableState> {
        self.store_for(name).mat_table_info(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matview::LocalTableStore;

    fn router() -> (GlobalTableRouter, Arc<LocalTableStore>, Arc<LocalTableStore>) {
        let own = Arc::new(LocalTableStore::new());
        let child = Arc::new(LocalTableStore::new());
        let router = GlobalTableRouter::new(own.clone(), DEFAULT_MAT_PREFIX)
            .with_route("Quotes", child.clone());
        (router, own, child)
    }

    #[test]
    fn test_parse_schema() {
        let (router, _, _) = router();
        assert_eq!(router.parse_schema("#MAT_Quotes.Daily"), Some("Quotes"));
        assert_eq!(router.parse_schema("#mat_Quotes.a.b"), Some("Quotes"));
        assert_eq!(router.parse_schema("#MAT_NoDot"), None);
        assert_eq!(router.parse_schema("#MAT_.t"), None);
        assert_eq!(router.parse_schema("Quotes.Daily"), None);
        assert_eq!(router.parse_schema("#M"), None);
    }

    #[test]
    fn test_routes_to_owner_and_falls_back() {
        let (router, own, child) = router();
        let cols = vec!["id".to_string()];

        router.create_mat_table("#MAT_QUOTES.Daily", &cols, &cols);
        router.create_mat_table("#MAT_Reports.Summary", &cols, &cols);
        router.create_mat_table("garbage", &cols, &cols);

        assert_eq!(child.table_names(), vec!["#mat_quotes.daily".to_string()]);
        assert_eq!(own.table_names().len(), 2);
        assert!(router.mat_table_info("#MAT_Quotes.Daily").is_some());
        assert!(router.needs_loading("#MAT_Quotes.Daily", "local", false, false, false));
        assert!(child.mat_table_info("#MAT_Quotes.Daily").unwrap().loader_address.is_some());
    }
}
