//! Version resolution for unversioned VDB requests.

use std::sync::Arc;

use super::Registry;
use crate::composite::CompositeUnit;
use crate::key::{Version, VersionKey};
use crate::vdb::ConnectionType;

impl Registry {
    /// Pick the version that answers an unversioned request for `name`.
    ///
    /// Versions are scanned in ascending order and each one's current
    /// connection type decides: `ANY` takes over the selection, `BY_VERSION`
    /// is selected only if nothing is yet, `NONE` is never selected.
    pub fn resolve(&self, name: &str) -> Option<VersionKey> {
        let mut selected: Option<VersionKey> = None;
        for entry in self.units.range(VersionKey::lowest(name)..) {
            if !entry.key().has_name(name) {
                break;
            }
            match entry.value().connection_type() {
                ConnectionType::Any => selected = Some(entry.key().clone()),
                ConnectionType::ByVersion if selected.is_none() => {
                    selected = Some(entry.key().clone());
                }
                ConnectionType::ByVersion | ConnectionType::None => {}
            }
        }
        selected
    }

    /// The VDB that answers an unversioned request for `name`.
    pub fn get_latest(&self, name: &str) -> Option<Arc<CompositeUnit>> {
        self.resolve(name).and_then(|key| self.get_by_key(&key))
    }

    /// Deployed versions of `name`, ascending.
    pub fn versions_of(&self, name: &str) -> Vec<Version> {
        self.units
            .range(VersionKey::lowest(name)..)
            .take_while(|entry| entry.key().has_name(name))
            .map(|entry| entry.key().version().clone())
            .collect()
    }
}
