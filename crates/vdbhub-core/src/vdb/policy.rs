//! Data access policies attached to a VDB.

use serde::{Deserialize, Serialize};

/// Access rights on one resource (model, table, column, or procedure path).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Permission {
    /// Dotted resource path, e.g. `Accounts` or `Accounts.Customer`.
    pub resource: String,
    #[serde(default)]
    pub allow_create: bool,
    #[serde(default)]
    pub allow_read: bool,
    #[serde(default)]
    pub allow_update: bool,
    #[serde(default)]
    pub allow_delete: bool,
    #[serde(default)]
    pub allow_execute: bool,
    #[serde(default)]
    pub allow_alter: bool,
}

impl Permission {
    /// A permission with no rights granted.
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            ..Self::default()
        }
    }

    /// A permission granting every right on the resource.
    pub fn all(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            allow_create: true,
            allow_read: true,
            allow_update: true,
            allow_delete: true,
            allow_execute: true,
            allow_alter: true,
        }
    }

    /// Grant read access.
    pub fn with_read(mut self) -> Self {
        self.allow_read = true;
        self
    }

    /// Grant execute access.
    pub fn with_execute(mut self) -> Self {
        self.allow_execute = true;
        self
    }
}

/// A named data role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPolicy {
    /// Policy name, unique within a (composite) VDB.
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Grants every right on every model of the declaring VDB.
    #[serde(default)]
    pub grant_all: bool,
    #[serde(default)]
    pub allow_create_temp_tables: bool,
    /// Applies to every authenticated user.
    #[serde(default)]
    pub any_authenticated: bool,
    /// Roles mapped onto this policy.
    #[serde(default)]
    pub mapped_roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl DataPolicy {
    /// Create an empty policy.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            grant_all: false,
            allow_create_temp_tables: false,
            any_authenticated: false,
            mapped_roles: Vec::new(),
            permissions: Vec::new(),
        }
    }

    /// Grant everything.
    pub fn with_grant_all(mut self) -> Self {
        self.grant_all = true;
        self
    }

    /// Add a permission.
    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permissions.push(permission);
        self
    }

    /// Map a role onto the policy.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.mapped_roles.push(role.into());
        self
    }

    /// Permission for a resource, ignoring case.
    pub fn permission(&self, resource: &str) -> Option<&Permission> {
        self.permissions
            .iter()
            .find(|p| p.resource.eq_ignore_ascii_case(resource))
    }

    /// Rewrite a grant-all policy so it only covers `models`.
    ///
    /// An imported grant-all policy must not extend to the importer's own
    /// models, so the blanket grant becomes one full permission per model.
    pub fn scoped_to<'a>(&self, models: impl IntoIterator<Item = &'a str>) -> Self {
        if !self.grant_all {
            return self.clone();
        }
        let mut scoped = self.clone();
        scoped.grant_all = false;
        for model in models {
            if scoped.permission(model).is_none() {
                scoped.permissions.push(Permission::all(model));
            }
        }
        scoped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_to_rewrites_grant_all() {
        let policy = DataPolicy::new("admins").with_grant_all().with_role("admin");
        let scoped = policy.scoped_to(["Quotes", "History"]);

        assert!(!scoped.grant_all);
        assert_eq!(scoped.permissions.len(), 2);
        assert_eq!(scoped.permission("quotes"), Some(&Permission::all("Quotes")));
        assert_eq!(scoped.mapped_roles, vec!["admin".to_string()]);
    }

    #[test]
    fn test_scoped_to_keeps_plain_policy() {
        let policy =
            DataPolicy::new("readers").with_permission(Permission::new("Quotes").with_read());
        assert_eq!(policy.scoped_to(["Quotes", "History"]), policy);
    }

    #[test]
    fn test_scoped_to_keeps_explicit_permission() {
        let policy = DataPolicy::new("mixed")
            .with_grant_all()
            .with_permission(Permission::new("Quotes").with_read());
        let scoped = policy.scoped_to(["Quotes"]);
        let quotes = scoped.permission("Quotes").unwrap();
        assert!(quotes.allow_read);
        assert!(!quotes.allow_delete);
    }
}
