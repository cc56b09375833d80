//! Access checks for schema-altering statements.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};

use crate::error::{SchemaChangeError, SchemaChangeResult};
use crate::schema::TableRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Permission {
    Create,
    Alter,
    Drop,
    Select,
    Modify,
    Authorize,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "CREATE",
            Self::Alter => "ALTER",
            Self::Drop => "DROP",
            Self::Select => "SELECT",
            Self::Modify => "MODIFY",
            Self::Authorize => "AUTHORIZE",
        };
        f.write_str(name)
    }
}

impl FromStr for Permission {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "CREATE" => Ok(Self::Create),
            "ALTER" => Ok(Self::Alter),
            "DROP" => Ok(Self::Drop),
            "SELECT" => Ok(Self::Select),
            "MODIFY" => Ok(Self::Modify),
            "AUTHORIZE" => Ok(Self::Authorize),
            other => Err(anyhow!("unknown permission '{other}'")),
        }
    }
}

/// Authenticated principal issuing a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub name: String,
}

impl AuthenticatedUser {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Capability check consulted before a statement touches schema state.
pub trait Authorizer: Send + Sync {
    fn check_access(
        &self,
        user: &AuthenticatedUser,
        table: &TableRef,
        permission: Permission,
    ) -> SchemaChangeResult<()>;
}

/// Grant table keyed by user. A keyspace-level grant covers every table in
/// that keyspace.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthorizer {
    superusers: BTreeSet<String>,
    keyspace_grants: BTreeMap<(String, String), BTreeSet<Permission>>,
    table_grants: BTreeMap<(String, TableRef), BTreeSet<Permission>>,
}

impl StaticAuthorizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_superuser(mut self, user: impl Into<String>) -> Self {
        self.superusers.insert(user.into());
        self
    }

    pub fn grant_keyspace(
        mut self,
        user: impl Into<String>,
        keyspace: impl Into<String>,
        permission: Permission,
    ) -> Self {
        self.keyspace_grants
            .entry((user.into(), keyspace.into()))
            .or_default()
            .insert(permission);
        self
    }

    pub fn grant_table(
        mut self,
        user: impl Into<String>,
        table: TableRef,
        permission: Permission,
    ) -> Self {
        self.table_grants
            .entry((user.into(), table))
            .or_default()
            .insert(permission);
        self
    }

    /// Applies a `user:keyspace[.table]:PERMISSION` grant spec.
    pub fn grant_spec(self, spec: &str) -> Result<Self> {
        let parts = spec.split(':').collect::<Vec<_>>();
        let [user, resource, permission] = parts.as_slice() else {
            return Err(anyhow!(
                "invalid grant '{spec}' (expected user:keyspace[.table]:PERMISSION)"
            ));
        };
        if user.trim().is_empty() || resource.trim().is_empty() {
            return Err(anyhow!("invalid grant '{spec}': empty user or resource"));
        }
        let permission = permission.parse::<Permission>()?;
        Ok(match resource.split_once('.') {
            Some((keyspace, table)) => {
                self.grant_table(*user, TableRef::new(keyspace, table), permission)
            }
            None => self.grant_keyspace(*user, *resource, permission),
        })
    }

    fn has_permission(&self, user: &str, table: &TableRef, permission: Permission) -> bool {
        if self.superusers.contains(user) {
            return true;
        }
        let on_keyspace = self
            .keyspace_grants
            .get(&(user.to_string(), table.keyspace.clone()))
            .is_some_and(|granted| granted.contains(&permission));
        let on_table = self
            .table_grants
            .get(&(user.to_string(), table.clone()))
            .is_some_and(|granted| granted.contains(&permission));
        on_keyspace || on_table
    }
}

impl Authorizer for StaticAuthorizer {
    fn check_access(
        &self,
        user: &AuthenticatedUser,
        table: &TableRef,
        permission: Permission,
    ) -> SchemaChangeResult<()> {
        if self.has_permission(user.name.as_str(), table, permission) {
            return Ok(());
        }
        Err(SchemaChangeError::unauthorized(format!(
            "User {} has no {} permission on <table {}> or any of its parents",
            user.name, permission, table
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyspace_grant_covers_tables() {
        let authorizer = StaticAuthorizer::new().grant_keyspace("alice", "app", Permission::Alter);
        let alice = AuthenticatedUser::new("alice");
        assert!(authorizer
            .check_access(&alice, &TableRef::new("app", "users"), Permission::Alter)
            .is_ok());
        assert!(authorizer
            .check_access(&alice, &TableRef::new("other", "users"), Permission::Alter)
            .is_err());
        assert!(authorizer
            .check_access(&alice, &TableRef::new("app", "users"), Permission::Drop)
            .is_err());
    }

    #[test]
    fn denial_names_user_permission_and_table() {
        let authorizer = StaticAuthorizer::new()
            .grant_table("bob", TableRef::new("app", "users"), Permission::Select);
        let err = authorizer
            .check_access(
                &AuthenticatedUser::new("bob"),
                &TableRef::new("app", "users"),
                Permission::Alter,
            )
            .unwrap_err();
        assert!(matches!(err, SchemaChangeError::Unauthorized(_)));
        assert_eq!(
            err.to_string(),
            "User bob has no ALTER permission on <table app.users> or any of its parents"
        );
    }

    #[test]
    fn grant_specs_parse_keyspace_and_table_resources() {
        let authorizer = StaticAuthorizer::new()
            .grant_spec("carol:app.users:alter")
            .unwrap()
            .grant_spec("dave:app:ALTER")
            .unwrap();
        let users = TableRef::new("app", "users");
        let carol = AuthenticatedUser::new("carol");
        let dave = AuthenticatedUser::new("dave");
        assert!(authorizer.check_access(&carol, &users, Permission::Alter).is_ok());
        assert!(authorizer
            .check_access(&carol, &TableRef::new("app", "orders"), Permission::Alter)
            .is_err());
        assert!(authorizer
            .check_access(&dave, &TableRef::new("app", "orders"), Permission::Alter)
            .is_ok());

        assert!(StaticAuthorizer::new().grant_spec("carol:app").is_err());
        assert!(StaticAuthorizer::new().grant_spec("carol:app:FLY").is_err());
    }

    #[test]
    fn superuser_bypasses_grants() {
        let authorizer = StaticAuthorizer::new().with_superuser("root");
        assert!(authorizer
            .check_access(
                &AuthenticatedUser::new("root"),
                &TableRef::new("any", "table"),
                Permission::Alter,
            )
            .is_ok());
    }
}
