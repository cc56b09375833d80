//! `CREATE INDEX` as a schema-altering statement.

use std::fmt;

use tracing::{info, warn};

use crate::auth::{AuthenticatedUser, Permission};
use crate::context::SchemaChangeContext;
use crate::error::{SchemaChangeError, SchemaChangeResult};
use crate::migrator::{self, Migration};
use crate::registry::lookup_table;
use crate::request::CreateIndexRequest;
use crate::schema::TableRef;
use crate::validator::{self, Validation};

/// Change kind reported to clients after a schema-altering statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaChange {
    Created,
    Updated,
    Dropped,
}

impl fmt::Display for SchemaChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => f.write_str("CREATED"),
            Self::Updated => f.write_str("UPDATED"),
            Self::Dropped => f.write_str("DROPPED"),
        }
    }
}

/// Schema change event produced by a statement that altered a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaChangeEvent {
    pub change: SchemaChange,
    pub table: TableRef,
}

#[derive(Debug, Clone)]
pub struct CreateIndexStatement {
    request: CreateIndexRequest,
}

impl CreateIndexStatement {
    pub fn new(request: CreateIndexRequest) -> Self {
        Self { request }
    }

    pub fn request(&self) -> &CreateIndexRequest {
        &self.request
    }

    /// Creating an index requires `ALTER` on the table.
    pub fn check_access(
        &self,
        context: &SchemaChangeContext,
        user: &AuthenticatedUser,
    ) -> SchemaChangeResult<()> {
        context
            .authorizer
            .check_access(user, &self.request.table, Permission::Alter)
    }

    pub fn validate(&self, context: &SchemaChangeContext) -> SchemaChangeResult<Validation> {
        let schema = lookup_table(context.registry.as_ref(), &self.request.table)?;
        validator::validate(&schema, &self.request, context.config.if_not_exists_scope)
    }

    pub async fn announce_migration(
        &self,
        context: &SchemaChangeContext,
    ) -> SchemaChangeResult<Migration> {
        migrator::announce_migration(context, &self.request).await
    }

    /// Creating an index only changes column metadata, which clients see as
    /// an update of the enclosing table.
    pub fn change_type(&self) -> SchemaChange {
        SchemaChange::Updated
    }

    /// Runs access check, validation and migration in order.
    ///
    /// Returns `None` when `IF NOT EXISTS` turned the statement into a no-op.
    pub async fn execute(
        &self,
        context: &SchemaChangeContext,
        user: &AuthenticatedUser,
    ) -> SchemaChangeResult<Option<SchemaChangeEvent>> {
        context.metrics.record_request();
        let table = &self.request.table;

        if let Err(err) = self.check_access(context, user) {
            context.metrics.record_unauthorized();
            warn!(table = %table, user = %user.name, "CREATE INDEX denied");
            return Err(err);
        }

        let outcome = match self.validate(context) {
            Ok(Validation::AlreadyExists) => Ok(Migration::Unchanged),
            Ok(Validation::Proceed) => self.announce_migration(context).await,
            Err(err) => Err(err),
        };

        match outcome {
            Ok(Migration::Unchanged) => {
                context.metrics.record_noop();
                info!(table = %table, "CREATE INDEX IF NOT EXISTS matched an existing index");
                Ok(None)
            }
            Ok(Migration::Updated(schema)) => {
                info!(
                    table = %table,
                    base_version = schema.version,
                    index = self.request.index_name.as_deref().unwrap_or("<default>"),
                    "CREATE INDEX applied"
                );
                Ok(Some(SchemaChangeEvent {
                    change: self.change_type(),
                    table: table.clone(),
                }))
            }
            Err(err) => {
                if matches!(err, SchemaChangeError::InvalidRequest(_)) {
                    context.metrics.record_rejected();
                    warn!(table = %table, error = %err, "CREATE INDEX rejected");
                }
                Err(err)
            }
        }
    }
}
