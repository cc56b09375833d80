use std::time::Duration;

use thiserror::Error;

use crate::schema::TableRef;

/// Convenience alias for `Result<T, SchemaChangeError>`.
pub type SchemaChangeResult<T> = Result<T, SchemaChangeError>;

/// Errors surfaced to the caller of a schema-altering statement.
///
/// `InvalidRequest` and `Unauthorized` are terminal user errors and carry a
/// message naming the offending column or resource. `Migration` and `Timeout`
/// come from submitting the new schema to the migration coordinator; neither
/// is retried here.
#[derive(Error, Debug)]
pub enum SchemaChangeError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("schema migration for {table} failed: {source:#}")]
    Migration {
        table: TableRef,
        #[source]
        source: anyhow::Error,
    },

    #[error("schema migration for {table} did not complete within {timeout:?}")]
    Timeout { table: TableRef, timeout: Duration },
}

impl SchemaChangeError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    /// Returns `true` for errors caused by the request itself rather than by
    /// the migration coordinator.
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::InvalidRequest(_) | Self::Unauthorized(_))
    }
}
