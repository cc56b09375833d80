//! Read access to authoritative table schemas.

use std::sync::Arc;

use crate::error::{SchemaChangeError, SchemaChangeResult};
use crate::schema::{TableRef, TableSchema};

/// Source of the current schema for a table.
///
/// Implementations hand out shared snapshots; callers that want to change a
/// schema clone the snapshot and submit the clone through a
/// [`MigrationCoordinator`](crate::coordinator::MigrationCoordinator).
pub trait SchemaRegistry: Send + Sync {
    fn keyspace_exists(&self, keyspace: &str) -> bool;

    fn table_schema(&self, table: &TableRef) -> Option<Arc<TableSchema>>;
}

/// Resolves a table or fails with the user-facing "unconfigured" error.
pub fn lookup_table(
    registry: &dyn SchemaRegistry,
    table: &TableRef,
) -> SchemaChangeResult<Arc<TableSchema>> {
    if !registry.keyspace_exists(table.keyspace.as_str()) {
        return Err(SchemaChangeError::invalid(format!(
            "Keyspace {} does not exist",
            table.keyspace
        )));
    }
    registry.table_schema(table).ok_or_else(|| {
        SchemaChangeError::invalid(format!("unconfigured table {}", table.table))
    })
}
