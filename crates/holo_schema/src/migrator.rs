//! Computes and announces the schema change for a validated CREATE INDEX.
//!
//! The migrator never edits a registry snapshot: it re-reads the current
//! schema, re-validates the request against it, applies the targets to an
//! owned clone and submits that clone to the migration coordinator as a
//! metadata-only update.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::IfNotExistsScope;
use crate::context::SchemaChangeContext;
use crate::error::{SchemaChangeError, SchemaChangeResult};
use crate::index::{CollectionIndexMode, IndexDescriptor, IndexKind};
use crate::registry::lookup_table;
use crate::request::{CreateIndexRequest, IndexProperties, IndexTarget};
use crate::schema::{ColumnDefinition, TableSchema};
use crate::validator::{validate, Validation};

/// Schema change computed for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Migration {
    /// `IF NOT EXISTS` matched; the schema stays as it is.
    Unchanged,
    /// Replacement descriptor for the table.
    Updated(TableSchema),
}

/// Applies `request` to a clone of `current`.
///
/// Re-runs validation first so an index created after the caller validated
/// is never overwritten: it either turns the request into a no-op
/// (`IF NOT EXISTS`) or fails as already existing.
pub fn prepare(
    current: &TableSchema,
    request: &CreateIndexRequest,
    scope: IfNotExistsScope,
) -> SchemaChangeResult<Migration> {
    if validate(current, request, scope)? == Validation::AlreadyExists {
        return Ok(Migration::Unchanged);
    }

    let mut updated = current.clone();
    let compound = updated.comparator.is_compound();
    for target in &request.targets {
        let Some(column) = updated.column_mut(target.column.as_str()) else {
            return Err(SchemaChangeError::invalid(format!(
                "No column definition found for column {}",
                target.column
            )));
        };
        // Only reachable under the per-target IF NOT EXISTS scope.
        if column.is_indexed() {
            continue;
        }

        debug!(
            keyspace = %current.keyspace,
            table = %current.name,
            column = %target.column,
            index = request.index_name.as_deref().unwrap_or("<default>"),
            "updating column definition for index"
        );
        let kind = index_kind_for(&request.properties, compound, column, target);
        let mut descriptor = IndexDescriptor::new(kind);
        descriptor.name = request.index_name.clone();
        column.index = Some(descriptor);
    }

    // Names are assigned last so defaults can avoid every name already taken.
    updated.add_default_index_names();
    updated.validate().map_err(|err| {
        SchemaChangeError::invalid(format!(
            "CREATE INDEX on {} produced an invalid schema: {err:#}",
            current.table_ref()
        ))
    })?;
    Ok(Migration::Updated(updated))
}

fn index_kind_for(
    properties: &IndexProperties,
    compound: bool,
    column: &ColumnDefinition,
    target: &IndexTarget,
) -> IndexKind {
    // Custom implementations get the raw options plus their class.
    if properties.is_custom {
        return IndexKind::Custom {
            options: properties.custom_options(),
        };
    }
    // Compound tables record which half of a collection is indexed; scalar
    // columns carry no mode.
    if compound {
        let collection = column
            .cql_type
            .is_collection()
            .then(|| CollectionIndexMode::from_collection_keys(target.collection_keys));
        return IndexKind::Composites { collection };
    }
    IndexKind::Keys
}

/// Re-reads the table, prepares the change and submits it.
pub async fn announce_migration(
    context: &SchemaChangeContext,
    request: &CreateIndexRequest,
) -> SchemaChangeResult<Migration> {
    let current = lookup_table(context.registry.as_ref(), &request.table)?;
    let Migration::Updated(schema) =
        prepare(&current, request, context.config.if_not_exists_scope)?
    else {
        return Ok(Migration::Unchanged);
    };

    let started = Instant::now();
    let result = submit(context, schema.clone(), context.config.announce_timeout()).await;
    match &result {
        Ok(()) => context.metrics.record_announced(started.elapsed()),
        Err(err) => {
            context.metrics.record_announce_failure(started.elapsed());
            warn!(table = %request.table, error = %err, "schema announcement failed");
        }
    }
    result.map(|()| Migration::Updated(schema))
}

async fn submit(
    context: &SchemaChangeContext,
    schema: TableSchema,
    timeout: Option<Duration>,
) -> SchemaChangeResult<()> {
    let table = schema.table_ref();
    let announce = context
        .coordinator
        .announce_column_family_update(schema, false);
    // `None` waits for the coordinator without a bound.
    let outcome = match timeout {
        Some(timeout) => match tokio::time::timeout(timeout, announce).await {
            Ok(outcome) => outcome,
            Err(_) => return Err(SchemaChangeError::Timeout { table, timeout }),
        },
        None => announce.await,
    };
    outcome.map_err(|source| SchemaChangeError::Migration { table, source })
}
