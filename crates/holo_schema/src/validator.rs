//! Legality checks for CREATE INDEX against a table schema snapshot.
//!
//! Validation never mutates the schema. Targets are checked in request order
//! and the first violation is returned, so error messages are deterministic.

use std::collections::BTreeSet;

use crate::config::IfNotExistsScope;
use crate::error::{SchemaChangeError, SchemaChangeResult};
use crate::request::CreateIndexRequest;
use crate::schema::{ColumnKind, TableSchema};

/// Result of a successful validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    /// The request changes the schema.
    Proceed,
    /// `IF NOT EXISTS` matched an existing index; nothing to do.
    AlreadyExists,
}

pub fn validate(
    schema: &TableSchema,
    request: &CreateIndexRequest,
    scope: IfNotExistsScope,
) -> SchemaChangeResult<Validation> {
    validate_request_shape(request)?;

    // Counter tables reject every index, whatever the targets or IF NOT EXISTS.
    if schema.is_counter {
        return Err(SchemaChangeError::invalid(
            "Secondary indexes are not supported on counter tables",
        ));
    }

    request.properties.validate()?;

    let mut already_indexed = 0usize;
    for target in &request.targets {
        let Some(column) = schema.column(target.column.as_str()) else {
            return Err(SchemaChangeError::invalid(format!(
                "No column definition found for column {}",
                target.column
            )));
        };

        // keys(col) only makes sense on maps; lists and sets index their values.
        let is_map = column.cql_type.is_map();
        if target.collection_keys && !is_map {
            return Err(SchemaChangeError::invalid(format!(
                "Cannot create index on keys of column {} with non map type",
                target.column
            )));
        }

        if let Some(existing) = column.index.as_ref() {
            // A map carries at most one index, so switching between keys and
            // values is a conflict even under IF NOT EXISTS.
            let previous_is_keys = existing.indexes_collection_keys();
            if is_map && target.collection_keys != previous_is_keys {
                return Err(SchemaChangeError::invalid(format!(
                    "Cannot create index on {} {}, an index on {} {} already exists and indexing \
                     a map on both keys and values at the same time is not currently supported",
                    target.column,
                    keys_or_values(target.collection_keys),
                    target.column,
                    keys_or_values(previous_is_keys),
                )));
            }

            if !request.if_not_exists {
                return Err(SchemaChangeError::invalid("Index already exists"));
            }
            match scope {
                IfNotExistsScope::Statement => return Ok(Validation::AlreadyExists),
                IfNotExistsScope::Target => {
                    already_indexed += 1;
                    continue;
                }
            }
        }

        // Compact storage can only address its value column on its own.
        if schema.comparator.is_dense() && column.kind != ColumnKind::Regular {
            return Err(SchemaChangeError::invalid(format!(
                "Secondary index on {} column {} is not yet supported for compact table",
                column.kind, target.column
            )));
        }

        // The whole partition key is already the primary index. A component of
        // a composite key can still be indexed.
        if column.kind == ColumnKind::PartitionKey && column.is_on_all_components() {
            return Err(SchemaChangeError::invalid(format!(
                "Cannot add secondary index to already primarily indexed column {}",
                target.column
            )));
        }
    }

    // Names are unique per table; reusing one owned by another column is the
    // same index from the client's point of view.
    if let Some(index_name) = request.index_name.as_deref() {
        if let Some(owner) = schema.column_for_index(index_name) {
            let owned_by_target = request
                .targets
                .iter()
                .any(|target| target.column == owner.name);
            if !owned_by_target {
                if request.if_not_exists {
                    return Ok(Validation::AlreadyExists);
                }
                return Err(SchemaChangeError::invalid(format!(
                    "Index {index_name} already exists"
                )));
            }
        }
    }

    // Target scope: nothing left to create once every target was skipped.
    if already_indexed == request.targets.len() {
        return Ok(Validation::AlreadyExists);
    }
    Ok(Validation::Proceed)
}

fn validate_request_shape(request: &CreateIndexRequest) -> SchemaChangeResult<()> {
    if request.targets.is_empty() {
        return Err(SchemaChangeError::invalid(
            "CREATE INDEX requires at least one target column",
        ));
    }
    let mut seen = BTreeSet::<&str>::new();
    for target in &request.targets {
        if !seen.insert(target.column.as_str()) {
            return Err(SchemaChangeError::invalid(format!(
                "Column {} is targeted more than once",
                target.column
            )));
        }
    }
    if let Some(index_name) = request.index_name.as_deref() {
        if index_name.trim().is_empty() {
            return Err(SchemaChangeError::invalid("Index name cannot be empty"));
        }
        if request.targets.len() > 1 {
            return Err(SchemaChangeError::invalid(format!(
                "Index name {index_name} cannot be shared by {} columns",
                request.targets.len()
            )));
        }
    }
    Ok(())
}

fn keys_or_values(collection_keys: bool) -> &'static str {
    if collection_keys {
        "keys"
    } else {
        "values"
    }
}
