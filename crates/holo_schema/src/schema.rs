//! Table schema descriptors shared by the validator, migrator and store.
//!
//! A `TableSchema` is handed out by the registry as an `Arc` snapshot and is
//! never mutated in place: schema changes clone it, edit the clone, and hand
//! the replacement to the migration coordinator.

use std::collections::BTreeSet;
use std::fmt;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::index::{CollectionIndexMode, IndexDescriptor, IndexKind};

/// `(keyspace, table)` identity of a table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub keyspace: String,
    pub table: String,
}

impl TableRef {
    pub fn new(keyspace: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            keyspace: keyspace.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.keyspace, self.table)
    }
}

/// Declared type of a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CqlType {
    Ascii,
    Bigint,
    Blob,
    Boolean,
    Counter,
    Double,
    Float,
    Inet,
    Int,
    Text,
    Timestamp,
    Timeuuid,
    Uuid,
    Varint,
    List(Box<CqlType>),
    Set(Box<CqlType>),
    Map(Box<CqlType>, Box<CqlType>),
}

impl CqlType {
    pub fn map(key: CqlType, value: CqlType) -> Self {
        Self::Map(Box::new(key), Box::new(value))
    }

    pub fn list(element: CqlType) -> Self {
        Self::List(Box::new(element))
    }

    pub fn set(element: CqlType) -> Self {
        Self::Set(Box::new(element))
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Self::List(_) | Self::Set(_) | Self::Map(_, _))
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Self::Map(_, _))
    }

    pub fn is_counter(&self) -> bool {
        matches!(self, Self::Counter)
    }
}

impl fmt::Display for CqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascii => f.write_str("ascii"),
            Self::Bigint => f.write_str("bigint"),
            Self::Blob => f.write_str("blob"),
            Self::Boolean => f.write_str("boolean"),
            Self::Counter => f.write_str("counter"),
            Self::Double => f.write_str("double"),
            Self::Float => f.write_str("float"),
            Self::Inet => f.write_str("inet"),
            Self::Int => f.write_str("int"),
            Self::Text => f.write_str("text"),
            Self::Timestamp => f.write_str("timestamp"),
            Self::Timeuuid => f.write_str("timeuuid"),
            Self::Uuid => f.write_str("uuid"),
            Self::Varint => f.write_str("varint"),
            Self::List(element) => write!(f, "list<{element}>"),
            Self::Set(element) => write!(f, "set<{element}>"),
            Self::Map(key, value) => write!(f, "map<{key}, {value}>"),
        }
    }
}

/// Role a column plays in the table layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColumnKind {
    PartitionKey,
    Clustering,
    Regular,
    Static,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PartitionKey => "PARTITION_KEY",
            Self::Clustering => "CLUSTERING",
            Self::Regular => "REGULAR",
            Self::Static => "STATIC",
        };
        f.write_str(name)
    }
}

/// Cell-name comparator layout of a table.
///
/// `compound` tables use the modern composite cell layout; `dense` tables are
/// the legacy compact-storage layout where only the single value column can be
/// addressed independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Comparator {
    pub compound: bool,
    pub dense: bool,
}

impl Comparator {
    pub fn compound() -> Self {
        Self {
            compound: true,
            dense: false,
        }
    }

    pub fn is_compound(&self) -> bool {
        self.compound
    }

    pub fn is_dense(&self) -> bool {
        self.dense
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub cql_type: CqlType,
    pub kind: ColumnKind,
    /// Position inside a multi-component partition or clustering key. `None`
    /// means the column is the whole key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_index: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<IndexDescriptor>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, cql_type: CqlType, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            cql_type,
            kind,
            component_index: None,
            index: None,
        }
    }

    pub fn partition_key(name: impl Into<String>, cql_type: CqlType) -> Self {
        Self::new(name, cql_type, ColumnKind::PartitionKey)
    }

    pub fn clustering(name: impl Into<String>, cql_type: CqlType) -> Self {
        Self::new(name, cql_type, ColumnKind::Clustering)
    }

    pub fn regular(name: impl Into<String>, cql_type: CqlType) -> Self {
        Self::new(name, cql_type, ColumnKind::Regular)
    }

    pub fn with_component_index(mut self, component_index: u16) -> Self {
        self.component_index = Some(component_index);
        self
    }

    pub fn with_index(mut self, index: IndexDescriptor) -> Self {
        self.index = Some(index);
        self
    }

    /// Returns whether this column spans every component of its key.
    ///
    /// Only meaningful on schemas accepted by [`TableSchema::validate`],
    /// which ties `component_index` to the number of key columns.
    pub fn is_on_all_components(&self) -> bool {
        self.component_index.is_none()
    }

    pub fn is_indexed(&self) -> bool {
        self.index.is_some()
    }
}

/// Descriptor of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub keyspace: String,
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    #[serde(default)]
    pub comparator: Comparator,
    #[serde(default)]
    pub is_counter: bool,
    /// Assigned by the schema store on every committed change.
    #[serde(default)]
    pub version: u64,
}

impl TableSchema {
    pub fn new(keyspace: impl Into<String>, name: impl Into<String>, comparator: Comparator) -> Self {
        Self {
            keyspace: keyspace.into(),
            name: name.into(),
            columns: Vec::new(),
            comparator,
            is_counter: false,
            version: 0,
        }
    }

    pub fn with_column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    pub fn counter(mut self) -> Self {
        self.is_counter = true;
        self
    }

    pub fn table_ref(&self) -> TableRef {
        TableRef::new(self.keyspace.clone(), self.name.clone())
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut ColumnDefinition> {
        self.columns.iter_mut().find(|column| column.name == name)
    }

    /// Returns the column owning an index with `index_name`, if any.
    pub fn column_for_index(&self, index_name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|column| {
            column
                .index
                .as_ref()
                .and_then(|index| index.name.as_deref())
                .is_some_and(|name| name == index_name)
        })
    }

    pub fn index_names(&self) -> BTreeSet<String> {
        self.columns
            .iter()
            .filter_map(|column| column.index.as_ref())
            .filter_map(|index| index.name.clone())
            .collect()
    }

    /// Gives every unnamed index the default `<table>_<column>_idx` name,
    /// appending `_N` until the name is unique within the table.
    pub fn add_default_index_names(&mut self) {
        let mut existing = self.index_names();
        let table_name = self.name.clone();
        for column in &mut self.columns {
            let Some(index) = column.index.as_mut() else {
                continue;
            };
            if index.name.is_some() {
                continue;
            }
            let base = default_index_name(table_name.as_str(), column.name.as_str());
            let mut candidate = base.clone();
            let mut suffix = 0u32;
            while existing.contains(candidate.as_str()) {
                suffix += 1;
                candidate = format!("{base}_{suffix}");
            }
            existing.insert(candidate.clone());
            index.name = Some(candidate);
        }
    }

    /// Validates structural invariants before the schema is registered or
    /// published.
    pub fn validate(&self) -> Result<()> {
        if self.keyspace.trim().is_empty() {
            return Err(anyhow!("table schema has empty keyspace"));
        }
        if self.name.trim().is_empty() {
            return Err(anyhow!("table schema has empty name"));
        }
        if self.columns.is_empty() {
            return Err(anyhow!("table '{}' has no columns", self.table_ref()));
        }

        let mut seen_columns = BTreeSet::<&str>::new();
        let mut seen_indexes = BTreeSet::<&str>::new();
        let mut has_partition_key = false;
        for column in &self.columns {
            if column.name.trim().is_empty() {
                return Err(anyhow!("table '{}' has empty column name", self.table_ref()));
            }
            if !seen_columns.insert(column.name.as_str()) {
                return Err(anyhow!(
                    "table '{}' has duplicate column '{}'",
                    self.table_ref(),
                    column.name
                ));
            }
            match column.kind {
                ColumnKind::PartitionKey => has_partition_key = true,
                ColumnKind::Clustering => {}
                ColumnKind::Regular | ColumnKind::Static => {
                    if column.component_index.is_some() {
                        return Err(anyhow!(
                            "{} column '{}' of table '{}' cannot have a component index",
                            column.kind,
                            column.name,
                            self.table_ref()
                        ));
                    }
                }
            }
            if column.cql_type.is_counter() && !self.is_counter {
                return Err(anyhow!(
                    "counter column '{}' is not allowed on non-counter table '{}'",
                    column.name,
                    self.table_ref()
                ));
            }

            let Some(index) = column.index.as_ref() else {
                continue;
            };
            if let Some(name) = index.name.as_deref() {
                if !seen_indexes.insert(name) {
                    return Err(anyhow!(
                        "table '{}' has duplicate index name '{}'",
                        self.table_ref(),
                        name
                    ));
                }
            }
            if let IndexKind::Composites {
                collection: Some(mode),
            } = &index.kind
            {
                if !column.cql_type.is_collection() {
                    return Err(anyhow!(
                        "index on non-collection column '{}' records collection mode {}",
                        column.name,
                        mode
                    ));
                }
                if *mode == CollectionIndexMode::Keys && !column.cql_type.is_map() {
                    return Err(anyhow!(
                        "index on column '{}' records map keys but the column is {}",
                        column.name,
                        column.cql_type
                    ));
                }
            }
        }

        if !has_partition_key {
            return Err(anyhow!(
                "table '{}' has no partition key column",
                self.table_ref()
            ));
        }
        self.validate_key_components(ColumnKind::PartitionKey)?;
        self.validate_key_components(ColumnKind::Clustering)?;
        Ok(())
    }

    /// A key made of one column spans the whole key and has no component
    /// index. A composite key numbers its columns `0..n`, each exactly once.
    fn validate_key_components(&self, kind: ColumnKind) -> Result<()> {
        let columns = self
            .columns
            .iter()
            .filter(|column| column.kind == kind)
            .collect::<Vec<_>>();
        if let [column] = columns.as_slice() {
            if let Some(component) = column.component_index {
                return Err(anyhow!(
                    "{kind} column '{}' of table '{}' is the whole key but has component index {component}",
                    column.name,
                    self.table_ref()
                ));
            }
            return Ok(());
        }

        let mut seen = BTreeSet::<u16>::new();
        for column in &columns {
            let Some(component) = column.component_index else {
                return Err(anyhow!(
                    "{kind} column '{}' of table '{}' is part of a composite key but has no component index",
                    column.name,
                    self.table_ref()
                ));
            };
            if usize::from(component) >= columns.len() || !seen.insert(component) {
                return Err(anyhow!(
                    "{kind} column '{}' of table '{}' has invalid component index {component} for a {}-column key",
                    column.name,
                    self.table_ref(),
                    columns.len()
                ));
            }
        }
        Ok(())
    }
}

fn default_index_name(table: &str, column: &str) -> String {
    format!("{table}_{column}_idx")
        .chars()
        .filter(|ch| ch.is_alphanumeric() || *ch == '_')
        .collect()
}
