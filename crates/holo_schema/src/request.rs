//! CREATE INDEX request model.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{SchemaChangeError, SchemaChangeResult};
use crate::index::CUSTOM_INDEX_OPTION_NAME;
use crate::schema::TableRef;

/// One `(column, flavor)` unit of a CREATE INDEX request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexTarget {
    pub column: String,
    /// Index the map's keys instead of its values. Only meaningful for map
    /// columns.
    pub collection_keys: bool,
}

impl IndexTarget {
    pub fn values(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            collection_keys: false,
        }
    }

    pub fn keys(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            collection_keys: true,
        }
    }

    /// Parses `col`, `values(col)` or `keys(col)`.
    pub fn parse(raw: &str) -> SchemaChangeResult<Self> {
        let raw = raw.trim();
        let (collection_keys, column) = if let Some(inner) = strip_call(raw, "keys") {
            (true, inner)
        } else if let Some(inner) = strip_call(raw, "values") {
            (false, inner)
        } else {
            (false, raw)
        };
        if column.is_empty() {
            return Err(SchemaChangeError::invalid(format!(
                "invalid index target '{raw}'"
            )));
        }
        Ok(Self {
            column: column.to_string(),
            collection_keys,
        })
    }
}

fn strip_call<'a>(raw: &'a str, function: &str) -> Option<&'a str> {
    let rest = raw.strip_prefix(function)?.trim_start();
    let inner = rest.strip_prefix('(')?.strip_suffix(')')?;
    Some(inner.trim())
}

impl fmt::Display for IndexTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.collection_keys {
            write!(f, "keys({})", self.column)
        } else {
            f.write_str(&self.column)
        }
    }
}

/// `USING` / `WITH options` part of a CREATE INDEX statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexProperties {
    pub is_custom: bool,
    pub custom_class: Option<String>,
    pub options: BTreeMap<String, String>,
}

impl IndexProperties {
    pub fn custom(class: impl Into<String>) -> Self {
        Self {
            is_custom: true,
            custom_class: Some(class.into()),
            options: BTreeMap::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn validate(&self) -> SchemaChangeResult<()> {
        if self.is_custom && self.custom_class.is_none() {
            return Err(SchemaChangeError::invalid(
                "CUSTOM index requires specifying the index class",
            ));
        }
        if !self.is_custom && self.custom_class.is_some() {
            return Err(SchemaChangeError::invalid(
                "Cannot specify index class for a non-CUSTOM index",
            ));
        }
        if !self.is_custom && !self.options.is_empty() {
            return Err(SchemaChangeError::invalid(
                "Cannot specify options for a non-CUSTOM index",
            ));
        }
        if self.options.contains_key(CUSTOM_INDEX_OPTION_NAME) {
            return Err(SchemaChangeError::invalid(format!(
                "Cannot specify {CUSTOM_INDEX_OPTION_NAME} as a CUSTOM option"
            )));
        }
        Ok(())
    }

    /// Options persisted on a custom index: the raw options plus the
    /// implementation class.
    pub fn custom_options(&self) -> BTreeMap<String, String> {
        let mut options = self.options.clone();
        if let Some(class) = &self.custom_class {
            options.insert(CUSTOM_INDEX_OPTION_NAME.to_string(), class.clone());
        }
        options
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateIndexRequest {
    pub table: TableRef,
    pub index_name: Option<String>,
    pub targets: Vec<IndexTarget>,
    pub properties: IndexProperties,
    pub if_not_exists: bool,
}

impl CreateIndexRequest {
    pub fn new(table: TableRef, target: IndexTarget) -> Self {
        Self {
            table,
            index_name: None,
            targets: vec![target],
            properties: IndexProperties::default(),
            if_not_exists: false,
        }
    }

    pub fn named(mut self, index_name: impl Into<String>) -> Self {
        self.index_name = Some(index_name.into());
        self
    }

    pub fn with_target(mut self, target: IndexTarget) -> Self {
        self.targets.push(target);
        self
    }

    pub fn with_properties(mut self, properties: IndexProperties) -> Self {
        self.properties = properties;
        self
    }

    pub fn if_not_exists(mut self, if_not_exists: bool) -> Self {
        self.if_not_exists = if_not_exists;
        self
    }
}
