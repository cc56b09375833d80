//! Index metadata persisted on a column.
//!
//! In memory the index kind is a tagged enum. On disk it keeps the legacy
//! `index_type` / `index_options` / `index_name` layout, including the
//! `index_keys` and `index_values` option flags that index-maintenance code
//! reads to know which half of a collection is indexed.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Option flag recording that a collection index tracks map keys.
pub const INDEX_KEYS_OPTION: &str = "index_keys";
/// Option flag recording that a collection index tracks collection values.
pub const INDEX_VALUES_OPTION: &str = "index_values";
/// Option carrying the implementation class of a custom index.
pub const CUSTOM_INDEX_OPTION_NAME: &str = "class_name";

/// Which half of a collection a composites index covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionIndexMode {
    Keys,
    Values,
}

impl CollectionIndexMode {
    pub fn from_collection_keys(collection_keys: bool) -> Self {
        if collection_keys {
            Self::Keys
        } else {
            Self::Values
        }
    }

    pub fn option_name(self) -> &'static str {
        match self {
            Self::Keys => INDEX_KEYS_OPTION,
            Self::Values => INDEX_VALUES_OPTION,
        }
    }
}

impl fmt::Display for CollectionIndexMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keys => f.write_str("keys"),
            Self::Values => f.write_str("values"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexKind {
    /// Legacy index on simple-comparator tables.
    Keys,
    /// Index on compound-comparator tables. Collection columns record which
    /// half of the collection is indexed.
    Composites {
        collection: Option<CollectionIndexMode>,
    },
    /// User-supplied implementation. `options` includes `class_name`.
    Custom { options: BTreeMap<String, String> },
}

impl IndexKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Keys => "KEYS",
            Self::Composites { .. } => "COMPOSITES",
            Self::Custom { .. } => "CUSTOM",
        }
    }

    /// Flattens the kind payload into the persisted option map.
    pub fn options(&self) -> BTreeMap<String, String> {
        match self {
            Self::Keys => BTreeMap::new(),
            Self::Composites { collection } => collection
                .map(|mode| BTreeMap::from([(mode.option_name().to_string(), String::new())]))
                .unwrap_or_default(),
            Self::Custom { options } => options.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "IndexDescriptorRecord", try_from = "IndexDescriptorRecord")]
pub struct IndexDescriptor {
    pub kind: IndexKind,
    /// Unset until the migrator assigns a requested or default name.
    pub name: Option<String>,
    /// Persisted options of a KEYS or COMPOSITES index that the kind does not
    /// model. Written back unchanged.
    pub extra_options: BTreeMap<String, String>,
}

impl IndexDescriptor {
    pub fn new(kind: IndexKind) -> Self {
        Self {
            kind,
            name: None,
            extra_options: BTreeMap::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Full persisted option map: the kind payload plus untouched extras.
    pub fn options(&self) -> BTreeMap<String, String> {
        let mut options = self.extra_options.clone();
        options.extend(self.kind.options());
        options
    }

    /// Returns whether the index records that it covers map keys.
    ///
    /// Decided from the persisted options, so custom and legacy KEYS
    /// descriptors are read the same way they were written.
    pub fn indexes_collection_keys(&self) -> bool {
        self.options().contains_key(INDEX_KEYS_OPTION)
    }
}

/// Persisted layout of an [`IndexDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptorRecord {
    pub index_type: String,
    #[serde(default)]
    pub index_options: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
}

impl From<IndexDescriptor> for IndexDescriptorRecord {
    fn from(descriptor: IndexDescriptor) -> Self {
        Self {
            index_type: descriptor.kind.type_name().to_string(),
            index_options: descriptor.options(),
            index_name: descriptor.name,
        }
    }
}

impl TryFrom<IndexDescriptorRecord> for IndexDescriptor {
    type Error = anyhow::Error;

    fn try_from(record: IndexDescriptorRecord) -> Result<Self> {
        let mut options = record.index_options;
        let kind = match record.index_type.as_str() {
            // Legacy KEYS indexes have no modelled options; keep them all.
            "KEYS" => IndexKind::Keys,
            "COMPOSITES" => {
                let keys = options.remove(INDEX_KEYS_OPTION).is_some();
                let values = options.remove(INDEX_VALUES_OPTION).is_some();
                let collection = match (keys, values) {
                    (true, true) => {
                        return Err(anyhow!(
                            "index options record both {} and {}",
                            INDEX_KEYS_OPTION,
                            INDEX_VALUES_OPTION
                        ))
                    }
                    (true, false) => Some(CollectionIndexMode::Keys),
                    (false, true) => Some(CollectionIndexMode::Values),
                    (false, false) => None,
                };
                IndexKind::Composites { collection }
            }
            "CUSTOM" => {
                if !options.contains_key(CUSTOM_INDEX_OPTION_NAME) {
                    return Err(anyhow!(
                        "custom index options are missing {}",
                        CUSTOM_INDEX_OPTION_NAME
                    ));
                }
                IndexKind::Custom {
                    options: std::mem::take(&mut options),
                }
            }
            other => {
                return Err(anyhow!(
                    "unknown index type '{other}' (expected KEYS, COMPOSITES or CUSTOM)"
                ))
            }
        };
        Ok(Self {
            kind,
            name: record.index_name,
            extra_options: options,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composites_values_index_persists_legacy_option_flag() {
        let descriptor = IndexDescriptor::new(IndexKind::Composites {
            collection: Some(CollectionIndexMode::Values),
        })
        .named("m_idx");

        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "index_type": "COMPOSITES",
                "index_options": {"index_values": ""},
                "index_name": "m_idx"
            })
        );
        let decoded: IndexDescriptor = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, descriptor);
    }

    #[test]
    fn legacy_keys_flag_decodes_to_key_mode() {
        let json = r#"{"index_type":"COMPOSITES","index_options":{"index_keys":""},"index_name":"m_keys"}"#;
        let decoded: IndexDescriptor = serde_json::from_str(json).unwrap();
        assert!(decoded.indexes_collection_keys());
        assert_eq!(decoded.name.as_deref(), Some("m_keys"));
    }

    #[test]
    fn both_collection_flags_are_rejected() {
        let json = r#"{"index_type":"COMPOSITES","index_options":{"index_keys":"","index_values":""}}"#;
        assert!(serde_json::from_str::<IndexDescriptor>(json).is_err());
    }

    #[test]
    fn custom_index_requires_class_name() {
        let json = r#"{"index_type":"CUSTOM","index_options":{"foo":"bar"}}"#;
        assert!(serde_json::from_str::<IndexDescriptor>(json).is_err());

        let json = r#"{"index_type":"CUSTOM","index_options":{"class_name":"org.example.Lucene","index_keys":""}}"#;
        let decoded: IndexDescriptor = serde_json::from_str(json).unwrap();
        assert!(decoded.indexes_collection_keys());
        assert_eq!(decoded.kind.type_name(), "CUSTOM");
    }

    #[test]
    fn unmodelled_options_survive_a_round_trip() {
        let composites = serde_json::json!({
            "index_type": "COMPOSITES",
            "index_options": {"index_values": "", "legacy_flag": "1"},
            "index_name": "m_idx"
        });
        let decoded: IndexDescriptor = serde_json::from_value(composites.clone()).unwrap();
        assert_eq!(
            decoded.kind,
            IndexKind::Composites {
                collection: Some(CollectionIndexMode::Values)
            }
        );
        assert_eq!(serde_json::to_value(&decoded).unwrap(), composites);

        let keys = serde_json::json!({
            "index_type": "KEYS",
            "index_options": {"index_values": ""}
        });
        let decoded: IndexDescriptor = serde_json::from_value(keys.clone()).unwrap();
        assert_eq!(decoded.kind, IndexKind::Keys);
        assert!(!decoded.indexes_collection_keys());
        assert_eq!(serde_json::to_value(&decoded).unwrap(), keys);
    }

    #[test]
    fn index_type_must_match_exactly() {
        for index_type in ["composites", "Keys", "custom"] {
            let json = format!(
                r#"{{"index_type":"{index_type}","index_options":{{"class_name":"org.example.Lucene"}}}}"#
            );
            let err = serde_json::from_str::<IndexDescriptor>(&json).unwrap_err();
            assert!(err.to_string().contains("unknown index type"));
        }
    }

    #[test]
    fn keys_index_has_no_options() {
        let descriptor = IndexDescriptor::new(IndexKind::Keys);
        assert!(descriptor.kind.options().is_empty());
        assert!(!descriptor.indexes_collection_keys());
    }
}
