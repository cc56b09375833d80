//! JSON-file-backed schema catalog.
//!
//! The store keeps every table schema as an `Arc` snapshot behind a lock and
//! swaps whole snapshots on commit, so readers never observe a partially
//! updated descriptor. Commits are conditional on the table version the
//! change was computed from.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::registry::SchemaRegistry;
use crate::schema::{TableRef, TableSchema};

/// Persisted catalog layout: `keyspace -> table -> schema`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaCatalog {
    #[serde(default)]
    pub epoch: u64,
    #[serde(default)]
    pub keyspaces: BTreeMap<String, BTreeMap<String, TableSchema>>,
}

#[derive(Debug, Clone, Default)]
struct CatalogState {
    epoch: u64,
    keyspaces: BTreeSet<String>,
    tables: BTreeMap<TableRef, Arc<TableSchema>>,
}

impl CatalogState {
    fn from_catalog(catalog: SchemaCatalog) -> Result<Self> {
        let mut state = Self {
            epoch: catalog.epoch,
            ..Self::default()
        };
        for (keyspace, tables) in catalog.keyspaces {
            state.keyspaces.insert(keyspace.clone());
            for (table_name, schema) in tables {
                if schema.keyspace != keyspace || schema.name != table_name {
                    return Err(anyhow!(
                        "schema catalog entry {keyspace}.{table_name} holds table {}",
                        schema.table_ref()
                    ));
                }
                schema
                    .validate()
                    .with_context(|| format!("validate table {keyspace}.{table_name}"))?;
                state.tables.insert(schema.table_ref(), Arc::new(schema));
            }
        }
        Ok(state)
    }

    fn to_catalog(&self) -> SchemaCatalog {
        let mut keyspaces = self
            .keyspaces
            .iter()
            .map(|keyspace| (keyspace.clone(), BTreeMap::new()))
            .collect::<BTreeMap<_, _>>();
        for (table, schema) in &self.tables {
            keyspaces
                .entry(table.keyspace.clone())
                .or_insert_with(BTreeMap::new)
                .insert(table.table.clone(), schema.as_ref().clone());
        }
        SchemaCatalog {
            epoch: self.epoch,
            keyspaces,
        }
    }
}

/// Shared schema state + persistence wrapper.
#[derive(Clone)]
pub struct SchemaStore {
    state: Arc<RwLock<CatalogState>>,
    path: Option<PathBuf>,
}

impl SchemaStore {
    /// Creates a store that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            state: Arc::new(RwLock::new(CatalogState::default())),
            path: None,
        }
    }

    /// Opens the catalog at `path`, creating an empty one if the file does
    /// not exist yet.
    pub fn load_or_init(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = match fs::read(&path) {
            Ok(data) => {
                let catalog: SchemaCatalog = serde_json::from_slice(&data)
                    .with_context(|| format!("decode schema catalog {}", path.display()))?;
                CatalogState::from_catalog(catalog)?
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => CatalogState::default(),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("read schema catalog {}", path.display()))
            }
        };

        let store = Self {
            state: Arc::new(RwLock::new(state)),
            path: Some(path),
        };
        store.write_catalog(&store.state.read().unwrap())?;
        Ok(store)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Monotonic counter bumped by every committed change.
    pub fn epoch(&self) -> u64 {
        self.state.read().unwrap().epoch
    }

    pub fn snapshot(&self) -> Vec<Arc<TableSchema>> {
        self.state.read().unwrap().tables.values().cloned().collect()
    }

    pub fn create_keyspace(&self, keyspace: &str) -> Result<()> {
        if keyspace.trim().is_empty() {
            return Err(anyhow!("keyspace name cannot be empty"));
        }
        let mut state = self.state.write().unwrap();
        if state.keyspaces.contains(keyspace) {
            return Ok(());
        }
        let mut next = state.clone();
        next.keyspaces.insert(keyspace.to_string());
        next.epoch = next.epoch.saturating_add(1);
        self.write_catalog(&next)?;
        *state = next;
        Ok(())
    }

    /// Adds a new table. Its keyspace is created on demand.
    pub fn register_table(&self, mut schema: TableSchema) -> Result<Arc<TableSchema>> {
        schema.validate()?;
        let table = schema.table_ref();

        let mut state = self.state.write().unwrap();
        if state.tables.contains_key(&table) {
            return Err(anyhow!("table {table} already exists"));
        }
        let mut next = state.clone();
        next.epoch = next.epoch.saturating_add(1);
        schema.version = 1;
        let schema = Arc::new(schema);
        next.keyspaces.insert(table.keyspace.clone());
        next.tables.insert(table.clone(), schema.clone());
        self.write_catalog(&next)?;
        *state = next;

        debug!(table = %table, "registered table schema");
        Ok(schema)
    }

    /// Replaces a table schema if its `version` still matches the stored one.
    ///
    /// The committed schema receives the next version number.
    pub fn commit_table(&self, mut schema: TableSchema) -> Result<Arc<TableSchema>> {
        schema.validate()?;
        let table = schema.table_ref();

        let mut state = self.state.write().unwrap();
        let Some(current) = state.tables.get(&table) else {
            return Err(anyhow!("table {table} does not exist"));
        };
        if current.version != schema.version {
            return Err(anyhow!(
                "schema version conflict for {table}: change was computed from version {} but the current version is {}",
                schema.version,
                current.version
            ));
        }

        let mut next = state.clone();
        next.epoch = next.epoch.saturating_add(1);
        schema.version = current.version.saturating_add(1);
        let schema = Arc::new(schema);
        next.tables.insert(table, schema.clone());
        self.write_catalog(&next)?;
        *state = next;
        Ok(schema)
    }

    fn write_catalog(&self, state: &CatalogState) -> Result<()> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).context("create schema catalog dir")?;
            }
        }
        let data =
            serde_json::to_vec_pretty(&state.to_catalog()).context("serialize schema catalog")?;
        fs::write(path, data).context("write schema catalog")?;
        Ok(())
    }
}

impl SchemaRegistry for SchemaStore {
    fn keyspace_exists(&self, keyspace: &str) -> bool {
        self.state.read().unwrap().keyspaces.contains(keyspace)
    }

    fn table_schema(&self, table: &TableRef) -> Option<Arc<TableSchema>> {
        self.state.read().unwrap().tables.get(table).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{IndexDescriptor, IndexKind};
    use crate::schema::{ColumnDefinition, Comparator, CqlType};

    fn table(name: &str) -> TableSchema {
        TableSchema::new("app", name, Comparator::compound())
            .with_column(ColumnDefinition::partition_key("k", CqlType::Int))
            .with_column(ColumnDefinition::regular("v", CqlType::Text))
    }

    #[test]
    fn register_assigns_first_version() {
        let store = SchemaStore::in_memory();
        let schema = store.register_table(table("t")).unwrap();
        assert_eq!(schema.version, 1);
        assert!(store.keyspace_exists("app"));
        assert_eq!(store.epoch(), 1);
        assert!(store.register_table(table("t")).is_err());
    }

    #[test]
    fn commit_rejects_stale_versions() {
        let store = SchemaStore::in_memory();
        let registered = store.register_table(table("t")).unwrap();

        let first = registered.as_ref().clone();
        let second = registered.as_ref().clone();
        let committed = store.commit_table(first).unwrap();
        assert_eq!(committed.version, 2);

        let err = store.commit_table(second).unwrap_err();
        assert!(err.to_string().contains("schema version conflict"));
        assert_eq!(store.table_schema(&registered.table_ref()).unwrap().version, 2);
    }

    #[test]
    fn readers_keep_their_snapshot_across_commits() {
        let store = SchemaStore::in_memory();
        let before = store.register_table(table("t")).unwrap();
        let mut changed = before.as_ref().clone();
        changed.columns.pop();
        changed.columns.push(ColumnDefinition::regular("w", CqlType::Int));
        store.commit_table(changed).unwrap();

        assert!(before.column("v").is_some());
        let after = store.table_schema(&before.table_ref()).unwrap();
        assert!(after.column("v").is_none());
        assert!(after.column("w").is_some());
    }

    #[test]
    fn catalog_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("schema.json");

        let store = SchemaStore::load_or_init(&path).unwrap();
        store.create_keyspace("empty").unwrap();
        store.register_table(table("t")).unwrap();
        drop(store);

        let reloaded = SchemaStore::load_or_init(&path).unwrap();
        assert!(reloaded.keyspace_exists("empty"));
        assert_eq!(reloaded.epoch(), 2);
        let schema = reloaded.table_schema(&TableRef::new("app", "t")).unwrap();
        assert_eq!(schema.version, 1);
    }

    #[test]
    fn register_rejects_inconsistent_key_components() {
        let store = SchemaStore::in_memory();
        let composite: TableSchema = serde_json::from_value(serde_json::json!({
            "keyspace": "app",
            "name": "events",
            "columns": [
                {"name": "a", "type": "int", "kind": "PARTITION_KEY"},
                {"name": "b", "type": "int", "kind": "PARTITION_KEY"},
                {"name": "v", "type": "text", "kind": "REGULAR"}
            ]
        }))
        .unwrap();
        let err = store.register_table(composite).unwrap_err();
        assert!(err.to_string().contains("has no component index"));

        let sole: TableSchema = serde_json::from_value(serde_json::json!({
            "keyspace": "app",
            "name": "users",
            "columns": [
                {"name": "k", "type": "int", "kind": "PARTITION_KEY", "component_index": 0},
                {"name": "v", "type": "text", "kind": "REGULAR"}
            ]
        }))
        .unwrap();
        assert!(store.register_table(sole).is_err());
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn commit_keeps_options_of_untouched_indexes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        let catalog = serde_json::json!({
            "epoch": 1,
            "keyspaces": {"app": {"t": {
                "keyspace": "app",
                "name": "t",
                "comparator": {"compound": true, "dense": false},
                "version": 1,
                "columns": [
                    {"name": "k", "type": "int", "kind": "PARTITION_KEY"},
                    {"name": "m", "type": {"map": ["text", "int"]}, "kind": "REGULAR", "index": {
                        "index_type": "COMPOSITES",
                        "index_options": {"index_values": "", "legacy_flag": "1"},
                        "index_name": "m_idx"
                    }},
                    {"name": "v", "type": "text", "kind": "REGULAR"}
                ]
            }}}
        });
        fs::write(&path, serde_json::to_vec(&catalog).unwrap()).unwrap();

        let store = SchemaStore::load_or_init(&path).unwrap();
        assert_eq!(store.path(), Some(path.as_path()));
        let table = TableRef::new("app", "t");
        let mut changed = store.table_schema(&table).unwrap().as_ref().clone();
        let v = changed.column_mut("v").unwrap();
        *v = v.clone().with_index(
            IndexDescriptor::new(IndexKind::Composites { collection: None }).named("v_idx"),
        );
        store.commit_table(changed).unwrap();

        let persisted: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        let columns = &persisted["keyspaces"]["app"]["t"]["columns"];
        assert_eq!(
            columns[1]["index"]["index_options"],
            serde_json::json!({"index_values": "", "legacy_flag": "1"})
        );
        assert_eq!(columns[2]["index"]["index_name"], "v_idx");
    }

    #[test]
    fn corrupt_catalog_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        fs::write(&path, b"{not json").unwrap();
        let err = SchemaStore::load_or_init(&path).err().unwrap();
        assert!(format!("{err:#}").contains("decode schema catalog"));
    }
}
