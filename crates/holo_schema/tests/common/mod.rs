use std::sync::Arc;

use anyhow::Result;
use holo_schema::{
    AuthenticatedUser, ColumnDefinition, Comparator, CqlType, SchemaChangeConfig,
    SchemaChangeContext, SchemaStore, StaticAuthorizer, StoreMigrationCoordinator, TableSchema,
};
use tempfile::TempDir;

pub const KEYSPACE: &str = "ks";
pub const ADMIN: &str = "admin";

/// `ks.t (k int PRIMARY KEY, m map<text,int>, v text)` on a compound layout.
pub fn scenario_table() -> TableSchema {
    TableSchema::new(KEYSPACE, "t", Comparator::compound())
        .with_column(ColumnDefinition::partition_key("k", CqlType::Int))
        .with_column(ColumnDefinition::regular(
            "m",
            CqlType::map(CqlType::Text, CqlType::Int),
        ))
        .with_column(ColumnDefinition::regular("v", CqlType::Text))
}

pub fn counter_table() -> TableSchema {
    TableSchema::new(KEYSPACE, "hits", Comparator::compound())
        .counter()
        .with_column(ColumnDefinition::partition_key("page", CqlType::Text))
        .with_column(ColumnDefinition::regular("c", CqlType::Counter))
}

/// Legacy compact-storage table with one clustering column.
pub fn dense_table() -> TableSchema {
    TableSchema::new(
        KEYSPACE,
        "legacy",
        Comparator {
            compound: false,
            dense: true,
        },
    )
    .with_column(ColumnDefinition::partition_key("k", CqlType::Int))
    .with_column(ColumnDefinition::clustering("c", CqlType::Int))
    .with_column(ColumnDefinition::regular("value", CqlType::Blob))
}

/// File-backed store with the scenario tables and a context wired to it.
pub struct TestHarness {
    pub dir: TempDir,
    pub store: SchemaStore,
    pub context: SchemaChangeContext,
    pub coordinator: Arc<StoreMigrationCoordinator>,
}

impl TestHarness {
    pub fn start() -> Result<Self> {
        Self::start_with(SchemaChangeConfig::default(), StaticAuthorizer::new())
    }

    pub fn start_with(mut config: SchemaChangeConfig, authorizer: StaticAuthorizer) -> Result<Self> {
        let dir = tempfile::tempdir()?;
        config.store_path = dir.path().join("schema.json");
        let store = SchemaStore::load_or_init(&config.store_path)?;
        for table in [scenario_table(), counter_table(), dense_table()] {
            store.register_table(table)?;
        }
        let authorizer = Arc::new(authorizer.with_superuser(ADMIN));
        let (context, coordinator) = SchemaChangeContext::for_store(store.clone(), authorizer, config);
        Ok(Self {
            dir,
            store,
            context,
            coordinator,
        })
    }

    pub fn admin(&self) -> AuthenticatedUser {
        AuthenticatedUser::new(ADMIN)
    }
}
