//! Submission of changed table schemas for cluster-wide propagation.

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use crate::schema::{TableRef, TableSchema};
use crate::store::SchemaStore;

/// Number of announcements kept in the in-memory history.
const ANNOUNCEMENT_HISTORY_LIMIT: usize = 1024;

/// Durably records a schema change and propagates it to cluster members.
#[async_trait]
pub trait MigrationCoordinator: Send + Sync {
    /// Announces a new descriptor for an existing table.
    ///
    /// `is_drop_recreate = false` marks a metadata-only update: receivers
    /// must keep the table's data.
    async fn announce_column_family_update(
        &self,
        schema: TableSchema,
        is_drop_recreate: bool,
    ) -> Result<()>;
}

/// One announcement accepted by [`StoreMigrationCoordinator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnouncedMigration {
    pub table: TableRef,
    pub version: u64,
    pub epoch: u64,
    pub drop_recreate: bool,
}

/// Coordinator that commits announced schemas into a [`SchemaStore`].
pub struct StoreMigrationCoordinator {
    store: SchemaStore,
    history: Mutex<VecDeque<AnnouncedMigration>>,
}

impl StoreMigrationCoordinator {
    pub fn new(store: SchemaStore) -> Self {
        Self {
            store,
            history: Mutex::new(VecDeque::new()),
        }
    }

    /// Returns announcements in commit order, oldest first.
    pub fn announcements(&self) -> Vec<AnnouncedMigration> {
        self.history.lock().unwrap().iter().cloned().collect()
    }
}

#[async_trait]
impl MigrationCoordinator for StoreMigrationCoordinator {
    async fn announce_column_family_update(
        &self,
        schema: TableSchema,
        is_drop_recreate: bool,
    ) -> Result<()> {
        let table = schema.table_ref();
        let committed = self
            .store
            .commit_table(schema)
            .with_context(|| format!("commit schema update for {table}"))?;
        let epoch = self.store.epoch();

        info!(
            table = %table,
            version = committed.version,
            epoch,
            drop_recreate = is_drop_recreate,
            "announced column family update"
        );

        let mut history = self.history.lock().unwrap();
        if history.len() == ANNOUNCEMENT_HISTORY_LIMIT {
            history.pop_front();
        }
        history.push_back(AnnouncedMigration {
            table,
            version: committed.version,
            epoch,
            drop_recreate: is_drop_recreate,
        });
        Ok(())
    }
}
