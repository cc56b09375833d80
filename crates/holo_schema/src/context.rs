use std::sync::Arc;

use crate::auth::Authorizer;
use crate::config::SchemaChangeConfig;
use crate::coordinator::{MigrationCoordinator, StoreMigrationCoordinator};
use crate::metrics::SchemaChangeMetrics;
use crate::registry::SchemaRegistry;
use crate::store::SchemaStore;

/// Collaborators a schema-altering statement runs against.
///
/// Passed explicitly to every statement call; nothing here is process-global.
#[derive(Clone)]
pub struct SchemaChangeContext {
    pub registry: Arc<dyn SchemaRegistry>,
    pub coordinator: Arc<dyn MigrationCoordinator>,
    pub authorizer: Arc<dyn Authorizer>,
    pub config: SchemaChangeConfig,
    pub metrics: Arc<SchemaChangeMetrics>,
}

impl SchemaChangeContext {
    pub fn new(
        registry: Arc<dyn SchemaRegistry>,
        coordinator: Arc<dyn MigrationCoordinator>,
        authorizer: Arc<dyn Authorizer>,
        config: SchemaChangeConfig,
    ) -> Self {
        Self {
            registry,
            coordinator,
            authorizer,
            config,
            metrics: Arc::new(SchemaChangeMetrics::default()),
        }
    }

    /// Wires a context whose registry and coordinator are both backed by
    /// `store`. The coordinator is returned as well so callers can inspect
    /// its announcement history.
    pub fn for_store(
        store: SchemaStore,
        authorizer: Arc<dyn Authorizer>,
        config: SchemaChangeConfig,
    ) -> (Self, Arc<StoreMigrationCoordinator>) {
        let coordinator = Arc::new(StoreMigrationCoordinator::new(store.clone()));
        let context = Self::new(Arc::new(store), coordinator.clone(), authorizer, config);
        (context, coordinator)
    }
}
