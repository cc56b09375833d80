//! Schema-change core for secondary indexes on HoloStore tables.
//!
//! A `CREATE INDEX` request flows through three stages:
//! - an access check against an [`Authorizer`] (`ALTER` on the table),
//! - the [`validator`], which decides whether the request is legal against
//!   the current table schema,
//! - the [`migrator`], which re-reads the schema, records the new index
//!   descriptors on an owned clone and submits it to a
//!   [`MigrationCoordinator`] as a metadata-only update.
//!
//! Collaborators are injected through [`SchemaChangeContext`]. The crate also
//! ships a JSON-file-backed [`SchemaStore`] that serves as registry and as the
//! commit target of [`StoreMigrationCoordinator`].

pub mod auth;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod index;
pub mod metrics;
pub mod migrator;
pub mod registry;
pub mod request;
pub mod schema;
pub mod statement;
pub mod store;
pub mod validator;

pub use auth::{AuthenticatedUser, Authorizer, Permission, StaticAuthorizer};
pub use config::{IfNotExistsScope, SchemaChangeConfig};
pub use context::SchemaChangeContext;
pub use coordinator::{AnnouncedMigration, MigrationCoordinator, StoreMigrationCoordinator};
pub use error::{SchemaChangeError, SchemaChangeResult};
pub use index::{CollectionIndexMode, IndexDescriptor, IndexKind};
pub use metrics::{SchemaChangeMetrics, SchemaChangeMetricsSnapshot};
pub use migrator::Migration;
pub use registry::SchemaRegistry;
pub use request::{CreateIndexRequest, IndexProperties, IndexTarget};
pub use schema::{ColumnDefinition, ColumnKind, Comparator, CqlType, TableRef, TableSchema};
pub use statement::{CreateIndexStatement, SchemaChange, SchemaChangeEvent};
pub use store::{SchemaCatalog, SchemaStore};
pub use validator::Validation;
