//! Hivemind Store
//!
//! Durable storage for workflow definitions and run instances ("bees").
//!
//! The [`Store`] trait defines operations for:
//! - Saving workflow definitions keyed by id (insert-or-replace)
//! - Recording run-instance snapshots as a run progresses
//! - Querying definitions and run history
//!
//! Run records are written best-effort by the engine; a crash mid-run leaves
//! the last snapshot in place and nothing resumes it.

mod sqlite;
mod types;

pub use sqlite::SqliteStore;
pub use types::{BeeInstance, BeeState, StoredWorkflow};

use async_trait::async_trait;
use hivemind_config::WorkflowDef;

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// The requested record was not found.
  #[error("not found: {0}")]
  NotFound(String),

  /// A database error occurred.
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),

  /// Migrations could not be applied.
  #[error("migration error: {0}")]
  Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Storage trait for workflow definitions and run instances.
#[async_trait]
pub trait Store: Send + Sync {
  /// Insert a workflow definition, replacing any stored under the same id.
  async fn save_workflow(&self, workflow: &WorkflowDef) -> Result<(), Error>;

  /// Get a workflow definition by id.
  async fn get_workflow(&self, workflow_id: &str) -> Result<StoredWorkflow, Error>;

  /// List stored workflow definitions, ordered by id.
  async fn list_workflows(&self) -> Result<Vec<StoredWorkflow>, Error>;

  /// Insert or update a run-instance snapshot.
  async fn save_instance(&self, instance: &BeeInstance) -> Result<(), Error>;

  /// Get a run instance by id.
  async fn get_instance(&self, instance_id: &str) -> Result<BeeInstance, Error>;

  /// List run instances of a workflow, most recent first.
  async fn list_instances(&self, workflow_id: &str) -> Result<Vec<BeeInstance>, Error>;
}
