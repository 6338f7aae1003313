use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use hivemind_config::WorkflowDef;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::types::Json;

use crate::{BeeInstance, Error, Store, StoredWorkflow};

/// SQLite-based store implementation.
#[derive(Debug, Clone)]
pub struct SqliteStore {
  pool: SqlitePool,
}

impl SqliteStore {
  /// Create a new SQLite store with the given connection pool.
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  /// Open (creating if needed) the database file and apply migrations.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
    let options = SqliteConnectOptions::new()
      .filename(path)
      .create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    let store = Self::new(pool);
    store.migrate().await?;
    Ok(store)
  }

  /// Run database migrations.
  pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(&self.pool).await
  }

  pub fn pool(&self) -> &SqlitePool {
    &self.pool
  }
}

#[async_trait]
impl Store for SqliteStore {
  async fn save_workflow(&self, workflow: &WorkflowDef) -> Result<(), Error> {
    let now = Utc::now();
    sqlx::query(
      r#"
            INSERT INTO workflows (id, name, definition, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                definition = excluded.definition,
                updated_at = excluded.updated_at
            "#,
    )
    .bind(&workflow.id)
    .bind(&workflow.name)
    .bind(Json(workflow))
    .bind(now)
    .bind(now)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn get_workflow(&self, workflow_id: &str) -> Result<StoredWorkflow, Error> {
    sqlx::query_as(
      r#"
            SELECT id, name, definition, created_at, updated_at
            FROM workflows
            WHERE id = ?
            "#,
    )
    .bind(workflow_id)
    .fetch_optional(&self.pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("workflow '{}'", workflow_id)))
  }

  async fn list_workflows(&self) -> Result<Vec<StoredWorkflow>, Error> {
    let rows = sqlx::query_as(
      r#"
            SELECT id, name, definition, created_at, updated_at
            FROM workflows
            ORDER BY id ASC
            "#,
    )
    .fetch_all(&self.pool)
    .await?;

    Ok(rows)
  }

  async fn save_instance(&self, instance: &BeeInstance) -> Result<(), Error> {
    sqlx::query(
      r#"
            INSERT INTO instances (instance_id, workflow_id, state, context, current_node, start_time, end_time, logs)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (instance_id) DO UPDATE SET
                state = excluded.state,
                context = excluded.context,
                current_node = excluded.current_node,
                end_time = excluded.end_time,
                logs = excluded.logs
            "#,
    )
    .bind(&instance.instance_id)
    .bind(&instance.workflow_id)
    .bind(instance.state)
    .bind(&instance.context)
    .bind(&instance.current_node)
    .bind(instance.start_time)
    .bind(instance.end_time)
    .bind(&instance.logs)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn get_instance(&self, instance_id: &str) -> Result<BeeInstance, Error> {
    sqlx::query_as(
      r#"
            SELECT instance_id, workflow_id, state, context, current_node, start_time, end_time, logs
            FROM instances
            WHERE instance_id = ?
            "#,
    )
    .bind(instance_id)
    .fetch_optional(&self.pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("instance '{}'", instance_id)))
  }

  async fn list_instances(&self, workflow_id: &str) -> Result<Vec<BeeInstance>, Error> {
    let rows = sqlx::query_as(
      r#"
            SELECT instance_id, workflow_id, state, context, current_node, start_time, end_time, logs
            FROM instances
            WHERE workflow_id = ?
            ORDER BY start_time DESC
            "#,
    )
    .bind(workflow_id)
    .fetch_all(&self.pool)
    .await?;

    Ok(rows)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::BeeState;
  use hivemind_config::NodeDef;

  async fn memory_store() -> SqliteStore {
    let pool = SqlitePoolOptions::new()
      .max_connections(1)
      .connect("sqlite::memory:")
      .await
      .unwrap();
    let store = SqliteStore::new(pool);
    store.migrate().await.unwrap();
    store
  }

  fn workflow(id: &str, name: &str) -> WorkflowDef {
    WorkflowDef {
      id: id.to_string(),
      name: name.to_string(),
      nodes: vec![NodeDef::new("out", "output")],
      output_node: "out".to_string(),
    }
  }

  #[tokio::test]
  async fn test_save_and_get_workflow() {
    let store = memory_store().await;
    store.save_workflow(&workflow("scan", "Scan")).await.unwrap();

    let stored = store.get_workflow("scan").await.unwrap();
    assert_eq!(stored.name, "Scan");
    assert_eq!(stored.definition.0, workflow("scan", "Scan"));
  }

  #[tokio::test]
  async fn test_save_workflow_replaces() {
    let store = memory_store().await;
    store.save_workflow(&workflow("scan", "Scan")).await.unwrap();
    let first = store.get_workflow("scan").await.unwrap();

    store
      .save_workflow(&workflow("scan", "Scan v2"))
      .await
      .unwrap();

    let all = store.list_workflows().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].name, "Scan v2");
    assert_eq!(all[0].created_at, first.created_at);
  }

  #[tokio::test]
  async fn test_get_missing_workflow() {
    let store = memory_store().await;
    assert!(matches!(
      store.get_workflow("ghost").await,
      Err(Error::NotFound(_))
    ));
  }

  #[tokio::test]
  async fn test_list_workflows_ordered() {
    let store = memory_store().await;
    store.save_workflow(&workflow("b", "B")).await.unwrap();
    store.save_workflow(&workflow("a", "A")).await.unwrap();

    let ids: Vec<_> = store
      .list_workflows()
      .await
      .unwrap()
      .into_iter()
      .map(|w| w.id)
      .collect();
    assert_eq!(ids, vec!["a", "b"]);
  }

  #[tokio::test]
  async fn test_instance_upsert() {
    let store = memory_store().await;
    let mut bee = BeeInstance::queued("bee-1", "scan", 1_000);
    store.save_instance(&bee).await.unwrap();

    bee.state = BeeState::Completed;
    bee.current_node = Some("out".to_string());
    bee.end_time = Some(2_000);
    bee
      .context
      .0
      .insert("out.output".to_string(), serde_json::json!("done"));
    bee.logs.0.push("node out completed".to_string());
    store.save_instance(&bee).await.unwrap();

    let loaded = store.get_instance("bee-1").await.unwrap();
    assert_eq!(loaded, bee);
  }

  #[tokio::test]
  async fn test_list_instances_most_recent_first() {
    let store = memory_store().await;
    store
      .save_instance(&BeeInstance::queued("old", "scan", 1))
      .await
      .unwrap();
    store
      .save_instance(&BeeInstance::queued("new", "scan", 2))
      .await
      .unwrap();
    store
      .save_instance(&BeeInstance::queued("other", "ingest", 3))
      .await
      .unwrap();

    let ids: Vec<_> = store
      .list_instances("scan")
      .await
      .unwrap()
      .into_iter()
      .map(|b| b.instance_id)
      .collect();
    assert_eq!(ids, vec!["new", "old"]);
  }
}
