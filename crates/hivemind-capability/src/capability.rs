use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::CapabilityError;
use crate::task::{Task, TaskResult};

/// A named unit of functionality exposing declared operations.
///
/// Implementations must return promptly once `cancel` fires, and must not
/// leave child processes running when they do.
#[async_trait]
pub trait Capability: Send + Sync {
  fn id(&self) -> &str;

  fn name(&self) -> &str;

  /// Operations this capability declares.
  fn operations(&self) -> Vec<String>;

  async fn execute(
    &self,
    task: Task,
    cancel: CancellationToken,
  ) -> Result<TaskResult, CapabilityError>;

  /// Summary used by registry queries.
  fn info(&self) -> CapabilityInfo {
    CapabilityInfo {
      id: self.id().to_string(),
      name: self.name().to_string(),
      operations: self.operations(),
    }
  }
}

/// Registry query row: what can be dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityInfo {
  pub id: String,
  pub name: String,
  pub operations: Vec<String>,
}
