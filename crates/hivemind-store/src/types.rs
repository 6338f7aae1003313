use std::fmt;

use chrono::{DateTime, Utc};
use hivemind_config::WorkflowDef;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;

/// Lifecycle state of a run instance.
///
/// ```text
/// queued -> running -> completed | failed | cancelled
///           running <-> paused -> cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum BeeState {
  Queued,
  Running,
  Paused,
  Completed,
  Failed,
  Cancelled,
}

impl BeeState {
  pub fn as_str(&self) -> &'static str {
    match self {
      BeeState::Queued => "queued",
      BeeState::Running => "running",
      BeeState::Paused => "paused",
      BeeState::Completed => "completed",
      BeeState::Failed => "failed",
      BeeState::Cancelled => "cancelled",
    }
  }

  pub fn is_terminal(&self) -> bool {
    matches!(
      self,
      BeeState::Completed | BeeState::Failed | BeeState::Cancelled
    )
  }

  /// Whether the state machine allows moving from `self` to `next`.
  pub fn can_transition_to(&self, next: BeeState) -> bool {
    use BeeState::*;
    matches!(
      (self, next),
      (Queued, Running)
        | (Queued, Cancelled)
        | (Running, Completed)
        | (Running, Failed)
        | (Running, Cancelled)
        | (Running, Paused)
        | (Paused, Running)
        | (Paused, Cancelled)
    )
  }
}

impl fmt::Display for BeeState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A run instance as stored in the database.
///
/// Times are Unix milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct BeeInstance {
  pub instance_id: String,
  pub workflow_id: String,
  pub state: BeeState,
  /// Snapshot of the run's result store.
  pub context: Json<serde_json::Map<String, serde_json::Value>>,
  pub current_node: Option<String>,
  pub start_time: i64,
  pub end_time: Option<i64>,
  pub logs: Json<Vec<String>>,
}

impl BeeInstance {
  /// A freshly queued instance.
  pub fn queued(
    instance_id: impl Into<String>,
    workflow_id: impl Into<String>,
    start_time: i64,
  ) -> Self {
    Self {
      instance_id: instance_id.into(),
      workflow_id: workflow_id.into(),
      state: BeeState::Queued,
      context: Json(serde_json::Map::new()),
      current_node: None,
      start_time,
      end_time: None,
      logs: Json(Vec::new()),
    }
  }
}

/// A workflow definition as stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct StoredWorkflow {
  pub id: String,
  pub name: String,
  pub definition: Json<WorkflowDef>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_legal_transitions() {
    assert!(BeeState::Queued.can_transition_to(BeeState::Running));
    assert!(BeeState::Running.can_transition_to(BeeState::Completed));
    assert!(BeeState::Running.can_transition_to(BeeState::Cancelled));
    assert!(BeeState::Running.can_transition_to(BeeState::Paused));
    assert!(BeeState::Paused.can_transition_to(BeeState::Running));
    assert!(BeeState::Paused.can_transition_to(BeeState::Cancelled));
  }

  #[test]
  fn test_terminal_states_are_final() {
    for terminal in [BeeState::Completed, BeeState::Failed, BeeState::Cancelled] {
      assert!(terminal.is_terminal());
      for next in [
        BeeState::Queued,
        BeeState::Running,
        BeeState::Paused,
        BeeState::Completed,
        BeeState::Failed,
        BeeState::Cancelled,
      ] {
        assert!(!terminal.can_transition_to(next), "{terminal} -> {next}");
      }
    }
  }

  #[test]
  fn test_illegal_shortcuts() {
    assert!(!BeeState::Queued.can_transition_to(BeeState::Completed));
    assert!(!BeeState::Paused.can_transition_to(BeeState::Completed));
  }

  #[test]
  fn test_state_serialization() {
    assert_eq!(
      serde_json::to_string(&BeeState::Cancelled).unwrap(),
      "\"cancelled\""
    );
    assert_eq!(BeeState::Running.to_string(), "running");
  }
}
