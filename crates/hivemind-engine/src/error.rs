//! Engine error types.

use hivemind_capability::CapabilityError;
use hivemind_guard::GuardError;
use hivemind_workflow::WorkflowError;

/// Errors raised by a node handler.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
  /// A required input or config value is missing or has the wrong shape.
  #[error("invalid input: {message}")]
  InvalidInput { message: String },

  /// Reading a file failed.
  #[error("failed to read '{path}': {source}")]
  Io {
    path: String,
    #[source]
    source: std::io::Error,
  },

  /// A path escaped its sandbox.
  #[error(transparent)]
  Guard(#[from] GuardError),

  /// The dispatched capability raised an infrastructure error.
  #[error(transparent)]
  Capability(#[from] CapabilityError),

  /// Content was refused by the validator.
  #[error("policy violation: {}", violations.join(", "))]
  PolicyViolation { violations: Vec<String> },
}

impl HandlerError {
  /// Create an invalid-input error.
  pub fn invalid_input(message: impl Into<String>) -> Self {
    Self::InvalidInput {
      message: message.into(),
    }
  }
}

/// Errors that end a run or a direct task dispatch.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
  /// The workflow or its initial inputs are invalid.
  #[error(transparent)]
  Workflow(#[from] WorkflowError),

  /// No handler is registered for the node's type.
  #[error("unknown node type '{node_type}' for node '{node_id}'")]
  UnknownNodeType { node_id: String, node_type: String },

  /// A node's condition could not be evaluated.
  #[error("condition of node '{node_id}' failed: {message}")]
  Condition { node_id: String, message: String },

  /// A node handler failed.
  #[error("node '{node_id}' failed: {source}")]
  Node {
    node_id: String,
    #[source]
    source: HandlerError,
  },

  /// A node exceeded its timeout.
  #[error("node '{node_id}' timed out after {timeout_ms}ms")]
  Timeout { node_id: String, timeout_ms: u64 },

  /// A direct task dispatch exceeded the node timeout.
  #[error("task for capability '{capability_id}' timed out after {timeout_ms}ms")]
  TaskTimeout {
    capability_id: String,
    timeout_ms: u64,
  },

  /// Input or output was refused by the validator.
  #[error("policy violation: {}", violations.join(", "))]
  PolicyViolation { violations: Vec<String> },

  /// A direct task dispatch failed.
  #[error(transparent)]
  Capability(#[from] CapabilityError),

  /// A storage operation failed.
  #[error(transparent)]
  Store(#[from] hivemind_store::Error),

  /// The engine has no store attached.
  #[error("no store configured")]
  NoStore,

  /// The run was cancelled.
  #[error("execution cancelled")]
  Cancelled,
}

impl ExecutionError {
  /// The node the error is attributed to, if any.
  pub fn node_id(&self) -> Option<&str> {
    match self {
      Self::UnknownNodeType { node_id, .. }
      | Self::Condition { node_id, .. }
      | Self::Node { node_id, .. }
      | Self::Timeout { node_id, .. } => Some(node_id),
      _ => None,
    }
  }
}
