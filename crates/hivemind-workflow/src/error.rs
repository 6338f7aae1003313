use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
  #[error("duplicate node id: {0}")]
  DuplicateNode(String),

  #[error("node '{node_id}' lists unknown successor '{next}'")]
  UnknownSuccessor { node_id: String, next: String },

  #[error("output node not found: {0}")]
  UnknownOutputNode(String),

  #[error("cycle detected among nodes: {}", .0.join(", "))]
  Cycle(Vec<String>),

  #[error(
    "node '{node_id}' input '{input}' references '{reference}', which is neither an initial input nor a node output"
  )]
  UnresolvedReference {
    node_id: String,
    input: String,
    reference: String,
  },
}
