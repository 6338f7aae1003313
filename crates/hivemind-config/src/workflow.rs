use serde::{Deserialize, Serialize};

use crate::node::NodeDef;

/// A workflow ("hive") definition.
///
/// Nodes are listed in the order the author intends them to run. The engine
/// keeps that order whenever it satisfies the data-flow references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDef {
  pub id: String,
  pub name: String,
  pub nodes: Vec<NodeDef>,
  /// Node whose `output` key becomes the run's final result.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub output_node: String,
}

impl WorkflowDef {
  /// Parse a workflow definition from JSON text.
  pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(json)
  }

  pub fn to_json(&self) -> Result<String, serde_json::Error> {
    serde_json::to_string(self)
  }
}
