use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::input::InputRef;

/// A single step of a workflow as authored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
  pub id: String,
  /// Handler type, e.g. `"file_reader"` or `"neuron"`.
  #[serde(rename = "type")]
  pub node_type: String,
  #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
  pub config: serde_json::Map<String, serde_json::Value>,
  /// Local input name -> producer reference.
  #[serde(default, skip_serializing_if = "HashMap::is_empty")]
  pub inputs: HashMap<String, InputRef>,
  /// Boolean expression over the result store; the node is skipped when false.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub condition: Option<String>,
  /// Explicit successors, used as ordering edges.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub next: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,
}

impl NodeDef {
  /// Create a node with no config, inputs, or successors.
  pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      node_type: node_type.into(),
      config: serde_json::Map::new(),
      inputs: HashMap::new(),
      condition: None,
      next: Vec::new(),
      timeout_ms: None,
    }
  }

  pub fn with_input(mut self, name: impl Into<String>, reference: impl Into<String>) -> Self {
    self.inputs.insert(name.into(), reference.into());
    self
  }

  pub fn with_config(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
    self.config.insert(key.into(), value);
    self
  }

  pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
    self.condition = Some(condition.into());
    self
  }
}
