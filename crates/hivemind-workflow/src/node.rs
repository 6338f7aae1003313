use std::collections::{HashMap, HashSet};

use hivemind_config::NodeDef;
use serde::{Deserialize, Serialize};

/// A resolved input reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reference {
  /// A key of the initial inputs supplied when the run starts.
  Initial { key: String },
  /// The `key` output of node `node_id`.
  Output { node_id: String, key: String },
}

impl Reference {
  /// Classify a raw reference against the workflow's node ids.
  ///
  /// `"<node_id>.<key>"` is an output reference when `node_id` names a node of
  /// the workflow; anything else is an initial input key (which may itself
  /// contain dots).
  pub fn parse(raw: &str, node_ids: &HashSet<&str>) -> Self {
    if let Some((node_id, key)) = raw.split_once('.')
      && node_ids.contains(node_id)
    {
      return Self::Output {
        node_id: node_id.to_string(),
        key: key.to_string(),
      };
    }

    Self::Initial {
      key: raw.to_string(),
    }
  }

  /// Key under which the referenced value lives in the run's result store.
  pub fn store_key(&self) -> String {
    match self {
      Self::Initial { key } => key.clone(),
      Self::Output { node_id, key } => format!("{}.{}", node_id, key),
    }
  }

  /// The producing node, if this is an output reference.
  pub fn producer(&self) -> Option<&str> {
    match self {
      Self::Initial { .. } => None,
      Self::Output { node_id, .. } => Some(node_id),
    }
  }
}

/// A node of a validated workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
  pub id: String,
  pub node_type: String,
  pub config: serde_json::Map<String, serde_json::Value>,
  pub inputs: HashMap<String, Reference>,
  pub condition: Option<String>,
  pub next: Vec<String>,
  pub timeout_ms: Option<u64>,
}

impl Node {
  pub(crate) fn from_def(def: &NodeDef, node_ids: &HashSet<&str>) -> Self {
    let inputs = def
      .inputs
      .iter()
      .map(|(name, raw)| (name.clone(), Reference::parse(raw, node_ids)))
      .collect();

    Self {
      id: def.id.clone(),
      node_type: def.node_type.clone(),
      config: def.config.clone(),
      inputs,
      condition: def.condition.clone(),
      next: def.next.clone(),
      timeout_ms: def.timeout_ms,
    }
  }

  /// Nodes whose outputs this node consumes.
  pub fn producers(&self) -> impl Iterator<Item = &str> {
    self.inputs.values().filter_map(Reference::producer)
  }
}
