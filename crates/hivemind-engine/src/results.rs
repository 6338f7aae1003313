//! Per-run result store.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use serde_json::{Map, Value};

/// Key/value results of one run.
///
/// Initial inputs live under their own keys, node outputs under
/// `"<node_id>.<key>"`.
#[derive(Debug, Default)]
pub struct ResultStore {
  values: RwLock<HashMap<String, Value>>,
}

impl ResultStore {
  pub fn new(initial: HashMap<String, Value>) -> Self {
    Self {
      values: RwLock::new(initial),
    }
  }

  pub fn get(&self, key: &str) -> Option<Value> {
    self
      .values
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .get(key)
      .cloned()
  }

  /// Store every output of a node under `"<node_id>.<key>"`.
  pub fn insert_outputs(&self, node_id: &str, outputs: Map<String, Value>) {
    let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
    for (key, value) in outputs {
      values.insert(format!("{}.{}", node_id, key), value);
    }
  }

  /// Flat copy of every entry.
  pub fn snapshot(&self) -> Map<String, Value> {
    self
      .values
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .iter()
      .map(|(k, v)| (k.clone(), v.clone()))
      .collect()
  }

  /// Nested view for expression evaluation.
  ///
  /// Outputs of the given nodes become `{node_id: {key: value}}`; every other
  /// entry stays at the top level.
  pub fn nested(&self, node_ids: &HashSet<&str>) -> Value {
    let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
    let mut root = Map::new();

    for (key, value) in values.iter() {
      if let Some((node_id, output)) = key.split_once('.')
        && node_ids.contains(node_id)
      {
        let entry = root
          .entry(node_id.to_string())
          .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
          *entry = Value::Object(Map::new());
        }
        if let Value::Object(map) = entry {
          map.insert(output.to_string(), value.clone());
        }
        continue;
      }
      root.entry(key.clone()).or_insert_with(|| value.clone());
    }

    Value::Object(root)
  }
}
