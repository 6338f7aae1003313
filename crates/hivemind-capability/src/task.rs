use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A unit of work dispatched to a capability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
  pub capability_id: String,
  pub operation: String,
  #[serde(default)]
  pub params: HashMap<String, String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub payload: Vec<u8>,
}

impl Task {
  pub fn new(capability_id: impl Into<String>, operation: impl Into<String>) -> Self {
    Self {
      capability_id: capability_id.into(),
      operation: operation.into(),
      ..Self::default()
    }
  }

  pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.params.insert(key.into(), value.into());
    self
  }

  pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
    self.payload = payload.into();
    self
  }
}

/// Outcome of a capability invocation.
///
/// `success == false` is a soft failure: the capability ran and explains in
/// `output` why it could not satisfy the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
  pub success: bool,
  pub output: String,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub data: Vec<u8>,
  #[serde(default)]
  pub confidence: f64,
  #[serde(default, skip_serializing_if = "HashMap::is_empty")]
  pub details: HashMap<String, String>,
}

impl TaskResult {
  pub fn success(output: impl Into<String>) -> Self {
    Self {
      success: true,
      output: output.into(),
      ..Self::default()
    }
  }

  pub fn failure(output: impl Into<String>) -> Self {
    Self {
      success: false,
      output: output.into(),
      ..Self::default()
    }
  }

  pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.details.insert(key.into(), value.into());
    self
  }
}
