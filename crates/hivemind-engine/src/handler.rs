//! Node handler contract and registry.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::error::HandlerError;

/// Named values passed into and out of a handler.
pub type Values = Map<String, Value>;

/// Execution logic for one node type.
///
/// `inputs` holds only the references that resolved; absent references are
/// simply missing keys. Handlers that block on I/O must honor `cancel`.
#[async_trait]
pub trait NodeHandler: Send + Sync {
  async fn execute(
    &self,
    inputs: Values,
    config: &Values,
    cancel: CancellationToken,
  ) -> Result<Values, HandlerError>;
}

/// Maps node type strings to handlers.
#[derive(Default)]
pub struct HandlerRegistry {
  handlers: RwLock<HashMap<String, Arc<dyn NodeHandler>>>,
}

impl HandlerRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a handler, replacing any existing one for the type.
  pub fn register(&self, node_type: impl Into<String>, handler: Arc<dyn NodeHandler>) {
    self
      .handlers
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(node_type.into(), handler);
  }

  pub fn get(&self, node_type: &str) -> Option<Arc<dyn NodeHandler>> {
    self
      .handlers
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .get(node_type)
      .cloned()
  }

  /// Registered node types, sorted.
  pub fn types(&self) -> Vec<String> {
    let mut types: Vec<_> = self
      .handlers
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .keys()
      .cloned()
      .collect();
    types.sort();
    types
  }
}

/// Read a string config value.
pub(crate) fn config_str<'a>(config: &'a Values, key: &str) -> Option<&'a str> {
  config.get(key).and_then(Value::as_str)
}

/// Read an unsigned integer config value, rejecting other shapes.
pub(crate) fn config_usize(
  config: &Values,
  key: &str,
  default: usize,
) -> Result<usize, HandlerError> {
  match config.get(key) {
    None | Some(Value::Null) => Ok(default),
    Some(value) => value
      .as_u64()
      .or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
      .map(|n| n as usize)
      .ok_or_else(|| {
        HandlerError::invalid_input(format!("'{}' must be a non-negative integer", key))
      }),
  }
}

/// Render a value as plain text: strings verbatim, everything else as JSON.
pub(crate) fn value_text(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}
