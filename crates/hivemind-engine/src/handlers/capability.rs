use std::sync::Arc;

use async_trait::async_trait;
use hivemind_capability::{CapabilityRegistry, Task};
use hivemind_guard::redact_params;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::inputs_to_params;
use crate::error::HandlerError;
use crate::handler::{NodeHandler, Values, config_str};

/// Dispatches a task to a registered capability.
///
/// Config: `neuron_id` (capability id), `operation`. Every input becomes a
/// string task parameter. Emits `output`, `success`, `confidence`, `details`.
///
/// A soft capability failure is a successful node: `success` is `false` and
/// downstream conditions decide what to do with it.
pub struct CapabilityHandler {
  capabilities: Arc<CapabilityRegistry>,
}

impl CapabilityHandler {
  pub fn new(capabilities: Arc<CapabilityRegistry>) -> Self {
    Self { capabilities }
  }
}

#[async_trait]
impl NodeHandler for CapabilityHandler {
  async fn execute(
    &self,
    inputs: Values,
    config: &Values,
    cancel: CancellationToken,
  ) -> Result<Values, HandlerError> {
    let capability_id = config_str(config, "neuron_id")
      .or_else(|| config_str(config, "capability"))
      .ok_or_else(|| HandlerError::invalid_input("neuron: 'neuron_id' is required"))?;
    let operation = config_str(config, "operation").unwrap_or_default();

    let capability = self.capabilities.get(capability_id)?;
    let mut task = Task::new(capability_id, operation);
    task.params = inputs_to_params(&inputs);

    debug!(
      capability_id = %capability_id,
      operation = %operation,
      params = ?redact_params(&task.params),
      "dispatching task"
    );

    let result = capability.execute(task, cancel).await?;

    let mut outputs = Values::new();
    outputs.insert("output".to_string(), Value::String(result.output));
    outputs.insert("success".to_string(), Value::Bool(result.success));
    outputs.insert("confidence".to_string(), Value::from(result.confidence));
    outputs.insert(
      "details".to_string(),
      Value::Object(
        result
          .details
          .into_iter()
          .map(|(k, v)| (k, Value::String(v)))
          .collect(),
      ),
    );
    Ok(outputs)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use hivemind_capability::{CapabilityError, NativeCapability, TaskResult};
  use serde_json::json;

  fn registry() -> Arc<CapabilityRegistry> {
    let registry = CapabilityRegistry::new();
    registry.register(Arc::new(NativeCapability::new(
      "canary",
      "Canary",
      vec!["probe".to_string()],
      |task| match task.params.get("target").map(String::as_str) {
        Some("10.0.0.1") => Ok(TaskResult::success("open: 22").with_detail("ports", "22")),
        _ => Ok(TaskResult::failure("unreachable")),
      },
    )));
    Arc::new(registry)
  }

  fn config() -> Values {
    json!({"neuron_id": "canary", "operation": "probe"})
      .as_object()
      .cloned()
      .unwrap()
  }

  #[tokio::test]
  async fn test_dispatch() {
    let inputs = json!({"target": "10.0.0.1"}).as_object().cloned().unwrap();
    let outputs = CapabilityHandler::new(registry())
      .execute(inputs, &config(), CancellationToken::new())
      .await
      .unwrap();

    assert_eq!(outputs["success"], true);
    assert_eq!(outputs["output"], "open: 22");
    assert_eq!(outputs["details"]["ports"], "22");
  }

  #[tokio::test]
  async fn test_soft_failure_is_data() {
    let outputs = CapabilityHandler::new(registry())
      .execute(Values::new(), &config(), CancellationToken::new())
      .await
      .unwrap();

    assert_eq!(outputs["success"], false);
    assert_eq!(outputs["output"], "unreachable");
  }

  #[tokio::test]
  async fn test_unknown_capability() {
    let config = json!({"neuron_id": "ghost"}).as_object().cloned().unwrap();
    let result = CapabilityHandler::new(registry())
      .execute(Values::new(), &config, CancellationToken::new())
      .await;

    assert!(matches!(
      result,
      Err(HandlerError::Capability(CapabilityError::NotFound(_)))
    ));
  }
}
