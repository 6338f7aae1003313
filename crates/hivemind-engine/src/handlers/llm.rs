use std::sync::Arc;

use async_trait::async_trait;
use hivemind_capability::{CapabilityRegistry, Task};
use hivemind_validator::Validator;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::HandlerError;
use crate::handler::{NodeHandler, Values, config_str};

const DEFAULT_MODEL: &str = "elara";
const DEFAULT_OPERATION: &str = "generate";

/// Sends the `prompt` input to a conversational capability.
///
/// Config: `capability` (or `model`, default `elara`), `operation` (default
/// `generate`). The prompt must pass input validation. A harmful reply fails
/// the node; a deceptive reply is replaced by its correction. Emits `text`,
/// `model`, `success`.
pub struct LlmHandler {
  capabilities: Arc<CapabilityRegistry>,
  validator: Arc<Validator>,
}

impl LlmHandler {
  pub fn new(capabilities: Arc<CapabilityRegistry>, validator: Arc<Validator>) -> Self {
    Self {
      capabilities,
      validator,
    }
  }
}

#[async_trait]
impl NodeHandler for LlmHandler {
  async fn execute(
    &self,
    inputs: Values,
    config: &Values,
    cancel: CancellationToken,
  ) -> Result<Values, HandlerError> {
    let prompt = inputs
      .get("prompt")
      .and_then(Value::as_str)
      .unwrap_or_default()
      .trim()
      .to_string();
    let model = config_str(config, "capability")
      .or_else(|| config_str(config, "model"))
      .unwrap_or(DEFAULT_MODEL);
    let operation = config_str(config, "operation").unwrap_or(DEFAULT_OPERATION);

    let checked = self.validator.validate_input(&prompt);
    if !checked.passed {
      return Err(HandlerError::PolicyViolation {
        violations: checked.violations,
      });
    }

    let capability = self.capabilities.get(model)?;
    let task = Task::new(model, operation)
      .with_param("prompt", &prompt)
      .with_param("system", self.validator.summary());
    let result = capability.execute(task, cancel).await?;

    let mut text = result.output;
    if result.success {
      let reviewed = self.validator.validate_output(&text);
      if reviewed.escalation_required {
        return Err(HandlerError::PolicyViolation {
          violations: reviewed.violations,
        });
      }
      if let Some(corrected) = reviewed.corrected_output {
        warn!(model = %model, violations = ?reviewed.violations, "reply corrected");
        text = corrected;
      }
    }

    let mut outputs = Values::new();
    outputs.insert("text".to_string(), Value::String(text));
    outputs.insert("model".to_string(), Value::String(model.to_string()));
    outputs.insert("success".to_string(), Value::Bool(result.success));
    Ok(outputs)
  }
}
