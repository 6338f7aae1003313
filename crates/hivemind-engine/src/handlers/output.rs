use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::HandlerError;
use crate::handler::{NodeHandler, Values, config_str, value_text};

/// Pass-through handler that optionally wraps content for presentation.
///
/// Uses the `content` input when present, otherwise all inputs as a JSON
/// object. `config.format` of `json` or `markdown` wraps the text in a fenced
/// block. Emits `output`.
#[derive(Debug, Clone, Default)]
pub struct OutputHandler;

#[async_trait]
impl NodeHandler for OutputHandler {
  async fn execute(
    &self,
    inputs: Values,
    config: &Values,
    _cancel: CancellationToken,
  ) -> Result<Values, HandlerError> {
    let content = match inputs.get("content") {
      Some(content) => value_text(content),
      None => Value::Object(inputs).to_string(),
    };

    let output = match config_str(config, "format") {
      Some("json") => format!("```json\n{}\n```", content),
      Some("markdown") => format!("```\n{}\n```", content),
      _ => content,
    };

    let mut outputs = Values::new();
    outputs.insert("output".to_string(), Value::String(output));
    Ok(outputs)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn values(value: Value) -> Values {
    value.as_object().cloned().unwrap_or_default()
  }

  async fn run(inputs: Value, config: Value) -> String {
    let outputs = OutputHandler
      .execute(values(inputs), &values(config), CancellationToken::new())
      .await
      .unwrap();
    outputs["output"].as_str().unwrap().to_string()
  }

  #[tokio::test]
  async fn test_echoes_content() {
    assert_eq!(run(json!({"content": "hello"}), json!({})).await, "hello");
  }

  #[tokio::test]
  async fn test_json_format() {
    assert_eq!(
      run(json!({"content": "{\"a\":1}"}), json!({"format": "json"})).await,
      "```json\n{\"a\":1}\n```"
    );
  }

  #[tokio::test]
  async fn test_markdown_format() {
    assert_eq!(
      run(json!({"content": "# Title"}), json!({"format": "markdown"})).await,
      "```\n# Title\n```"
    );
  }

  #[tokio::test]
  async fn test_without_content_uses_all_inputs() {
    assert_eq!(run(json!({"count": 3}), json!({})).await, "{\"count\":3}");
  }

  #[tokio::test]
  async fn test_non_string_content() {
    assert_eq!(run(json!({"content": 42}), json!({})).await, "42");
  }
}
