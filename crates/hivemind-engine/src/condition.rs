//! Node condition evaluation.
//!
//! Conditions are minijinja expressions evaluated against the run's results:
//! node outputs as `node.key`, initial inputs by name.
//!
//! ```text
//! scan.success and scan.confidence > 0.5
//! mode == "deep"
//! ```

use minijinja::{Environment, UndefinedBehavior, Value};

/// Evaluate `expr` against `context`, using template truthiness.
///
/// Missing values (including attributes of missing values) are falsy.
pub fn evaluate(expr: &str, context: &serde_json::Value) -> Result<bool, String> {
  let mut env = Environment::new();
  env.set_undefined_behavior(UndefinedBehavior::Chainable);
  let compiled = env
    .compile_expression(expr)
    .map_err(|e| format!("invalid expression '{}': {}", expr, e))?;
  let value = compiled
    .eval(Value::from_serialize(context))
    .map_err(|e| format!("failed to evaluate '{}': {}", expr, e))?;
  Ok(value.is_true())
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_nested_access() {
    let ctx = json!({"scan": {"success": true, "confidence": 0.8}});
    assert!(evaluate("scan.success and scan.confidence > 0.5", &ctx).unwrap());
    assert!(!evaluate("not scan.success", &ctx).unwrap());
  }

  #[test]
  fn test_missing_value_is_falsy() {
    let ctx = json!({});
    assert!(!evaluate("scan.success", &ctx).unwrap());
  }

  #[test]
  fn test_initial_input() {
    let ctx = json!({"mode": "deep"});
    assert!(evaluate("mode == 'deep'", &ctx).unwrap());
  }

  #[test]
  fn test_invalid_expression() {
    assert!(evaluate("scan.success ==", &json!({})).is_err());
  }
}
