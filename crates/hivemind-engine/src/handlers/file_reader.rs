use std::path::PathBuf;

use async_trait::async_trait;
use hivemind_guard::validate_path;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::HandlerError;
use crate::handler::{NodeHandler, Values, config_str};

/// Reads a file named by `config.path` or the `path` input.
///
/// Emits `content`, `path`, and `size` (bytes). In sandboxed mode the path is
/// resolved against a base directory and must stay inside it.
#[derive(Debug, Clone, Default)]
pub struct FileReaderHandler {
  base_dir: Option<PathBuf>,
}

impl FileReaderHandler {
  /// Read paths as given. Callers must validate them beforehand.
  pub fn new() -> Self {
    Self::default()
  }

  /// Confine every path to `base_dir`.
  pub fn sandboxed(base_dir: impl Into<PathBuf>) -> Self {
    Self {
      base_dir: Some(base_dir.into()),
    }
  }
}

#[async_trait]
impl NodeHandler for FileReaderHandler {
  async fn execute(
    &self,
    inputs: Values,
    config: &Values,
    _cancel: CancellationToken,
  ) -> Result<Values, HandlerError> {
    let requested = config_str(config, "path")
      .or_else(|| inputs.get("path").and_then(Value::as_str))
      .filter(|p| !p.is_empty())
      .ok_or_else(|| HandlerError::invalid_input("file_reader: no path provided"))?
      .to_string();

    let resolved = match &self.base_dir {
      Some(base) => validate_path(base, &requested)?,
      None => PathBuf::from(&requested),
    };
    debug!(path = %resolved.display(), "reading file");

    let data = tokio::fs::read(&resolved)
      .await
      .map_err(|e| HandlerError::Io {
        path: requested.clone(),
        source: e,
      })?;

    let mut outputs = Values::new();
    outputs.insert("size".to_string(), Value::from(data.len()));
    outputs.insert(
      "content".to_string(),
      Value::String(String::from_utf8_lossy(&data).into_owned()),
    );
    outputs.insert("path".to_string(), Value::String(requested));
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

  #[tokio::test]
  async fn test_reads_from_config_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, "héllo").unwrap();

    let outputs = FileReaderHandler::new()
      .execute(
        Values::new(),
        &values(json!({"path": path.to_string_lossy()})),
        CancellationToken::new(),
      )
      .await
      .unwrap();

    assert_eq!(outputs["content"], "héllo");
    assert_eq!(outputs["size"], 6);
  }

  #[tokio::test]
  async fn test_path_from_input() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), "abc").unwrap();

    let outputs = FileReaderHandler::sandboxed(dir.path())
      .execute(
        values(json!({"path": "a.txt"})),
        &Values::new(),
        CancellationToken::new(),
      )
      .await
      .unwrap();

    assert_eq!(outputs["content"], "abc");
    assert_eq!(outputs["path"], "a.txt");
  }

  #[tokio::test]
  async fn test_missing_path() {
    let result = FileReaderHandler::new()
      .execute(Values::new(), &Values::new(), CancellationToken::new())
      .await;
    assert!(matches!(result, Err(HandlerError::InvalidInput { .. })));
  }

  #[tokio::test]
  async fn test_unreadable_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = FileReaderHandler::sandboxed(dir.path())
      .execute(
        values(json!({"path": "missing.txt"})),
        &Values::new(),
        CancellationToken::new(),
      )
      .await;

    let err = result.unwrap_err();
    assert!(matches!(err, HandlerError::Io { .. }));
    assert!(err.to_string().contains("missing.txt"));
  }

  #[tokio::test]
  async fn test_sandbox_rejects_traversal() {
    let dir = tempfile::tempdir().unwrap();
    let result = FileReaderHandler::sandboxed(dir.path())
      .execute(
        values(json!({"path": "../../etc/passwd"})),
        &Values::new(),
        CancellationToken::new(),
      )
      .await;

    assert!(matches!(result, Err(HandlerError::Guard(_))));
  }
}
