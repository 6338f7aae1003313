//! Subprocess-backed capabilities.
//!
//! One long-lived child process per capability. Each request is one JSON
//! object on the child's stdin, each response one JSON object on its stdout:
//!
//! ```text
//! -> {"operation":"ocr","params":{"lang":"en"},"payload":"..."}
//! <- {"success":true,"output":"...","confidence":0.9,"details":{...}}
//! ```
//!
//! A response carrying a non-empty `error` field becomes a soft failure.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use hivemind_config::CapabilityConfig;
use hivemind_guard::redact_params;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::capability::Capability;
use crate::error::CapabilityError;
use crate::task::{Task, TaskResult};

/// Longest response line accepted from a child, in bytes.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1 << 20;

/// How long `stop` waits for a child to exit after its stdin is closed.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct BridgeRequest<'a> {
  operation: &'a str,
  params: &'a HashMap<String, String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  payload: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BridgeResponse {
  #[serde(default)]
  success: bool,
  #[serde(default)]
  output: String,
  #[serde(default)]
  confidence: f64,
  #[serde(default)]
  details: HashMap<String, String>,
  #[serde(default)]
  error: String,
}

impl From<BridgeResponse> for TaskResult {
  fn from(resp: BridgeResponse) -> Self {
    if !resp.error.is_empty() {
      return TaskResult::failure(resp.error);
    }
    TaskResult {
      success: resp.success,
      output: resp.output,
      data: Vec::new(),
      confidence: resp.confidence,
      details: resp.details,
    }
  }
}

struct BridgeProcess {
  child: Child,
  stdin: ChildStdin,
  stdout: BufReader<ChildStdout>,
}

/// A capability implemented by a child process speaking the line protocol.
///
/// Calls are serialized: at most one request is outstanding per child.
pub struct BridgedCapability {
  id: String,
  name: String,
  operations: Vec<String>,
  command: String,
  args: Vec<String>,
  max_line_bytes: usize,
  stop_timeout: Duration,
  process: Mutex<Option<BridgeProcess>>,
}

impl BridgedCapability {
  pub fn new(
    id: impl Into<String>,
    name: impl Into<String>,
    command: impl Into<String>,
    args: Vec<String>,
    operations: Vec<String>,
  ) -> Self {
    Self {
      id: id.into(),
      name: name.into(),
      operations,
      command: command.into(),
      args,
      max_line_bytes: DEFAULT_MAX_LINE_BYTES,
      stop_timeout: DEFAULT_STOP_TIMEOUT,
      process: Mutex::new(None),
    }
  }

  pub fn from_config(config: &CapabilityConfig) -> Self {
    Self::new(
      &config.id,
      &config.name,
      &config.command,
      config.args.clone(),
      config.operations.clone(),
    )
  }

  pub fn with_max_line_bytes(mut self, limit: usize) -> Self {
    self.max_line_bytes = limit;
    self
  }

  pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
    self.stop_timeout = timeout;
    self
  }

  pub async fn is_running(&self) -> bool {
    self.process.lock().await.is_some()
  }

  /// Launch the child process. Starting a running bridge is a no-op.
  #[instrument(name = "bridge_start", skip(self), fields(capability_id = %self.id))]
  pub async fn start(&self) -> Result<(), CapabilityError> {
    let mut guard = self.process.lock().await;
    if guard.is_some() {
      return Ok(());
    }

    let mut child = Command::new(&self.command)
      .args(&self.args)
      .stdin(Stdio::piped())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true)
      .spawn()
      .map_err(|e| CapabilityError::Spawn {
        id: self.id.clone(),
        source: e,
      })?;

    let stdin = child.stdin.take().ok_or_else(|| self.io_error("no stdin on child"))?;
    let stdout = child
      .stdout
      .take()
      .ok_or_else(|| self.io_error("no stdout on child"))?;

    if let Some(stderr) = child.stderr.take() {
      let id = self.id.clone();
      tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
          if !line.trim().is_empty() {
            debug!(capability_id = %id, line = %line, "bridge stderr");
          }
        }
      });
    }

    info!(command = %self.command, pid = ?child.id(), "bridge started");
    *guard = Some(BridgeProcess {
      child,
      stdin,
      stdout: BufReader::new(stdout),
    });
    Ok(())
  }

  /// Close the child's stdin and wait for it to exit, killing it if it is
  /// still running after the stop timeout.
  ///
  /// Safe to call on a bridge that was never started or is already stopped.
  #[instrument(name = "bridge_stop", skip(self), fields(capability_id = %self.id))]
  pub async fn stop(&self) -> Result<(), CapabilityError> {
    let Some(process) = self.process.lock().await.take() else {
      return Ok(());
    };

    let BridgeProcess {
      mut child, stdin, ..
    } = process;
    drop(stdin);

    let status = match tokio::time::timeout(self.stop_timeout, child.wait()).await {
      Ok(status) => status.map_err(|e| self.io(e))?,
      Err(_) => {
        warn!(
          timeout_ms = self.stop_timeout.as_millis() as u64,
          "bridge ignored end of input, killing"
        );
        child.kill().await.map_err(|e| self.io(e))?;
        return Ok(());
      }
    };
    if status.success() {
      info!("bridge stopped");
    } else {
      warn!(status = %status, "bridge exited with failure status");
    }
    Ok(())
  }

  async fn round_trip(
    &self,
    process: &mut BridgeProcess,
    task: &Task,
  ) -> Result<TaskResult, CapabilityError> {
    let request = BridgeRequest {
      operation: &task.operation,
      params: &task.params,
      payload: (!task.payload.is_empty())
        .then(|| String::from_utf8_lossy(&task.payload).into_owned()),
    };
    let mut line = serde_json::to_vec(&request).map_err(|e| CapabilityError::Protocol {
      id: self.id.clone(),
      message: e.to_string(),
    })?;
    line.push(b'\n');

    process
      .stdin
      .write_all(&line)
      .await
      .map_err(|e| self.io(e))?;
    process.stdin.flush().await.map_err(|e| self.io(e))?;

    let response = read_line_limited(&mut process.stdout, self.max_line_bytes)
      .await
      .map_err(|e| match e {
        LineError::Io(e) => self.io(e),
        LineError::TooLong => CapabilityError::ResponseTooLong {
          id: self.id.clone(),
          limit: self.max_line_bytes,
        },
      })?
      .ok_or_else(|| CapabilityError::NoResponse(self.id.clone()))?;

    let response: BridgeResponse =
      serde_json::from_slice(&response).map_err(|e| CapabilityError::Protocol {
        id: self.id.clone(),
        message: e.to_string(),
      })?;

    Ok(response.into())
  }

  fn io(&self, source: std::io::Error) -> CapabilityError {
    CapabilityError::Io {
      id: self.id.clone(),
      source,
    }
  }

  fn io_error(&self, message: &str) -> CapabilityError {
    self.io(std::io::Error::other(message.to_string()))
  }
}

#[async_trait]
impl Capability for BridgedCapability {
  fn id(&self) -> &str {
    &self.id
  }

  fn name(&self) -> &str {
    &self.name
  }

  fn operations(&self) -> Vec<String> {
    self.operations.clone()
  }

  #[instrument(
    name = "bridge_execute",
    skip(self, task, cancel),
    fields(capability_id = %self.id, operation = %task.operation)
  )]
  async fn execute(
    &self,
    task: Task,
    cancel: CancellationToken,
  ) -> Result<TaskResult, CapabilityError> {
    let mut guard = tokio::select! {
      guard = self.process.lock() => guard,
      _ = cancel.cancelled() => return Err(CapabilityError::Cancelled),
    };
    // Held outside the slot for the duration of the call: if this future is
    // dropped mid-exchange the process is dropped too, and kill_on_drop reaps it.
    let Some(mut process) = guard.take() else {
      return Err(CapabilityError::NotRunning(self.id.clone()));
    };

    debug!(params = ?redact_params(&task.params), "bridge request");

    let outcome = tokio::select! {
      result = self.round_trip(&mut process, &task) => result,
      _ = cancel.cancelled() => Err(CapabilityError::Cancelled),
    };

    match outcome {
      Ok(result) => {
        *guard = Some(process);
        Ok(result)
      }
      Err(e) => {
        // The stream position is unknown after a failed exchange.
        if let Err(kill_err) = process.child.kill().await {
          warn!(error = %kill_err, "failed to kill bridge child");
        }
        warn!(error = %e, "bridge call failed, child discarded");
        Err(e)
      }
    }
  }
}

#[derive(Debug)]
enum LineError {
  Io(std::io::Error),
  TooLong,
}

impl From<std::io::Error> for LineError {
  fn from(e: std::io::Error) -> Self {
    LineError::Io(e)
  }
}

/// Read one `\n`-terminated line without buffering more than `limit` bytes.
///
/// Returns `None` on EOF before any byte was read. A final line without a
/// terminator is returned as is.
async fn read_line_limited<R>(reader: &mut R, limit: usize) -> Result<Option<Vec<u8>>, LineError>
where
  R: AsyncBufRead + Unpin,
{
  let mut line = Vec::new();
  loop {
    let available = reader.fill_buf().await?;
    if available.is_empty() {
      return Ok((!line.is_empty()).then_some(line));
    }

    let (chunk, consumed, done) = match available.iter().position(|b| *b == b'\n') {
      Some(i) => (&available[..i], i + 1, true),
      None => (available, available.len(), false),
    };
    if line.len() + chunk.len() > limit {
      return Err(LineError::TooLong);
    }
    line.extend_from_slice(chunk);
    reader.consume(consumed);

    if done {
      if line.last() == Some(&b'\r') {
        line.pop();
      }
      return Ok(Some(line));
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_read_line_limited() {
    let mut reader = BufReader::new(&b"first\nsecond\r\nlast"[..]);

    let first = read_line_limited(&mut reader, 64).await.unwrap();
    let second = read_line_limited(&mut reader, 64).await.unwrap();
    let last = read_line_limited(&mut reader, 64).await.unwrap();
    let eof = read_line_limited(&mut reader, 64).await.unwrap();

    assert_eq!(first.as_deref(), Some(&b"first"[..]));
    assert_eq!(second.as_deref(), Some(&b"second"[..]));
    assert_eq!(last.as_deref(), Some(&b"last"[..]));
    assert!(eof.is_none());
  }

  #[tokio::test]
  async fn test_read_line_limited_rejects_long_line() {
    let input = format!("{}\n", "a".repeat(100));
    let mut reader = BufReader::with_capacity(16, input.as_bytes());

    let result = read_line_limited(&mut reader, 64).await;
    assert!(matches!(result, Err(LineError::TooLong)));
  }

  #[test]
  fn test_error_response_is_soft_failure() {
    let resp: BridgeResponse =
      serde_json::from_str(r#"{"success":true,"output":"x","error":"model missing"}"#).unwrap();
    let result = TaskResult::from(resp);

    assert!(!result.success);
    assert_eq!(result.output, "model missing");
  }

  #[test]
  fn test_request_omits_empty_payload() {
    let params = HashMap::from([("lang".to_string(), "en".to_string())]);
    let request = BridgeRequest {
      operation: "ocr",
      params: &params,
      payload: None,
    };

    assert_eq!(
      serde_json::to_string(&request).unwrap(),
      r#"{"operation":"ocr","params":{"lang":"en"}}"#
    );
  }
}
