//! Capability errors.

use std::path::PathBuf;

use hivemind_guard::GuardError;

/// Infrastructure errors raised while invoking a capability.
///
/// A capability that ran but could not satisfy the request reports a soft
/// failure through [`TaskResult`](crate::TaskResult) instead.
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
  /// No capability is registered under the id.
  #[error("capability not found: {0}")]
  NotFound(String),

  /// The bridged child process has not been started or has gone away.
  #[error("capability '{0}' is not running")]
  NotRunning(String),

  /// The child process could not be launched.
  #[error("failed to spawn capability '{id}': {source}")]
  Spawn {
    id: String,
    #[source]
    source: std::io::Error,
  },

  /// Reading from or writing to the child process failed.
  #[error("i/o error talking to capability '{id}': {source}")]
  Io {
    id: String,
    #[source]
    source: std::io::Error,
  },

  /// The child closed its output without answering.
  #[error("capability '{0}' closed its output without a response")]
  NoResponse(String),

  /// A response line exceeded the configured maximum.
  #[error("response from capability '{id}' exceeds {limit} bytes")]
  ResponseTooLong { id: String, limit: usize },

  /// A response could not be decoded.
  #[error("malformed response from capability '{id}': {message}")]
  Protocol { id: String, message: String },

  /// A required task parameter is missing.
  #[error("task for capability '{id}' is missing parameter '{param}'")]
  MissingParam { id: String, param: String },

  /// The plugin module is not in the registry.
  #[error("plugin module not found: {0}")]
  UnknownModule(String),

  /// The plugin module declares a backend type that cannot be executed.
  #[error("plugin module '{module}' has unsupported type")]
  UnsupportedModule { module: String },

  /// The plugin index file could not be read or parsed.
  #[error("failed to load plugin index '{path}': {message}")]
  PluginIndex { path: PathBuf, message: String },

  /// A plugin entry point escapes the plugin directory.
  #[error("invalid plugin entry point: {0}")]
  EntryPoint(#[from] GuardError),

  /// The call was cancelled.
  #[error("capability call cancelled")]
  Cancelled,
}
