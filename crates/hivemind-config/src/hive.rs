//! Hub settings.
//!
//! Settings are read from a JSON file. Every field has a default, so an empty
//! object (or a missing file) yields a usable configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Errors that can occur while loading the hub configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("failed to read config file '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse config file '{path}': {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

/// A subprocess-backed capability to spawn at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityConfig {
  pub id: String,
  pub name: String,
  /// Program to launch, e.g. `"python3"`.
  pub command: String,
  #[serde(default)]
  pub args: Vec<String>,
  /// Operations the capability declares.
  #[serde(default)]
  pub operations: Vec<String>,
}

/// Runtime settings for the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HiveConfig {
  pub hive_name: String,
  /// Maximum number of run instances executing at the same time.
  pub max_concurrent_bees: usize,
  pub db_path: PathBuf,
  /// Base directory for the sandboxed file-ingestion handler.
  pub document_path: PathBuf,
  pub workflow_path: PathBuf,
  /// Directory holding plugin modules and their `index.json`.
  pub plugin_path: PathBuf,
  pub sandbox_enabled: bool,
  /// Allow runs whose inputs fail input validation (logged, not refused).
  pub auto_approve: bool,
  pub node_timeout_ms: u64,
  /// Per-subscriber event buffer; events are dropped when it is full.
  pub event_buffer: usize,
  pub capabilities: Vec<CapabilityConfig>,
}

impl Default for HiveConfig {
  fn default() -> Self {
    Self {
      hive_name: "cynapse_hive".to_string(),
      max_concurrent_bees: 5,
      db_path: PathBuf::from("./hivemind.db"),
      document_path: PathBuf::from("./data/documents"),
      workflow_path: PathBuf::from("./workflows"),
      plugin_path: PathBuf::from("./data/techsupport"),
      sandbox_enabled: true,
      auto_approve: false,
      node_timeout_ms: 30_000,
      event_buffer: 64,
      capabilities: Vec::new(),
    }
  }
}

impl HiveConfig {
  /// Load settings from a JSON file.
  ///
  /// A missing file yields the defaults; an unreadable or malformed file is an error.
  pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let content = match std::fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
      Err(e) => {
        return Err(ConfigError::Read {
          path: path.to_path_buf(),
          source: e,
        });
      }
    };

    serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
      path: path.to_path_buf(),
      source: e,
    })
  }
}
