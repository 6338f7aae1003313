//! IT-support plugin modules.
//!
//! Modules live under a plugin directory described by `index.json`. Each call
//! runs the module's entry point in a fresh process under a timeout. Arguments
//! are always passed in list form; nothing is interpolated into a shell line.
//!
//! - `python` modules: `python3 <entry> --operation <op> --<key> <value>...`,
//!   run from the entry point's directory.
//! - `script` modules: `<entry> <op>`, parameters passed as `IT_<KEY>`
//!   environment variables.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use hivemind_guard::{redact_params, redact_text, validate_path};
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::capability::Capability;
use crate::error::CapabilityError;
use crate::task::{Task, TaskResult};

/// Default per-call plugin timeout.
pub const DEFAULT_PLUGIN_TIMEOUT: Duration = Duration::from_secs(30);

const INDEX_FILE: &str = "index.json";

/// How a module's entry point is launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
  Python,
  Script,
  /// Any other declared type. Listed, never executed.
  #[serde(other)]
  Unsupported,
}

/// A registered plugin module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleInfo {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub version: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub capabilities: Vec<String>,
  #[serde(rename = "type")]
  pub kind: ModuleKind,
  /// Path of the entry point, relative to the plugin directory.
  pub entry_point: String,
}

/// Plugin modules known to the hub.
#[derive(Debug)]
pub struct PluginRegistry {
  modules_dir: PathBuf,
  modules: RwLock<HashMap<String, ModuleInfo>>,
}

impl PluginRegistry {
  /// An empty registry rooted at `modules_dir`.
  pub fn new(modules_dir: impl Into<PathBuf>) -> Self {
    Self {
      modules_dir: modules_dir.into(),
      modules: RwLock::new(HashMap::new()),
    }
  }

  /// Load `index.json` from `modules_dir`. A missing index yields an empty registry.
  pub fn load(modules_dir: impl Into<PathBuf>) -> Result<Self, CapabilityError> {
    let registry = Self::new(modules_dir);
    let index_path = registry.modules_dir.join(INDEX_FILE);

    let content = match std::fs::read_to_string(&index_path) {
      Ok(content) => content,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(registry),
      Err(e) => {
        return Err(CapabilityError::PluginIndex {
          path: index_path,
          message: e.to_string(),
        });
      }
    };

    let modules: Vec<ModuleInfo> =
      serde_json::from_str(&content).map_err(|e| CapabilityError::PluginIndex {
        path: index_path.clone(),
        message: e.to_string(),
      })?;

    for module in modules {
      registry.register(module);
    }
    Ok(registry)
  }

  pub fn modules_dir(&self) -> &Path {
    &self.modules_dir
  }

  pub fn register(&self, module: ModuleInfo) {
    self
      .modules
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(module.id.clone(), module);
  }

  pub fn get(&self, id: &str) -> Option<ModuleInfo> {
    self
      .modules
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .get(id)
      .cloned()
  }

  /// All modules, ordered by id.
  pub fn list(&self) -> Vec<ModuleInfo> {
    let mut modules: Vec<_> = self
      .modules
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .values()
      .cloned()
      .collect();
    modules.sort_by(|a, b| a.id.cmp(&b.id));
    modules
  }
}

/// Runs plugin modules under a timeout.
#[derive(Debug, Clone)]
pub struct PluginExecutor {
  registry: Arc<PluginRegistry>,
  timeout: Duration,
  interpreter: String,
}

impl PluginExecutor {
  pub fn new(registry: Arc<PluginRegistry>) -> Self {
    Self {
      registry,
      timeout: DEFAULT_PLUGIN_TIMEOUT,
      interpreter: "python3".to_string(),
    }
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  /// Interpreter used for `python` modules.
  pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
    self.interpreter = interpreter.into();
    self
  }

  pub fn registry(&self) -> &PluginRegistry {
    &self.registry
  }

  /// Run one module operation.
  ///
  /// A module that exits non-zero, cannot be launched, or exceeds the timeout
  /// is reported as a soft failure.
  #[instrument(
    name = "plugin_execute",
    skip_all,
    fields(module_id = %module_id, operation = %operation)
  )]
  pub async fn execute(
    &self,
    module_id: &str,
    operation: &str,
    params: &HashMap<String, String>,
    cancel: CancellationToken,
  ) -> Result<TaskResult, CapabilityError> {
    let module = self
      .registry
      .get(module_id)
      .ok_or_else(|| CapabilityError::UnknownModule(module_id.to_string()))?;
    let entry = validate_path(self.registry.modules_dir(), &module.entry_point)?;

    info!(params = ?redact_params(params), "plugin started");

    let mut command = match module.kind {
      ModuleKind::Python => self.python_command(&entry, operation, params),
      ModuleKind::Script => script_command(&entry, operation, params),
      ModuleKind::Unsupported => {
        return Err(CapabilityError::UnsupportedModule {
          module: module.id.clone(),
        });
      }
    };
    command
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true);

    let child = match command.spawn() {
      Ok(child) => child,
      Err(e) => {
        warn!(error = %e, "plugin failed to launch");
        return Ok(TaskResult::failure(format!(
          "module {} failed to launch: {}",
          module.id, e
        )));
      }
    };

    let waited = tokio::select! {
      waited = tokio::time::timeout(self.timeout, child.wait_with_output()) => waited,
      _ = cancel.cancelled() => return Err(CapabilityError::Cancelled),
    };

    let output = match waited {
      Err(_) => {
        warn!(timeout_ms = self.timeout.as_millis() as u64, "plugin timed out");
        return Ok(TaskResult::failure(format!(
          "module {} timed out after {}ms",
          module.id,
          self.timeout.as_millis()
        )));
      }
      Ok(Err(e)) => {
        return Err(CapabilityError::Io {
          id: module.id.clone(),
          source: e,
        });
      }
      Ok(Ok(output)) => output,
    };

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    if !output.status.success() {
      warn!(status = %output.status, "plugin failed");
      return Ok(TaskResult::failure(redact_text(
        &format!("module {} failed: {}\n{}", module.id, output.status, combined),
        params,
      )));
    }

    info!("plugin completed");
    Ok(
      TaskResult::success(combined.trim())
        .with_detail("module", &module.id)
        .with_detail("operation", operation),
    )
  }

  fn python_command(
    &self,
    entry: &Path,
    operation: &str,
    params: &HashMap<String, String>,
  ) -> Command {
    let mut command = Command::new(&self.interpreter);
    command.arg(entry).arg("--operation").arg(operation);
    for (key, value) in sorted(params) {
      if !is_param_key(key) || key == "operation" {
        warn!(key = %key, "skipping parameter with invalid flag name");
        continue;
      }
      command.arg(format!("--{}", key)).arg(value);
    }
    if let Some(dir) = entry.parent() {
      command.current_dir(dir);
    }
    command
  }
}

fn script_command(entry: &Path, operation: &str, params: &HashMap<String, String>) -> Command {
  let mut command = Command::new(entry);
  command.arg(operation).env_clear();
  if let Some(path) = std::env::var_os("PATH") {
    command.env("PATH", path);
  }
  for (key, value) in sorted(params) {
    if !is_param_key(key) {
      warn!(key = %key, "skipping parameter with invalid environment name");
      continue;
    }
    command.env(format!("IT_{}", key.to_ascii_uppercase()), value);
  }
  command
}

/// Parameter names reach modules as flags or environment names: `[A-Za-z0-9_]+`.
fn is_param_key(key: &str) -> bool {
  !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn sorted(params: &HashMap<String, String>) -> BTreeMap<&str, &str> {
  params
    .iter()
    .map(|(k, v)| (k.as_str(), v.as_str()))
    .collect()
}

/// The plugin executor exposed through the [`Capability`] interface.
///
/// `task.params["module"]` selects the module; the remaining parameters are
/// forwarded to it.
pub struct PluginCapability {
  id: String,
  executor: PluginExecutor,
}

impl PluginCapability {
  pub fn new(id: impl Into<String>, executor: PluginExecutor) -> Self {
    Self {
      id: id.into(),
      executor,
    }
  }
}

#[async_trait]
impl Capability for PluginCapability {
  fn id(&self) -> &str {
    &self.id
  }

  fn name(&self) -> &str {
    "IT Support"
  }

  /// The union of the operations declared by every module.
  fn operations(&self) -> Vec<String> {
    self
      .executor
      .registry()
      .list()
      .into_iter()
      .flat_map(|m| m.capabilities)
      .collect::<BTreeSet<_>>()
      .into_iter()
      .collect()
  }

  async fn execute(
    &self,
    task: Task,
    cancel: CancellationToken,
  ) -> Result<TaskResult, CapabilityError> {
    let mut params = task.params;
    let module = params
      .remove("module")
      .ok_or_else(|| CapabilityError::MissingParam {
        id: self.id.clone(),
        param: "module".to_string(),
      })?;

    self
      .executor
      .execute(&module, &task.operation, &params, cancel)
      .await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_load_missing_index_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let registry = PluginRegistry::load(dir.path()).unwrap();
    assert!(registry.list().is_empty());
  }

  #[test]
  fn test_load_index() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
      dir.path().join(INDEX_FILE),
      r#"[
        {"id": "wifi", "name": "WiFi Fixer", "type": "script",
         "entry_point": "wifi/fix.sh", "capabilities": ["diagnose", "reset"]},
        {"id": "disk", "name": "Disk Doctor", "version": "1.0", "type": "python",
         "entry_point": "disk/main.py"},
        {"id": "legacy", "name": "Legacy", "type": "go_plugin", "entry_point": "x.so"}
      ]"#,
    )
    .unwrap();

    let registry = PluginRegistry::load(dir.path()).unwrap();
    let ids: Vec<_> = registry.list().into_iter().map(|m| m.id).collect();

    assert_eq!(ids, vec!["disk", "legacy", "wifi"]);
    assert_eq!(registry.get("wifi").unwrap().kind, ModuleKind::Script);
    assert_eq!(registry.get("legacy").unwrap().kind, ModuleKind::Unsupported);
  }

  #[test]
  fn test_load_malformed_index() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(INDEX_FILE), "[{").unwrap();

    assert!(matches!(
      PluginRegistry::load(dir.path()),
      Err(CapabilityError::PluginIndex { .. })
    ));
  }

  #[test]
  fn test_python_command_skips_unsafe_keys() {
    let dir = tempfile::tempdir().unwrap();
    let executor = PluginExecutor::new(Arc::new(PluginRegistry::new(dir.path())));
    let params = HashMap::from([
      ("target".to_string(), "sda".to_string()),
      ("operation".to_string(), "format".to_string()),
      ("-rf".to_string(), "x".to_string()),
      ("mode=fast".to_string(), "y".to_string()),
    ]);

    let command = executor.python_command(&dir.path().join("main.py"), "check", &params);
    let args: Vec<String> = command
      .as_std()
      .get_args()
      .map(|a| a.to_string_lossy().into_owned())
      .collect();

    assert_eq!(&args[1..], &["--operation", "check", "--target", "sda"]);
  }

  #[tokio::test]
  async fn test_unknown_module() {
    let dir = tempfile::tempdir().unwrap();
    let executor = PluginExecutor::new(Arc::new(PluginRegistry::new(dir.path())));

    let result = executor
      .execute("ghost", "run", &HashMap::new(), CancellationToken::new())
      .await;
    assert!(matches!(result, Err(CapabilityError::UnknownModule(_))));
  }

  #[tokio::test]
  async fn test_entry_point_outside_plugin_dir_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let registry = PluginRegistry::new(dir.path());
    registry.register(ModuleInfo {
      id: "escape".to_string(),
      name: "Escape".to_string(),
      version: String::new(),
      description: String::new(),
      capabilities: vec![],
      kind: ModuleKind::Script,
      entry_point: "../../bin/sh".to_string(),
    });
    let executor = PluginExecutor::new(Arc::new(registry));

    let result = executor
      .execute("escape", "run", &HashMap::new(), CancellationToken::new())
      .await;
    assert!(matches!(result, Err(CapabilityError::EntryPoint(_))));
  }

  #[tokio::test]
  async fn test_plugin_capability_requires_module_param() {
    let dir = tempfile::tempdir().unwrap();
    let cap = PluginCapability::new(
      "techsupport",
      PluginExecutor::new(Arc::new(PluginRegistry::new(dir.path()))),
    );

    let result = cap
      .execute(Task::new("techsupport", "diagnose"), CancellationToken::new())
      .await;
    assert!(matches!(result, Err(CapabilityError::MissingParam { .. })));
  }
}
