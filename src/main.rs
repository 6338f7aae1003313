use std::collections::HashMap;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use hivemind_capability::{
  BridgedCapability, Capability, PluginCapability, PluginExecutor, PluginRegistry,
};
use hivemind_config::{HiveConfig, WorkflowDef};
use hivemind_engine::{Engine, EngineConfig, EventBus};
use hivemind_store::{SqliteStore, Store};
use hivemind_workflow::Workflow;

/// Capability id under which the IT-support plugin modules are exposed.
const PLUGIN_CAPABILITY_ID: &str = "techsupport";

/// Hivemind - a workflow hub for local capability modules
#[derive(Parser)]
#[command(name = "hivemind")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the hub configuration file (JSON)
  #[arg(long, global = true, default_value = "hive.json")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a workflow file; initial inputs are read as a JSON object from stdin
  Run {
    workflow_file: PathBuf,

    /// Print engine events to stderr as JSON lines
    #[arg(long)]
    events: bool,
  },

  /// Validate a workflow file and store it
  Save { workflow_file: PathBuf },

  /// Print a stored workflow definition
  Show { workflow_id: String },

  /// List stored workflows, or the runs of one workflow
  List {
    /// List the runs of this workflow instead
    #[arg(long)]
    runs: Option<String>,
  },

  /// List registered capabilities
  Capabilities,

  /// Check the store and start every configured capability
  Health,
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  tracing_subscriber::fmt()
    .with_writer(io::stderr)
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
    )
    .init();

  let Some(command) = cli.command else {
    println!("hivemind - use --help to see available commands");
    return Ok(());
  };

  let config = HiveConfig::load(&cli.config)
    .with_context(|| format!("failed to load config: {}", cli.config.display()))?;

  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async {
    match command {
      Commands::Run {
        workflow_file,
        events,
      } => run_workflow(&config, &workflow_file, events).await,
      Commands::Save { workflow_file } => save_workflow(&config, &workflow_file).await,
      Commands::Show { workflow_id } => show_workflow(&config, &workflow_id).await,
      Commands::List { runs } => list(&config, runs.as_deref()).await,
      Commands::Capabilities => list_capabilities(&config).await,
      Commands::Health => health(&config).await,
    }
  })
}

/// A configured engine plus the bridges it owns.
struct Hive {
  engine: Engine<Arc<EventBus>>,
  bus: Arc<EventBus>,
  bridges: Vec<Arc<BridgedCapability>>,
}

impl Hive {
  async fn open(config: &HiveConfig) -> Result<Self> {
    let store = open_store(config).await?;
    let bus = Arc::new(EventBus::new(config.event_buffer));
    let engine =
      Engine::with_notifier(EngineConfig::from(config), bus.clone()).with_store(store);

    let mut bridges = Vec::with_capacity(config.capabilities.len());
    for capability in &config.capabilities {
      let bridge = Arc::new(BridgedCapability::from_config(capability));
      engine.register_capability(bridge.clone());
      bridges.push(bridge);
    }

    match PluginRegistry::load(config.plugin_path.clone()) {
      Ok(registry) if registry.list().is_empty() => {}
      Ok(registry) => {
        let executor = PluginExecutor::new(Arc::new(registry))
          .with_timeout(Duration::from_millis(config.node_timeout_ms));
        engine.register_capability(Arc::new(PluginCapability::new(
          PLUGIN_CAPABILITY_ID,
          executor,
        )));
      }
      Err(e) => warn!(error = %e, "plugin modules not loaded"),
    }

    Ok(Self {
      engine,
      bus,
      bridges,
    })
  }

  /// Start every bridge. A bridge that fails to start stays registered but
  /// reports not-running on dispatch.
  async fn start(&self) {
    for bridge in &self.bridges {
      if let Err(e) = bridge.start().await {
        warn!(error = %e, "capability failed to start");
      }
    }
  }

  async fn shutdown(self) {
    for bridge in &self.bridges {
      if let Err(e) = bridge.stop().await {
        warn!(error = %e, "capability failed to stop cleanly");
      }
    }
  }
}

async fn open_store(config: &HiveConfig) -> Result<Arc<dyn Store>> {
  let store = SqliteStore::open(&config.db_path)
    .await
    .with_context(|| format!("failed to open database: {}", config.db_path.display()))?;
  Ok(Arc::new(store))
}

async fn run_workflow(config: &HiveConfig, workflow_file: &Path, show_events: bool) -> Result<()> {
  let definition = read_workflow(config, workflow_file).await?;
  let workflow = Workflow::new(definition).context("invalid workflow")?;
  eprintln!("Loaded workflow: {} ({} nodes)", workflow.name, workflow.nodes.len());

  let initial = read_inputs_from_stdin()?;

  let hive = Hive::open(config).await?;
  hive
    .engine
    .save_workflow(workflow.definition())
    .await
    .context("failed to save workflow")?;
  hive.start().await;

  let printer = show_events.then(|| {
    let mut events = hive.bus.subscribe();
    tokio::spawn(async move {
      while let Some(event) = events.recv().await {
        if let Ok(line) = serde_json::to_string(&event) {
          eprintln!("{}", line);
        }
      }
    })
  });

  let cancel = CancellationToken::new();
  let interrupt = {
    let cancel = cancel.clone();
    tokio::spawn(async move {
      if tokio::signal::ctrl_c().await.is_ok() {
        info!("interrupt received, cancelling run");
        cancel.cancel();
      }
    })
  };

  let result = hive
    .engine
    .execute_with_cancel(&workflow, initial, cancel)
    .await;
  interrupt.abort();
  hive.shutdown().await;
  if let Some(printer) = printer {
    let _ = printer.await;
  }

  let result = result.context("workflow execution failed")?;
  eprintln!("Run completed: {}", result.instance_id);
  println!("{}", serde_json::to_string_pretty(&result)?);

  Ok(())
}

async fn save_workflow(config: &HiveConfig, workflow_file: &Path) -> Result<()> {
  let definition = read_workflow(config, workflow_file).await?;
  let engine = Engine::new(EngineConfig::from(config)).with_store(open_store(config).await?);
  engine
    .save_workflow(&definition)
    .await
    .context("failed to save workflow")?;
  eprintln!("Saved workflow: {}", definition.id);
  Ok(())
}

async fn show_workflow(config: &HiveConfig, workflow_id: &str) -> Result<()> {
  let store = open_store(config).await?;
  let stored = store
    .get_workflow(workflow_id)
    .await
    .with_context(|| format!("failed to load workflow '{}'", workflow_id))?;
  println!("{}", stored.definition.0.to_json()?);
  Ok(())
}

async fn list(config: &HiveConfig, runs_of: Option<&str>) -> Result<()> {
  let store = open_store(config).await?;

  let output = match runs_of {
    Some(workflow_id) => {
      let runs = store
        .list_instances(workflow_id)
        .await
        .context("failed to list runs")?;
      serde_json::to_value(runs)?
    }
    None => {
      let workflows = store
        .list_workflows()
        .await
        .context("failed to list workflows")?;
      Value::Array(
        workflows
          .into_iter()
          .map(|w| json!({ "id": w.id, "name": w.name, "updated_at": w.updated_at }))
          .collect(),
      )
    }
  };

  println!("{}", serde_json::to_string_pretty(&output)?);
  Ok(())
}

async fn list_capabilities(config: &HiveConfig) -> Result<()> {
  let hive = Hive::open(config).await?;
  println!("{}", serde_json::to_string_pretty(&hive.engine.capabilities())?);
  Ok(())
}

async fn health(config: &HiveConfig) -> Result<()> {
  let hive = Hive::open(config).await?;
  hive.start().await;

  let mut capabilities = Vec::with_capacity(hive.bridges.len());
  for bridge in &hive.bridges {
    capabilities.push(json!({ "id": bridge.id(), "running": bridge.is_running().await }));
  }

  let report = json!({
    "hive_name": config.hive_name,
    "database": config.db_path,
    "handlers": hive.engine.handler_types(),
    "bridges": capabilities,
    "capabilities": hive.engine.capabilities(),
  });
  hive.shutdown().await;

  println!("{}", serde_json::to_string_pretty(&report)?);
  Ok(())
}

/// Resolve a workflow file argument. A relative path missing from the working
/// directory is looked up under the configured `workflow_path`.
fn resolve_workflow_file(config: &HiveConfig, path: &Path) -> PathBuf {
  if path.is_relative() && !path.exists() {
    let candidate = config.workflow_path.join(path);
    if candidate.exists() {
      return candidate;
    }
  }
  path.to_path_buf()
}

async fn read_workflow(config: &HiveConfig, path: &Path) -> Result<WorkflowDef> {
  let path = resolve_workflow_file(config, path);
  let path = path.as_path();
  let content = tokio::fs::read_to_string(path)
    .await
    .with_context(|| format!("failed to read workflow file: {}", path.display()))?;
  WorkflowDef::from_json(&content)
    .with_context(|| format!("failed to parse workflow file: {}", path.display()))
}

fn read_inputs_from_stdin() -> Result<HashMap<String, Value>> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    return Ok(HashMap::new());
  }

  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read inputs from stdin")?;
  if input.trim().is_empty() {
    return Ok(HashMap::new());
  }

  let inputs: Value =
    serde_json::from_str(&input).context("failed to parse inputs JSON from stdin")?;
  match inputs {
    Value::Object(map) => Ok(map.into_iter().collect()),
    _ => bail!("inputs on stdin must be a JSON object"),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_workflow_file_falls_back_to_workflow_path() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("triage.json"), "{}").unwrap();
    let config = HiveConfig {
      workflow_path: dir.path().to_path_buf(),
      ..HiveConfig::default()
    };

    assert_eq!(
      resolve_workflow_file(&config, Path::new("triage.json")),
      dir.path().join("triage.json")
    );
    assert_eq!(
      resolve_workflow_file(&config, Path::new("missing.json")),
      PathBuf::from("missing.json")
    );
  }
}
