//! Workflow execution engine.
//!
//! The `Engine` runs one bee per `execute` call. Nodes of a bee run strictly
//! one after another in the workflow's execution order; several bees may run
//! at once, bounded by `max_concurrent_bees`.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use hivemind_capability::{Capability, CapabilityInfo, CapabilityRegistry, Task, TaskResult};
use hivemind_config::{HiveConfig, WorkflowDef};
use hivemind_guard::{MASK, is_sensitive_key, redact_params, redact_text};
use hivemind_store::{BeeInstance, BeeState, Store};
use hivemind_validator::{ValidationResult, Validator};
use hivemind_workflow::{Node, Workflow};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::condition;
use crate::error::{ExecutionError, HandlerError};
use crate::events::{EngineEvent, EventKind, ExecutionNotifier, NoopNotifier};
use crate::handler::{HandlerRegistry, NodeHandler, Values, value_text};
use crate::handlers::{
  CapabilityHandler, FileReaderHandler, LlmHandler, OutputHandler, TextChunkerHandler,
  inputs_to_params,
};
use crate::results::ResultStore;

/// Stands in for result values refused by output validation.
pub const WITHHELD: &str = "[withheld]";

/// Configuration for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
  /// Timeout applied to nodes that do not set their own.
  pub node_timeout: Duration,
  /// Maximum number of bees executing at the same time.
  pub max_concurrent_bees: usize,
  /// Start runs whose inputs fail validation instead of refusing them.
  pub auto_approve: bool,
  /// When set, `file_reader` only reads below this directory.
  pub document_root: Option<PathBuf>,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      node_timeout: Duration::from_secs(30),
      max_concurrent_bees: 5,
      auto_approve: false,
      document_root: None,
    }
  }
}

impl From<&HiveConfig> for EngineConfig {
  fn from(config: &HiveConfig) -> Self {
    Self {
      node_timeout: Duration::from_millis(config.node_timeout_ms),
      max_concurrent_bees: config.max_concurrent_bees,
      auto_approve: config.auto_approve,
      document_root: config
        .sandbox_enabled
        .then(|| config.document_path.clone()),
    }
  }
}

/// Result of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
  pub instance_id: String,
  pub workflow_id: String,
  /// Text of the output node's `output`, after output validation.
  pub output: String,
  /// Present when the final output was checked by the validator.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub validation: Option<ValidationResult>,
  /// Every value of the run's result store.
  pub results: Map<String, Value>,
  /// Nodes whose condition evaluated false.
  pub skipped: Vec<String>,
}

/// The workflow execution engine.
///
/// Generic over `N: ExecutionNotifier` to allow different notification strategies.
/// Use `Engine::new()` for an engine that discards events, or
/// `Engine::with_notifier()` to observe them.
pub struct Engine<N: ExecutionNotifier = NoopNotifier> {
  config: EngineConfig,
  handlers: HandlerRegistry,
  capabilities: Arc<CapabilityRegistry>,
  validator: Arc<Validator>,
  store: Option<Arc<dyn Store>>,
  notifier: N,
  running: Mutex<HashMap<String, CancellationToken>>,
  slots: Semaphore,
}

impl Engine<NoopNotifier> {
  /// Create an engine with no-op notifications.
  pub fn new(config: EngineConfig) -> Self {
    Self::with_notifier(config, NoopNotifier)
  }
}

impl<N: ExecutionNotifier> Engine<N> {
  /// Create an engine with a custom notifier and the built-in handlers.
  pub fn with_notifier(config: EngineConfig, notifier: N) -> Self {
    let capabilities = Arc::new(CapabilityRegistry::new());
    let validator = Arc::new(Validator::new());

    let handlers = HandlerRegistry::new();
    handlers.register("output", Arc::new(OutputHandler));
    handlers.register(
      "file_reader",
      Arc::new(match &config.document_root {
        Some(root) => FileReaderHandler::sandboxed(root.clone()),
        None => FileReaderHandler::new(),
      }),
    );
    handlers.register("text_chunker", Arc::new(TextChunkerHandler));
    handlers.register(
      "neuron",
      Arc::new(CapabilityHandler::new(capabilities.clone())),
    );
    handlers.register(
      "llm",
      Arc::new(LlmHandler::new(capabilities.clone(), validator.clone())),
    );

    let slots = Semaphore::new(config.max_concurrent_bees.max(1));

    Self {
      config,
      handlers,
      capabilities,
      validator,
      store: None,
      notifier,
      running: Mutex::new(HashMap::new()),
      slots,
    }
  }

  /// Attach a store for workflow definitions and bee records.
  pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
    self.store = Some(store);
    self
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  pub fn notifier(&self) -> &N {
    &self.notifier
  }

  pub fn validator(&self) -> &Validator {
    &self.validator
  }

  /// Register a handler for a node type, replacing any existing one.
  pub fn register_handler(&self, node_type: impl Into<String>, handler: Arc<dyn NodeHandler>) {
    self.handlers.register(node_type, handler);
  }

  /// Registered node types, sorted.
  pub fn handler_types(&self) -> Vec<String> {
    self.handlers.types()
  }

  /// Register a capability, replacing any existing one with the same id.
  pub fn register_capability(&self, capability: Arc<dyn Capability>) {
    self.capabilities.register(capability);
  }

  /// Registered capabilities, sorted by id.
  pub fn capabilities(&self) -> Vec<CapabilityInfo> {
    self.capabilities.list()
  }

  /// Ids of the bees currently executing or queued for a run slot.
  pub fn running_instances(&self) -> Vec<String> {
    let mut ids: Vec<String> = self
      .running
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .keys()
      .cloned()
      .collect();
    ids.sort();
    ids
  }

  /// Cancel a running bee. Returns `false` if no such bee is running.
  #[instrument(name = "engine_kill", skip(self))]
  pub fn kill(&self, instance_id: &str) -> bool {
    let token = self
      .running
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .get(instance_id)
      .cloned();

    match token {
      Some(token) => {
        info!("cancelling bee");
        token.cancel();
        true
      }
      None => false,
    }
  }

  /// Validate and store a workflow definition.
  #[instrument(name = "engine_save_workflow", skip_all, fields(workflow_id = %definition.id))]
  pub async fn save_workflow(&self, definition: &WorkflowDef) -> Result<(), ExecutionError> {
    let store = self.store.as_ref().ok_or(ExecutionError::NoStore)?;
    Workflow::new(definition.clone())?;
    store.save_workflow(definition).await?;
    info!("workflow saved");
    Ok(())
  }

  /// Load and validate a stored workflow.
  #[instrument(name = "engine_load_workflow", skip(self))]
  pub async fn load_workflow(&self, workflow_id: &str) -> Result<Workflow, ExecutionError> {
    let store = self.store.as_ref().ok_or(ExecutionError::NoStore)?;
    let stored = store.get_workflow(workflow_id).await?;
    Ok(Workflow::new(stored.definition.0)?)
  }

  /// Run a workflow to completion.
  pub async fn execute(
    &self,
    workflow: &Workflow,
    initial: HashMap<String, Value>,
  ) -> Result<RunResult, ExecutionError> {
    self
      .execute_with_cancel(workflow, initial, CancellationToken::new())
      .await
  }

  /// Run a workflow, stopping at the next node boundary once `cancel` fires.
  ///
  /// The bee can also be stopped with [`Engine::kill`]; cancelling `cancel`
  /// and killing the bee have the same effect.
  #[instrument(
    name = "engine_execute",
    skip_all,
    fields(workflow_id = %workflow.workflow_id)
  )]
  pub async fn execute_with_cancel(
    &self,
    workflow: &Workflow,
    initial: HashMap<String, Value>,
    cancel: CancellationToken,
  ) -> Result<RunResult, ExecutionError> {
    workflow.validate_initial_inputs(&initial)?;
    self.check_initial_inputs(&initial)?;

    let instance_id = uuid::Uuid::new_v4().to_string();
    let cancel = cancel.child_token();
    let _running = RunningGuard::register(&self.running, &instance_id, cancel.clone());

    let mut bee = BeeRecord::new(&instance_id, &workflow.workflow_id);
    self.persist(&bee).await;

    let _slot = tokio::select! {
      slot = self.slots.acquire() => slot.map_err(|_| ExecutionError::Cancelled)?,
      _ = cancel.cancelled() => {
        bee.transition(BeeState::Cancelled);
        bee.log("cancelled while queued");
        self.notifier.notify(EngineEvent::bee(EventKind::BeeCancelled, &instance_id));
        self.persist(&bee).await;
        info!(instance_id = %instance_id, "bee cancelled while queued");
        return Err(ExecutionError::Cancelled);
      }
    };

    bee.transition(BeeState::Running);
    bee.log("started");
    info!(instance_id = %instance_id, "bee started");
    self.notifier.notify(
      EngineEvent::bee(EventKind::BeeStarted, &instance_id)
        .with_payload(json!({ "workflow_id": workflow.workflow_id })),
    );
    self.persist(&bee).await;

    let results = ResultStore::new(initial);
    let outcome = match self.run_nodes(workflow, &results, &mut bee, &cancel).await {
      Ok(skipped) => self
        .final_output(workflow, &results)
        .map(|(output, validation)| (output, validation, skipped)),
      Err(e) => Err(e),
    };
    let (screened, violations) = self.screen_results(results.snapshot());
    bee.set_context(screened.clone());
    let outcome = match outcome {
      Ok(_) if !violations.is_empty() => {
        warn!(violations = ?violations, "intermediate results refused");
        Err(ExecutionError::PolicyViolation { violations })
      }
      other => other,
    };

    match outcome {
      Ok((output, validation, skipped)) => {
        bee.transition(BeeState::Completed);
        bee.log("completed");
        self.notifier.notify(
          EngineEvent::bee(EventKind::BeeCompleted, &instance_id)
            .with_payload(json!({ "output": output })),
        );
        self.persist(&bee).await;
        info!(instance_id = %instance_id, "bee completed");

        Ok(RunResult {
          instance_id,
          workflow_id: workflow.workflow_id.clone(),
          output,
          validation,
          results: screened,
          skipped,
        })
      }
      Err(ExecutionError::Cancelled) => {
        bee.transition(BeeState::Cancelled);
        bee.log("cancelled");
        self
          .notifier
          .notify(EngineEvent::bee(EventKind::BeeCancelled, &instance_id));
        self.persist(&bee).await;
        info!(instance_id = %instance_id, "bee cancelled");
        Err(ExecutionError::Cancelled)
      }
      Err(e) => {
        let message = redact_text(&e.to_string(), &HashMap::new());
        bee.transition(BeeState::Failed);
        bee.log(format!("failed: {}", message));
        self.notifier.notify(
          EngineEvent::bee(EventKind::BeeFailed, &instance_id)
            .with_payload(json!({ "error": message })),
        );
        self.persist(&bee).await;
        error!(instance_id = %instance_id, error = %message, "bee failed");
        Err(e)
      }
    }
  }

  /// Dispatch a single task to a capability, validating input and output.
  #[instrument(
    name = "engine_execute_task",
    skip_all,
    fields(capability_id = %task.capability_id, operation = %task.operation)
  )]
  pub async fn execute_task(
    &self,
    task: Task,
    cancel: CancellationToken,
  ) -> Result<TaskResult, ExecutionError> {
    let text = match task.params.get("prompt") {
      Some(prompt) => prompt.clone(),
      None => String::from_utf8_lossy(&task.payload).into_owned(),
    };
    self.check_input(&text)?;

    let capability = self.capabilities.get(&task.capability_id)?;
    let capability_id = task.capability_id.clone();
    info!(params = ?redact_params(&task.params), "dispatching task");

    let mut result = tokio::time::timeout(self.config.node_timeout, capability.execute(task, cancel))
      .await
      .map_err(|_| ExecutionError::TaskTimeout {
        capability_id,
        timeout_ms: duration_ms(self.config.node_timeout),
      })??;

    if result.success && !result.output.is_empty() {
      let validation = self.validator.validate_output(&result.output);
      if validation.escalation_required {
        warn!(violations = ?validation.violations, "task output refused");
        return Err(ExecutionError::PolicyViolation {
          violations: validation.violations,
        });
      }
      if let Some(corrected) = validation.corrected_output {
        result.output = corrected;
        result
          .details
          .insert("validation".to_string(), "corrected".to_string());
      }
    }

    Ok(result)
  }

  /// Walk the nodes in execution order. Returns the ids of skipped nodes.
  async fn run_nodes(
    &self,
    workflow: &Workflow,
    results: &ResultStore,
    bee: &mut BeeRecord,
    cancel: &CancellationToken,
  ) -> Result<Vec<String>, ExecutionError> {
    let node_ids: HashSet<&str> = workflow.nodes.iter().map(|n| n.id.as_str()).collect();
    let bee_id = bee.instance.instance_id.clone();
    let mut skipped = Vec::new();

    for node in &workflow.nodes {
      if cancel.is_cancelled() {
        return Err(ExecutionError::Cancelled);
      }
      bee.instance.current_node = Some(node.id.clone());

      if let Some(expr) = &node.condition {
        let passed = condition::evaluate(expr, &results.nested(&node_ids)).map_err(|message| {
          ExecutionError::Condition {
            node_id: node.id.clone(),
            message,
          }
        });
        match passed {
          Ok(true) => {}
          Ok(false) => {
            info!(instance_id = %bee_id, node_id = %node.id, "node skipped");
            self.notifier.notify(
              EngineEvent::node(EventKind::NodeSkipped, &bee_id, &node.id)
                .with_payload(json!({ "condition": expr })),
            );
            bee.log(format!("node {} skipped", node.id));
            skipped.push(node.id.clone());
            continue;
          }
          Err(e) => {
            self.node_failed(bee, &node.id, &e, &HashMap::new());
            return Err(e);
          }
        }
      }

      let inputs = resolve_inputs(node, results);
      let params = inputs_to_params(&inputs);
      info!(instance_id = %bee_id, node_id = %node.id, node_type = %node.node_type, "node started");
      self
        .notifier
        .notify(EngineEvent::node(EventKind::NodeStarted, &bee_id, &node.id));

      match self.run_node(node, inputs, cancel).await {
        Ok(outputs) => {
          let keys: Vec<&String> = outputs.keys().collect();
          self.notifier.notify(
            EngineEvent::node(EventKind::NodeCompleted, &bee_id, &node.id)
              .with_payload(json!({ "outputs": keys })),
          );
          results.insert_outputs(&node.id, outputs);
          info!(instance_id = %bee_id, node_id = %node.id, "node completed");
          bee.log(format!("node {} completed", node.id));
          bee.set_context(self.screen_results(results.snapshot()).0);
          self.persist(bee).await;
        }
        Err(ExecutionError::Cancelled) => return Err(ExecutionError::Cancelled),
        Err(e) => {
          self.node_failed(bee, &node.id, &e, &params);
          return Err(e);
        }
      }
    }

    if cancel.is_cancelled() {
      return Err(ExecutionError::Cancelled);
    }
    Ok(skipped)
  }

  /// Dispatch one node to its handler under the node timeout.
  async fn run_node(
    &self,
    node: &Node,
    inputs: Values,
    cancel: &CancellationToken,
  ) -> Result<Values, ExecutionError> {
    let handler = self
      .handlers
      .get(&node.node_type)
      .ok_or_else(|| ExecutionError::UnknownNodeType {
        node_id: node.id.clone(),
        node_type: node.node_type.clone(),
      })?;

    let timeout = node
      .timeout_ms
      .map(Duration::from_millis)
      .unwrap_or(self.config.node_timeout);
    let node_cancel = cancel.child_token();
    let call = handler.execute(inputs, &node.config, node_cancel.clone());

    let result = tokio::select! {
      result = tokio::time::timeout(timeout, call) => result,
      _ = cancel.cancelled() => return Err(ExecutionError::Cancelled),
    };

    match result {
      Err(_) => {
        node_cancel.cancel();
        Err(ExecutionError::Timeout {
          node_id: node.id.clone(),
          timeout_ms: duration_ms(timeout),
        })
      }
      Ok(Err(HandlerError::Capability(hivemind_capability::CapabilityError::Cancelled)))
        if cancel.is_cancelled() =>
      {
        Err(ExecutionError::Cancelled)
      }
      Ok(Err(source)) => Err(ExecutionError::Node {
        node_id: node.id.clone(),
        source,
      }),
      Ok(Ok(outputs)) => Ok(outputs),
    }
  }

  /// Text of the output node's `output`, checked by the validator.
  fn final_output(
    &self,
    workflow: &Workflow,
    results: &ResultStore,
  ) -> Result<(String, Option<ValidationResult>), ExecutionError> {
    let Some(output_node) = &workflow.output_node else {
      return Ok((String::new(), None));
    };
    let output = results
      .get(&format!("{}.output", output_node))
      .map(|v| value_text(&v))
      .unwrap_or_default();
    if output.is_empty() {
      return Ok((output, None));
    }

    let validation = self.validator.validate_output(&output);
    if validation.escalation_required {
      warn!(violations = ?validation.violations, "final output refused");
      return Err(ExecutionError::PolicyViolation {
        violations: validation.violations,
      });
    }

    let output = match &validation.corrected_output {
      Some(corrected) => {
        warn!(violations = ?validation.violations, "final output corrected");
        corrected.clone()
      }
      None => output,
    };
    Ok((output, Some(validation)))
  }

  fn check_initial_inputs(&self, initial: &HashMap<String, Value>) -> Result<(), ExecutionError> {
    let mut keys: Vec<&String> = initial.keys().collect();
    keys.sort();
    for key in keys {
      if let Some(value) = initial.get(key) {
        self.check_input_value(value)?;
      }
    }
    Ok(())
  }

  /// Validate every string leaf of an input value, object keys included.
  fn check_input_value(&self, value: &Value) -> Result<(), ExecutionError> {
    match value {
      Value::String(text) => self.check_input(text),
      Value::Array(items) => items.iter().try_for_each(|item| self.check_input_value(item)),
      Value::Object(map) => map.iter().try_for_each(|(key, item)| {
        self.check_input(key)?;
        self.check_input_value(item)
      }),
      _ => Ok(()),
    }
  }

  /// Run every string in a result snapshot through output validation.
  ///
  /// Deceptive text is replaced by its correction and harmful text by
  /// [`WITHHELD`]; the violations behind each withheld value are returned.
  fn screen_results(&self, snapshot: Map<String, Value>) -> (Map<String, Value>, Vec<String>) {
    let mut violations = Vec::new();
    let screened = snapshot
      .into_iter()
      .map(|(key, value)| (key, self.screen_value(value, &mut violations)))
      .collect();
    (screened, violations)
  }

  fn screen_value(&self, value: Value, violations: &mut Vec<String>) -> Value {
    match value {
      Value::String(text) => {
        let validation = self.validator.validate_output(&text);
        if validation.escalation_required {
          violations.extend(validation.violations);
          Value::String(WITHHELD.to_string())
        } else {
          Value::String(validation.corrected_output.unwrap_or(text))
        }
      }
      Value::Array(items) => Value::Array(
        items
          .into_iter()
          .map(|item| self.screen_value(item, violations))
          .collect(),
      ),
      Value::Object(map) => Value::Object(
        map
          .into_iter()
          .map(|(key, item)| (key, self.screen_value(item, violations)))
          .collect(),
      ),
      other => other,
    }
  }

  fn check_input(&self, text: &str) -> Result<(), ExecutionError> {
    let validation = self.validator.validate_input(text);
    if validation.passed {
      return Ok(());
    }
    if self.config.auto_approve {
      warn!(violations = ?validation.violations, "input violates policy, auto-approved");
      return Ok(());
    }
    warn!(violations = ?validation.violations, "input refused");
    Err(ExecutionError::PolicyViolation {
      violations: validation.violations,
    })
  }

  fn node_failed(
    &self,
    bee: &mut BeeRecord,
    node_id: &str,
    err: &ExecutionError,
    params: &HashMap<String, String>,
  ) {
    let message = redact_text(&err.to_string(), params);
    error!(
      instance_id = %bee.instance.instance_id,
      node_id = %node_id,
      error = %message,
      "node failed"
    );
    self.notifier.notify(
      EngineEvent::node(EventKind::NodeFailed, &bee.instance.instance_id, node_id)
        .with_payload(json!({ "error": message })),
    );
    bee.log(format!("node {} failed: {}", node_id, message));
  }

  /// Save a bee snapshot. Failures are logged, never fatal.
  async fn persist(&self, bee: &BeeRecord) {
    let Some(store) = &self.store else {
      return;
    };
    if let Err(e) = store.save_instance(&bee.instance).await {
      warn!(
        instance_id = %bee.instance.instance_id,
        error = %e,
        "failed to persist bee"
      );
    }
  }
}

/// Collect a node's inputs from the result store. Absent references are omitted.
fn resolve_inputs(node: &Node, results: &ResultStore) -> Values {
  node
    .inputs
    .iter()
    .filter_map(|(name, reference)| {
      results
        .get(&reference.store_key())
        .map(|value| (name.clone(), value))
    })
    .collect()
}

fn duration_ms(duration: Duration) -> u64 {
  u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn now_ms() -> i64 {
  chrono::Utc::now().timestamp_millis()
}

/// In-memory view of a bee's stored record.
struct BeeRecord {
  instance: BeeInstance,
}

impl BeeRecord {
  fn new(instance_id: &str, workflow_id: &str) -> Self {
    Self {
      instance: BeeInstance::queued(instance_id, workflow_id, now_ms()),
    }
  }

  fn transition(&mut self, next: BeeState) {
    let current = self.instance.state;
    if !current.can_transition_to(next) {
      warn!(from = %current, to = %next, "ignoring illegal bee transition");
      return;
    }
    self.instance.state = next;
    if next.is_terminal() {
      self.instance.end_time = Some(now_ms());
    }
  }

  fn log(&mut self, line: impl Into<String>) {
    self.instance.logs.0.push(line.into());
  }

  /// Store a result snapshot, masking values under sensitive keys.
  fn set_context(&mut self, snapshot: Map<String, Value>) {
    self.instance.context.0 = snapshot
      .into_iter()
      .map(|(key, value)| {
        let leaf = key.rsplit('.').next().unwrap_or(&key);
        if is_sensitive_key(leaf) {
          (key, Value::String(MASK.to_string()))
        } else {
          (key, value)
        }
      })
      .collect();
  }
}

/// Keeps a bee's cancellation token reachable by `kill` while it runs.
struct RunningGuard<'a> {
  running: &'a Mutex<HashMap<String, CancellationToken>>,
  instance_id: String,
}

impl<'a> RunningGuard<'a> {
  fn register(
    running: &'a Mutex<HashMap<String, CancellationToken>>,
    instance_id: &str,
    token: CancellationToken,
  ) -> Self {
    running
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(instance_id.to_string(), token);
    Self {
      running,
      instance_id: instance_id.to_string(),
    }
  }
}

impl Drop for RunningGuard<'_> {
  fn drop(&mut self) {
    self
      .running
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(&self.instance_id);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use hivemind_config::NodeDef;

  #[test]
  fn test_resolve_inputs_omits_absent_references() {
    let workflow = Workflow::new(WorkflowDef {
      id: "wf".to_string(),
      name: "wf".to_string(),
      nodes: vec![
        NodeDef::new("a", "output"),
        NodeDef::new("b", "output")
          .with_input("present", "a.output")
          .with_input("absent", "a.missing"),
      ],
      output_node: String::new(),
    })
    .unwrap();

    let results = ResultStore::new(HashMap::new());
    let mut outputs = Values::new();
    outputs.insert("output".to_string(), json!("hello"));
    results.insert_outputs("a", outputs);

    let inputs = resolve_inputs(workflow.get_node("b").unwrap(), &results);
    assert_eq!(inputs.len(), 1);
    assert_eq!(inputs["present"], "hello");
  }

  #[test]
  fn test_bee_record_ignores_illegal_transition() {
    let mut bee = BeeRecord::new("bee", "wf");
    bee.transition(BeeState::Completed);
    assert_eq!(bee.instance.state, BeeState::Queued);

    bee.transition(BeeState::Running);
    bee.transition(BeeState::Failed);
    assert_eq!(bee.instance.state, BeeState::Failed);
    assert!(bee.instance.end_time.is_some());

    bee.transition(BeeState::Running);
    assert_eq!(bee.instance.state, BeeState::Failed);
  }

  #[test]
  fn test_queued_bee_can_be_cancelled() {
    let mut bee = BeeRecord::new("bee", "wf");
    bee.transition(BeeState::Cancelled);

    assert_eq!(bee.instance.state, BeeState::Cancelled);
    assert!(bee.instance.end_time.is_some());
  }

  #[test]
  fn test_screen_results_corrects_and_withholds() {
    let engine = Engine::new(EngineConfig::default());
    let snapshot = json!({
      "who.output": "I am a human just like you",
      "scan.output": ["ok", { "note": "Let me help you hack into that system" }],
      "scan.success": true,
    });
    let Value::Object(snapshot) = snapshot else {
      unreachable!()
    };

    let (screened, violations) = engine.screen_results(snapshot);
    assert_eq!(screened["who.output"], "I am an AI assistant just like you");
    assert_eq!(screened["scan.output"], json!(["ok", { "note": WITHHELD }]));
    assert_eq!(screened["scan.success"], true);
    assert!(!violations.is_empty());
  }

  #[test]
  fn test_context_masks_sensitive_keys() {
    let results = ResultStore::new(HashMap::from([
      ("api_token".to_string(), json!("abc")),
      ("question".to_string(), json!("why")),
    ]));
    let mut bee = BeeRecord::new("bee", "wf");
    bee.set_context(results.snapshot());

    assert_eq!(bee.instance.context.0["api_token"], MASK);
    assert_eq!(bee.instance.context.0["question"], "why");
  }

  #[test]
  fn test_config_from_hive_config() {
    let mut hive = HiveConfig::default();
    hive.node_timeout_ms = 250;
    hive.sandbox_enabled = false;

    let config = EngineConfig::from(&hive);
    assert_eq!(config.node_timeout, Duration::from_millis(250));
    assert!(config.document_root.is_none());
  }

  #[test]
  fn test_kill_unknown_bee() {
    let engine = Engine::new(EngineConfig::default());
    assert!(!engine.kill("ghost"));
    assert!(engine.running_instances().is_empty());
  }

  #[test]
  fn test_builtin_handlers() {
    let engine = Engine::new(EngineConfig::default());
    assert_eq!(
      engine.handler_types(),
      vec!["file_reader", "llm", "neuron", "output", "text_chunker"]
    );
  }
}
