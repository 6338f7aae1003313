use std::collections::{HashMap, HashSet};

use hivemind_config::WorkflowDef;

use crate::error::WorkflowError;
use crate::graph::Graph;
use crate::node::{Node, Reference};

/// A validated workflow ready for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct Workflow {
  pub workflow_id: String,
  pub name: String,
  /// Nodes in execution order.
  pub nodes: Vec<Node>,
  pub output_node: Option<String>,
  definition: WorkflowDef,
}

impl Workflow {
  /// Validate a definition and compute its execution order.
  pub fn new(definition: WorkflowDef) -> Result<Self, WorkflowError> {
    let mut node_ids: HashSet<&str> = HashSet::with_capacity(definition.nodes.len());
    for node in &definition.nodes {
      if !node_ids.insert(node.id.as_str()) {
        return Err(WorkflowError::DuplicateNode(node.id.clone()));
      }
    }

    for node in &definition.nodes {
      if let Some(next) = node.next.iter().find(|n| !node_ids.contains(n.as_str())) {
        return Err(WorkflowError::UnknownSuccessor {
          node_id: node.id.clone(),
          next: next.clone(),
        });
      }
    }

    let output_node = if definition.output_node.is_empty() {
      None
    } else if node_ids.contains(definition.output_node.as_str()) {
      Some(definition.output_node.clone())
    } else {
      return Err(WorkflowError::UnknownOutputNode(
        definition.output_node.clone(),
      ));
    };

    let declared: Vec<Node> = definition
      .nodes
      .iter()
      .map(|def| Node::from_def(def, &node_ids))
      .collect();

    let order = Graph::new(&declared).topological_order(&declared)?;
    let mut slots: Vec<Option<Node>> = declared.into_iter().map(Some).collect();
    let nodes = order.into_iter().filter_map(|i| slots[i].take()).collect();

    Ok(Self {
      workflow_id: definition.id.clone(),
      name: definition.name.clone(),
      nodes,
      output_node,
      definition,
    })
  }

  /// Build the graph structure for traversal.
  pub fn graph(&self) -> Graph {
    Graph::new(&self.nodes)
  }

  /// Get a node by ID.
  pub fn get_node(&self, node_id: &str) -> Option<&Node> {
    self.nodes.iter().find(|n| n.id == node_id)
  }

  /// The definition this workflow was built from, for persistence.
  pub fn definition(&self) -> &WorkflowDef {
    &self.definition
  }

  /// Check that every initial-input reference is satisfied by `initial`.
  ///
  /// Output references are not checked here: a producer that does not emit a
  /// key simply leaves the consumer's input absent.
  pub fn validate_initial_inputs(
    &self,
    initial: &HashMap<String, serde_json::Value>,
  ) -> Result<(), WorkflowError> {
    for node in &self.nodes {
      for (input, reference) in &node.inputs {
        if let Reference::Initial { key } = reference
          && !initial.contains_key(key)
        {
          return Err(WorkflowError::UnresolvedReference {
            node_id: node.id.clone(),
            input: input.clone(),
            reference: key.clone(),
          });
        }
      }
    }
    Ok(())
  }
}
