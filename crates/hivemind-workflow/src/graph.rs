use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::error::WorkflowError;
use crate::node::Node;

/// Dependency graph of a workflow.
///
/// An edge `a -> b` exists when `b` consumes an output of `a`, or when `a`
/// lists `b` among its explicit `next` successors.
#[derive(Debug, Clone)]
pub struct Graph {
  /// Adjacency list: node_id -> list of downstream node_ids.
  adjacency: HashMap<String, Vec<String>>,
  /// Reverse adjacency: node_id -> list of upstream node_ids.
  reverse_adjacency: HashMap<String, Vec<String>>,
}

impl Graph {
  /// Build a graph from nodes in declared order.
  ///
  /// Every successor and producer must name a node in `nodes`.
  pub fn new(nodes: &[Node]) -> Self {
    let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
    let mut reverse_adjacency: HashMap<String, Vec<String>> = HashMap::new();

    for node in nodes {
      adjacency.entry(node.id.clone()).or_default();
      reverse_adjacency.entry(node.id.clone()).or_default();
    }

    let mut add_edge = |from: &str, to: &str| {
      let downstream = adjacency.entry(from.to_string()).or_default();
      if !downstream.iter().any(|d| d == to) {
        downstream.push(to.to_string());
        reverse_adjacency
          .entry(to.to_string())
          .or_default()
          .push(from.to_string());
      }
    };

    for node in nodes {
      for producer in node.producers() {
        add_edge(producer, &node.id);
      }
      for next in &node.next {
        add_edge(&node.id, next);
      }
    }

    Self {
      adjacency,
      reverse_adjacency,
    }
  }

  /// Get downstream nodes for a given node.
  pub fn downstream(&self, node_id: &str) -> &[String] {
    self
      .adjacency
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Get upstream nodes for a given node.
  pub fn upstream(&self, node_id: &str) -> &[String] {
    self
      .reverse_adjacency
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Compute a topological order of `nodes`, returned as indices into it.
  ///
  /// Among nodes that are ready at the same time the one declared first wins,
  /// so an already valid declared order is returned unchanged.
  pub fn topological_order(&self, nodes: &[Node]) -> Result<Vec<usize>, WorkflowError> {
    let index: HashMap<&str, usize> = nodes
      .iter()
      .enumerate()
      .map(|(i, n)| (n.id.as_str(), i))
      .collect();

    let mut in_degree: Vec<usize> = nodes
      .iter()
      .map(|n| self.upstream(&n.id).len())
      .collect();

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
      .iter()
      .enumerate()
      .filter(|(_, degree)| **degree == 0)
      .map(|(i, _)| Reverse(i))
      .collect();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(Reverse(i)) = ready.pop() {
      order.push(i);
      for downstream in self.downstream(&nodes[i].id) {
        if let Some(&j) = index.get(downstream.as_str()) {
          in_degree[j] -= 1;
          if in_degree[j] == 0 {
            ready.push(Reverse(j));
          }
        }
      }
    }

    if order.len() < nodes.len() {
      let stuck = nodes
        .iter()
        .enumerate()
        .filter(|(i, _)| in_degree[*i] > 0)
        .map(|(_, n)| n.id.clone())
        .collect();
      return Err(WorkflowError::Cycle(stuck));
    }

    Ok(order)
  }
}
