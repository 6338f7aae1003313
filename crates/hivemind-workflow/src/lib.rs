//! Hivemind Workflow
//!
//! This crate provides the validated workflow representation for hivemind.
//! A [`Workflow`] is built from a [`hivemind_config::WorkflowDef`] and is ready
//! for execution.
//!
//! Key differences from the definition:
//! - Node ids are unique, `next` successors and `output_node` exist
//! - Input references are classified as initial inputs or node outputs
//! - Nodes are held in a topological execution order (declared order is kept
//!   whenever it already satisfies every reference)
//! - Cyclic workflows are rejected

mod error;
mod graph;
mod node;
mod workflow;

pub use error::WorkflowError;
pub use graph::Graph;
pub use node::{Node, Reference};
pub use workflow::Workflow;
