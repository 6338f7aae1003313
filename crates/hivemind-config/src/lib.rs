//! Hivemind Config
//!
//! This crate contains the serializable types for hivemind: workflow ("hive")
//! definitions as authored by users, and the settings of the hub itself.
//!
//! Workflow definitions can be loaded from:
//! - JSON files (via the CLI, `hivemind run workflow.json`)
//! - Database storage (as JSON blobs)
//!
//! The engine validates these definitions into an executable
//! `hivemind_workflow::Workflow` before running them.

mod hive;
mod input;
mod node;
mod workflow;

pub use hive::{CapabilityConfig, ConfigError, HiveConfig};
pub use input::InputRef;
pub use node::NodeDef;
pub use workflow::WorkflowDef;
