//! Hivemind Engine
//!
//! Runs validated workflows ("hives"). Each run ("bee") walks the workflow's
//! nodes in execution order, resolves their inputs from a per-run result
//! store, dispatches them to node handlers, and records progress.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Engine                             │
//! │  - execute(workflow, inputs) → RunResult                    │
//! │  - kill(instance_id), execute_task(task), capabilities()    │
//! │  - input/output validation, run-slot semaphore              │
//! └─────────────────────────────────────────────────────────────┘
//!            │                    │                    │
//!            ▼                    ▼                    ▼
//!   ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────┐
//!   │ HandlerRegistry │  │ ExecutionNotifier│  │      Store      │
//!   │ output, llm,    │  │ (EventBus)       │  │ (best-effort    │
//!   │ neuron, ...     │  │                  │  │  bee records)   │
//!   └─────────────────┘  └─────────────────┘  └─────────────────┘
//!            │
//!            ▼
//!   ┌─────────────────┐
//!   │CapabilityRegistry│
//!   └─────────────────┘
//! ```
//!
//! Nodes of one run execute sequentially; concurrency comes from running
//! several bees at once, each with its own cancellation scope.

mod condition;
mod engine;
mod error;
mod events;
mod handler;
pub mod handlers;
mod results;

pub use condition::evaluate as evaluate_condition;
pub use engine::{Engine, EngineConfig, RunResult, WITHHELD};
pub use error::{ExecutionError, HandlerError};
pub use events::{EngineEvent, EventBus, EventKind, ExecutionNotifier, NoopNotifier};
pub use handler::{HandlerRegistry, NodeHandler, Values};
pub use results::ResultStore;
