//! Hivemind Capability
//!
//! The uniform execution contract for "neurons": named units of functionality
//! that receive a [`Task`] and return a [`TaskResult`].
//!
//! Backends:
//! - [`NativeCapability`] runs a function in the engine's process.
//! - [`BridgedCapability`] talks to one long-lived child process over a
//!   line-delimited JSON protocol on its standard streams.
//! - [`PluginCapability`] runs IT-support modules through the
//!   [`PluginExecutor`], one short-lived process per call.
//!
//! A `TaskResult` with `success == false` is a soft failure and is returned as
//! data. `Err(CapabilityError)` is reserved for infrastructure faults: a child
//! that cannot be reached, a malformed response, a cancelled call.

mod bridge;
mod capability;
mod error;
mod native;
mod plugin;
mod registry;
mod task;

pub use bridge::{BridgedCapability, DEFAULT_MAX_LINE_BYTES};
pub use capability::{Capability, CapabilityInfo};
pub use error::CapabilityError;
pub use native::NativeCapability;
pub use plugin::{
  DEFAULT_PLUGIN_TIMEOUT, ModuleInfo, ModuleKind, PluginCapability, PluginExecutor, PluginRegistry,
};
pub use registry::CapabilityRegistry;
pub use task::{Task, TaskResult};
