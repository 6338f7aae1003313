use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::capability::Capability;
use crate::error::CapabilityError;
use crate::task::{Task, TaskResult};

type NativeFn = dyn Fn(&Task) -> Result<TaskResult, CapabilityError> + Send + Sync;

/// A capability whose logic runs in the engine's process.
#[derive(Clone)]
pub struct NativeCapability {
  id: String,
  name: String,
  operations: Vec<String>,
  func: Arc<NativeFn>,
}

impl NativeCapability {
  pub fn new<F>(
    id: impl Into<String>,
    name: impl Into<String>,
    operations: Vec<String>,
    func: F,
  ) -> Self
  where
    F: Fn(&Task) -> Result<TaskResult, CapabilityError> + Send + Sync + 'static,
  {
    Self {
      id: id.into(),
      name: name.into(),
      operations,
      func: Arc::new(func),
    }
  }
}

impl fmt::Debug for NativeCapability {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("NativeCapability")
      .field("id", &self.id)
      .field("name", &self.name)
      .field("operations", &self.operations)
      .finish_non_exhaustive()
  }
}

#[async_trait]
impl Capability for NativeCapability {
  fn id(&self) -> &str {
    &self.id
  }

  fn name(&self) -> &str {
    &self.name
  }

  fn operations(&self) -> Vec<String> {
    self.operations.clone()
  }

  async fn execute(
    &self,
    task: Task,
    cancel: CancellationToken,
  ) -> Result<TaskResult, CapabilityError> {
    if cancel.is_cancelled() {
      return Err(CapabilityError::Cancelled);
    }
    (self.func)(&task)
  }
}
