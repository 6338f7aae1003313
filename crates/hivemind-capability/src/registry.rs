use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::capability::{Capability, CapabilityInfo};
use crate::error::CapabilityError;

/// Capabilities available for dispatch, keyed by id.
#[derive(Default)]
pub struct CapabilityRegistry {
  capabilities: RwLock<HashMap<String, Arc<dyn Capability>>>,
}

impl CapabilityRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a capability, replacing any previous one with the same id.
  pub fn register(&self, capability: Arc<dyn Capability>) {
    let id = capability.id().to_string();
    self
      .capabilities
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(id, capability);
  }

  pub fn get(&self, id: &str) -> Result<Arc<dyn Capability>, CapabilityError> {
    self
      .capabilities
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .get(id)
      .cloned()
      .ok_or_else(|| CapabilityError::NotFound(id.to_string()))
  }

  /// Describe every registered capability, ordered by id.
  pub fn list(&self) -> Vec<CapabilityInfo> {
    let mut infos: Vec<_> = self
      .capabilities
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .values()
      .map(|c| c.info())
      .collect();
    infos.sort_by(|a, b| a.id.cmp(&b.id));
    infos
  }

  pub fn len(&self) -> usize {
    self
      .capabilities
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
