//! Execution events and notifiers for observability.
//!
//! Events are emitted during a run so that consumers (UI, logs) can observe
//! progress. Delivery is best-effort and never blocks node execution.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

/// Kinds of events emitted during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
  BeeStarted,
  NodeStarted,
  NodeCompleted,
  NodeFailed,
  NodeSkipped,
  BeeCompleted,
  BeeFailed,
  BeeCancelled,
}

/// An event on the engine's stream.
///
/// Serialized as `{"type": ..., "bee_id": ..., "node_id"?: ..., "payload"?: ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineEvent {
  #[serde(rename = "type")]
  pub kind: EventKind,
  pub bee_id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub node_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub payload: Option<serde_json::Value>,
}

impl EngineEvent {
  /// A run-level event.
  pub fn bee(kind: EventKind, bee_id: impl Into<String>) -> Self {
    Self {
      kind,
      bee_id: bee_id.into(),
      node_id: None,
      payload: None,
    }
  }

  /// A node-level event.
  pub fn node(kind: EventKind, bee_id: impl Into<String>, node_id: impl Into<String>) -> Self {
    Self {
      kind,
      bee_id: bee_id.into(),
      node_id: Some(node_id.into()),
      payload: None,
    }
  }

  pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
    self.payload = Some(payload);
    self
  }
}

/// Trait for receiving execution events.
///
/// The engine calls `notify` for each event. Implementations must not block.
pub trait ExecutionNotifier: Send + Sync {
  /// Called when an execution event occurs.
  fn notify(&self, event: EngineEvent);
}

impl<T: ExecutionNotifier + ?Sized> ExecutionNotifier for Arc<T> {
  fn notify(&self, event: EngineEvent) {
    (**self).notify(event)
  }
}

/// A no-op notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: EngineEvent) {}
}

/// Fan-out notifier with a bounded buffer per subscriber.
///
/// When a subscriber's buffer is full the event is dropped for that
/// subscriber only. Subscribers whose receiver was dropped are pruned.
#[derive(Debug)]
pub struct EventBus {
  buffer: usize,
  subscribers: Mutex<Vec<mpsc::Sender<EngineEvent>>>,
}

impl EventBus {
  pub fn new(buffer: usize) -> Self {
    Self {
      buffer: buffer.max(1),
      subscribers: Mutex::new(Vec::new()),
    }
  }

  /// Register a new subscriber.
  pub fn subscribe(&self) -> mpsc::Receiver<EngineEvent> {
    let (tx, rx) = mpsc::channel(self.buffer);
    self
      .subscribers
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .push(tx);
    rx
  }

  pub fn subscriber_count(&self) -> usize {
    self
      .subscribers
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .len()
  }
}

impl Default for EventBus {
  fn default() -> Self {
    Self::new(64)
  }
}

impl ExecutionNotifier for EventBus {
  fn notify(&self, event: EngineEvent) {
    let mut subscribers = self
      .subscribers
      .lock()
      .unwrap_or_else(PoisonError::into_inner);

    subscribers.retain(|tx| match tx.try_send(event.clone()) {
      Ok(()) => true,
      Err(TrySendError::Full(dropped)) => {
        debug!(kind = ?dropped.kind, bee_id = %dropped.bee_id, "dropped event for slow subscriber");
        true
      }
      Err(TrySendError::Closed(_)) => false,
    });
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_event_serialization() {
    let event = EngineEvent::node(EventKind::NodeFailed, "bee-1", "scan")
      .with_payload(json!("unreachable"));

    assert_eq!(
      serde_json::to_value(&event).unwrap(),
      json!({"type": "node_failed", "bee_id": "bee-1", "node_id": "scan", "payload": "unreachable"})
    );
    assert_eq!(
      serde_json::to_value(EngineEvent::bee(EventKind::BeeStarted, "bee-1")).unwrap(),
      json!({"type": "bee_started", "bee_id": "bee-1"})
    );
  }

  #[tokio::test]
  async fn test_fan_out() {
    let bus = EventBus::new(8);
    let mut a = bus.subscribe();
    let mut b = bus.subscribe();

    bus.notify(EngineEvent::bee(EventKind::BeeStarted, "bee-1"));

    assert_eq!(a.recv().await.unwrap().kind, EventKind::BeeStarted);
    assert_eq!(b.recv().await.unwrap().kind, EventKind::BeeStarted);
  }

  #[tokio::test]
  async fn test_full_subscriber_drops_without_blocking() {
    let bus = EventBus::new(2);
    let mut slow = bus.subscribe();

    for _ in 0..10 {
      bus.notify(EngineEvent::bee(EventKind::NodeStarted, "bee-1"));
    }

    assert!(slow.recv().await.is_some());
    assert!(slow.recv().await.is_some());
    assert!(slow.try_recv().is_err());
    assert_eq!(bus.subscriber_count(), 1);
  }

  #[test]
  fn test_closed_subscriber_is_pruned() {
    let bus = EventBus::new(4);
    let rx = bus.subscribe();
    drop(rx);

    bus.notify(EngineEvent::bee(EventKind::BeeStarted, "bee-1"));
    assert_eq!(bus.subscriber_count(), 0);
  }
}
