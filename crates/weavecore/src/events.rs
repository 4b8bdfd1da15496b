use crate::{graph::NodeId, Value};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

pub type RunId = Uuid;

/// Externally observable notification of a node's progress or result.
///
/// Tagged with the run id and generation so a consumer can discard events
/// from a superseded run. Events for a single node are delivered in
/// production order; no ordering is promised across nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEvent {
    pub run_id: RunId,
    pub generation: u64,
    pub node_id: NodeId,
    #[serde(flatten)]
    pub kind: StatusKind,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatusKind {
    PropertyUpdated { name: String, value: Value },
    StatusChanged { status: String },
    OutputsReady { outputs: HashMap<String, Value> },
}

/// Per-node emitter handed to executing code (coordinator or background
/// task). All it can do is publish events; it holds no node state.
#[derive(Clone)]
pub struct StatusEmitter {
    run_id: RunId,
    generation: u64,
    node_id: NodeId,
    sender: broadcast::Sender<StatusEvent>,
}

impl StatusEmitter {
    fn send(&self, kind: StatusKind) {
        let _ = self.sender.send(StatusEvent {
            run_id: self.run_id,
            generation: self.generation,
            node_id: self.node_id.clone(),
            kind,
            timestamp: Utc::now(),
        });
    }

    /// Publish a status-text change ("Processing...", "Complete", ...).
    pub fn status(&self, status: impl Into<String>) {
        self.send(StatusKind::StatusChanged {
            status: status.into(),
        });
    }

    /// Publish a property update (e.g. a streaming response preview).
    pub fn property(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.send(StatusKind::PropertyUpdated {
            name: name.into(),
            value: value.into(),
        });
    }

    /// Publish final outputs for the node.
    pub fn outputs_ready(&self, outputs: HashMap<String, Value>) {
        self.send(StatusKind::OutputsReady { outputs });
    }
}

/// Status-event bus for one executor session. Owned by the session and
/// injected where needed, never process-global state.
pub struct EventBus {
    sender: broadcast::Sender<StatusEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: StatusEvent) {
        let _ = self.sender.send(event);
    }

    pub fn emitter(&self, run_id: RunId, generation: u64, node_id: NodeId) -> StatusEmitter {
        StatusEmitter {
            run_id,
            generation,
            node_id,
            sender: self.sender.clone(),
        }
    }
}
