//! Core abstractions for the weave workflow engine
//!
//! This crate provides the fundamental types and traits that all other
//! components depend on: values, the node contract, the graph snapshot,
//! status events, and the error taxonomy. It contains no scheduling logic.

mod error;
mod events;
mod graph;
mod node;
mod value;

pub use error::{GraphError, NodeError, WeaveError};
pub use events::{EventBus, RunId, StatusEmitter, StatusEvent, StatusKind};
pub use graph::{Connection, Endpoint, NodeId, NodeSpec, Workflow};
pub use node::{
    ExecutionMode, InputBinding, InputPort, Node, NodeContext, NodeOutput, OutputPort, PortSpec,
    RecalcPolicy,
};
pub use value::Value;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, WeaveError>;
