use crate::graph::NodeId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WeaveError {
    #[error("node error: {0}")]
    Node(#[from] NodeError),

    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures local to a single node. Clone-able because completion messages
/// carry them across task boundaries.
#[derive(Error, Debug, Clone)]
pub enum NodeError {
    #[error("missing required input: {0}")]
    MissingInput(String),

    #[error("invalid input type for '{field}': expected {expected}")]
    InvalidInputType { field: String, expected: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    #[error("cancelled")]
    Cancelled,
}

/// Failures in the graph snapshot itself.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("cycle detected through node '{node}'")]
    CyclicDependency { node: NodeId },

    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("node '{node}' has no port '{port}'")]
    UnknownPort { node: NodeId, port: String },

    #[error("invalid connection: {0}")]
    InvalidConnection(String),

    #[error("input '{node}.{port}' already has an incoming connection")]
    InputAlreadyBound { node: NodeId, port: String },
}
