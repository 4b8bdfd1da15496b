use std::collections::HashMap;
use std::sync::Arc;
use weavecore::{GraphError, Node, NodeError};

/// Factory trait for creating node behavior instances. This is the node
/// extension interface: a new kind supplies identity, port declarations,
/// policy, mode, and an `execute` implementation via the `Node` it builds.
pub trait NodeFactory: Send + Sync {
    /// Create a behavior instance. Instances are stateless with respect to
    /// the workflow; per-node configuration lives in the `NodeSpec`.
    fn create(&self) -> Result<Arc<dyn Node>, NodeError>;

    /// Kind identifier (e.g. "text.static").
    fn node_type(&self) -> &str;

    fn metadata(&self) -> NodeTypeInfo {
        NodeTypeInfo::default()
    }
}

/// Display metadata about a node kind.
#[derive(Debug, Clone)]
pub struct NodeTypeInfo {
    pub description: String,
    pub category: String,
}

impl Default for NodeTypeInfo {
    fn default() -> Self {
        Self {
            description: String::new(),
            category: "general".to_string(),
        }
    }
}

/// Registry of available node kinds.
pub struct NodeRegistry {
    factories: HashMap<String, Arc<dyn NodeFactory>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn register(&mut self, factory: Arc<dyn NodeFactory>) {
        let node_type = factory.node_type().to_string();
        tracing::debug!("registering node type: {}", node_type);
        self.factories.insert(node_type, factory);
    }

    pub fn create_node(&self, node_type: &str) -> Result<Arc<dyn Node>, GraphError> {
        let factory = self
            .factories
            .get(node_type)
            .ok_or_else(|| GraphError::UnknownNodeType(node_type.to_string()))?;

        factory
            .create()
            .map_err(|e| GraphError::InvalidConnection(format!("failed to create node: {}", e)))
    }

    pub fn list_node_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.factories.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn get_metadata(&self, node_type: &str) -> Option<NodeTypeInfo> {
        self.factories.get(node_type).map(|f| f.metadata())
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
