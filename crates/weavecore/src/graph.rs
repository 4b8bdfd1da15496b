use crate::{GraphError, RecalcPolicy, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Stable node identifier, as persisted in the workflow document.
pub type NodeId = String;

/// One end of a connection: (node id, slot name). Serializes as a two
/// element array, matching the persisted `{"out": [node, slot], ...}` form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint(pub NodeId, pub String);

impl Endpoint {
    pub fn node(&self) -> &NodeId {
        &self.0
    }

    pub fn slot(&self) -> &str {
        &self.1
    }
}

/// A binding from one node's output slot to another node's input slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    #[serde(rename = "out")]
    pub from: Endpoint,
    #[serde(rename = "in")]
    pub to: Endpoint,
}

/// Per-node entry in the snapshot: kind, configured properties, and
/// optionally a policy override and cached outputs loaded from disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    #[serde(rename = "type")]
    pub node_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub properties: HashMap<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<RecalcPolicy>,

    /// Output-cache seed state. The engine does not validate freshness;
    /// the first run re-evaluates dirtiness from resolved inputs as normal.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub cached_outputs: HashMap<String, Value>,
}

impl NodeSpec {
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            name: None,
            properties: HashMap::new(),
            policy: None,
            cached_outputs: HashMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_policy(mut self, policy: RecalcPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn with_cached_output(mut self, slot: impl Into<String>, value: impl Into<Value>) -> Self {
        self.cached_outputs.insert(slot.into(), value.into());
        self
    }
}

/// The graph snapshot: the immutable-for-the-duration-of-a-run view of
/// nodes and connections a workflow run executes over.
///
/// Node order is kept deterministic (BTreeMap) so identical graphs build
/// identically regardless of insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(default)]
    pub name: String,

    pub nodes: BTreeMap<NodeId, NodeSpec>,

    #[serde(default)]
    pub connections: Vec<Connection>,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: BTreeMap::new(),
            connections: Vec::new(),
        }
    }

    pub fn add_node(&mut self, id: impl Into<NodeId>, spec: NodeSpec) -> NodeId {
        let id = id.into();
        self.nodes.insert(id.clone(), spec);
        id
    }

    /// Bind an output slot to an input slot. Enforces the single-writer
    /// invariant at edge-creation time: an input slot accepts at most one
    /// incoming connection.
    pub fn connect(
        &mut self,
        from_node: impl Into<NodeId>,
        from_slot: impl Into<String>,
        to_node: impl Into<NodeId>,
        to_slot: impl Into<String>,
    ) -> Result<(), GraphError> {
        let from = Endpoint(from_node.into(), from_slot.into());
        let to = Endpoint(to_node.into(), to_slot.into());

        if !self.nodes.contains_key(from.node()) {
            return Err(GraphError::NodeNotFound(from.node().clone()));
        }
        if !self.nodes.contains_key(to.node()) {
            return Err(GraphError::NodeNotFound(to.node().clone()));
        }
        if self.connections.iter().any(|c| c.to == to) {
            return Err(GraphError::InputAlreadyBound {
                node: to.node().clone(),
                port: to.slot().to_string(),
            });
        }

        self.connections.push(Connection { from, to });
        Ok(())
    }

    pub fn node(&self, id: &str) -> Option<&NodeSpec> {
        self.nodes.get(id)
    }

    /// Connections feeding the given node.
    pub fn incoming<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections.iter().filter(move |c| c.to.node() == id)
    }

    /// Connections leaving the given node.
    pub fn outgoing<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections.iter().filter(move |c| c.from.node() == id)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
