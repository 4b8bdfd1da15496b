use crate::{events::StatusEmitter, graph::NodeId, NodeError, Value};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Decides when a node's cached outputs may be reused instead of
/// re-executing. Named by behavior; see `weaveruntime::cache` for the
/// staleness rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecalcPolicy {
    /// Re-execute when any resolved input differs (by value) from the one
    /// that produced the cache. The default.
    OnInputChange,
    /// Re-execute on every run, regardless of inputs, until reset.
    Always,
    /// Reuse any non-empty cache until the node is explicitly reset, even
    /// if inputs change.
    TrustCache,
}

impl Default for RecalcPolicy {
    fn default() -> Self {
        RecalcPolicy::OnInputChange
    }
}

/// Whether `execute` runs inline on the coordinator or on a background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Synchronous,
    Asynchronous,
}

/// How an input slot may be fed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputBinding {
    /// Configured value only; refuses incoming connections.
    LiteralOnly,
    /// Connection only; has no configured value.
    BindOnly,
    /// Configured value, overridden by a connection when one is bound.
    Either,
}

#[derive(Debug, Clone)]
pub struct InputPort {
    pub name: String,
    pub binding: InputBinding,
    pub default: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct OutputPort {
    pub name: String,
}

/// Static per-kind declaration of a node's slots, resolved at graph-build
/// time rather than by runtime introspection.
#[derive(Debug, Clone, Default)]
pub struct PortSpec {
    pub inputs: Vec<InputPort>,
    pub outputs: Vec<OutputPort>,
}

impl PortSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Literal-only input with a default value.
    pub fn literal(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.inputs.push(InputPort {
            name: name.into(),
            binding: InputBinding::LiteralOnly,
            default: Some(default.into()),
        });
        self
    }

    /// Connection-or-literal input with no default.
    pub fn bindable(mut self, name: impl Into<String>) -> Self {
        self.inputs.push(InputPort {
            name: name.into(),
            binding: InputBinding::Either,
            default: None,
        });
        self
    }

    /// Connection-or-literal input with a default value.
    pub fn bindable_or(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.inputs.push(InputPort {
            name: name.into(),
            binding: InputBinding::Either,
            default: Some(default.into()),
        });
        self
    }

    /// Connection-only input.
    pub fn bound_only(mut self, name: impl Into<String>) -> Self {
        self.inputs.push(InputPort {
            name: name.into(),
            binding: InputBinding::BindOnly,
            default: None,
        });
        self
    }

    pub fn output(mut self, name: impl Into<String>) -> Self {
        self.outputs.push(OutputPort { name: name.into() });
        self
    }

    pub fn input(&self, name: &str) -> Option<&InputPort> {
        self.inputs.iter().find(|p| p.name == name)
    }

    pub fn has_output(&self, name: &str) -> bool {
        self.outputs.iter().any(|p| p.name == name)
    }
}

/// Core trait all executable node kinds implement.
#[async_trait]
pub trait Node: Send + Sync {
    /// Stable kind identifier (e.g. "text.static", "llm.prompt").
    fn node_type(&self) -> &str;

    /// Input/output slot declarations for this kind.
    fn ports(&self) -> PortSpec;

    /// Kind-default recalculation policy; a workflow spec may override it
    /// per node instance.
    fn policy(&self) -> RecalcPolicy {
        RecalcPolicy::OnInputChange
    }

    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Synchronous
    }

    /// Node-specific transformation over resolved inputs. By the time this
    /// runs, every bound upstream value already exists; `execute` must not
    /// fail for "not yet computed" inputs.
    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError>;
}

/// Execution context handed to a node for one execution.
#[derive(Clone)]
pub struct NodeContext {
    pub node_id: NodeId,

    /// Fully resolved inputs: the configured literal for each slot unless a
    /// connection is bound, in which case the upstream cache entry.
    pub inputs: HashMap<String, Value>,

    /// Emitter for progress/preview events during execution.
    pub emitter: StatusEmitter,

    /// Cooperative cancellation; long-running nodes should check it.
    pub cancellation: tokio_util::sync::CancellationToken,
}

impl NodeContext {
    /// Get a required input or fail.
    pub fn require_input(&self, name: &str) -> Result<&Value, NodeError> {
        self.inputs
            .get(name)
            .ok_or_else(|| NodeError::MissingInput(name.to_string()))
    }

    /// Input rendered as text; empty string when absent.
    pub fn input_text(&self, name: &str) -> String {
        self.inputs.get(name).map(Value::to_text).unwrap_or_default()
    }

    /// Input coerced to a boolean, with a fallback.
    pub fn input_bool(&self, name: &str, default: bool) -> bool {
        self.inputs
            .get(name)
            .and_then(Value::coerce_bool)
            .unwrap_or(default)
    }

    /// Input coerced to a number, with a fallback.
    pub fn input_f64(&self, name: &str, default: f64) -> f64 {
        self.inputs
            .get(name)
            .and_then(Value::coerce_f64)
            .unwrap_or(default)
    }
}

/// Output of one node execution: slot name to produced value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeOutput {
    pub outputs: HashMap<String, Value>,
}

impl NodeOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, slot: impl Into<String>, value: impl Into<Value>) -> Self {
        self.outputs.insert(slot.into(), value.into());
        self
    }
}
