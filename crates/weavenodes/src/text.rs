use async_trait::async_trait;
use std::sync::Arc;
use weavecore::{Node, NodeContext, NodeError, NodeOutput, PortSpec};
use weaveruntime::{NodeFactory, NodeTypeInfo};

/// Emits a configured block of text.
pub struct StaticTextNode;

#[async_trait]
impl Node for StaticTextNode {
    fn node_type(&self) -> &str {
        "text.static"
    }

    fn ports(&self) -> PortSpec {
        PortSpec::new().literal("text", "").output("text")
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let text = ctx.input_text("text");
        ctx.emitter
            .status(format!("Outputting {} characters", text.len()));
        Ok(NodeOutput::new().with_output("text", text))
    }
}

pub struct StaticTextNodeFactory;

impl NodeFactory for StaticTextNodeFactory {
    fn create(&self) -> Result<Arc<dyn Node>, NodeError> {
        Ok(Arc::new(StaticTextNode))
    }

    fn node_type(&self) -> &str {
        "text.static"
    }

    fn metadata(&self) -> NodeTypeInfo {
        NodeTypeInfo {
            description: "Output a fixed block of text".to_string(),
            category: "input".to_string(),
        }
    }
}
