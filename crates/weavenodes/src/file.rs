use async_trait::async_trait;
use std::sync::Arc;
use weavecore::{Node, NodeContext, NodeError, NodeOutput, PortSpec};
use weaveruntime::{NodeFactory, NodeTypeInfo};

/// Loads text from a file, or saves its input to one. Either way the text
/// passes through on the output slot.
pub struct TextFileNode;

#[async_trait]
impl Node for TextFileNode {
    fn node_type(&self) -> &str {
        "io.text_file"
    }

    fn ports(&self) -> PortSpec {
        PortSpec::new()
            .literal("filepath", "")
            .literal("mode", "load")
            .bindable_or("text", "")
            .output("text")
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let filepath = ctx.input_text("filepath");
        if filepath.is_empty() {
            return Err(NodeError::Configuration("no file path set".to_string()));
        }

        let mode = ctx.input_text("mode").to_lowercase();
        match mode.as_str() {
            "load" => {
                let text = tokio::fs::read_to_string(&filepath).await.map_err(|e| {
                    NodeError::ExecutionFailed(format!("failed to read '{}': {}", filepath, e))
                })?;
                ctx.emitter
                    .status(format!("Loaded {} characters", text.len()));
                Ok(NodeOutput::new().with_output("text", text))
            }
            "save" => {
                let text = ctx.input_text("text");
                tokio::fs::write(&filepath, &text).await.map_err(|e| {
                    NodeError::ExecutionFailed(format!("failed to write '{}': {}", filepath, e))
                })?;
                ctx.emitter
                    .status(format!("Saved {} characters", text.len()));
                Ok(NodeOutput::new().with_output("text", text))
            }
            other => Err(NodeError::Configuration(format!(
                "unknown mode '{}', expected 'load' or 'save'",
                other
            ))),
        }
    }
}

pub struct TextFileNodeFactory;

impl NodeFactory for TextFileNodeFactory {
    fn create(&self) -> Result<Arc<dyn Node>, NodeError> {
        Ok(Arc::new(TextFileNode))
    }

    fn node_type(&self) -> &str {
        "io.text_file"
    }

    fn metadata(&self) -> NodeTypeInfo {
        NodeTypeInfo {
            description: "Load or save a text file".to_string(),
            category: "io".to_string(),
        }
    }
}
