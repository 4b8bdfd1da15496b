use async_trait::async_trait;
use regex::RegexBuilder;
use std::sync::Arc;
use weavecore::{Node, NodeContext, NodeError, NodeOutput, PortSpec};
use weaveruntime::{NodeFactory, NodeTypeInfo};

const FAN_WIDTH: usize = 8;

/// Joins up to eight inputs with a configurable delimiter.
pub struct JoinNode;

#[async_trait]
impl Node for JoinNode {
    fn node_type(&self) -> &str {
        "text.join"
    }

    fn ports(&self) -> PortSpec {
        let mut ports = PortSpec::new()
            .literal("delimiter", "\n")
            .literal("skip_empty", true)
            .literal("trim_whitespace", false)
            .output("result");
        for i in 1..=FAN_WIDTH {
            ports = ports.bindable(format!("input_{}", i));
        }
        ports
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let delimiter = ctx.input_text("delimiter");
        let skip_empty = ctx.input_bool("skip_empty", true);
        let trim = ctx.input_bool("trim_whitespace", false);

        let mut parts = Vec::new();
        let mut present = 0usize;
        for i in 1..=FAN_WIDTH {
            let Some(value) = ctx.inputs.get(&format!("input_{}", i)) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            present += 1;
            let mut text = value.to_text();
            if trim {
                text = text.trim().to_string();
            }
            if skip_empty && text.is_empty() {
                continue;
            }
            parts.push(text);
        }

        if present == 0 {
            ctx.emitter.status("All inputs empty");
        } else {
            ctx.emitter
                .status(format!("Complete: {} inputs joined", parts.len()));
        }

        Ok(NodeOutput::new().with_output("result", parts.join(&delimiter)))
    }
}

pub struct JoinNodeFactory;

impl NodeFactory for JoinNodeFactory {
    fn create(&self) -> Result<Arc<dyn Node>, NodeError> {
        Ok(Arc::new(JoinNode))
    }

    fn node_type(&self) -> &str {
        "text.join"
    }

    fn metadata(&self) -> NodeTypeInfo {
        NodeTypeInfo {
            description: "Join multiple inputs with a delimiter".to_string(),
            category: "text".to_string(),
        }
    }
}

/// Splits input text into eight numbered outputs plus an overflow slot.
pub struct SplitNode;

#[async_trait]
impl Node for SplitNode {
    fn node_type(&self) -> &str {
        "text.split"
    }

    fn ports(&self) -> PortSpec {
        let mut ports = PortSpec::new()
            .bindable_or("text", "")
            .literal("delimiter", "\n")
            .literal("use_regex", false)
            .literal("max_splits", -1i64)
            .literal("trim_whitespace", false);
        for i in 1..=FAN_WIDTH {
            ports = ports.output(format!("output_{}", i));
        }
        ports.output("overflow")
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let text = ctx.input_text("text");
        if text.is_empty() {
            ctx.emitter.status("No input text");
            let mut out = NodeOutput::new().with_output("overflow", "");
            for i in 1..=FAN_WIDTH {
                out = out.with_output(format!("output_{}", i), "");
            }
            return Ok(out);
        }

        let delimiter = ctx.input_text("delimiter");
        let use_regex = ctx.input_bool("use_regex", false);
        let trim = ctx.input_bool("trim_whitespace", false);
        let max_splits = ctx.input_f64("max_splits", -1.0) as i64;

        let mut parts: Vec<String> = if use_regex {
            let pattern = RegexBuilder::new(&delimiter)
                .build()
                .map_err(|e| NodeError::Configuration(format!("invalid split pattern: {}", e)))?;
            if max_splits >= 0 {
                pattern
                    .splitn(&text, max_splits as usize + 1)
                    .map(str::to_string)
                    .collect()
            } else {
                pattern.split(&text).map(str::to_string).collect()
            }
        } else if max_splits >= 0 {
            text.splitn(max_splits as usize + 1, &delimiter)
                .map(str::to_string)
                .collect()
        } else {
            text.split(&delimiter).map(str::to_string).collect()
        };

        if trim {
            for part in &mut parts {
                *part = part.trim().to_string();
            }
        }

        let mut out = NodeOutput::new();
        for i in 0..FAN_WIDTH {
            out = out.with_output(
                format!("output_{}", i + 1),
                parts.get(i).cloned().unwrap_or_default(),
            );
        }

        // Remaining parts are re-joined onto the overflow slot. Regex
        // splitting loses the original separators, so a space stands in.
        let overflow = if parts.len() > FAN_WIDTH {
            let glue = if use_regex { " " } else { delimiter.as_str() };
            parts[FAN_WIDTH..].join(glue)
        } else {
            String::new()
        };
        out = out.with_output("overflow", overflow);

        if parts.len() <= FAN_WIDTH {
            ctx.emitter
                .status(format!("Split into {} part(s)", parts.len()));
        } else {
            ctx.emitter.status(format!(
                "Split into {} part(s) ({} outputs + overflow)",
                parts.len(),
                FAN_WIDTH
            ));
        }

        Ok(out)
    }
}

pub struct SplitNodeFactory;

impl NodeFactory for SplitNodeFactory {
    fn create(&self) -> Result<Arc<dyn Node>, NodeError> {
        Ok(Arc::new(SplitNode))
    }

    fn node_type(&self) -> &str {
        "text.split"
    }

    fn metadata(&self) -> NodeTypeInfo {
        NodeTypeInfo {
            description: "Split text into numbered outputs".to_string(),
            category: "text".to_string(),
        }
    }
}

/// Applies a regex operation (replace, match, split, findall) to its input.
pub struct RegexNode;

#[async_trait]
impl Node for RegexNode {
    fn node_type(&self) -> &str {
        "text.regex"
    }

    fn ports(&self) -> PortSpec {
        PortSpec::new()
            .bindable_or("text", "")
            .literal("pattern", "<think>.*?</think>")
            .literal("replacement", "")
            .literal("operation", "replace")
            .literal("dotall", true)
            .literal("multiline", false)
            .literal("ignorecase", false)
            .output("result")
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let text = ctx.input_text("text");
        if text.is_empty() {
            ctx.emitter.status("No input text");
            return Ok(NodeOutput::new().with_output("result", ""));
        }

        let pattern = RegexBuilder::new(&ctx.input_text("pattern"))
            .dot_matches_new_line(ctx.input_bool("dotall", true))
            .multi_line(ctx.input_bool("multiline", false))
            .case_insensitive(ctx.input_bool("ignorecase", false))
            .build()
            .map_err(|e| NodeError::Configuration(format!("invalid pattern: {}", e)))?;

        let operation = ctx.input_text("operation");
        let replacement = ctx.input_text("replacement");

        let result = match operation.as_str() {
            "replace" => pattern.replace_all(&text, replacement.as_str()).into_owned(),
            "match" => pattern
                .find(&text)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
            "split" => pattern.split(&text).collect::<Vec<_>>().join("\n"),
            "findall" => {
                let mut matches = Vec::new();
                for caps in pattern.captures_iter(&text) {
                    if caps.len() > 1 {
                        let groups: Vec<&str> = caps
                            .iter()
                            .skip(1)
                            .flatten()
                            .map(|m| m.as_str())
                            .collect();
                        matches.push(groups.join(" | "));
                    } else {
                        matches.push(caps[0].to_string());
                    }
                }
                matches.join("\n")
            }
            other => {
                return Err(NodeError::Configuration(format!(
                    "unknown operation '{}'",
                    other
                )))
            }
        };

        ctx.emitter.status("Complete");
        Ok(NodeOutput::new().with_output("result", result))
    }
}

pub struct RegexNodeFactory;

impl NodeFactory for RegexNodeFactory {
    fn create(&self) -> Result<Arc<dyn Node>, NodeError> {
        Ok(Arc::new(RegexNode))
    }

    fn node_type(&self) -> &str {
        "text.regex"
    }

    fn metadata(&self) -> NodeTypeInfo {
        NodeTypeInfo {
            description: "Apply a regex operation to text".to_string(),
            category: "text".to_string(),
        }
    }
}
