use async_trait::async_trait;
use futures_util::StreamExt;
use regex::{Regex, RegexBuilder};
use std::sync::Arc;
use std::time::Instant;
use weavecore::{
    ExecutionMode, Node, NodeContext, NodeError, NodeOutput, PortSpec, RecalcPolicy, Value,
};
use weaveruntime::{NodeFactory, NodeTypeInfo};

const PREVIEW_CHARS: usize = 10_000;

/// Truncated preview of a long response for property events.
fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        text.to_string()
    } else {
        let mut p: String = text.chars().take(PREVIEW_CHARS).collect();
        p.push_str("...");
        p
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterMode {
    None,
    Remove,
    Extract,
}

/// Regex post-processing applied to a generated response: strip a pattern
/// out of it, or extract only the matching portions.
#[derive(Debug, Clone)]
pub struct ResponseFilter {
    mode: FilterMode,
    pattern: Option<Regex>,
}

impl ResponseFilter {
    pub fn new(
        mode: &str,
        pattern: &str,
        dotall: bool,
        multiline: bool,
        ignorecase: bool,
    ) -> Result<Self, NodeError> {
        let mode = match mode {
            "" | "none" => FilterMode::None,
            "remove" => FilterMode::Remove,
            "extract" => FilterMode::Extract,
            other => {
                return Err(NodeError::Configuration(format!(
                    "unknown filter mode '{}'",
                    other
                )))
            }
        };
        let pattern = if mode == FilterMode::None || pattern.is_empty() {
            None
        } else {
            Some(
                RegexBuilder::new(pattern)
                    .dot_matches_new_line(dotall)
                    .multi_line(multiline)
                    .case_insensitive(ignorecase)
                    .build()
                    .map_err(|e| {
                        NodeError::Configuration(format!("invalid filter pattern: {}", e))
                    })?,
            )
        };
        Ok(Self { mode, pattern })
    }

    fn from_context(ctx: &NodeContext) -> Result<Self, NodeError> {
        Self::new(
            &ctx.input_text("filter_mode"),
            &ctx.input_text("filter_pattern"),
            ctx.input_bool("filter_dotall", true),
            ctx.input_bool("filter_multiline", true),
            ctx.input_bool("filter_ignorecase", false),
        )
    }

    pub fn apply(&self, text: &str) -> String {
        let Some(pattern) = &self.pattern else {
            return text.to_string();
        };
        match self.mode {
            FilterMode::None => text.to_string(),
            FilterMode::Remove => pattern.replace_all(text, "").into_owned(),
            FilterMode::Extract => {
                let mut matches = Vec::new();
                for caps in pattern.captures_iter(text) {
                    // First capturing group when one exists, else the
                    // whole match.
                    let m = if caps.len() > 1 { caps.get(1) } else { caps.get(0) };
                    if let Some(m) = m {
                        matches.push(m.as_str());
                    }
                }
                matches.join("\n")
            }
        }
    }
}

/// Sends a prompt to an Ollama-compatible endpoint and streams back the
/// response. Asynchronous: the coordinator launches this on a background
/// task and applies the result through the completion channel.
pub struct PromptNode {
    client: reqwest::Client,
}

impl PromptNode {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for PromptNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Node for PromptNode {
    fn node_type(&self) -> &str {
        "llm.prompt"
    }

    fn ports(&self) -> PortSpec {
        PortSpec::new()
            .literal("endpoint", "http://localhost:11434/api/generate")
            .literal("model", "deepseek-r1:32b")
            .bindable_or("system_prompt", "You are a helpful assistant.")
            .bindable_or("user_prompt", "")
            .literal("temperature", 0.7)
            .literal("top_p", 0.9)
            .literal("top_k", 40i64)
            .literal("repeat_penalty", 1.1)
            .literal("max_tokens", 2048i64)
            .literal("filter_mode", "remove")
            .literal("filter_pattern", "<think>.*?</think>")
            .literal("filter_dotall", true)
            .literal("filter_multiline", true)
            .literal("filter_ignorecase", false)
            .output("response")
            .output("raw_response")
    }

    // A generation is not a pure function of its inputs; rerun every time
    // unless the workflow pins a different policy on the instance.
    fn policy(&self) -> RecalcPolicy {
        RecalcPolicy::Always
    }

    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Asynchronous
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let user_prompt = ctx.input_text("user_prompt");
        if user_prompt.is_empty() {
            ctx.emitter.status("No user prompt input");
            return Ok(NodeOutput::new()
                .with_output("response", "")
                .with_output("raw_response", ""));
        }

        // Validate the filter before burning tokens on a generation.
        let filter = ResponseFilter::from_context(&ctx)?;

        let endpoint = ctx.input_text("endpoint");
        let model = ctx.input_text("model");
        let system_prompt = ctx.input_text("system_prompt");

        let mut payload = serde_json::json!({
            "model": model,
            "prompt": user_prompt,
            "stream": true,
            "options": {
                "temperature": ctx.input_f64("temperature", 0.7),
                "top_p": ctx.input_f64("top_p", 0.9),
                "top_k": ctx.input_f64("top_k", 40.0) as i64,
                "repeat_penalty": ctx.input_f64("repeat_penalty", 1.1),
                "num_predict": ctx.input_f64("max_tokens", 2048.0) as i64,
            },
        });
        if !system_prompt.is_empty() {
            payload["system"] = serde_json::Value::String(system_prompt);
        }

        ctx.emitter.status("Generating...");
        let started = Instant::now();

        let response = self
            .client
            .post(&endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NodeError::ExecutionFailed(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(NodeError::ExecutionFailed(format!(
                "API error: {}",
                response.status()
            )));
        }

        // The endpoint streams newline-delimited JSON chunks, each with a
        // piece of the response and a final `done` marker.
        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        let mut raw = String::new();
        let mut tokens = 0u64;

        while let Some(chunk) = stream.next().await {
            if ctx.cancellation.is_cancelled() {
                return Err(NodeError::Cancelled);
            }
            let chunk =
                chunk.map_err(|e| NodeError::ExecutionFailed(format!("stream error: {}", e)))?;
            buffer.extend_from_slice(&chunk);

            while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                let line = &line[..line.len() - 1];
                if line.is_empty() {
                    continue;
                }
                let data: serde_json::Value = serde_json::from_slice(line)
                    .map_err(|e| NodeError::ExecutionFailed(format!("bad stream chunk: {}", e)))?;

                if let Some(piece) = data.get("response").and_then(|v| v.as_str()) {
                    raw.push_str(piece);
                    tokens += 1;
                    if tokens % 5 == 0 {
                        let elapsed = started.elapsed().as_secs_f64();
                        let tps = if elapsed > 0.0 { tokens as f64 / elapsed } else { 0.0 };
                        ctx.emitter
                            .status(format!("Generating: {} tokens ({:.1}/s)", tokens, tps));
                    }
                    if tokens % 10 == 0 {
                        ctx.emitter
                            .property("raw_preview", Value::from(preview(&raw)));
                    }
                }
            }
        }

        let filtered = filter.apply(&raw);

        ctx.emitter
            .property("raw_preview", Value::from(preview(&raw)));
        ctx.emitter
            .property("response_preview", Value::from(preview(&filtered)));
        let elapsed = started.elapsed().as_secs_f64();
        let tps = if elapsed > 0.0 { tokens as f64 / elapsed } else { 0.0 };
        ctx.emitter
            .status(format!("Complete: {} tokens ({:.1}/s)", tokens, tps));

        Ok(NodeOutput::new()
            .with_output("response", filtered)
            .with_output("raw_response", raw))
    }
}

pub struct PromptNodeFactory;

impl NodeFactory for PromptNodeFactory {
    fn create(&self) -> Result<Arc<dyn Node>, NodeError> {
        Ok(Arc::new(PromptNode::new()))
    }

    fn node_type(&self) -> &str {
        "llm.prompt"
    }

    fn metadata(&self) -> NodeTypeInfo {
        NodeTypeInfo {
            description: "Send a prompt to an LLM and stream the response".to_string(),
            category: "llm".to_string(),
        }
    }
}
