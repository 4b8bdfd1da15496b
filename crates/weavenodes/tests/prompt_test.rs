use weavecore::{EventBus, ExecutionMode, Node, NodeContext, RecalcPolicy, RunId, Value};
use weavenodes::{PromptNode, ResponseFilter};

#[test]
fn remove_filter_strips_thinking_tags() {
    let filter =
        ResponseFilter::new("remove", "<think>.*?</think>", true, true, false).unwrap();
    let text = "<think>step 1\nstep 2</think>Final answer.";
    assert_eq!(filter.apply(text), "Final answer.");
}

#[test]
fn remove_filter_spans_newlines_only_with_dotall() {
    let text = "<think>multi\nline</think>kept";
    let with_dotall =
        ResponseFilter::new("remove", "<think>.*?</think>", true, false, false).unwrap();
    assert_eq!(with_dotall.apply(text), "kept");

    let without_dotall =
        ResponseFilter::new("remove", "<think>.*?</think>", false, false, false).unwrap();
    assert_eq!(without_dotall.apply(text), text);
}

#[test]
fn extract_filter_takes_the_first_capture_group() {
    let filter = ResponseFilter::new("extract", r"```rust\n(.*?)```", true, false, false).unwrap();
    let text = "intro\n```rust\nfn main() {}\n```\noutro";
    assert_eq!(filter.apply(text), "fn main() {}\n");
}

#[test]
fn extract_filter_without_groups_takes_whole_matches() {
    let filter = ResponseFilter::new("extract", r"\d+", false, false, false).unwrap();
    assert_eq!(filter.apply("a1b22c333"), "1\n22\n333");
}

#[test]
fn none_filter_passes_text_through() {
    let filter = ResponseFilter::new("none", "<ignored>", true, true, false).unwrap();
    assert_eq!(filter.apply("untouched"), "untouched");
}

#[test]
fn empty_pattern_passes_text_through() {
    let filter = ResponseFilter::new("remove", "", true, true, false).unwrap();
    assert_eq!(filter.apply("untouched"), "untouched");
}

#[test]
fn invalid_filter_pattern_is_rejected() {
    assert!(ResponseFilter::new("remove", "(unclosed", true, true, false).is_err());
    assert!(ResponseFilter::new("sideways", ".*", true, true, false).is_err());
}

#[test]
fn prompt_node_declares_async_always_recompute() {
    let node = PromptNode::new();
    assert_eq!(node.mode(), ExecutionMode::Asynchronous);
    assert_eq!(node.policy(), RecalcPolicy::Always);

    let ports = node.ports();
    assert!(ports.input("user_prompt").is_some());
    assert!(ports.has_output("response"));
    assert!(ports.has_output("raw_response"));
}

/// Requires a running Ollama instance on localhost:11434.
#[tokio::test]
#[ignore]
async fn prompt_node_generates_against_live_endpoint() {
    let bus = EventBus::new(64);
    let ctx = NodeContext {
        node_id: "prompt".to_string(),
        inputs: [
            ("endpoint", Value::from("http://localhost:11434/api/generate")),
            ("model", Value::from("llama3.2")),
            ("user_prompt", Value::from("Reply with the single word: pong")),
            ("filter_mode", Value::from("none")),
            ("max_tokens", Value::from(32i64)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect(),
        emitter: bus.emitter(RunId::nil(), 1, "prompt".to_string()),
        cancellation: tokio_util::sync::CancellationToken::new(),
    };

    let node = PromptNode::new();
    let result = node.execute(ctx).await.unwrap();
    let response = result.outputs.get("response").map(Value::to_text).unwrap();
    assert!(!response.is_empty());
}
