use std::collections::HashMap;
use weavecore::{EventBus, Node, NodeContext, NodeError, RunId, Value};
use weavenodes::{JoinNode, RegexNode, SplitNode, StaticTextNode};

// Helper to build an execution context the way the coordinator would,
// with explicitly supplied resolved inputs
fn test_context(inputs: Vec<(&str, Value)>) -> NodeContext {
    let bus = EventBus::new(64);
    NodeContext {
        node_id: "test".to_string(),
        inputs: inputs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
        emitter: bus.emitter(RunId::nil(), 1, "test".to_string()),
        cancellation: tokio_util::sync::CancellationToken::new(),
    }
}

fn out(outputs: &HashMap<String, Value>, slot: &str) -> String {
    outputs.get(slot).map(Value::to_text).unwrap_or_default()
}

#[tokio::test]
async fn static_text_outputs_its_configured_text() {
    let node = StaticTextNode;
    let ctx = test_context(vec![("text", Value::from("hello there"))]);

    let result = node.execute(ctx).await.unwrap();
    assert_eq!(out(&result.outputs, "text"), "hello there");
}

#[tokio::test]
async fn join_concatenates_in_slot_order() {
    let node = JoinNode;
    let ctx = test_context(vec![
        ("input_1", Value::from("alpha")),
        ("input_2", Value::from("beta")),
        ("input_5", Value::from("gamma")),
        ("delimiter", Value::from(", ")),
    ]);

    let result = node.execute(ctx).await.unwrap();
    assert_eq!(out(&result.outputs, "result"), "alpha, beta, gamma");
}

#[tokio::test]
async fn join_skips_empty_inputs_by_default() {
    let node = JoinNode;
    let ctx = test_context(vec![
        ("input_1", Value::from("a")),
        ("input_2", Value::from("")),
        ("input_3", Value::from("b")),
        ("delimiter", Value::from("-")),
    ]);

    let result = node.execute(ctx).await.unwrap();
    assert_eq!(out(&result.outputs, "result"), "a-b");
}

#[tokio::test]
async fn join_keeps_empty_inputs_when_asked() {
    let node = JoinNode;
    let ctx = test_context(vec![
        ("input_1", Value::from("a")),
        ("input_2", Value::from("")),
        ("input_3", Value::from("b")),
        ("delimiter", Value::from("-")),
        ("skip_empty", Value::from(false)),
    ]);

    let result = node.execute(ctx).await.unwrap();
    assert_eq!(out(&result.outputs, "result"), "a--b");
}

#[tokio::test]
async fn join_trims_whitespace_when_asked() {
    let node = JoinNode;
    let ctx = test_context(vec![
        ("input_1", Value::from("  a  ")),
        ("input_2", Value::from("b")),
        ("delimiter", Value::from("|")),
        // trim options arrive as text from the editor
        ("trim_whitespace", Value::from("true")),
    ]);

    let result = node.execute(ctx).await.unwrap();
    assert_eq!(out(&result.outputs, "result"), "a|b");
}

#[tokio::test]
async fn split_fills_numbered_outputs() {
    let node = SplitNode;
    let ctx = test_context(vec![
        ("text", Value::from("a,b,c")),
        ("delimiter", Value::from(",")),
    ]);

    let result = node.execute(ctx).await.unwrap();
    assert_eq!(out(&result.outputs, "output_1"), "a");
    assert_eq!(out(&result.outputs, "output_2"), "b");
    assert_eq!(out(&result.outputs, "output_3"), "c");
    assert_eq!(out(&result.outputs, "output_4"), "");
    assert_eq!(out(&result.outputs, "overflow"), "");
}

#[tokio::test]
async fn split_overflow_rejoins_the_tail() {
    let node = SplitNode;
    let parts: Vec<String> = (1..=10).map(|i| format!("p{}", i)).collect();
    let ctx = test_context(vec![
        ("text", Value::from(parts.join(","))),
        ("delimiter", Value::from(",")),
    ]);

    let result = node.execute(ctx).await.unwrap();
    assert_eq!(out(&result.outputs, "output_8"), "p8");
    assert_eq!(out(&result.outputs, "overflow"), "p9,p10");
}

#[tokio::test]
async fn split_honors_max_splits() {
    let node = SplitNode;
    let ctx = test_context(vec![
        ("text", Value::from("a,b,c,d")),
        ("delimiter", Value::from(",")),
        ("max_splits", Value::from(1i64)),
    ]);

    let result = node.execute(ctx).await.unwrap();
    assert_eq!(out(&result.outputs, "output_1"), "a");
    assert_eq!(out(&result.outputs, "output_2"), "b,c,d");
    assert_eq!(out(&result.outputs, "output_3"), "");
}

#[tokio::test]
async fn split_supports_regex_delimiters() {
    let node = SplitNode;
    let ctx = test_context(vec![
        ("text", Value::from("one1two22three")),
        ("delimiter", Value::from(r"\d+")),
        ("use_regex", Value::from(true)),
    ]);

    let result = node.execute(ctx).await.unwrap();
    assert_eq!(out(&result.outputs, "output_1"), "one");
    assert_eq!(out(&result.outputs, "output_2"), "two");
    assert_eq!(out(&result.outputs, "output_3"), "three");
}

#[tokio::test]
async fn regex_replace_strips_pattern() {
    let node = RegexNode;
    let ctx = test_context(vec![
        (
            "text",
            Value::from("<think>reasoning...</think>The answer is 42."),
        ),
        ("pattern", Value::from("<think>.*?</think>")),
        ("operation", Value::from("replace")),
        ("dotall", Value::from(true)),
    ]);

    let result = node.execute(ctx).await.unwrap();
    assert_eq!(out(&result.outputs, "result"), "The answer is 42.");
}

#[tokio::test]
async fn regex_match_returns_first_hit() {
    let node = RegexNode;
    let ctx = test_context(vec![
        ("text", Value::from("id=17 id=42")),
        ("pattern", Value::from(r"id=\d+")),
        ("operation", Value::from("match")),
    ]);

    let result = node.execute(ctx).await.unwrap();
    assert_eq!(out(&result.outputs, "result"), "id=17");
}

#[tokio::test]
async fn regex_findall_joins_matches_per_line() {
    let node = RegexNode;
    let ctx = test_context(vec![
        ("text", Value::from("x=1 y=2 z=3")),
        ("pattern", Value::from(r"(\w)=(\d)")),
        ("operation", Value::from("findall")),
    ]);

    let result = node.execute(ctx).await.unwrap();
    assert_eq!(out(&result.outputs, "result"), "x | 1\ny | 2\nz | 3");
}

#[tokio::test]
async fn regex_rejects_invalid_patterns() {
    let node = RegexNode;
    let ctx = test_context(vec![
        ("text", Value::from("anything")),
        ("pattern", Value::from("(unclosed")),
        ("operation", Value::from("replace")),
    ]);

    let err = node.execute(ctx).await.unwrap_err();
    assert!(matches!(err, NodeError::Configuration(_)));
}

#[tokio::test]
async fn regex_ignorecase_flag_applies() {
    let node = RegexNode;
    let ctx = test_context(vec![
        ("text", Value::from("Hello HELLO hello")),
        ("pattern", Value::from("hello")),
        ("replacement", Value::from("hi")),
        ("operation", Value::from("replace")),
        ("ignorecase", Value::from(true)),
    ]);

    let result = node.execute(ctx).await.unwrap();
    assert_eq!(out(&result.outputs, "result"), "hi hi hi");
}
