use std::path::PathBuf;
use weavecore::{EventBus, Node, NodeContext, NodeError, RunId, Value};
use weavenodes::TextFileNode;

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

fn scratch_path() -> PathBuf {
    std::env::temp_dir().join(format!("weave-file-test-{}.txt", uuid::Uuid::new_v4()))
}

#[tokio::test]
async fn save_then_load_roundtrips() {
    let node = TextFileNode;
    let path = scratch_path();
    let path_str = path.to_string_lossy().to_string();

    let save_ctx = test_context(vec![
        ("filepath", Value::from(path_str.clone())),
        ("mode", Value::from("save")),
        ("text", Value::from("workflow artifact")),
    ]);
    let saved = node.execute(save_ctx).await.unwrap();
    assert_eq!(
        saved.outputs.get("text").map(Value::to_text).unwrap(),
        "workflow artifact"
    );

    let load_ctx = test_context(vec![
        ("filepath", Value::from(path_str)),
        ("mode", Value::from("load")),
    ]);
    let loaded = node.execute(load_ctx).await.unwrap();
    assert_eq!(
        loaded.outputs.get("text").map(Value::to_text).unwrap(),
        "workflow artifact"
    );

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn load_of_missing_file_fails_cleanly() {
    let node = TextFileNode;
    let ctx = test_context(vec![
        ("filepath", Value::from("/nonexistent/weave/nowhere.txt")),
        ("mode", Value::from("load")),
    ]);

    let err = node.execute(ctx).await.unwrap_err();
    assert!(matches!(err, NodeError::ExecutionFailed(_)));
}

#[tokio::test]
async fn empty_filepath_is_a_configuration_error() {
    let node = TextFileNode;
    let ctx = test_context(vec![("mode", Value::from("load"))]);

    let err = node.execute(ctx).await.unwrap_err();
    assert!(matches!(err, NodeError::Configuration(_)));
}

#[tokio::test]
async fn unknown_mode_is_rejected() {
    let node = TextFileNode;
    let ctx = test_context(vec![
        ("filepath", Value::from("whatever.txt")),
        ("mode", Value::from("append")),
    ]);

    let err = node.execute(ctx).await.unwrap_err();
    assert!(matches!(err, NodeError::Configuration(_)));
}
