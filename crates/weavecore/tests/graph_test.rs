use weavecore::{GraphError, NodeSpec, RecalcPolicy, Value, Workflow};

fn two_node_workflow() -> Workflow {
    let mut workflow = Workflow::new("test");
    workflow.add_node(
        "static_1",
        NodeSpec::new("text.static").with_property("text", "banana"),
    );
    workflow.add_node("prompt_1", NodeSpec::new("llm.prompt"));
    workflow
}

#[test]
fn connect_links_output_to_input() {
    let mut workflow = two_node_workflow();
    workflow
        .connect("static_1", "text", "prompt_1", "user_prompt")
        .unwrap();

    assert_eq!(workflow.connections.len(), 1);
    let conn = &workflow.connections[0];
    assert_eq!(conn.from.node(), "static_1");
    assert_eq!(conn.from.slot(), "text");
    assert_eq!(conn.to.node(), "prompt_1");
    assert_eq!(conn.to.slot(), "user_prompt");
}

#[test]
fn connect_rejects_unknown_nodes() {
    let mut workflow = two_node_workflow();
    let err = workflow
        .connect("static_1", "text", "missing", "user_prompt")
        .unwrap_err();
    assert!(matches!(err, GraphError::NodeNotFound(node) if node == "missing"));
}

#[test]
fn input_slot_accepts_at_most_one_connection() {
    let mut workflow = two_node_workflow();
    workflow.add_node(
        "static_2",
        NodeSpec::new("text.static").with_property("text", "apple"),
    );
    workflow
        .connect("static_1", "text", "prompt_1", "user_prompt")
        .unwrap();

    let err = workflow
        .connect("static_2", "text", "prompt_1", "user_prompt")
        .unwrap_err();
    assert!(matches!(
        err,
        GraphError::InputAlreadyBound { node, port } if node == "prompt_1" && port == "user_prompt"
    ));

    // Binding a different input of the same node is fine
    workflow
        .connect("static_2", "text", "prompt_1", "system_prompt")
        .unwrap();
}

#[test]
fn serializes_to_the_persisted_document_shape() {
    let mut workflow = two_node_workflow();
    workflow
        .connect("static_1", "text", "prompt_1", "user_prompt")
        .unwrap();

    let json = workflow.to_json().unwrap();
    let doc: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(doc["nodes"]["static_1"]["type"], "text.static");
    assert_eq!(doc["nodes"]["static_1"]["properties"]["text"], "banana");
    assert_eq!(
        doc["connections"][0]["out"],
        serde_json::json!(["static_1", "text"])
    );
    assert_eq!(
        doc["connections"][0]["in"],
        serde_json::json!(["prompt_1", "user_prompt"])
    );
}

#[test]
fn loads_a_saved_document_with_cached_outputs() {
    let doc = r#"{
        "name": "saved",
        "nodes": {
            "static_1": {
                "type": "text.static",
                "properties": { "text": "banana" }
            },
            "prompt_1": {
                "type": "llm.prompt",
                "policy": "trust_cache",
                "cached_outputs": { "response": "cached joke" }
            }
        },
        "connections": [
            { "out": ["static_1", "text"], "in": ["prompt_1", "user_prompt"] }
        ]
    }"#;

    let workflow = Workflow::from_json(doc).unwrap();
    assert_eq!(workflow.nodes.len(), 2);

    let prompt = workflow.node("prompt_1").unwrap();
    assert_eq!(prompt.policy, Some(RecalcPolicy::TrustCache));
    assert_eq!(
        prompt.cached_outputs.get("response"),
        Some(&Value::String("cached joke".to_string()))
    );

    let static_node = workflow.node("static_1").unwrap();
    assert_eq!(static_node.policy, None);
    assert_eq!(
        static_node.properties.get("text"),
        Some(&Value::String("banana".to_string()))
    );
}

#[test]
fn roundtrips_through_json() {
    let mut workflow = two_node_workflow();
    workflow
        .connect("static_1", "text", "prompt_1", "user_prompt")
        .unwrap();

    let restored = Workflow::from_json(&workflow.to_json().unwrap()).unwrap();
    assert_eq!(restored.name, workflow.name);
    assert_eq!(restored.nodes.len(), workflow.nodes.len());
    assert_eq!(restored.connections, workflow.connections);
}
