use weavecore::{GraphError, NodeSpec, Workflow};
use weaveruntime::resolve_order;

fn workflow_with_nodes(ids: &[&str]) -> Workflow {
    let mut workflow = Workflow::new("test");
    for id in ids {
        workflow.add_node(*id, NodeSpec::new("test.noop"));
    }
    workflow
}

fn position(order: &[String], id: &str) -> usize {
    order.iter().position(|n| n == id).unwrap()
}

#[test]
fn every_node_appears_after_its_sources() {
    let mut workflow = workflow_with_nodes(&["a", "b", "c", "d"]);
    workflow.connect("a", "out", "b", "in_1").unwrap();
    workflow.connect("a", "out", "c", "in_1").unwrap();
    workflow.connect("b", "out", "d", "in_1").unwrap();
    workflow.connect("c", "out", "d", "in_2").unwrap();

    let order = resolve_order(&workflow).unwrap();
    assert_eq!(order.len(), 4);
    assert!(position(&order, "a") < position(&order, "b"));
    assert!(position(&order, "a") < position(&order, "c"));
    assert!(position(&order, "b") < position(&order, "d"));
    assert!(position(&order, "c") < position(&order, "d"));
}

#[test]
fn independent_nodes_resolve_in_id_order() {
    let workflow = workflow_with_nodes(&["zebra", "apple", "mango"]);
    let order = resolve_order(&workflow).unwrap();
    assert_eq!(order, vec!["apple", "mango", "zebra"]);
}

#[test]
fn identical_graphs_resolve_identically() {
    // Same graph, connections inserted in different orders
    let mut first = workflow_with_nodes(&["a", "b", "c", "d"]);
    first.connect("a", "out", "c", "in_1").unwrap();
    first.connect("b", "out", "d", "in_1").unwrap();

    let mut second = workflow_with_nodes(&["a", "b", "c", "d"]);
    second.connect("b", "out", "d", "in_1").unwrap();
    second.connect("a", "out", "c", "in_1").unwrap();

    assert_eq!(
        resolve_order(&first).unwrap(),
        resolve_order(&second).unwrap()
    );
}

#[test]
fn parallel_edges_between_two_nodes_resolve() {
    let mut workflow = workflow_with_nodes(&["a", "b"]);
    workflow.connect("a", "out_1", "b", "in_1").unwrap();
    workflow.connect("a", "out_2", "b", "in_2").unwrap();

    let order = resolve_order(&workflow).unwrap();
    assert_eq!(order, vec!["a", "b"]);
}

#[test]
fn cycle_is_reported_with_an_implicated_node() {
    let mut workflow = workflow_with_nodes(&["a", "b", "c"]);
    workflow.connect("a", "out", "b", "in_1").unwrap();
    workflow.connect("b", "out", "c", "in_1").unwrap();
    workflow.connect("c", "out", "a", "in_1").unwrap();

    let err = resolve_order(&workflow).unwrap_err();
    assert!(matches!(err, GraphError::CyclicDependency { node } if node == "a"));
}

#[test]
fn cycle_behind_a_valid_prefix_is_still_fatal() {
    let mut workflow = workflow_with_nodes(&["root", "x", "y"]);
    workflow.connect("root", "out", "x", "in_1").unwrap();
    workflow.connect("x", "out", "y", "in_1").unwrap();
    workflow.connect("y", "out", "x", "in_2").unwrap();

    let err = resolve_order(&workflow).unwrap_err();
    assert!(matches!(err, GraphError::CyclicDependency { node } if node == "x"));
}
