use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use weavecore::{GraphError, NodeId, Workflow};

/// Compute a topological execution order for the snapshot.
///
/// Kahn's algorithm over the connection relation, with the zero-in-degree
/// frontier kept in a min-heap keyed by node id: identical graphs resolve
/// to the same order on every run. Fails with `CyclicDependency` (naming
/// the smallest unresolved node) if the frontier empties while nodes
/// remain; no partial order is returned for cyclic graphs.
pub fn resolve_order(workflow: &Workflow) -> Result<Vec<NodeId>, GraphError> {
    let mut graph: DiGraph<NodeId, ()> = DiGraph::new();
    let mut index: HashMap<&NodeId, NodeIndex> = HashMap::new();

    for id in workflow.nodes.keys() {
        let idx = graph.add_node(id.clone());
        index.insert(id, idx);
    }

    for conn in &workflow.connections {
        let from = index
            .get(conn.from.node())
            .ok_or_else(|| GraphError::NodeNotFound(conn.from.node().clone()))?;
        let to = index
            .get(conn.to.node())
            .ok_or_else(|| GraphError::NodeNotFound(conn.to.node().clone()))?;
        graph.add_edge(*from, *to, ());
    }

    let mut in_degree: HashMap<NodeIndex, usize> = graph
        .node_indices()
        .map(|idx| (idx, graph.edges_directed(idx, Direction::Incoming).count()))
        .collect();

    let mut frontier: BinaryHeap<Reverse<(NodeId, NodeIndex)>> = graph
        .node_indices()
        .filter(|idx| in_degree[idx] == 0)
        .map(|idx| Reverse((graph[idx].clone(), idx)))
        .collect();

    let mut order = Vec::with_capacity(graph.node_count());
    while let Some(Reverse((id, idx))) = frontier.pop() {
        order.push(id);
        let successors: Vec<NodeIndex> = graph
            .neighbors_directed(idx, Direction::Outgoing)
            .collect();
        for succ in successors {
            let remaining = in_degree.get_mut(&succ).expect("successor is in graph");
            *remaining -= 1;
            if *remaining == 0 {
                frontier.push(Reverse((graph[succ].clone(), succ)));
            }
        }
    }

    if order.len() < graph.node_count() {
        let node = graph
            .node_indices()
            .filter(|idx| in_degree[idx] > 0)
            .map(|idx| graph[idx].clone())
            .min()
            .expect("unresolved node exists");
        return Err(GraphError::CyclicDependency { node });
    }

    Ok(order)
}
