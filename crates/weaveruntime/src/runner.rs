use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use weavecore::{Node, NodeContext, NodeError, NodeId, Value};

/// Completion message a background task sends over the run's update
/// channel. This is the only way background work reaches node state; the
/// task itself never mutates anything shared.
#[derive(Debug)]
pub struct TaskCompletion {
    pub node_id: NodeId,
    pub generation: u64,
    pub result: Result<HashMap<String, Value>, NodeError>,
}

/// Launches a node's long-running work on the background runtime and
/// reports completion through the session's mpsc channel.
pub struct TaskRunner {
    tx: mpsc::UnboundedSender<TaskCompletion>,
}

impl TaskRunner {
    /// Create a runner together with the receiving half of its completion
    /// channel. The executor owns the receiver; one channel per session.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TaskCompletion>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Spawn the node's `execute` future. The completion (success, failure,
    /// or cooperative cancellation) is tagged with the launching generation
    /// so a superseded task's late result can be discarded.
    pub fn launch(&self, node: Arc<dyn Node>, ctx: NodeContext, generation: u64) {
        let tx = self.tx.clone();
        let node_id = ctx.node_id.clone();
        tokio::spawn(async move {
            let result = node.execute(ctx).await.map(|out| out.outputs);
            let _ = tx.send(TaskCompletion {
                node_id,
                generation,
                result,
            });
        });
    }
}
