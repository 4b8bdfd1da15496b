use crate::cache::{self, NodeRunState};
use crate::registry::NodeRegistry;
use crate::resolver;
use crate::runner::{TaskCompletion, TaskRunner};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use weavecore::{
    EventBus, ExecutionMode, GraphError, InputBinding, Node, NodeContext, NodeId, PortSpec,
    RecalcPolicy, RunId, StatusEvent, Value, Workflow,
};

/// Outcome of one `run` dispatch. Async nodes still in flight when `run`
/// returns move from `in_flight` to `executed`/`failed` as their
/// completions are applied (see `settle`).
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub run_id: RunId,
    pub generation: u64,
    pub executed: Vec<NodeId>,
    pub skipped: Vec<NodeId>,
    pub failed: Vec<NodeId>,
    pub blocked: Vec<NodeId>,
    pub in_flight: Vec<NodeId>,
    pub discarded_completions: u64,
}

/// Instantiated behavior plus the static declarations the coordinator
/// consults for a node.
struct NodeSlot {
    node: Arc<dyn Node>,
    ports: PortSpec,
    policy: RecalcPolicy,
    mode: ExecutionMode,
}

/// Drives workflow runs over one graph snapshot.
///
/// The executor owns all node state for the session. Background tasks
/// reach that state only through the completion channel; the coordinator
/// is the single writer, so cache updates are serialized by construction.
pub struct WorkflowExecutor {
    workflow: Workflow,
    slots: HashMap<NodeId, NodeSlot>,
    states: HashMap<NodeId, NodeRunState>,
    events: EventBus,
    runner: TaskRunner,
    completions: mpsc::UnboundedReceiver<TaskCompletion>,
    tokens: HashMap<NodeId, CancellationToken>,
    generation: u64,
    run_id: RunId,
    report: RunReport,
    run_executed: HashSet<NodeId>,
    run_failed: HashSet<NodeId>,
}

impl std::fmt::Debug for WorkflowExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowExecutor")
            .field("run_id", &self.run_id)
            .field("generation", &self.generation)
            .field("nodes", &self.slots.len())
            .finish_non_exhaustive()
    }
}

impl WorkflowExecutor {
    /// Build a session: instantiate behaviors from the registry, check
    /// every connection against the port declarations, and seed output
    /// caches from the snapshot.
    pub fn new(workflow: Workflow, registry: &NodeRegistry) -> weavecore::Result<Self> {
        let mut slots = HashMap::new();
        let mut states = HashMap::new();

        for (id, spec) in &workflow.nodes {
            let node = registry.create_node(&spec.node_type)?;
            let ports = node.ports();
            let policy = spec.policy.unwrap_or(node.policy());
            let mode = node.mode();
            slots.insert(
                id.clone(),
                NodeSlot {
                    node,
                    ports,
                    policy,
                    mode,
                },
            );
            states.insert(id.clone(), NodeRunState::new(spec.cached_outputs.clone()));
        }

        validate_connections(&workflow, &slots)?;

        let (runner, completions) = TaskRunner::new();
        Ok(Self {
            workflow,
            slots,
            states,
            events: EventBus::new(1024),
            runner,
            completions,
            tokens: HashMap::new(),
            generation: 0,
            run_id: RunId::nil(),
            report: RunReport::default(),
            run_executed: HashSet::new(),
            run_failed: HashSet::new(),
        })
    }

    /// Drive one full workflow run.
    ///
    /// Returns as soon as all synchronous work has executed and all async
    /// launches are dispatched. The run suspends only when a node next in
    /// order needs a still-running upstream's result; independent nodes
    /// are never held up. Callers wanting the fully-settled state await
    /// `settle` afterwards.
    pub async fn run(&mut self) -> weavecore::Result<RunReport> {
        self.generation += 1;
        self.run_id = RunId::new_v4();
        self.report = RunReport {
            run_id: self.run_id,
            generation: self.generation,
            ..Default::default()
        };
        self.run_executed.clear();
        self.run_failed.clear();

        tracing::info!(run_id = %self.run_id, generation = self.generation, "starting workflow run");

        let order = match resolver::resolve_order(&self.workflow) {
            Ok(order) => order,
            Err(err) => {
                if let GraphError::CyclicDependency { node } = &err {
                    self.events
                        .emitter(self.run_id, self.generation, node.clone())
                        .status(format!("Error: {}", err));
                }
                tracing::error!(error = %err, "run aborted, no nodes executed");
                return Err(err.into());
            }
        };

        // Pass 1: walk the order, dispatching everything that does not
        // need a still-running upstream. Dependents of in-flight (or
        // deferred) nodes are set aside so the run keeps moving.
        let mut deferred: Vec<NodeId> = Vec::new();
        let mut deferred_set: HashSet<NodeId> = HashSet::new();

        for id in &order {
            if self.trusts_cache(id) {
                self.report.skipped.push(id.clone());
                continue;
            }
            if self.needs_deferral(id, &deferred_set) {
                deferred.push(id.clone());
                deferred_set.insert(id.clone());
                continue;
            }
            self.dispatch_node(id).await;
        }

        // Pass 2: deferred nodes in order, suspending only on the
        // upstream completions each one actually needs.
        for id in &deferred {
            deferred_set.remove(id);
            let sources: Vec<NodeId> = self
                .workflow
                .incoming(id)
                .map(|c| c.from.node().clone())
                .collect();
            for src in sources {
                self.wait_for(&src).await;
            }
            self.dispatch_node(id).await;
        }

        tracing::info!(
            executed = self.report.executed.len(),
            skipped = self.report.skipped.len(),
            failed = self.report.failed.len(),
            blocked = self.report.blocked.len(),
            in_flight = self.report.in_flight.len(),
            "run dispatched"
        );

        Ok(self.report.clone())
    }

    /// Await the fully-settled state: every outstanding background task
    /// has reported. Current-generation results are applied; superseded
    /// ones are discarded. Returns the final report for this generation.
    pub async fn settle(&mut self) -> RunReport {
        while self.states.values().any(|s| s.in_flight.is_some()) {
            match self.completions.recv().await {
                Some(completion) => self.apply_completion(completion),
                None => break,
            }
        }
        self.report.clone()
    }

    /// Reset the whole workflow: every node becomes dirty with an empty
    /// cache and idle status, regardless of policy. Outstanding async work
    /// is superseded: tokens are cancelled and the generation advances,
    /// so late completions are discarded rather than applied.
    pub fn reset(&mut self) {
        self.generation += 1;
        for (_, token) in self.tokens.drain() {
            token.cancel();
        }
        let ids: Vec<NodeId> = self.states.keys().cloned().collect();
        for id in &ids {
            if let Some(state) = self.states.get_mut(id) {
                state.reset();
            }
            self.events
                .emitter(self.run_id, self.generation, id.clone())
                .status("Idle");
        }
        self.run_executed.clear();
        self.run_failed.clear();
        tracing::info!(generation = self.generation, "workflow reset");
    }

    /// Editor hook: update a configured property, mark the node (and its
    /// OnInputChange dependents) dirty, and notify observers.
    pub fn set_property(
        &mut self,
        id: &str,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> weavecore::Result<()> {
        let name = name.into();
        let value = value.into();
        let spec = self
            .workflow
            .nodes
            .get_mut(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;
        spec.properties.insert(name.clone(), value.clone());
        self.mark_dirty(id);
        self.events
            .emitter(self.run_id, self.generation, id.to_string())
            .property(name, value);
        Ok(())
    }

    /// Subscribe to the session's status-event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.events.subscribe()
    }

    pub fn status(&self, id: &str) -> Option<&str> {
        self.states.get(id).map(|s| s.status.as_str())
    }

    pub fn outputs(&self, id: &str) -> Option<&HashMap<String, Value>> {
        self.states.get(id).map(|s| &s.cache)
    }

    pub fn is_dirty(&self, id: &str) -> Option<bool> {
        self.states.get(id).map(|s| s.dirty)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    /// Snapshot for persistence: the workflow with each node's
    /// `cached_outputs` refreshed from the live output cache.
    pub fn snapshot(&self) -> Workflow {
        let mut workflow = self.workflow.clone();
        for (id, spec) in workflow.nodes.iter_mut() {
            if let Some(state) = self.states.get(id) {
                spec.cached_outputs = state.cache.clone();
            }
        }
        workflow
    }

    /// TrustCache nodes with a clean, non-empty cache settle without even
    /// resolving inputs; upstream activity cannot invalidate them.
    fn trusts_cache(&self, id: &NodeId) -> bool {
        let Some(slot) = self.slots.get(id) else {
            return false;
        };
        let Some(state) = self.states.get(id) else {
            return false;
        };
        slot.policy == RecalcPolicy::TrustCache && !state.dirty && !state.cache.is_empty()
    }

    /// A node is deferred when any bound upstream is still running this
    /// generation, or is itself deferred.
    fn needs_deferral(&self, id: &NodeId, deferred: &HashSet<NodeId>) -> bool {
        self.workflow.incoming(id).any(|c| {
            let src = c.from.node();
            deferred.contains(src)
                || self
                    .states
                    .get(src)
                    .map_or(false, |s| s.in_flight == Some(self.generation))
        })
    }

    /// Execute or launch one node whose upstreams are all settled for this
    /// run.
    async fn dispatch_node(&mut self, id: &NodeId) {
        // Forward failure propagation: a node whose bound input traces to
        // a node that failed (or was blocked) this run does not execute.
        let failed_src: Option<NodeId> = self
            .workflow
            .incoming(id)
            .map(|c| c.from.node())
            .find(|src| self.run_failed.contains(*src))
            .cloned();
        if let Some(src) = failed_src {
            self.set_status(id, format!("Blocked: upstream '{}' failed", src));
            self.run_failed.insert(id.clone());
            self.report.blocked.push(id.clone());
            return;
        }

        let resolved = self.resolve_inputs(id);
        let (node, policy, mode) = {
            let slot = &self.slots[id];
            (slot.node.clone(), slot.policy, slot.mode)
        };

        // Upstream dirtiness propagates forward: any ancestor that
        // executed (or launched) this run makes an OnInputChange node
        // stale before its turn, even if the produced values are equal.
        let propagated = policy == RecalcPolicy::OnInputChange
            && self
                .workflow
                .incoming(id)
                .any(|c| self.run_executed.contains(c.from.node()));
        let stale = propagated || cache::is_stale(policy, &self.states[id], &resolved);

        if !stale {
            tracing::debug!(node = %id, "cache valid, skipping");
            self.report.skipped.push(id.clone());
            return;
        }

        self.set_status(id, "Processing...");

        let token = CancellationToken::new();
        let ctx = NodeContext {
            node_id: id.clone(),
            inputs: resolved.clone(),
            emitter: self.events.emitter(self.run_id, self.generation, id.clone()),
            cancellation: token.clone(),
        };

        match mode {
            ExecutionMode::Synchronous => match node.execute(ctx).await {
                Ok(out) => self.complete_node(id, out.outputs, resolved),
                Err(err) => self.fail_node(id, &err.to_string()),
            },
            ExecutionMode::Asynchronous => {
                // A still-outstanding task from an earlier generation is
                // superseded: cancel it and let the generation check
                // discard its eventual completion.
                if let Some(old) = self.tokens.insert(id.clone(), token) {
                    old.cancel();
                }
                {
                    let state = self.states.get_mut(id).expect("known node");
                    state.in_flight = Some(self.generation);
                    state.pending_inputs = Some(resolved);
                }
                self.runner.launch(node, ctx, self.generation);
                self.run_executed.insert(id.clone());
                self.report.in_flight.push(id.clone());
                tracing::debug!(node = %id, "async work launched");
            }
        }
    }

    /// Suspend until the target node's current-generation task (if any)
    /// has reported. Completions for other nodes and generations are
    /// applied or discarded as they drain.
    async fn wait_for(&mut self, target: &NodeId) {
        while self
            .states
            .get(target)
            .map_or(false, |s| s.in_flight == Some(self.generation))
        {
            match self.completions.recv().await {
                Some(completion) => self.apply_completion(completion),
                None => break,
            }
        }
    }

    /// Fold one background completion into node state. The single entry
    /// point for cross-context results; superseded generations never make
    /// it past the guard here.
    fn apply_completion(&mut self, completion: TaskCompletion) {
        let TaskCompletion {
            node_id,
            generation,
            result,
        } = completion;

        if generation != self.generation {
            tracing::debug!(node = %node_id, generation, "discarding superseded completion");
            self.report.discarded_completions += 1;
            if let Some(state) = self.states.get_mut(&node_id) {
                if state.in_flight == Some(generation) {
                    state.in_flight = None;
                    state.pending_inputs = None;
                }
            }
            return;
        }

        let tracked = self
            .states
            .get(&node_id)
            .map_or(false, |s| s.in_flight == Some(generation));
        if !tracked {
            self.report.discarded_completions += 1;
            return;
        }
        if let Some(state) = self.states.get_mut(&node_id) {
            state.in_flight = None;
        }
        self.report.in_flight.retain(|n| n != &node_id);

        match result {
            Ok(outputs) => {
                let resolved = self
                    .states
                    .get_mut(&node_id)
                    .and_then(|s| s.pending_inputs.take())
                    .unwrap_or_default();
                self.complete_node(&node_id, outputs, resolved);
            }
            Err(err) => {
                if let Some(state) = self.states.get_mut(&node_id) {
                    state.pending_inputs = None;
                }
                self.fail_node(&node_id, &err.to_string());
            }
        }
    }

    /// Successful execution: store outputs, record the input fingerprint,
    /// clear dirty, announce completion.
    fn complete_node(
        &mut self,
        id: &NodeId,
        outputs: HashMap<String, Value>,
        resolved: HashMap<String, Value>,
    ) {
        let state = self.states.get_mut(id).expect("known node");
        state.cache = outputs;
        state.last_inputs = Some(resolved);
        state.dirty = false;
        state.status = "Complete".to_string();
        let outputs = state.cache.clone();

        let emitter = self.events.emitter(self.run_id, self.generation, id.clone());
        emitter.status("Complete");
        emitter.outputs_ready(outputs);

        self.run_executed.insert(id.clone());
        self.report.executed.push(id.clone());
        tracing::debug!(node = %id, "node complete");
    }

    /// Failed execution: keep dirty set so the next run retries, record
    /// the reason in the status, and continue the run for independent
    /// branches.
    fn fail_node(&mut self, id: &NodeId, reason: &str) {
        tracing::error!(node = %id, error = reason, "node failed");
        if let Some(state) = self.states.get_mut(id) {
            state.dirty = true;
            state.status = format!("Error: {}", reason);
        }
        self.events
            .emitter(self.run_id, self.generation, id.clone())
            .status(format!("Error: {}", reason));
        self.run_failed.insert(id.clone());
        self.report.failed.push(id.clone());
    }

    fn set_status(&mut self, id: &NodeId, status: impl Into<String>) {
        let status = status.into();
        if let Some(state) = self.states.get_mut(id) {
            state.status = status.clone();
        }
        self.events
            .emitter(self.run_id, self.generation, id.clone())
            .status(status);
    }

    /// Resolved inputs for a node: the configured literal (or declared
    /// default) for each slot, overridden by the upstream cache entry
    /// wherever a connection is bound.
    fn resolve_inputs(&self, id: &NodeId) -> HashMap<String, Value> {
        let spec = &self.workflow.nodes[id];
        let slot = &self.slots[id];
        let mut inputs = HashMap::new();

        for port in &slot.ports.inputs {
            if port.binding == InputBinding::BindOnly {
                continue;
            }
            if let Some(value) = spec.properties.get(&port.name) {
                inputs.insert(port.name.clone(), value.clone());
            } else if let Some(default) = &port.default {
                inputs.insert(port.name.clone(), default.clone());
            }
        }

        for conn in self.workflow.incoming(id) {
            if let Some(state) = self.states.get(conn.from.node()) {
                if let Some(value) = state.cache.get(conn.from.slot()) {
                    inputs.insert(conn.to.slot().to_string(), value.clone());
                }
            }
        }

        inputs
    }

    /// Mark a node dirty and cascade through its OnInputChange dependents.
    /// The cascade stops at TrustCache nodes: their output cannot change
    /// until they are reset, so nothing past them is affected.
    fn mark_dirty(&mut self, id: &str) {
        let mut queue: VecDeque<NodeId> = VecDeque::from([id.to_string()]);
        let mut seen: HashSet<NodeId> = HashSet::new();

        while let Some(current) = queue.pop_front() {
            if !seen.insert(current.clone()) {
                continue;
            }
            let policy = match self.slots.get(&current) {
                Some(slot) => slot.policy,
                None => continue,
            };
            if current != id && policy != RecalcPolicy::OnInputChange {
                continue;
            }
            if let Some(state) = self.states.get_mut(&current) {
                if !state.dirty {
                    state.dirty = true;
                    state.status = "Idle".to_string();
                }
            }
            let downstream: Vec<NodeId> = self
                .workflow
                .outgoing(&current)
                .map(|c| c.to.node().clone())
                .collect();
            queue.extend(downstream);
        }
    }
}

/// Check every connection against the port declarations: endpoints must
/// exist, the input must accept connections, and each input slot takes at
/// most one incoming edge.
fn validate_connections(
    workflow: &Workflow,
    slots: &HashMap<NodeId, NodeSlot>,
) -> Result<(), GraphError> {
    let mut bound: HashSet<(&NodeId, &str)> = HashSet::new();

    for conn in &workflow.connections {
        let from = slots
            .get(conn.from.node())
            .ok_or_else(|| GraphError::NodeNotFound(conn.from.node().clone()))?;
        if !from.ports.has_output(conn.from.slot()) {
            return Err(GraphError::UnknownPort {
                node: conn.from.node().clone(),
                port: conn.from.slot().to_string(),
            });
        }

        let to = slots
            .get(conn.to.node())
            .ok_or_else(|| GraphError::NodeNotFound(conn.to.node().clone()))?;
        let port = to
            .ports
            .input(conn.to.slot())
            .ok_or_else(|| GraphError::UnknownPort {
                node: conn.to.node().clone(),
                port: conn.to.slot().to_string(),
            })?;
        if port.binding == InputBinding::LiteralOnly {
            return Err(GraphError::InvalidConnection(format!(
                "input '{}.{}' does not accept connections",
                conn.to.node(),
                conn.to.slot()
            )));
        }

        if !bound.insert((conn.to.node(), conn.to.slot())) {
            return Err(GraphError::InputAlreadyBound {
                node: conn.to.node().clone(),
                port: conn.to.slot().to_string(),
            });
        }
    }

    Ok(())
}
