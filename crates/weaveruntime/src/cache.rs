use std::collections::HashMap;
use weavecore::{RecalcPolicy, Value};

/// Per-node execution state tracked across runs: the output-cache memo,
/// the dirty flag, and the bookkeeping that serializes async completions.
#[derive(Debug, Clone)]
pub struct NodeRunState {
    /// True when cached outputs no longer reflect current inputs or
    /// configuration. Cleared only by successful execution.
    pub dirty: bool,

    /// Last produced outputs; empty before the first successful execution.
    pub cache: HashMap<String, Value>,

    /// Resolved inputs that produced the current cache, compared by value
    /// equality under `OnInputChange`.
    pub last_inputs: Option<HashMap<String, Value>>,

    /// Resolved inputs captured at async launch; promoted to `last_inputs`
    /// when the matching completion is applied.
    pub pending_inputs: Option<HashMap<String, Value>>,

    /// Human-readable state ("Idle", "Processing...", "Complete",
    /// "Error: ...", "Blocked: ...").
    pub status: String,

    /// Generation of the outstanding background task, if any. At most one
    /// task is outstanding per node; a completion is applied only if its
    /// generation matches this marker and the current run.
    pub in_flight: Option<u64>,
}

impl NodeRunState {
    /// Fresh state, optionally seeded with cached outputs loaded from a
    /// persisted workflow. Seeded or not, the node starts dirty; the
    /// first run re-evaluates staleness from resolved inputs.
    pub fn new(seed_cache: HashMap<String, Value>) -> Self {
        Self {
            dirty: true,
            cache: seed_cache,
            last_inputs: None,
            pending_inputs: None,
            status: "Idle".to_string(),
            in_flight: None,
        }
    }

    /// Back to the post-reset state: dirty, empty cache, idle status.
    /// Leaves `in_flight` alone: an outstanding task still owes a
    /// completion, which the executor drains and discards.
    pub fn reset(&mut self) {
        self.dirty = true;
        self.cache.clear();
        self.last_inputs = None;
        self.pending_inputs = None;
        self.status = "Idle".to_string();
    }
}

/// Decide whether a node must execute this run.
///
/// - `Always`: execute on every run, overwrite the cache unconditionally.
/// - `TrustCache`: skip whenever the cache is non-empty and the dirty flag
///   is clear; only an explicit reset (or a first run) triggers execution.
/// - `OnInputChange`: execute when the cache is empty, the dirty flag is
///   set, or the resolved inputs differ by value from the fingerprint that
///   produced the cache.
pub fn is_stale(
    policy: RecalcPolicy,
    state: &NodeRunState,
    resolved_inputs: &HashMap<String, Value>,
) -> bool {
    match policy {
        RecalcPolicy::Always => true,
        RecalcPolicy::TrustCache => state.cache.is_empty() || state.dirty,
        RecalcPolicy::OnInputChange => {
            if state.cache.is_empty() || state.dirty {
                return true;
            }
            match &state.last_inputs {
                Some(last) => last != resolved_inputs,
                None => true,
            }
        }
    }
}
