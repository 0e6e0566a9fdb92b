use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::timestamp::ClockTimestamp;

/// One host-ABI invocation made by the engine during an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostFunctionCall {
    pub name: String,
    pub params: Value,
    pub result: Value,
    pub timestamp: ClockTimestamp,
}

/// One state mutation observed during an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    pub change_type: String,
    pub key: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub timestamp: ClockTimestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleInteraction {
    pub oracle_id: String,
    pub request: Value,
    pub response: Value,
    pub timestamp: ClockTimestamp,
}

/// The canonical record of a single execution.
///
/// Records are appended in the order the engine produced them; hashing and
/// serialization re-sort copies without mutating the trace itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTrace {
    pub trace_id: String,
    pub start_time: ClockTimestamp,
    pub end_time: ClockTimestamp,
    pub host_function_calls: Vec<HostFunctionCall>,
    pub state_changes: Vec<StateChange>,
    pub oracle_interactions: Vec<OracleInteraction>,
    pub execution_path: Vec<String>,
}

impl ExecutionTrace {
    /// An empty trace anchored at `start`. The trace id is derived from the
    /// deterministic start time, never from the wall clock.
    pub fn new(start: ClockTimestamp) -> Self {
        Self {
            trace_id: format!("trace_{}", start.unix_nanos()),
            start_time: start,
            end_time: start,
            host_function_calls: Vec::new(),
            state_changes: Vec::new(),
            oracle_interactions: Vec::new(),
            execution_path: Vec::new(),
        }
    }

    /// Host calls sorted by `(name, timestamp)`, the stable order used for
    /// hashing.
    pub fn sorted_host_function_calls(&self) -> Vec<HostFunctionCall> {
        let mut calls = self.host_function_calls.clone();
        calls.sort_by(|a, b| (&a.name, a.timestamp).cmp(&(&b.name, b.timestamp)));
        calls
    }

    /// State changes sorted by `(change_type, key, timestamp)`, the stable
    /// order used for hashing.
    pub fn sorted_state_changes(&self) -> Vec<StateChange> {
        let mut changes = self.state_changes.clone();
        changes.sort_by(|a, b| {
            (&a.change_type, &a.key, a.timestamp).cmp(&(&b.change_type, &b.key, b.timestamp))
        });
        changes
    }

    pub fn duration_nanos(&self) -> u64 {
        self.end_time.duration_since(self.start_time).as_nanos() as u64
    }
}
