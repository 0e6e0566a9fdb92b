use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, B256};
use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use weisyn_types::{
    event::Event,
    timestamp::ClockTimestamp,
    trace::{ExecutionTrace, HostFunctionCall, OracleInteraction, StateChange},
    transaction::TransactionDraft,
};

use crate::{clock::DeterministicClock, resource::ResourceTracker};

/// Initialization parameters with the `nil | empty | payload` tri-state
/// kept explicit, because the three cases hash differently downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitParams {
    Absent,
    Empty,
    Payload(Vec<u8>),
}

impl InitParams {
    pub fn from_option(params: Option<Vec<u8>>) -> Self {
        match params {
            None => InitParams::Absent,
            Some(bytes) if bytes.is_empty() => InitParams::Empty,
            Some(bytes) => InitParams::Payload(bytes),
        }
    }

    /// Bytes fed to the input-data hash: absent parameters normalize to the
    /// literal `"[]"`, empty parameters to the empty byte string.
    pub fn hash_input(&self) -> &[u8] {
        match self {
            InitParams::Absent => b"[]",
            InitParams::Empty => b"",
            InitParams::Payload(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            InitParams::Payload(bytes) => bytes.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        !matches!(self, InitParams::Payload(_))
    }
}

/// Host-ABI handler installed before engine execution.
pub type HostFunction =
    Arc<dyn Fn(Value) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

struct TraceState {
    trace: ExecutionTrace,
    pending_calls: Vec<HostFunctionCall>,
    pending_changes: Vec<StateChange>,
    buffered: bool,
}

/// Per-execution isolation unit.
///
/// Owns the deterministic clock, the trace recorder, the resource counters
/// and the optional transaction-draft handle. Created per call and
/// destroyed exactly once on every exit path.
pub struct ExecutionContext {
    execution_id: String,
    caller_address: Vec<u8>,
    contract_address: Option<Address>,
    model_hash: Option<Vec<u8>>,
    init_params: InitParams,
    clock: DeterministicClock,
    trace: Mutex<TraceState>,
    return_data: Mutex<Option<Vec<u8>>>,
    events: Mutex<Vec<Event>>,
    draft: Mutex<Option<TransactionDraft>>,
    state_before_hash: Mutex<Option<B256>>,
    state_after_hash: Mutex<Option<B256>>,
    host_functions: RwLock<HashMap<String, HostFunction>>,
    resources: ResourceTracker,
}

impl ExecutionContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        execution_id: String,
        caller_address: Vec<u8>,
        contract_address: Option<Address>,
        model_hash: Option<Vec<u8>>,
        init_params: InitParams,
        execution_start: ClockTimestamp,
        tick_interval: Duration,
        buffered_trace: bool,
        draft: Option<TransactionDraft>,
    ) -> Self {
        let trace = ExecutionTrace::new(execution_start);
        Self {
            execution_id,
            caller_address,
            contract_address,
            model_hash,
            init_params,
            clock: DeterministicClock::new(execution_start, tick_interval),
            trace: Mutex::new(TraceState {
                trace,
                pending_calls: Vec::new(),
                pending_changes: Vec::new(),
                buffered: buffered_trace,
            }),
            return_data: Mutex::new(None),
            events: Mutex::new(Vec::new()),
            draft: Mutex::new(draft),
            state_before_hash: Mutex::new(None),
            state_after_hash: Mutex::new(None),
            host_functions: RwLock::new(HashMap::new()),
            resources: ResourceTracker::default(),
        }
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    pub fn caller_address(&self) -> &[u8] {
        &self.caller_address
    }

    pub fn contract_address(&self) -> Option<Address> {
        self.contract_address
    }

    pub fn model_hash(&self) -> Option<&[u8]> {
        self.model_hash.as_deref()
    }

    pub fn init_params(&self) -> &InitParams {
        &self.init_params
    }

    pub fn clock(&self) -> &DeterministicClock {
        &self.clock
    }

    pub fn execution_start(&self) -> ClockTimestamp {
        self.clock.execution_start()
    }

    pub fn resources(&self) -> &ResourceTracker {
        &self.resources
    }

    // ---- trace recording ----

    pub fn record_host_function_call(&self, call: HostFunctionCall) {
        self.resources.record_host_function_call();
        self.resources
            .add_trace_bytes((call.name.len() + 64) as u64);
        let mut state = self.trace.lock();
        if state.buffered {
            state.pending_calls.push(call);
        } else {
            state.trace.host_function_calls.push(call);
        }
    }

    pub fn append_state_change(&self, change: StateChange) {
        self.resources.record_state_change();
        self.resources
            .add_trace_bytes((change.key.len() + 64) as u64);
        let mut state = self.trace.lock();
        if state.buffered {
            state.pending_changes.push(change);
        } else {
            state.trace.state_changes.push(change);
        }
    }

    pub fn push_execution_path(&self, step: impl Into<String>) {
        self.trace.lock().trace.execution_path.push(step.into());
    }

    pub fn record_oracle_interaction(&self, interaction: OracleInteraction) {
        self.trace.lock().trace.oracle_interactions.push(interaction);
    }

    /// Drain buffered trace writes into the trace proper. Called by the
    /// coordinator immediately after the engine returns; a no-op when the
    /// recorder is unbuffered.
    pub fn flush_trace_queue(&self) {
        let mut state = self.trace.lock();
        let pending_calls = std::mem::take(&mut state.pending_calls);
        let pending_changes = std::mem::take(&mut state.pending_changes);
        state.trace.host_function_calls.extend(pending_calls);
        state.trace.state_changes.extend(pending_changes);
    }

    /// Snapshot the trace with its end time taken from the deterministic
    /// clock. An execution that recorded nothing yields a zero-duration
    /// trace.
    pub fn execution_trace(&self) -> ExecutionTrace {
        self.flush_trace_queue();
        let mut state = self.trace.lock();
        let has_records = !state.trace.host_function_calls.is_empty()
            || !state.trace.state_changes.is_empty()
            || !state.trace.oracle_interactions.is_empty()
            || !state.trace.execution_path.is_empty();
        if has_records {
            state.trace.end_time = self.clock.now();
        }
        state.trace.clone()
    }

    // ---- business data ----

    pub fn set_return_data(&self, data: Vec<u8>) {
        *self.return_data.lock() = Some(data);
    }

    pub fn return_data(&self) -> Option<Vec<u8>> {
        self.return_data.lock().clone()
    }

    pub fn add_event(&self, event: Event) {
        self.events.lock().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn set_state_hashes(&self, before: Option<B256>, after: Option<B256>) {
        *self.state_before_hash.lock() = before;
        *self.state_after_hash.lock() = after;
    }

    pub fn state_before_hash(&self) -> Option<B256> {
        *self.state_before_hash.lock()
    }

    pub fn state_after_hash(&self) -> Option<B256> {
        *self.state_after_hash.lock()
    }

    // ---- transaction draft ----

    pub fn take_draft(&self) -> Option<TransactionDraft> {
        self.draft.lock().take()
    }

    pub fn put_draft(&self, draft: TransactionDraft) {
        *self.draft.lock() = Some(draft);
    }

    pub fn has_draft(&self) -> bool {
        self.draft.lock().is_some()
    }

    // ---- host ABI ----

    pub fn register_host_function(&self, name: impl Into<String>, function: HostFunction) {
        self.host_functions.write().insert(name.into(), function);
    }

    /// Invoke a registered host function, recording the call in the trace
    /// with a deterministic timestamp.
    pub async fn call_host_function(&self, name: &str, params: Value) -> anyhow::Result<Value> {
        let function = self
            .host_functions
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("host function {name} is not registered"))?;

        if name.contains("utxo") {
            self.resources.record_utxo_query();
        } else if name.contains("resource") {
            self.resources.record_resource_query();
        }

        let result = function(params.clone()).await;
        let recorded_result = match &result {
            Ok(value) => value.clone(),
            Err(error) => Value::String(format!("error: {error}")),
        };
        self.record_host_function_call(HostFunctionCall {
            name: name.to_string(),
            params,
            result: recorded_result,
            timestamp: self.clock.now(),
        });
        result
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn context(buffered: bool) -> ExecutionContext {
        ExecutionContext::new(
            "exec_1".to_string(),
            vec![0x10; 20],
            Some(Address::ZERO),
            None,
            InitParams::Absent,
            ClockTimestamp::from_unix_seconds(1_700_000_000),
            Duration::from_micros(1),
            buffered,
            None,
        )
    }

    #[test]
    fn test_init_params_tri_state() {
        assert_eq!(InitParams::from_option(None), InitParams::Absent);
        assert_eq!(InitParams::from_option(Some(vec![])), InitParams::Empty);
        assert_eq!(
            InitParams::from_option(Some(vec![1])),
            InitParams::Payload(vec![1])
        );
        assert_eq!(InitParams::Absent.hash_input(), b"[]");
        assert_eq!(InitParams::Empty.hash_input(), b"");
        assert_eq!(InitParams::Payload(vec![1]).hash_input(), &[1]);
    }

    #[test]
    fn test_buffered_records_appear_after_flush() {
        let context = context(true);
        context.append_state_change(StateChange {
            change_type: "set".to_string(),
            key: "k".to_string(),
            old_value: None,
            new_value: Some(json!(1)),
            timestamp: context.clock().now(),
        });

        assert!(context.trace.lock().trace.state_changes.is_empty());
        context.flush_trace_queue();
        assert_eq!(context.trace.lock().trace.state_changes.len(), 1);
    }

    #[test]
    fn test_empty_trace_has_zero_duration() {
        let context = context(false);
        let trace = context.execution_trace();
        assert_eq!(trace.start_time, trace.end_time);
        assert!(trace.host_function_calls.is_empty());
    }

    #[tokio::test]
    async fn test_host_function_calls_are_traced() {
        let context = context(false);
        context.register_host_function(
            "get_utxo_set",
            Arc::new(
                |params| -> futures::future::BoxFuture<'static, anyhow::Result<Value>> {
                    Box::pin(async move { Ok(json!({ "echo": params })) })
                },
            ),
        );

        let result = context
            .call_host_function("get_utxo_set", json!([1, 2]))
            .await
            .unwrap();
        assert_eq!(result["echo"], json!([1, 2]));

        let trace = context.execution_trace();
        assert_eq!(trace.host_function_calls.len(), 1);
        assert_eq!(trace.host_function_calls[0].name, "get_utxo_set");
        assert_eq!(context.resources().snapshot(0).utxo_queries, 1);
    }

    #[tokio::test]
    async fn test_unregistered_host_function_errors() {
        let context = context(false);
        assert!(context
            .call_host_function("missing", json!(null))
            .await
            .is_err());
    }
}
