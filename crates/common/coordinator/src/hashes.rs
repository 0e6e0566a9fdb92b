use alloy_primitives::{Address, B256};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use weisyn_codec::{sha256, to_canonical_json};
use weisyn_types::{
    timestamp::ClockTimestamp,
    trace::{ExecutionTrace, HostFunctionCall, StateChange},
};

#[derive(Serialize)]
struct TraceMetadata<'a> {
    trace_id: &'a str,
    start_unix: u64,
    end_unix: u64,
    duration_ns: u64,
    execution_path: &'a [String],
}

#[derive(Serialize)]
struct ResultPayload<'a, T: Serialize> {
    return_value: &'a T,
    trace: TraceMetadata<'a>,
    host_function_calls: Vec<HostFunctionCall>,
    state_changes: Vec<StateChange>,
    /// Deterministic payload timestamp: the execution's start in unix
    /// seconds, never the wall clock.
    timestamp: u64,
}

/// SHA-256 over the canonical JSON of the result payload. Host calls and
/// state changes enter through their stable sort orders, so the hash is
/// invariant under recording order.
pub fn execution_result_hash<T: Serialize>(
    trace: &ExecutionTrace,
    return_value: &T,
) -> anyhow::Result<B256> {
    let payload = ResultPayload {
        return_value,
        trace: TraceMetadata {
            trace_id: &trace.trace_id,
            start_unix: trace.start_time.unix_seconds(),
            end_unix: trace.end_time.unix_seconds(),
            duration_ns: trace.duration_nanos(),
            execution_path: &trace.execution_path,
        },
        host_function_calls: trace.sorted_host_function_calls(),
        state_changes: trace.sorted_state_changes(),
        timestamp: trace.start_time.unix_seconds(),
    };
    Ok(sha256(&to_canonical_json(&payload)?))
}

fn state_side_hash(
    changes: &[StateChange],
    pick: impl Fn(&StateChange) -> Option<&Value>,
) -> anyhow::Result<Option<B256>> {
    let mut hasher = Sha256::new();
    let mut any_value = false;
    for change in changes {
        if let Some(value) = pick(change) {
            hasher.update(change.key.as_bytes());
            hasher.update(to_canonical_json(value)?);
            any_value = true;
        }
    }
    Ok(any_value.then(|| B256::from_slice(&hasher.finalize())))
}

/// State-before and state-after hashes over the sorted state changes:
/// SHA-256 of the concatenated `key ‖ json(value)` pairs for old and new
/// values respectively. An execution without state values yields `None`.
pub fn state_hashes(trace: &ExecutionTrace) -> anyhow::Result<(Option<B256>, Option<B256>)> {
    let sorted = trace.sorted_state_changes();
    let before = state_side_hash(&sorted, |change| change.old_value.as_ref())?;
    let after = state_side_hash(&sorted, |change| change.new_value.as_ref())?;
    Ok((before, after))
}

/// Fields that feed the deterministic state id, whichever are present on
/// the execution carrier.
pub struct StateIdSource<'a> {
    pub contract_address: Option<Address>,
    pub model_hash: Option<&'a [u8]>,
    pub function_name: Option<&'a str>,
    pub start: ClockTimestamp,
    pub params_count: u32,
}

/// SHA-256 over the concatenation of the present identity fields, the
/// start time as 8 big-endian bytes, and the parameter count as 4
/// big-endian bytes.
pub fn derive_state_id(source: &StateIdSource<'_>) -> B256 {
    let mut hasher = Sha256::new();
    if let Some(address) = source.contract_address {
        hasher.update(address.as_slice());
    }
    if let Some(model_hash) = source.model_hash {
        hasher.update(model_hash);
    }
    if let Some(function_name) = source.function_name {
        hasher.update(function_name.as_bytes());
    }
    hasher.update(source.start.unix_nanos().to_be_bytes());
    hasher.update(source.params_count.to_be_bytes());
    B256::from_slice(&hasher.finalize())
}
