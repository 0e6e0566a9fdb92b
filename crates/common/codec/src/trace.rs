use weisyn_types::trace::{ExecutionTrace, StateChange};

fn put_bytes(buffer: &mut Vec<u8>, bytes: &[u8]) {
    buffer.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    buffer.extend_from_slice(bytes);
}

/// Deterministic binary encoding of a trace, used as the pre-hashed private
/// input to the proving layer.
///
/// Layout: `trace_id` bytes, `start` and `end` as unix seconds (u64 BE),
/// host-call count, state-change count and execution-path count (u32 BE),
/// then each path element as `(len u32 BE, bytes)`.
pub fn encode_trace(trace: &ExecutionTrace) -> Vec<u8> {
    let mut buffer = Vec::new();
    buffer.extend_from_slice(trace.trace_id.as_bytes());
    buffer.extend_from_slice(&trace.start_time.unix_seconds().to_be_bytes());
    buffer.extend_from_slice(&trace.end_time.unix_seconds().to_be_bytes());
    buffer.extend_from_slice(&(trace.host_function_calls.len() as u32).to_be_bytes());
    buffer.extend_from_slice(&(trace.state_changes.len() as u32).to_be_bytes());
    buffer.extend_from_slice(&(trace.execution_path.len() as u32).to_be_bytes());
    for element in &trace.execution_path {
        put_bytes(&mut buffer, element.as_bytes());
    }
    buffer
}

/// Deterministic binary encoding of the state-change set.
///
/// Changes are sorted by `(change_type, key)` before encoding. Values are
/// represented by presence flags only; their content is already bound by
/// the state-before/after hashes.
pub fn encode_state_changes(changes: &[StateChange]) -> Vec<u8> {
    let mut sorted: Vec<&StateChange> = changes.iter().collect();
    sorted.sort_by(|a, b| {
        (&a.change_type, &a.key, a.timestamp).cmp(&(&b.change_type, &b.key, b.timestamp))
    });

    let mut buffer = Vec::new();
    buffer.extend_from_slice(&(sorted.len() as u32).to_be_bytes());
    for change in sorted {
        put_bytes(&mut buffer, change.change_type.as_bytes());
        put_bytes(&mut buffer, change.key.as_bytes());
        buffer.extend_from_slice(&change.timestamp.unix_seconds().to_be_bytes());
        buffer.push(change.old_value.is_some() as u8);
        buffer.push(change.new_value.is_some() as u8);
    }
    buffer
}
