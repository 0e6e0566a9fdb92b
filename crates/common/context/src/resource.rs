use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::errors::ContextError;

/// Finalized resource usage for one execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceUsage {
    pub execution_time_ms: u64,
    pub peak_memory_bytes: u64,
    pub trace_size_bytes: u64,
    pub host_function_calls: u64,
    pub utxo_queries: u64,
    pub resource_queries: u64,
    pub state_changes: u64,
}

/// Live counters, finalized exactly once on teardown.
#[derive(Debug, Default)]
pub struct ResourceTracker {
    peak_memory_bytes: AtomicU64,
    trace_size_bytes: AtomicU64,
    host_function_calls: AtomicU64,
    utxo_queries: AtomicU64,
    resource_queries: AtomicU64,
    state_changes: AtomicU64,
    finalized: AtomicBool,
}

impl ResourceTracker {
    pub fn record_host_function_call(&self) {
        self.host_function_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_utxo_query(&self) {
        self.utxo_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_resource_query(&self) {
        self.resource_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_state_change(&self) {
        self.state_changes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_trace_bytes(&self, bytes: u64) {
        self.trace_size_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn observe_memory(&self, bytes: u64) {
        self.peak_memory_bytes.fetch_max(bytes, Ordering::Relaxed);
    }

    pub fn snapshot(&self, execution_time_ms: u64) -> ResourceUsage {
        ResourceUsage {
            execution_time_ms,
            peak_memory_bytes: self.peak_memory_bytes.load(Ordering::Relaxed),
            trace_size_bytes: self.trace_size_bytes.load(Ordering::Relaxed),
            host_function_calls: self.host_function_calls.load(Ordering::Relaxed),
            utxo_queries: self.utxo_queries.load(Ordering::Relaxed),
            resource_queries: self.resource_queries.load(Ordering::Relaxed),
            state_changes: self.state_changes.load(Ordering::Relaxed),
        }
    }

    /// Freeze the counters. Errors on the second call; usage must be read
    /// only after finalization.
    pub fn finalize(&self, execution_time_ms: u64) -> Result<ResourceUsage, ContextError> {
        if self.finalized.swap(true, Ordering::SeqCst) {
            return Err(ContextError::AlreadyFinalized);
        }
        Ok(self.snapshot(execution_time_ms))
    }
}

/// Optional per-execution ceilings checked by the coordinator after the
/// usage is finalized.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceLimits {
    pub max_execution_time_ms: Option<u64>,
    pub max_memory_bytes: Option<u64>,
    pub max_host_function_calls: Option<u64>,
    pub max_state_changes: Option<u64>,
}

impl ResourceLimits {
    /// First exceeded limit as `(resource name, limit)`, if any.
    pub fn first_exceeded(&self, usage: &ResourceUsage) -> Option<(&'static str, u64)> {
        let checks = [
            ("execution_time_ms", self.max_execution_time_ms, usage.execution_time_ms),
            ("memory_bytes", self.max_memory_bytes, usage.peak_memory_bytes),
            (
                "host_function_calls",
                self.max_host_function_calls,
                usage.host_function_calls,
            ),
            ("state_changes", self.max_state_changes, usage.state_changes),
        ];
        checks.into_iter().find_map(|(name, limit, used)| {
            limit.filter(|limit| used > *limit).map(|limit| (name, limit))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finalize_is_once_only() {
        let tracker = ResourceTracker::default();
        tracker.record_host_function_call();
        let usage = tracker.finalize(12).unwrap();
        assert_eq!(usage.host_function_calls, 1);
        assert_eq!(usage.execution_time_ms, 12);
        assert_eq!(tracker.finalize(12), Err(ContextError::AlreadyFinalized));
    }

    #[test]
    fn test_limits_report_first_exceeded() {
        let limits = ResourceLimits {
            max_host_function_calls: Some(2),
            ..Default::default()
        };
        let usage = ResourceUsage {
            host_function_calls: 3,
            ..Default::default()
        };
        assert_eq!(limits.first_exceeded(&usage), Some(("host_function_calls", 2)));

        let within = ResourceUsage {
            host_function_calls: 2,
            ..Default::default()
        };
        assert_eq!(limits.first_exceeded(&within), None);
    }

    #[test]
    fn test_peak_memory_keeps_maximum() {
        let tracker = ResourceTracker::default();
        tracker.observe_memory(100);
        tracker.observe_memory(50);
        assert_eq!(tracker.snapshot(0).peak_memory_bytes, 100);
    }
}
