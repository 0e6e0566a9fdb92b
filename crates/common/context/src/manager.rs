use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::Address;
use parking_lot::RwLock;
use tracing::debug;
use weisyn_metrics::observe_active_contexts;
use weisyn_types::{timestamp::ClockTimestamp, transaction::TransactionDraft};

use crate::{
    context::{ExecutionContext, InitParams},
    errors::ContextError,
};

#[derive(Debug, Clone)]
pub struct ContextManagerConfig {
    /// Base timestamp the manager derives execution start times from when
    /// the caller does not supply one.
    pub clock_base: ClockTimestamp,
    /// Gap between start times of consecutive executions.
    pub execution_spacing: Duration,
    /// Tick granularity of each context's private clock.
    pub tick_interval: Duration,
    /// Whether trace recorders buffer writes until flushed.
    pub buffered_traces: bool,
}

impl Default for ContextManagerConfig {
    fn default() -> Self {
        Self {
            clock_base: ClockTimestamp::from_unix_seconds(1_700_000_000),
            execution_spacing: Duration::from_secs(1),
            tick_interval: Duration::from_micros(1),
            buffered_traces: false,
        }
    }
}

/// Everything needed to open a context for one execution.
pub struct ContextParams {
    pub execution_id: String,
    pub caller_address: Vec<u8>,
    pub contract_address: Option<Address>,
    pub model_hash: Option<Vec<u8>>,
    pub init_params: InitParams,
    pub execution_start: ClockTimestamp,
    pub transaction_draft: Option<TransactionDraft>,
}

/// Creates and tracks execution contexts. Contexts are isolated; the
/// registry exists for lifecycle bookkeeping and memory reporting.
pub struct ExecutionContextManager {
    active: RwLock<HashMap<String, Arc<ExecutionContext>>>,
    execution_counter: AtomicU64,
    config: ContextManagerConfig,
}

impl ExecutionContextManager {
    pub fn new(config: ContextManagerConfig) -> Self {
        Self {
            active: RwLock::new(HashMap::new()),
            execution_counter: AtomicU64::new(0),
            config,
        }
    }

    /// Deterministic start time for the next execution: the configured base
    /// advanced by the per-process execution counter.
    pub fn next_start_time(&self) -> ClockTimestamp {
        let index = self.execution_counter.fetch_add(1, Ordering::SeqCst);
        let offset_nanos = self.config.execution_spacing.as_nanos() as u64 * index;
        ClockTimestamp::from_unix_nanos(self.config.clock_base.unix_nanos() + offset_nanos)
    }

    pub fn create_context(
        &self,
        params: ContextParams,
    ) -> Result<Arc<ExecutionContext>, ContextError> {
        let mut active = self.active.write();
        if active.contains_key(&params.execution_id) {
            return Err(ContextError::DuplicateExecutionId(params.execution_id));
        }

        let context = Arc::new(ExecutionContext::new(
            params.execution_id.clone(),
            params.caller_address,
            params.contract_address,
            params.model_hash,
            params.init_params,
            params.execution_start,
            self.config.tick_interval,
            self.config.buffered_traces,
            params.transaction_draft,
        ));
        active.insert(params.execution_id, context.clone());
        observe_active_contexts(active.len() as i64);
        Ok(context)
    }

    /// Remove a context from the registry. Idempotent: destroying an
    /// unknown or already-destroyed id succeeds without effect, so cleanup
    /// paths can call it unconditionally.
    pub fn destroy_context(&self, execution_id: &str) {
        let mut active = self.active.write();
        if active.remove(execution_id).is_some() {
            debug!(%execution_id, "execution context destroyed");
        }
        observe_active_contexts(active.len() as i64);
    }

    pub fn get_context(&self, execution_id: &str) -> Option<Arc<ExecutionContext>> {
        self.active.read().get(execution_id).cloned()
    }

    pub fn active_count(&self) -> usize {
        self.active.read().len()
    }
}

impl Default for ExecutionContextManager {
    fn default() -> Self {
        Self::new(ContextManagerConfig::default())
    }
}
