use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use weisyn_types::tensor::{TensorInput, TensorOutput};

use crate::engine_trait::{EngineContext, EngineManager};

type ExecutionHook = Box<dyn Fn(&EngineContext) + Send + Sync>;

/// Scriptable engine used by coordinator and integration tests.
///
/// Results are queued per call; an empty queue yields empty return values.
/// A hook can mutate the execution context mid-call to simulate host-ABI
/// traffic and state changes.
#[derive(Default)]
pub struct MockEngineManager {
    wasm_results: Mutex<VecDeque<anyhow::Result<Vec<u64>>>>,
    onnx_results: Mutex<VecDeque<anyhow::Result<Vec<TensorOutput>>>>,
    on_execute: Mutex<Option<ExecutionHook>>,
    panic_next: Mutex<bool>,
    delay: Mutex<Option<std::time::Duration>>,
    invocations: AtomicU64,
}

impl MockEngineManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_wasm_result(&self, values: Vec<u64>) {
        self.wasm_results.lock().push_back(Ok(values));
    }

    pub fn queue_wasm_error(&self, message: &str) {
        self.wasm_results
            .lock()
            .push_back(Err(anyhow::anyhow!(message.to_string())));
    }

    pub fn queue_onnx_result(&self, outputs: Vec<TensorOutput>) {
        self.onnx_results.lock().push_back(Ok(outputs));
    }

    pub fn queue_onnx_error(&self, message: &str) {
        self.onnx_results
            .lock()
            .push_back(Err(anyhow::anyhow!(message.to_string())));
    }

    /// Run `hook` against the engine context during the next executions.
    pub fn set_execution_hook(&self, hook: impl Fn(&EngineContext) + Send + Sync + 'static) {
        *self.on_execute.lock() = Some(Box::new(hook));
    }

    /// The next execution panics, for exercising the coordinator's panic
    /// recovery.
    pub fn panic_on_next_execution(&self) {
        *self.panic_next.lock() = true;
    }

    /// Stall every execution, for exercising the coordinator's deadline.
    pub fn set_delay(&self, delay: std::time::Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::SeqCst)
    }

    fn common_execute(&self, engine_context: &EngineContext) {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        if std::mem::take(&mut *self.panic_next.lock()) {
            panic!("mock engine panic requested");
        }
        if let Some(hook) = self.on_execute.lock().as_ref() {
            hook(engine_context);
        }
    }
}

#[async_trait]
impl EngineManager for MockEngineManager {
    async fn execute_wasm(
        &self,
        engine_context: &EngineContext,
        _contract_hash: &[u8],
        _method_name: &str,
        _params: &[u64],
    ) -> anyhow::Result<Vec<u64>> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.common_execute(engine_context);
        self.wasm_results
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn execute_onnx(
        &self,
        engine_context: &EngineContext,
        _model_hash: &[u8],
        _inputs: &[TensorInput],
    ) -> anyhow::Result<Vec<TensorOutput>> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.common_execute(engine_context);
        self.onnx_results
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn shutdown(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use weisyn_context::{ContextManagerConfig, ContextParams, ExecutionContextManager, InitParams};
    use weisyn_types::timestamp::ClockTimestamp;

    use super::*;

    fn engine_context() -> EngineContext {
        let manager = ExecutionContextManager::new(ContextManagerConfig::default());
        let context = manager
            .create_context(ContextParams {
                execution_id: "exec_test".to_string(),
                caller_address: vec![0x10; 20],
                contract_address: None,
                model_hash: None,
                init_params: InitParams::Absent,
                execution_start: ClockTimestamp::from_unix_seconds(1_700_000_000),
                transaction_draft: None,
            })
            .unwrap();
        EngineContext {
            trace_id: "trace_test".to_string(),
            deadline: Duration::from_secs(30),
            execution_context: context,
        }
    }

    #[tokio::test]
    async fn test_queued_results_are_returned_in_order() {
        let engine = MockEngineManager::new();
        engine.queue_wasm_result(vec![1, 2]);
        engine.queue_wasm_error("boom");

        let context = engine_context();
        let first = engine
            .execute_wasm(&context, &[1], "run", &[])
            .await
            .unwrap();
        assert_eq!(first, vec![1, 2]);
        assert!(engine.execute_wasm(&context, &[1], "run", &[]).await.is_err());
        assert_eq!(engine.invocations(), 2);
    }

    #[tokio::test]
    async fn test_empty_queue_returns_empty_values() {
        let engine = MockEngineManager::new();
        let context = engine_context();
        let values = engine
            .execute_wasm(&context, &[1], "noop", &[])
            .await
            .unwrap();
        assert!(values.is_empty());
    }
}
