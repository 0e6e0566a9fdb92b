use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use weisyn_context::ExecutionContext;
use weisyn_types::tensor::{TensorInput, TensorOutput};

/// Isolated per-invocation engine context.
///
/// Carries the trace id and deadline forward and exposes the execution
/// context so the engine can reach the host ABI. Cancellation from the
/// outer caller is deliberately not part of this value; once the engine
/// runs, it runs to its own deadline.
#[derive(Clone)]
pub struct EngineContext {
    pub trace_id: String,
    pub deadline: Duration,
    pub execution_context: Arc<ExecutionContext>,
}

/// The execution engines consumed by the coordinator. Implementations run
/// the business logic exactly once per call and report a single logical
/// result, even if they parallelize internally.
#[async_trait]
pub trait EngineManager: Send + Sync {
    async fn execute_wasm(
        &self,
        engine_context: &EngineContext,
        contract_hash: &[u8],
        method_name: &str,
        params: &[u64],
    ) -> anyhow::Result<Vec<u64>>;

    async fn execute_onnx(
        &self,
        engine_context: &EngineContext,
        model_hash: &[u8],
        inputs: &[TensorInput],
    ) -> anyhow::Result<Vec<TensorOutput>>;

    async fn shutdown(&self) -> anyhow::Result<()>;
}
