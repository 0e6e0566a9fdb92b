use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, B256, hex};
use anyhow::anyhow;
use tracing::debug;
use weisyn_codec::{contract_address, encode_state_changes, encode_trace, sha256};
use weisyn_context::{
    ContextParams, ExecutionContext, ExecutionContextManager, InitParams, ResourceLimits,
};
use weisyn_engine::{EngineContext, EngineManager};
use weisyn_host::{HostFunctionProvider, QueryService};
use weisyn_metrics::time_execution;
use weisyn_prover::{ZkProofInput, ZkProofManager, ZkProofTask, ZkTaskStats};
use weisyn_types::{
    execution_proof::{ExecutionContextInfo, ExecutionProof, ExecutionType, IdentityProof},
    execution_result::{OnnxExecutionResult, WasmExecutionResult},
    state_output::{
        METADATA_EXECUTION_NODE, METADATA_EXECUTION_TIME, METADATA_ZK_PROOF_STATUS,
        METADATA_ZK_PROOF_TASK_ID, StateOutput, ZkStateProof,
    },
    tensor::TensorInput,
    timestamp::ClockTimestamp,
    trace::ExecutionTrace,
    transaction::TransactionDraft,
};

use crate::{
    draft::append_execution_proof,
    errors::CoordinatorError,
    hashes::{StateIdSource, derive_state_id, execution_result_hash, state_hashes},
};

const CONTRACT_EXECUTION_CIRCUIT: &str = "contract_execution";
const MODEL_INFERENCE_CIRCUIT: &str = "aimodel_inference";
const DEFAULT_NODE_ID: &str = "weisyn-node";

/// Optional externally injected address derivation. Absent, the built-in
/// `RIPEMD160(SHA256(hash))` chain is used.
pub trait HashManager: Send + Sync {
    fn contract_address(&self, contract_hash: &[u8]) -> anyhow::Result<Address>;
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Node identifier written into state-output metadata. The `NODE_ID`
    /// and `WEISYN_NODE_ID` environment variables override it.
    pub node_id: Option<String>,
    pub resource_limits: ResourceLimits,
    pub wasm_timeout: Duration,
    pub onnx_timeout: Duration,
    pub log_resource_usage: bool,
    pub zk_task_priority: u8,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            node_id: None,
            resource_limits: ResourceLimits::default(),
            wasm_timeout: Duration::from_secs(30),
            onnx_timeout: Duration::from_secs(60),
            log_resource_usage: true,
            zk_task_priority: 0,
        }
    }
}

/// One contract-execution request.
pub struct ContractCall {
    pub contract_hash: Vec<u8>,
    pub method_name: String,
    pub params: Vec<u64>,
    /// `None`, `Some(vec![])` and `Some(payload)` are three distinct
    /// states and hash differently.
    pub init_params: Option<Vec<u8>>,
    pub caller_address: Vec<u8>,
    /// Deterministic start override; when absent the context manager's
    /// clock supplies the start time.
    pub execution_start: Option<ClockTimestamp>,
    pub transaction_draft: Option<TransactionDraft>,
}

/// One model-inference request.
pub struct ModelCall {
    pub model_hash: Vec<u8>,
    pub tensor_inputs: Vec<TensorInput>,
    pub caller_address: Vec<u8>,
    pub execution_start: Option<ClockTimestamp>,
    pub transaction_draft: Option<TransactionDraft>,
}

/// Destroys the context on every exit path, including unwinding.
struct ContextGuard {
    manager: Arc<ExecutionContextManager>,
    execution_id: String,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        self.manager.destroy_context(&self.execution_id);
    }
}

/// Drives a single contract or model execution end to end: context
/// creation, engine invocation, trace capture, hash derivation, proof
/// generation and state-output assembly.
pub struct ExecutionCoordinator {
    engine: Arc<dyn EngineManager>,
    zk_manager: Arc<ZkProofManager>,
    context_manager: Arc<ExecutionContextManager>,
    query_service: Option<Arc<dyn QueryService>>,
    host_provider: Option<HostFunctionProvider>,
    hash_manager: Option<Arc<dyn HashManager>>,
    config: CoordinatorConfig,
}

impl ExecutionCoordinator {
    pub fn new(
        engine: Arc<dyn EngineManager>,
        zk_manager: Arc<ZkProofManager>,
        context_manager: Arc<ExecutionContextManager>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            engine,
            zk_manager,
            context_manager,
            query_service: None,
            host_provider: None,
            hash_manager: None,
            config,
        }
    }

    pub fn with_query_service(mut self, query_service: Arc<dyn QueryService>) -> Self {
        self.host_provider = Some(HostFunctionProvider::new(query_service.clone()));
        self.query_service = Some(query_service);
        self
    }

    pub fn with_hash_manager(mut self, hash_manager: Arc<dyn HashManager>) -> Self {
        self.hash_manager = Some(hash_manager);
        self
    }

    pub fn node_id(&self) -> String {
        std::env::var("NODE_ID")
            .or_else(|_| std::env::var("WEISYN_NODE_ID"))
            .ok()
            .or_else(|| self.config.node_id.clone())
            .unwrap_or_else(|| DEFAULT_NODE_ID.to_string())
    }

    // ---- async proof plumbing ----

    pub fn enable_async_zk_proof(
        &self,
        workers: usize,
        min_workers: usize,
        max_workers: usize,
    ) -> Result<(), CoordinatorError> {
        self.zk_manager
            .enable_async(workers, min_workers, max_workers)
            .map_err(CoordinatorError::ProofManager)
    }

    pub fn disable_async_zk_proof(&self) {
        self.zk_manager.disable_async();
    }

    pub fn get_zk_proof_task(&self, task_id: &str) -> Option<ZkProofTask> {
        self.zk_manager.get_task(task_id)
    }

    pub fn get_zk_proof_task_stats(&self) -> ZkTaskStats {
        self.zk_manager.get_stats()
    }

    // ---- contract path ----

    pub async fn execute_contract(
        &self,
        call: ContractCall,
    ) -> Result<WasmExecutionResult, CoordinatorError> {
        if call.contract_hash.is_empty() {
            return Err(CoordinatorError::InvalidContractHash);
        }
        if call.method_name.is_empty() {
            return Err(CoordinatorError::InvalidFunctionName);
        }
        if call.caller_address.is_empty() {
            return Err(CoordinatorError::MissingCallerAddress);
        }

        let timer = time_execution("wasm");
        let result = self.execute_contract_inner(call).await;
        timer.observe_duration();
        result
    }

    async fn execute_contract_inner(
        &self,
        call: ContractCall,
    ) -> Result<WasmExecutionResult, CoordinatorError> {
        let start = call
            .execution_start
            .unwrap_or_else(|| self.context_manager.next_start_time());
        let execution_id = format!("exec_{}", start.unix_nanos());

        let resource_address = match &self.hash_manager {
            Some(manager) => manager
                .contract_address(&call.contract_hash)
                .map_err(CoordinatorError::ContextCreationFailed)?,
            None => contract_address(&call.contract_hash),
        };

        let context = self
            .context_manager
            .create_context(ContextParams {
                execution_id: execution_id.clone(),
                caller_address: call.caller_address.clone(),
                contract_address: Some(resource_address),
                model_hash: None,
                init_params: InitParams::from_option(call.init_params.clone()),
                execution_start: start,
                transaction_draft: call.transaction_draft.clone(),
            })
            .map_err(|error| CoordinatorError::ContextCreationFailed(error.into()))?;
        let _guard = ContextGuard {
            manager: self.context_manager.clone(),
            execution_id: execution_id.clone(),
        };

        if let Some(provider) = &self.host_provider {
            provider.register(&context);
        }

        let return_values = self
            .run_wasm_engine(&call, start, context.clone())
            .await?;

        context.flush_trace_queue();
        let trace = context.execution_trace();

        let (state_before, state_after) =
            state_hashes(&trace).map_err(CoordinatorError::ExecutionResultHashFailed)?;
        context.set_state_hashes(state_before, state_after);

        let result_hash = execution_result_hash(&trace, &return_values)
            .map_err(CoordinatorError::ExecutionResultHashFailed)?;

        let state_id = derive_state_id(&StateIdSource {
            contract_address: Some(resource_address),
            model_hash: None,
            function_name: Some(&call.method_name),
            start,
            params_count: call.params.len() as u32,
        });

        let (state_output, result_context) = self
            .assemble_state_output(
                &context,
                &trace,
                &execution_id,
                start,
                state_id,
                result_hash,
                state_before,
                state_after,
                CONTRACT_EXECUTION_CIRCUIT,
            )
            .await?;

        let return_data = context.return_data();
        let events = context.events();

        let transaction_draft = self
            .augment_draft(
                &context,
                &call.contract_hash,
                &trace,
                &state_output,
                ExecutionType::ContractCall,
            )
            .await?;

        self.finish_execution(&context, &trace)?;

        Ok(WasmExecutionResult {
            return_values,
            return_data,
            events,
            state_output,
            context: result_context,
            transaction_draft,
        })
    }

    async fn run_wasm_engine(
        &self,
        call: &ContractCall,
        start: ClockTimestamp,
        context: Arc<ExecutionContext>,
    ) -> Result<Vec<u64>, CoordinatorError> {
        let engine_context = EngineContext {
            trace_id: format!("trace_{}", start.unix_nanos()),
            deadline: self.config.wasm_timeout,
            execution_context: context,
        };

        let engine = self.engine.clone();
        let contract_hash = call.contract_hash.clone();
        let method_name = call.method_name.clone();
        let params = call.params.clone();
        // The engine runs in its own task so a panic inside it unwinds
        // there, not through the coordinator. Caller cancellation is not
        // forwarded; the deadline below is the only abort signal.
        let engine_task = tokio::spawn(async move {
            engine
                .execute_wasm(&engine_context, &contract_hash, &method_name, &params)
                .await
        });

        let contract_label = hex::encode(&call.contract_hash);
        match tokio::time::timeout(self.config.wasm_timeout, engine_task).await {
            Err(_) => Err(CoordinatorError::ExecutionTimeout {
                contract: contract_label,
                method: call.method_name.clone(),
                timeout: self.config.wasm_timeout,
            }),
            Ok(Err(join_error)) => {
                let cause = if join_error.is_panic() {
                    anyhow!("engine panicked during execution")
                } else {
                    anyhow!("engine task was cancelled")
                };
                Err(CoordinatorError::ExecutionFailed {
                    contract: contract_label,
                    method: call.method_name.clone(),
                    source: cause,
                })
            }
            Ok(Ok(Err(engine_error))) => Err(CoordinatorError::ExecutionFailed {
                contract: contract_label,
                method: call.method_name.clone(),
                source: engine_error,
            }),
            Ok(Ok(Ok(values))) => Ok(values),
        }
    }

    // ---- model path ----

    pub async fn execute_model(
        &self,
        call: ModelCall,
    ) -> Result<OnnxExecutionResult, CoordinatorError> {
        if call.model_hash.is_empty() {
            return Err(CoordinatorError::InvalidModelHash);
        }
        if call.tensor_inputs.is_empty() {
            return Err(CoordinatorError::InvalidInputTensors);
        }

        let timer = time_execution("onnx");
        let result = self.execute_model_inner(call).await;
        timer.observe_duration();
        result
    }

    async fn execute_model_inner(
        &self,
        call: ModelCall,
    ) -> Result<OnnxExecutionResult, CoordinatorError> {
        let start = call
            .execution_start
            .unwrap_or_else(|| self.context_manager.next_start_time());
        let execution_id = format!("exec_{}", start.unix_nanos());

        let context = self
            .context_manager
            .create_context(ContextParams {
                execution_id: execution_id.clone(),
                caller_address: call.caller_address.clone(),
                contract_address: None,
                model_hash: Some(call.model_hash.clone()),
                init_params: InitParams::Absent,
                execution_start: start,
                transaction_draft: call.transaction_draft.clone(),
            })
            .map_err(|error| CoordinatorError::ContextCreationFailed(error.into()))?;
        let _guard = ContextGuard {
            manager: self.context_manager.clone(),
            execution_id: execution_id.clone(),
        };

        if let Some(provider) = &self.host_provider {
            provider.register(&context);
        }

        let engine_context = EngineContext {
            trace_id: format!("trace_{}", start.unix_nanos()),
            deadline: self.config.onnx_timeout,
            execution_context: context.clone(),
        };
        let engine = self.engine.clone();
        let model_hash = call.model_hash.clone();
        let inputs = call.tensor_inputs.clone();
        let engine_task = tokio::spawn(async move {
            engine.execute_onnx(&engine_context, &model_hash, &inputs).await
        });

        let model_label = hex::encode(&call.model_hash);
        let outputs = match tokio::time::timeout(self.config.onnx_timeout, engine_task).await {
            Err(_) => {
                return Err(CoordinatorError::ExecutionTimeout {
                    contract: model_label,
                    method: "inference".to_string(),
                    timeout: self.config.onnx_timeout,
                });
            }
            Ok(Err(join_error)) => {
                let cause = if join_error.is_panic() {
                    anyhow!("engine panicked during inference")
                } else {
                    anyhow!("engine task was cancelled")
                };
                return Err(CoordinatorError::ExecutionFailed {
                    contract: model_label,
                    method: "inference".to_string(),
                    source: cause,
                });
            }
            Ok(Ok(Err(engine_error))) => {
                return Err(CoordinatorError::ExecutionFailed {
                    contract: model_label,
                    method: "inference".to_string(),
                    source: engine_error,
                });
            }
            Ok(Ok(Ok(outputs))) => outputs,
        };

        context.flush_trace_queue();
        let trace = context.execution_trace();

        let (state_before, state_after) =
            state_hashes(&trace).map_err(CoordinatorError::ExecutionResultHashFailed)?;
        context.set_state_hashes(state_before, state_after);

        let result_hash = execution_result_hash(&trace, &outputs)
            .map_err(CoordinatorError::ExecutionResultHashFailed)?;

        let state_id = derive_state_id(&StateIdSource {
            contract_address: None,
            model_hash: Some(&call.model_hash),
            function_name: None,
            start,
            params_count: call.tensor_inputs.len() as u32,
        });

        let (state_output, result_context) = self
            .assemble_state_output(
                &context,
                &trace,
                &execution_id,
                start,
                state_id,
                result_hash,
                state_before,
                state_after,
                MODEL_INFERENCE_CIRCUIT,
            )
            .await?;

        let return_data = context.return_data();
        let events = context.events();

        let transaction_draft = self
            .augment_draft(
                &context,
                &call.model_hash,
                &trace,
                &state_output,
                ExecutionType::ModelInference,
            )
            .await?;

        self.finish_execution(&context, &trace)?;

        Ok(OnnxExecutionResult {
            outputs,
            return_data,
            events,
            state_output,
            context: result_context,
            transaction_draft,
        })
    }

    // ---- shared tail of both paths ----

    #[allow(clippy::too_many_arguments)]
    async fn assemble_state_output(
        &self,
        context: &Arc<ExecutionContext>,
        trace: &ExecutionTrace,
        execution_id: &str,
        start: ClockTimestamp,
        state_id: B256,
        result_hash: B256,
        state_before: Option<B256>,
        state_after: Option<B256>,
        circuit_id: &str,
    ) -> Result<(StateOutput, BTreeMap<String, String>), CoordinatorError> {
        let zk_input = ZkProofInput {
            public_inputs: vec![
                result_hash.as_slice().to_vec(),
                state_before.unwrap_or(B256::ZERO).as_slice().to_vec(),
                state_after.unwrap_or(B256::ZERO).as_slice().to_vec(),
            ],
            private_inputs: BTreeMap::from([
                (
                    "trace_hash".to_string(),
                    sha256(&encode_trace(trace)).as_slice().to_vec(),
                ),
                (
                    "state_diff_hash".to_string(),
                    sha256(&encode_state_changes(&trace.state_changes))
                        .as_slice()
                        .to_vec(),
                ),
            ]),
            circuit_id: circuit_id.to_string(),
            circuit_version: 1,
        };

        let usage_snapshot = context.resources().snapshot(0);
        let mut metadata = BTreeMap::from([
            (METADATA_EXECUTION_NODE.to_string(), self.node_id()),
            (METADATA_EXECUTION_TIME.to_string(), start.rfc3339()),
            (
                "compute_units".to_string(),
                (usage_snapshot.host_function_calls + usage_snapshot.state_changes).to_string(),
            ),
            (
                "input_size".to_string(),
                context.init_params().len().to_string(),
            ),
            (
                "output_size".to_string(),
                context
                    .return_data()
                    .map(|data| data.len())
                    .unwrap_or_default()
                    .to_string(),
            ),
        ]);
        let mut result_context = BTreeMap::new();

        let zk_proof = if self.zk_manager.is_async_enabled() {
            let task_id = self
                .zk_manager
                .submit_task(execution_id, zk_input.clone(), self.config.zk_task_priority)
                .map_err(CoordinatorError::ProofManager)?;
            metadata.insert(
                METADATA_ZK_PROOF_STATUS.to_string(),
                "pending".to_string(),
            );
            metadata.insert(METADATA_ZK_PROOF_TASK_ID.to_string(), task_id.clone());
            result_context.insert(METADATA_ZK_PROOF_STATUS.to_string(), "pending".to_string());
            result_context.insert(METADATA_ZK_PROOF_TASK_ID.to_string(), task_id);
            self.zk_manager.pending_proof(&zk_input)
        } else {
            self.generate_proof_blocking(zk_input).await?
        };

        let state_output = StateOutput {
            state_id,
            state_version: 1,
            zk_proof,
            execution_result_hash: result_hash,
            parent_state_hash: None,
            metadata,
        };
        Ok((state_output, result_context))
    }

    async fn generate_proof_blocking(
        &self,
        input: ZkProofInput,
    ) -> Result<ZkStateProof, CoordinatorError> {
        let manager = self.zk_manager.clone();
        let proof = tokio::task::spawn_blocking(move || manager.generate_state_proof(&input))
            .await
            .map_err(|join_error| CoordinatorError::ZkProofGenerationFailed(join_error.into()))?
            .map_err(|error| CoordinatorError::ZkProofGenerationFailed(error.into()))?;
        if proof.proof.is_empty() {
            return Err(CoordinatorError::ZkProofEmpty);
        }
        Ok(proof)
    }

    /// Step 12 of the contract path: when the caller accumulated a draft
    /// whose outputs need a contract-execution binding and no proof input
    /// exists yet, append the reference input carrying the execution proof.
    async fn augment_draft(
        &self,
        context: &Arc<ExecutionContext>,
        resource_hash: &[u8],
        trace: &ExecutionTrace,
        state_output: &StateOutput,
        execution_type: ExecutionType,
    ) -> Result<Option<TransactionDraft>, CoordinatorError> {
        let Some(mut draft) = context.take_draft() else {
            return Ok(None);
        };
        if !draft.needs_contract_binding() || draft.has_execution_proof_input() {
            return Ok(Some(draft));
        }

        let query_service = self
            .query_service
            .as_ref()
            .ok_or(CoordinatorError::MissingRuntimeDependency("query service"))?;
        let resource_tx = query_service
            .get_resource_tx(resource_hash)
            .await
            .map_err(CoordinatorError::TransactionDraftFailed)?;
        if resource_tx.tx_hash == B256::ZERO {
            return Err(CoordinatorError::TransactionDraftFailed(anyhow!(
                "resource transaction hash is empty"
            )));
        }

        // Block timestamp when the draft carries one, the deterministic
        // clock otherwise.
        let timestamp = draft
            .block_timestamp
            .unwrap_or_else(|| context.clock().now().unix_seconds());
        let execution_time_ms =
            (trace.duration_nanos() / 1_000_000).max(1);

        let identity = IdentityProof {
            caller_address: context.caller_address().to_vec(),
            algorithm: "secp256k1".to_string(),
            sighash_type: 1,
            timestamp,
            context_hash: B256::ZERO,
            // Populated by the signing layer; a verifier rejects the proof
            // while these are still empty.
            public_key: Vec::new(),
            signature: Vec::new(),
            nonce: Vec::new(),
        };

        let input_data_hash = sha256(context.init_params().hash_input());
        let output_data_hash = context
            .return_data()
            .map(|data| sha256(&data))
            .unwrap_or(state_output.state_id);

        let mut proof = ExecutionProof {
            execution_result_hash: state_output.execution_result_hash,
            state_id: state_output.state_id,
            execution_time_ms,
            context: ExecutionContextInfo {
                caller_identity: identity,
                resource_address: context.contract_address().unwrap_or(Address::ZERO),
                execution_type,
                input_data_hash,
                output_data_hash,
                metadata: BTreeMap::from([(
                    "execution_id".to_string(),
                    context.execution_id().to_string(),
                )]),
            },
        };
        proof.seal_context_hash();

        append_execution_proof(&mut draft, resource_tx.tx_hash, &proof);
        Ok(Some(draft))
    }

    /// Finalize usage, check limits, log. The context itself is destroyed
    /// by the guard on scope exit.
    fn finish_execution(
        &self,
        context: &Arc<ExecutionContext>,
        trace: &ExecutionTrace,
    ) -> Result<(), CoordinatorError> {
        let execution_time_ms = trace.duration_nanos() / 1_000_000;
        let usage = context
            .resources()
            .finalize(execution_time_ms)
            .unwrap_or_else(|_| context.resources().snapshot(execution_time_ms));

        if let Some((resource, limit)) = self.config.resource_limits.first_exceeded(&usage) {
            return Err(CoordinatorError::ResourceExhausted { resource, limit });
        }

        if self.config.log_resource_usage {
            debug!(
                execution_id = context.execution_id(),
                execution_time_ms = usage.execution_time_ms,
                host_function_calls = usage.host_function_calls,
                state_changes = usage.state_changes,
                trace_size_bytes = usage.trace_size_bytes,
                "execution finished"
            );
        }
        Ok(())
    }
}

