use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    event::Event, state_output::StateOutput, tensor::TensorOutput, transaction::TransactionDraft,
};

/// Result of one WASM contract execution.
///
/// `context` carries coordination metadata such as `zk_proof_task_id` and
/// `zk_proof_status` when the proof was generated asynchronously. A result
/// whose state output still carries a pending proof must not be submitted
/// to consensus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WasmExecutionResult {
    pub return_values: Vec<u64>,
    pub return_data: Option<Vec<u8>>,
    pub events: Vec<Event>,
    pub state_output: StateOutput,
    pub context: BTreeMap<String, String>,
    /// The caller's draft, handed back with the execution-proof reference
    /// input appended when the outputs require a contract binding.
    pub transaction_draft: Option<TransactionDraft>,
}

/// Result of one ONNX model inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnnxExecutionResult {
    pub outputs: Vec<TensorOutput>,
    pub return_data: Option<Vec<u8>>,
    pub events: Vec<Event>,
    pub state_output: StateOutput,
    pub context: BTreeMap<String, String>,
    pub transaction_draft: Option<TransactionDraft>,
}
