use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};

use crate::{execution_proof::ExecutionProof, state_output::StateOutput};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: B256,
    pub vout: u32,
}

/// Draft transaction input. Reference inputs point at on-chain data without
/// spending it; the coordinator appends one carrying the execution proof.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxInput {
    pub previous_output: OutPoint,
    pub is_reference: bool,
    pub unlocking_proof: Option<Vec<u8>>,
    pub execution_proof: Option<ExecutionProof>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum TxOutput {
    Asset {
        recipient: Address,
        asset_id: B256,
        amount: u64,
    },
    Resource {
        resource_hash: B256,
        owner: Address,
    },
    State {
        output: StateOutput,
    },
    ContractToken {
        contract_address: Address,
        recipient: Address,
        amount: u64,
    },
}

impl TxOutput {
    /// Outputs that are only spendable against a proven contract execution.
    pub fn requires_contract_binding(&self) -> bool {
        matches!(self, TxOutput::ContractToken { .. })
    }
}

/// An in-flight transaction under construction by the draft service.
///
/// The coordinator never finalizes or signs a draft; it only appends the
/// execution-proof reference input and mirrors the proof onto unlocked
/// spending inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionDraft {
    pub draft_id: String,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub block_timestamp: Option<u64>,
    pub sealed: bool,
}

impl TransactionDraft {
    pub fn has_execution_proof_input(&self) -> bool {
        self.inputs.iter().any(|input| input.execution_proof.is_some())
    }

    pub fn needs_contract_binding(&self) -> bool {
        self.outputs
            .iter()
            .any(TxOutput::requires_contract_binding)
    }
}
