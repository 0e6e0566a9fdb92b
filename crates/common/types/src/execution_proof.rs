use std::collections::BTreeMap;

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionType {
    ContractCall,
    ModelInference,
}

impl ExecutionType {
    pub fn as_u32(&self) -> u32 {
        match self {
            ExecutionType::ContractCall => 0,
            ExecutionType::ModelInference => 1,
        }
    }
}

/// Caller-identity binding for an execution.
///
/// `public_key`, `signature` and `nonce` are left empty by the coordinator;
/// the signing layer populates them before submission and verifiers reject
/// identity proofs where they are still empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityProof {
    pub caller_address: Vec<u8>,
    pub algorithm: String,
    pub sighash_type: u32,
    pub timestamp: u64,
    pub context_hash: B256,
    pub public_key: Vec<u8>,
    pub signature: Vec<u8>,
    pub nonce: Vec<u8>,
}

impl IdentityProof {
    /// Whether the signing layer has filled in all three placeholder
    /// fields. Any of them still empty means the proof must be rejected.
    pub fn is_signed(&self) -> bool {
        !self.public_key.is_empty() && !self.signature.is_empty() && !self.nonce.is_empty()
    }
}

/// The execution-context half of an [`ExecutionProof`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContextInfo {
    pub caller_identity: IdentityProof,
    pub resource_address: Address,
    pub execution_type: ExecutionType,
    pub input_data_hash: B256,
    pub output_data_hash: B256,
    pub metadata: BTreeMap<String, String>,
}

impl ExecutionContextInfo {
    /// Deterministic binding hash over the fixed-order preimage
    /// `input_data_hash ‖ output_data_hash ‖ resource_address ‖
    /// execution_type (u32 BE) ‖ sorted metadata key/value pairs`.
    ///
    /// The preimage order is part of the wire contract and must stay
    /// bit-identical across implementations.
    pub fn compute_context_hash(&self) -> B256 {
        let mut hasher = Sha256::new();
        hasher.update(self.input_data_hash.as_slice());
        hasher.update(self.output_data_hash.as_slice());
        hasher.update(self.resource_address.as_slice());
        hasher.update(self.execution_type.as_u32().to_be_bytes());
        for (key, value) in &self.metadata {
            hasher.update(key.as_bytes());
            hasher.update(value.as_bytes());
        }
        B256::from_slice(&hasher.finalize())
    }
}

/// Transaction-layer artifact binding an execution to its caller identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionProof {
    pub execution_result_hash: B256,
    pub state_id: B256,
    /// Wall-clock-independent execution duration, floored at 1 ms.
    pub execution_time_ms: u64,
    pub context: ExecutionContextInfo,
}

impl ExecutionProof {
    /// Recompute the context hash and write it back into the embedded
    /// identity. Called once at construction time by the coordinator.
    pub fn seal_context_hash(&mut self) {
        self.context.caller_identity.context_hash = self.context.compute_context_hash();
    }
}
