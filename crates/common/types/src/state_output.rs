use std::collections::BTreeMap;

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

use crate::timestamp::ClockTimestamp;

/// Placeholder proof bytes used while an asynchronous proving task is still
/// in flight. Downstream transaction validation must reject such a proof.
pub const PENDING_PROOF_BYTES: &[u8] = b"pending";

/// Metadata key carrying the async proving task id on a [`StateOutput`].
pub const METADATA_ZK_PROOF_TASK_ID: &str = "zk_proof_task_id";
pub const METADATA_ZK_PROOF_STATUS: &str = "zk_proof_status";
pub const METADATA_EXECUTION_NODE: &str = "execution_node";
pub const METADATA_EXECUTION_TIME: &str = "execution_time";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvingScheme {
    Groth16,
    Plonk,
}

impl ProvingScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProvingScheme::Groth16 => "groth16",
            ProvingScheme::Plonk => "plonk",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Curve {
    #[serde(rename = "bn254")]
    Bn254,
    #[serde(rename = "bls12-377")]
    Bls12_377,
}

impl Curve {
    pub fn as_str(&self) -> &'static str {
        match self {
            Curve::Bn254 => "bn254",
            Curve::Bls12_377 => "bls12-377",
        }
    }
}

/// A zero-knowledge proof over an execution trace.
///
/// `constraint_count == 0` if and only if the proof is the pending
/// placeholder of an asynchronous task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZkStateProof {
    pub proof: Vec<u8>,
    pub public_inputs: Vec<Vec<u8>>,
    pub proving_scheme: ProvingScheme,
    pub curve: Curve,
    pub verification_key_hash: Vec<u8>,
    pub circuit_id: String,
    pub circuit_version: u32,
    pub constraint_count: u64,
    pub generated_at: Option<ClockTimestamp>,
}

impl ZkStateProof {
    pub fn is_pending(&self) -> bool {
        self.constraint_count == 0 && self.proof == PENDING_PROOF_BYTES
    }
}

/// The externally visible artifact of one execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateOutput {
    /// 32-byte deterministic state identifier.
    pub state_id: B256,
    /// Initial version is 1.
    pub state_version: u64,
    /// Required and non-null; may be the pending placeholder, in which case
    /// `metadata` carries `zk_proof_status` and `zk_proof_task_id`.
    pub zk_proof: ZkStateProof,
    pub execution_result_hash: B256,
    pub parent_state_hash: Option<B256>,
    pub metadata: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proof(bytes: &[u8], constraints: u64) -> ZkStateProof {
        ZkStateProof {
            proof: bytes.to_vec(),
            public_inputs: vec![],
            proving_scheme: ProvingScheme::Groth16,
            curve: Curve::Bn254,
            verification_key_hash: vec![],
            circuit_id: "contract_execution".to_string(),
            circuit_version: 1,
            constraint_count: constraints,
            generated_at: None,
        }
    }

    #[test]
    fn test_pending_detection() {
        assert!(proof(PENDING_PROOF_BYTES, 0).is_pending());
        assert!(!proof(PENDING_PROOF_BYTES, 7).is_pending());
        assert!(!proof(&[1, 2, 3], 0).is_pending());
    }

    #[test]
    fn test_scheme_and_curve_labels() {
        assert_eq!(ProvingScheme::Groth16.as_str(), "groth16");
        assert_eq!(ProvingScheme::Plonk.as_str(), "plonk");
        assert_eq!(Curve::Bn254.as_str(), "bn254");
        assert_eq!(Curve::Bls12_377.as_str(), "bls12-377");
    }
}
