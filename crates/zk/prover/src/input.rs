use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Input to proof generation.
///
/// Public inputs bind positionally to circuit variables; private inputs
/// bind by name. Trace-derived private inputs are pre-hashed 32-byte
/// digests of canonical serializations, so the proving layer never sees
/// raw trace data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZkProofInput {
    pub public_inputs: Vec<Vec<u8>>,
    pub private_inputs: BTreeMap<String, Vec<u8>>,
    pub circuit_id: String,
    pub circuit_version: u32,
}

impl ZkProofInput {
    pub fn private(&self, name: &str) -> Option<&[u8]> {
        self.private_inputs.get(name).map(Vec::as_slice)
    }
}
