use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

use crate::hasher::MerkleHasher;

/// One leaf of a trace tree.
///
/// The serialization is produced by the coordinator (deterministic binary
/// encoding of the trace); the Merkle engine treats it as opaque bytes and
/// only ever hashes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub serialized_data: Vec<u8>,
    pub leaf_hash: Option<B256>,
}

impl TraceRecord {
    /// Record with a precomputed leaf hash.
    pub fn new(serialized_data: Vec<u8>, hasher: &dyn MerkleHasher) -> Self {
        let leaf_hash = hasher.digest(&serialized_data);
        Self {
            serialized_data,
            leaf_hash: Some(leaf_hash),
        }
    }

    /// Record without a precomputed hash; the hash is derived on demand.
    pub fn from_bytes(serialized_data: Vec<u8>) -> Self {
        Self {
            serialized_data,
            leaf_hash: None,
        }
    }

    pub fn leaf_hash(&self, hasher: &dyn MerkleHasher) -> B256 {
        self.leaf_hash
            .unwrap_or_else(|| hasher.digest(&self.serialized_data))
    }

    /// Record equality for change detection: precomputed hashes when both
    /// are present, serialized bytes otherwise.
    pub fn same_content(&self, other: &TraceRecord) -> bool {
        match (self.leaf_hash, other.leaf_hash) {
            (Some(a), Some(b)) => a == b,
            _ => self.serialized_data == other.serialized_data,
        }
    }
}
