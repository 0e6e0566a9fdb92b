use alloy_primitives::B256;
use weisyn_poseidon::Poseidon2Hasher;

/// Pluggable tree hash. Implementations must keep the two-field-element
/// input binding of the Poseidon hasher so that off-circuit roots match
/// the in-circuit gadget.
pub trait MerkleHasher: Send + Sync {
    fn digest(&self, data: &[u8]) -> B256;

    /// Internal-node hash: `H(left ‖ right)` over the 64-byte concatenation.
    fn hash_pair(&self, left: B256, right: B256) -> B256 {
        let mut joined = [0u8; 64];
        joined[..32].copy_from_slice(left.as_slice());
        joined[32..].copy_from_slice(right.as_slice());
        self.digest(&joined)
    }
}

impl MerkleHasher for Poseidon2Hasher {
    fn digest(&self, data: &[u8]) -> B256 {
        Poseidon2Hasher::digest(self, data)
    }

    fn hash_pair(&self, left: B256, right: B256) -> B256 {
        Poseidon2Hasher::hash_pair(self, left, right)
    }
}
