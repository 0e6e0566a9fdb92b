use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

use crate::{errors::MerkleError, hasher::MerkleHasher};

/// Authentication path from one leaf up to the root.
///
/// Direction bit 0 means the current node is the left child at that level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerklePath {
    pub leaf_index: u64,
    pub leaf_hash: B256,
    pub sibling_hashes: Vec<B256>,
    pub path_directions: Vec<u8>,
    pub root_hash: B256,
}

impl MerklePath {
    pub fn depth(&self) -> usize {
        self.sibling_hashes.len()
    }

    /// Recompute the root from the leaf and siblings and compare it against
    /// the embedded root.
    pub fn verify(&self, hasher: &dyn MerkleHasher) -> Result<bool, MerkleError> {
        if self.sibling_hashes.len() != self.path_directions.len() {
            return Err(MerkleError::PathLengthMismatch {
                siblings: self.sibling_hashes.len(),
                directions: self.path_directions.len(),
            });
        }
        Ok(self.recompute_root(self.leaf_hash, hasher) == self.root_hash)
    }

    /// Walk the siblings upward starting from `leaf`, returning the root
    /// this path yields.
    pub fn recompute_root(&self, leaf: B256, hasher: &dyn MerkleHasher) -> B256 {
        let mut current = leaf;
        for (sibling, direction) in self.sibling_hashes.iter().zip(&self.path_directions) {
            current = if *direction == 0 {
                hasher.hash_pair(current, *sibling)
            } else {
                hasher.hash_pair(*sibling, current)
            };
        }
        current
    }

    /// Root of the tree after replacing this path's leaf with `new_leaf`.
    ///
    /// A sibling equal to the node's own old value is a pad duplicate of an
    /// odd-width level; the duplicate tracks the replacement, so the new
    /// value pairs with itself there instead of with the stale sibling.
    pub fn recompute_root_replacing(&self, new_leaf: B256, hasher: &dyn MerkleHasher) -> B256 {
        let mut old_current = self.leaf_hash;
        let mut new_current = new_leaf;
        for (sibling, direction) in self.sibling_hashes.iter().zip(&self.path_directions) {
            if *direction == 0 && *sibling == old_current {
                new_current = hasher.hash_pair(new_current, new_current);
                old_current = hasher.hash_pair(old_current, old_current);
            } else if *direction == 0 {
                new_current = hasher.hash_pair(new_current, *sibling);
                old_current = hasher.hash_pair(old_current, *sibling);
            } else {
                new_current = hasher.hash_pair(*sibling, new_current);
                old_current = hasher.hash_pair(*sibling, old_current);
            }
        }
        new_current
    }

    /// Wire encoding: `leaf_index (u64 BE)`, `leaf_hash (32B)`,
    /// `depth (u32 BE)`, `depth × 32B` siblings, `depth × 1B` directions,
    /// `root (32B)`.
    pub fn encode(&self) -> Vec<u8> {
        let depth = self.sibling_hashes.len();
        let mut buffer = Vec::with_capacity(8 + 32 + 4 + depth * 33 + 32);
        buffer.extend_from_slice(&self.leaf_index.to_be_bytes());
        buffer.extend_from_slice(self.leaf_hash.as_slice());
        buffer.extend_from_slice(&(depth as u32).to_be_bytes());
        for sibling in &self.sibling_hashes {
            buffer.extend_from_slice(sibling.as_slice());
        }
        buffer.extend_from_slice(&self.path_directions);
        buffer.extend_from_slice(self.root_hash.as_slice());
        buffer
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, MerkleError> {
        let header_len = 8 + 32 + 4;
        if bytes.len() < header_len + 32 {
            return Err(MerkleError::InvalidEncoding("truncated header".to_string()));
        }
        let leaf_index = u64::from_be_bytes(
            bytes[0..8]
                .try_into()
                .map_err(|_| MerkleError::InvalidEncoding("leaf index".to_string()))?,
        );
        let leaf_hash = B256::from_slice(&bytes[8..40]);
        let depth = u32::from_be_bytes(
            bytes[40..44]
                .try_into()
                .map_err(|_| MerkleError::InvalidEncoding("depth".to_string()))?,
        ) as usize;

        let expected_len = header_len + depth * 33 + 32;
        if bytes.len() != expected_len {
            return Err(MerkleError::InvalidEncoding(format!(
                "expected {expected_len} bytes for depth {depth}, got {}",
                bytes.len()
            )));
        }

        let mut offset = header_len;
        let mut sibling_hashes = Vec::with_capacity(depth);
        for _ in 0..depth {
            sibling_hashes.push(B256::from_slice(&bytes[offset..offset + 32]));
            offset += 32;
        }
        let path_directions = bytes[offset..offset + depth].to_vec();
        offset += depth;
        let root_hash = B256::from_slice(&bytes[offset..offset + 32]);

        Ok(Self {
            leaf_index,
            leaf_hash,
            sibling_hashes,
            path_directions,
            root_hash,
        })
    }
}
