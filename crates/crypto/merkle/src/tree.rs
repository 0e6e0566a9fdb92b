use std::sync::Arc;

use alloy_primitives::B256;

use crate::{
    errors::MerkleError, hasher::MerkleHasher, path::MerklePath, record::TraceRecord,
};

/// Binary Merkle tree over trace records.
///
/// Odd-width levels are padded by duplicating the rightmost node, so every
/// level stored here has even width except the root. The node for leaf `i`
/// on level `l` sits at index `i >> l`.
pub struct MerkleTree {
    levels: Vec<Vec<B256>>,
    leaf_count: usize,
    hasher: Arc<dyn MerkleHasher>,
}

impl MerkleTree {
    pub fn build(
        records: &[TraceRecord],
        hasher: Arc<dyn MerkleHasher>,
    ) -> Result<Self, MerkleError> {
        if records.is_empty() {
            return Err(MerkleError::EmptyTree);
        }

        let leaf_count = records.len();
        let mut current: Vec<B256> = records
            .iter()
            .map(|record| record.leaf_hash(hasher.as_ref()))
            .collect();

        let mut levels = Vec::new();
        loop {
            if current.len() > 1 && current.len() % 2 != 0 {
                let last = *current
                    .last()
                    .ok_or(MerkleError::EmptyTree)?;
                current.push(last);
            }
            levels.push(current.clone());
            if current.len() == 1 {
                break;
            }
            current = current
                .chunks(2)
                .map(|pair| hasher.hash_pair(pair[0], pair[1]))
                .collect();
        }

        Ok(Self {
            levels,
            leaf_count,
            hasher,
        })
    }

    pub fn root(&self) -> B256 {
        self.levels
            .last()
            .and_then(|level| level.first())
            .copied()
            .unwrap_or(B256::ZERO)
    }

    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    pub fn hasher(&self) -> &dyn MerkleHasher {
        self.hasher.as_ref()
    }

    /// Authentication path for `leaf_index`, walking up from the leaf and
    /// recording the sibling hash and direction bit at every level.
    pub fn calculate_path(&self, leaf_index: u64) -> Result<MerklePath, MerkleError> {
        if leaf_index >= self.leaf_count as u64 {
            return Err(MerkleError::LeafIndexOutOfBounds {
                index: leaf_index,
                leaf_count: self.leaf_count as u64,
            });
        }

        let depth = self.depth();
        let mut sibling_hashes = Vec::with_capacity(depth);
        let mut path_directions = Vec::with_capacity(depth);
        for level in 0..depth {
            let node_index = (leaf_index >> level) as usize;
            let sibling_index = node_index ^ 1;
            let nodes = &self.levels[level];
            // Padded levels always contain the sibling; a duplicated
            // rightmost node is its own sibling.
            let sibling = nodes
                .get(sibling_index)
                .copied()
                .unwrap_or(nodes[node_index]);
            sibling_hashes.push(sibling);
            path_directions.push((node_index & 1) as u8);
        }

        Ok(MerklePath {
            leaf_index,
            leaf_hash: self.levels[0][leaf_index as usize],
            sibling_hashes,
            path_directions,
            root_hash: self.root(),
        })
    }
}

#[cfg(test)]
mod tests {
    use weisyn_poseidon::Poseidon2Hasher;

    use super::*;

    fn records(data: &[&str]) -> Vec<TraceRecord> {
        let hasher = Poseidon2Hasher::new();
        data.iter()
            .map(|item| TraceRecord::new(item.as_bytes().to_vec(), &hasher))
            .collect()
    }

    fn build(data: &[&str]) -> MerkleTree {
        MerkleTree::build(&records(data), Arc::new(Poseidon2Hasher::new())).unwrap()
    }

    #[test]
    fn test_empty_record_list_is_rejected() {
        let result = MerkleTree::build(&[], Arc::new(Poseidon2Hasher::new()));
        assert!(matches!(result, Err(MerkleError::EmptyTree)));
    }

    #[test]
    fn test_single_leaf_tree() {
        let tree = build(&["only"]);
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.leaf_count(), 1);
        let path = tree.calculate_path(0).unwrap();
        assert!(path.sibling_hashes.is_empty());
        assert_eq!(path.leaf_hash, tree.root());
    }

    #[test]
    fn test_four_leaves_give_depth_two() {
        let tree = build(&["r1", "r2", "r3", "r4"]);
        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.leaf_count(), 4);
    }

    #[test]
    fn test_every_path_verifies() {
        let tree = build(&["r1", "r2", "r3", "r4", "r5"]);
        let hasher = Poseidon2Hasher::new();
        for index in 0..5 {
            let path = tree.calculate_path(index).unwrap();
            assert!(path.verify(&hasher).unwrap(), "path {index} failed");
            assert_eq!(path.root_hash, tree.root());
        }
    }

    #[test]
    fn test_odd_width_pads_with_rightmost_node() {
        // With three leaves the padded fourth leaf equals the third, so the
        // third leaf's sibling is itself.
        let tree = build(&["r1", "r2", "r3"]);
        let path = tree.calculate_path(2).unwrap();
        assert_eq!(path.sibling_hashes[0], path.leaf_hash);
        assert!(path.verify(&Poseidon2Hasher::new()).unwrap());
    }

    #[test]
    fn test_path_out_of_bounds() {
        let tree = build(&["r1", "r2"]);
        assert!(matches!(
            tree.calculate_path(2),
            Err(MerkleError::LeafIndexOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_rebuild_is_deterministic() {
        let first = build(&["r1", "r2", "r3", "r4"]);
        let second = build(&["r1", "r2", "r3", "r4"]);
        assert_eq!(first.root(), second.root());
        assert_eq!(
            first.calculate_path(1).unwrap().encode(),
            second.calculate_path(1).unwrap().encode()
        );
    }
}
