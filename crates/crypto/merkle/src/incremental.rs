use std::collections::{HashMap, HashSet, hash_map::Entry};
use std::sync::Arc;

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

use crate::{
    changes::{ChangeType, detect_changes},
    errors::MerkleError,
    hasher::MerkleHasher,
    path::MerklePath,
    record::TraceRecord,
    tree::MerkleTree,
};

/// Proof that a bounded set of leaf changes transforms `old_root` into
/// `new_root`. Verification work is proportional to the change set, not the
/// tree size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncrementalProof {
    pub old_root: B256,
    /// Authentication paths from the old tree, one per modified or deleted
    /// index, in ascending index order.
    pub changed_paths: Vec<MerklePath>,
    /// New record values, one per modified or added index, in ascending
    /// index order.
    pub changed_records: Vec<TraceRecord>,
    pub new_root: B256,
}

/// Build an incremental proof taking `old_records` to `new_records`.
///
/// The new tree is currently rebuilt in full to obtain `new_root`; callers
/// must only rely on the root value, not on the amount of work done.
pub fn generate_incremental_proof(
    old_records: &[TraceRecord],
    new_records: &[TraceRecord],
    hasher: Arc<dyn MerkleHasher>,
) -> Result<IncrementalProof, MerkleError> {
    let old_tree = MerkleTree::build(old_records, hasher.clone())?;
    let new_tree = MerkleTree::build(new_records, hasher)?;

    let mut changed_paths = Vec::new();
    let mut changed_records = Vec::new();
    for change in detect_changes(old_records, new_records) {
        match change.change_type {
            ChangeType::Modified => {
                changed_paths.push(old_tree.calculate_path(change.index as u64)?);
                if let Some(record) = change.new_record {
                    changed_records.push(record);
                }
            }
            ChangeType::Deleted => {
                changed_paths.push(old_tree.calculate_path(change.index as u64)?);
            }
            ChangeType::Added => {
                if let Some(record) = change.new_record {
                    changed_records.push(record);
                }
            }
        }
    }

    Ok(IncrementalProof {
        old_root: old_tree.root(),
        changed_paths,
        changed_records,
        new_root: new_tree.root(),
    })
}

/// Verify an incremental proof, optionally pinning the expected old root.
pub fn verify_incremental_proof(
    proof: &IncrementalProof,
    expected_old_root: Option<B256>,
    hasher: &dyn MerkleHasher,
) -> Result<(), MerkleError> {
    if let Some(expected) = expected_old_root
        && expected != proof.old_root
    {
        return Err(MerkleError::InconsistentRootHashes);
    }

    for (index, path) in proof.changed_paths.iter().enumerate() {
        if !path.verify(hasher)? {
            return Err(MerkleError::InvalidPath { index });
        }
        if path.root_hash != proof.old_root {
            return Err(MerkleError::InconsistentRootHashes);
        }
    }

    let recomputed = recompute_new_root(proof, hasher)?;
    if recomputed != proof.new_root {
        return Err(MerkleError::RootMismatch);
    }
    Ok(())
}

fn recompute_new_root(
    proof: &IncrementalProof,
    hasher: &dyn MerkleHasher,
) -> Result<B256, MerkleError> {
    match (proof.changed_paths.len(), proof.changed_records.len()) {
        (0, 0) => Ok(proof.old_root),
        (1, 1) => {
            let new_leaf = proof.changed_records[0].leaf_hash(hasher);
            Ok(proof.changed_paths[0].recompute_root_replacing(new_leaf, hasher))
        }
        (paths, records) if paths == records => {
            merge_paths(&proof.changed_paths, &proof.changed_records, hasher)
        }
        _ => Err(MerkleError::CannotRecomputeRoot(
            "additions or deletions need structural witnesses the proof format does not carry"
                .to_string(),
        )),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeSource {
    /// Sibling hash copied out of an old-tree path.
    Snapshot,
    /// Hash recomputed from new leaf values.
    Derived,
}

/// Level-indexed multi-path merge. Every known node hash is keyed by
/// `(level, node_index)` and tagged with its provenance; a derived value may
/// overwrite a snapshot, while any other disagreement is a hard error.
fn merge_paths(
    paths: &[MerklePath],
    records: &[TraceRecord],
    hasher: &dyn MerkleHasher,
) -> Result<B256, MerkleError> {
    let depth = paths[0].depth();
    if paths.iter().any(|path| path.depth() != depth) {
        return Err(MerkleError::CannotRecomputeRoot(
            "paths span trees of different depths".to_string(),
        ));
    }

    let mut nodes: HashMap<(usize, u64), (B256, NodeSource)> = HashMap::new();
    // Pad duplicates of odd-width levels, keyed by `(level, index)`. A
    // duplicate mirrors whatever the merge resolves for its left neighbor
    // instead of contributing a snapshot of its own.
    let mut pad_duplicates: HashSet<(usize, u64)> = HashSet::new();

    for (path, record) in paths.iter().zip(records) {
        insert_node(
            &mut nodes,
            0,
            path.leaf_index,
            record.leaf_hash(hasher),
            NodeSource::Derived,
        )?;

        // Seed the siblings along this path. A sibling equal to the node's
        // own old-tree value is the node's pad duplicate, not real data.
        // A real sibling that merely collides with that value is
        // indistinguishable here; the merge then fails closed on the final
        // root comparison instead of accepting a wrong root.
        let mut old_current = path.leaf_hash;
        for (level, (sibling, direction)) in path
            .sibling_hashes
            .iter()
            .zip(&path.path_directions)
            .enumerate()
        {
            let node_index = path.leaf_index >> level;
            if *direction == 0 && *sibling == old_current {
                pad_duplicates.insert((level, node_index ^ 1));
                old_current = hasher.hash_pair(old_current, old_current);
            } else if *direction == 0 {
                insert_node(&mut nodes, level, node_index ^ 1, *sibling, NodeSource::Snapshot)?;
                old_current = hasher.hash_pair(old_current, *sibling);
            } else {
                insert_node(&mut nodes, level, node_index ^ 1, *sibling, NodeSource::Snapshot)?;
                old_current = hasher.hash_pair(*sibling, old_current);
            }
        }
    }

    for level in 0..depth {
        // Values for this level are final once the previous level was
        // propagated; resolve pad duplicates before hashing parents.
        let mut duplicate_indices: Vec<u64> = pad_duplicates
            .iter()
            .filter(|(duplicate_level, _)| *duplicate_level == level)
            .map(|(_, index)| *index)
            .collect();
        duplicate_indices.sort_unstable();
        for duplicate_index in duplicate_indices {
            if let Some(entry) = nodes.get(&(level, duplicate_index ^ 1)).copied() {
                nodes.insert((level, duplicate_index), entry);
            }
        }

        let mut left_indices: Vec<u64> = nodes
            .keys()
            .filter(|(node_level, index)| *node_level == level && index % 2 == 0)
            .map(|(_, index)| *index)
            .collect();
        left_indices.sort_unstable();

        for left_index in left_indices {
            let Some((left, _)) = nodes.get(&(level, left_index)).copied() else {
                continue;
            };
            let Some((right, _)) = nodes.get(&(level, left_index | 1)).copied() else {
                continue;
            };
            insert_node(
                &mut nodes,
                level + 1,
                left_index >> 1,
                hasher.hash_pair(left, right),
                NodeSource::Derived,
            )?;
        }
    }

    nodes
        .get(&(depth, 0))
        .map(|(hash, _)| *hash)
        .ok_or_else(|| MerkleError::CannotRecomputeRoot("root position never resolved".to_string()))
}

fn insert_node(
    nodes: &mut HashMap<(usize, u64), (B256, NodeSource)>,
    level: usize,
    index: u64,
    hash: B256,
    source: NodeSource,
) -> Result<(), MerkleError> {
    match nodes.entry((level, index)) {
        Entry::Vacant(entry) => {
            entry.insert((hash, source));
        }
        Entry::Occupied(mut entry) => {
            let (existing_hash, existing_source) = *entry.get();
            if existing_hash == hash {
                if source == NodeSource::Derived {
                    entry.insert((hash, NodeSource::Derived));
                }
            } else {
                match (existing_source, source) {
                    (NodeSource::Snapshot, NodeSource::Derived) => {
                        entry.insert((hash, NodeSource::Derived));
                    }
                    // A stale snapshot never displaces a derived value.
                    (NodeSource::Derived, NodeSource::Snapshot) => {}
                    _ => return Err(MerkleError::NodeHashConflict { level, index }),
                }
            }
        }
    }
    Ok(())
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

    fn hasher() -> Arc<dyn MerkleHasher> {
        Arc::new(Poseidon2Hasher::new())
    }

    #[test]
    fn test_single_leaf_change_round_trips() {
        let old = records(&["r1", "r2", "r3", "r4"]);
        let new = records(&["r1'", "r2", "r3", "r4"]);

        let proof = generate_incremental_proof(&old, &new, hasher()).unwrap();
        assert_eq!(proof.changed_paths.len(), 1);
        assert_eq!(proof.changed_paths[0].depth(), 2);
        assert_eq!(proof.changed_records.len(), 1);

        let expected_new_root = MerkleTree::build(&new, hasher()).unwrap().root();
        assert_eq!(proof.new_root, expected_new_root);

        let old_root = proof.old_root;
        verify_incremental_proof(&proof, Some(old_root), &Poseidon2Hasher::new()).unwrap();
    }

    #[test]
    fn test_multi_point_merge_matches_full_rebuild() {
        let old = records(&["r1", "r2", "r3", "r4"]);
        let new = records(&["r1'", "r2", "r3'", "r4"]);

        let proof = generate_incremental_proof(&old, &new, hasher()).unwrap();
        assert_eq!(proof.changed_paths.len(), 2);
        assert_eq!(proof.changed_records.len(), 2);

        let rebuilt = MerkleTree::build(&new, hasher()).unwrap().root();
        assert_eq!(proof.new_root, rebuilt);
        verify_incremental_proof(&proof, Some(proof.old_root), &Poseidon2Hasher::new()).unwrap();
    }

    #[test]
    fn test_adjacent_leaf_changes_merge() {
        // Leaves 0 and 1 share a parent, so each path's level-0 snapshot is
        // displaced by the other leaf's derived value.
        let old = records(&["r1", "r2", "r3", "r4"]);
        let new = records(&["r1'", "r2'", "r3", "r4"]);

        let proof = generate_incremental_proof(&old, &new, hasher()).unwrap();
        let rebuilt = MerkleTree::build(&new, hasher()).unwrap().root();
        assert_eq!(proof.new_root, rebuilt);
        verify_incremental_proof(&proof, None, &Poseidon2Hasher::new()).unwrap();
    }

    #[test]
    fn test_modifying_a_padded_last_leaf_round_trips() {
        // Three leaves pad the fourth position with a duplicate of the
        // third; replacing the third leaf must carry the duplicate along.
        let old = records(&["r1", "r2", "r3"]);
        let new = records(&["r1", "r2", "r3'"]);

        let proof = generate_incremental_proof(&old, &new, hasher()).unwrap();
        let rebuilt = MerkleTree::build(&new, hasher()).unwrap().root();
        assert_eq!(proof.new_root, rebuilt);
        verify_incremental_proof(&proof, Some(proof.old_root), &Poseidon2Hasher::new()).unwrap();
    }

    #[test]
    fn test_modifying_the_deep_padded_tail_round_trips() {
        // Five leaves duplicate through two levels above the last leaf.
        let old = records(&["r1", "r2", "r3", "r4", "r5"]);
        let new = records(&["r1", "r2", "r3", "r4", "r5'"]);

        let proof = generate_incremental_proof(&old, &new, hasher()).unwrap();
        let rebuilt = MerkleTree::build(&new, hasher()).unwrap().root();
        assert_eq!(proof.new_root, rebuilt);
        verify_incremental_proof(&proof, None, &Poseidon2Hasher::new()).unwrap();
    }

    #[test]
    fn test_multi_point_merge_across_a_padded_level() {
        // Leaves 4 and 5 share a parent whose level-1 neighbor is a pad
        // duplicate; the duplicate must mirror the merged parent value.
        let old = records(&["r1", "r2", "r3", "r4", "r5", "r6"]);
        let new = records(&["r1", "r2", "r3", "r4", "r5'", "r6'"]);

        let proof = generate_incremental_proof(&old, &new, hasher()).unwrap();
        assert_eq!(proof.changed_paths.len(), 2);
        let rebuilt = MerkleTree::build(&new, hasher()).unwrap().root();
        assert_eq!(proof.new_root, rebuilt);
        verify_incremental_proof(&proof, Some(proof.old_root), &Poseidon2Hasher::new()).unwrap();
    }

    #[test]
    fn test_no_changes_keeps_old_root() {
        let old = records(&["r1", "r2"]);
        let proof = generate_incremental_proof(&old, &old, hasher()).unwrap();
        assert_eq!(proof.old_root, proof.new_root);
        assert!(proof.changed_paths.is_empty());
        verify_incremental_proof(&proof, Some(proof.old_root), &Poseidon2Hasher::new()).unwrap();
    }

    #[test]
    fn test_generation_is_deterministic() {
        let old = records(&["r1", "r2", "r3", "r4"]);
        let new = records(&["r1'", "r2", "r3'", "r4"]);
        let first = generate_incremental_proof(&old, &new, hasher()).unwrap();
        let second = generate_incremental_proof(&old, &new, hasher()).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first.changed_paths[0].encode(),
            second.changed_paths[0].encode()
        );
    }

    #[test]
    fn test_mixed_tree_paths_are_rejected() {
        let tree_a = MerkleTree::build(&records(&["a1", "a2", "a3", "a4"]), hasher()).unwrap();
        let tree_b = MerkleTree::build(&records(&["b1", "b2", "b3", "b4"]), hasher()).unwrap();

        let proof = IncrementalProof {
            old_root: tree_a.root(),
            changed_paths: vec![
                tree_a.calculate_path(0).unwrap(),
                tree_b.calculate_path(2).unwrap(),
            ],
            changed_records: records(&["a1'", "a3'"]),
            new_root: tree_a.root(),
        };
        assert_eq!(
            verify_incremental_proof(&proof, None, &Poseidon2Hasher::new()),
            Err(MerkleError::InconsistentRootHashes)
        );
    }

    #[test]
    fn test_expected_old_root_mismatch_is_rejected() {
        let old = records(&["r1", "r2"]);
        let proof = generate_incremental_proof(&old, &old, hasher()).unwrap();
        assert_eq!(
            verify_incremental_proof(&proof, Some(B256::ZERO), &Poseidon2Hasher::new()),
            Err(MerkleError::InconsistentRootHashes)
        );
    }

    #[test]
    fn test_pure_additions_cannot_recompute() {
        let old = records(&["r1", "r2"]);
        let new = records(&["r1", "r2", "r3"]);
        let proof = generate_incremental_proof(&old, &new, hasher()).unwrap();
        assert!(matches!(
            verify_incremental_proof(&proof, None, &Poseidon2Hasher::new()),
            Err(MerkleError::CannotRecomputeRoot(_))
        ));
    }

    #[test]
    fn test_conflicting_derived_values_are_detected() {
        let old = records(&["r1", "r2", "r3", "r4"]);
        let tree = MerkleTree::build(&old, hasher()).unwrap();
        let path = tree.calculate_path(0).unwrap();

        // Two derived values for leaf 0 with different contents.
        let proof = IncrementalProof {
            old_root: tree.root(),
            changed_paths: vec![path.clone(), path],
            changed_records: records(&["x", "y"]),
            new_root: tree.root(),
        };
        assert_eq!(
            verify_incremental_proof(&proof, None, &Poseidon2Hasher::new()),
            Err(MerkleError::NodeHashConflict { level: 0, index: 0 })
        );
    }

    #[test]
    fn test_tampered_path_fails_self_verification() {
        let old = records(&["r1", "r2", "r3", "r4"]);
        let new = records(&["r1'", "r2", "r3", "r4"]);
        let mut proof = generate_incremental_proof(&old, &new, hasher()).unwrap();
        proof.changed_paths[0].sibling_hashes[0] = B256::ZERO;
        assert_eq!(
            verify_incremental_proof(&proof, None, &Poseidon2Hasher::new()),
            Err(MerkleError::InvalidPath { index: 0 })
        );
    }
}
