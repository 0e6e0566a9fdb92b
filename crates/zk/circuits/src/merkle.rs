use ark_crypto_primitives::sponge::poseidon::PoseidonConfig;
use ark_ff::PrimeField;
use ark_r1cs_std::{
    alloc::AllocVar, boolean::Boolean, eq::EqGadget, fields::fp::FpVar, select::CondSelectGadget,
};
use ark_relations::r1cs::{
    ConstraintSynthesizer, ConstraintSystemRef, SynthesisError,
};
use weisyn_poseidon::constraints::{compress_gadget, leaf_gadget};

use crate::errors::CircuitError;

/// Depth 20 supports trees of up to 2^20 trace records.
pub const MAX_CIRCUIT_DEPTH: usize = 20;

fn check_depth(depth: usize) -> Result<(), CircuitError> {
    if depth == 0 || depth > MAX_CIRCUIT_DEPTH {
        return Err(CircuitError::UnsupportedDepth(depth));
    }
    Ok(())
}

/// Walk one authentication path upward inside the circuit.
///
/// Direction bit 0 keeps the current node on the left:
/// `cur = (1 - dir) · H(cur, sib) + dir · H(sib, cur)`.
fn walk_path<F: PrimeField>(
    cs: ConstraintSystemRef<F>,
    config: &PoseidonConfig<F>,
    mut current: FpVar<F>,
    siblings: &[Option<F>],
    directions: &[Option<bool>],
) -> Result<FpVar<F>, SynthesisError> {
    for (sibling, direction) in siblings.iter().zip(directions) {
        let sibling = FpVar::new_witness(cs.clone(), || {
            sibling.ok_or(SynthesisError::AssignmentMissing)
        })?;
        let direction = Boolean::new_witness(cs.clone(), || {
            direction.ok_or(SynthesisError::AssignmentMissing)
        })?;
        let left = compress_gadget(cs.clone(), config, &current, &sibling)?;
        let right = compress_gadget(cs.clone(), config, &sibling, &current)?;
        current = FpVar::conditionally_select(&direction, &right, &left)?;
    }
    Ok(current)
}

/// Proof of leaf inclusion: `H(leaf_data, 0)` walked up the sibling chain
/// must equal the public root.
///
/// The sibling and direction vectors are length-fixed when the circuit is
/// instantiated; the proving framework requires the arity at key-generation
/// time.
#[derive(Clone)]
pub struct MerklePathCircuit<F: PrimeField> {
    pub config: PoseidonConfig<F>,
    pub root: Option<F>,
    pub leaf_data: Option<F>,
    pub sibling_hashes: Vec<Option<F>>,
    pub path_directions: Vec<Option<bool>>,
}

impl<F: PrimeField> MerklePathCircuit<F> {
    pub fn depth(&self) -> usize {
        self.sibling_hashes.len()
    }

    pub fn assign(
        mut self,
        root: F,
        leaf_data: F,
        siblings: Vec<F>,
        directions: Vec<bool>,
    ) -> Result<Self, CircuitError> {
        if siblings.len() != self.depth() || directions.len() != self.depth() {
            return Err(CircuitError::ArityMismatch {
                expected: self.depth(),
                actual: siblings.len(),
            });
        }
        self.root = Some(root);
        self.leaf_data = Some(leaf_data);
        self.sibling_hashes = siblings.into_iter().map(Some).collect();
        self.path_directions = directions.into_iter().map(Some).collect();
        Ok(self)
    }
}

impl<F: PrimeField> ConstraintSynthesizer<F> for MerklePathCircuit<F> {
    fn generate_constraints(self, cs: ConstraintSystemRef<F>) -> Result<(), SynthesisError> {
        let root = FpVar::new_input(cs.clone(), || {
            self.root.ok_or(SynthesisError::AssignmentMissing)
        })?;
        let leaf_data = FpVar::new_witness(cs.clone(), || {
            self.leaf_data.ok_or(SynthesisError::AssignmentMissing)
        })?;

        let leaf = leaf_gadget(cs.clone(), &self.config, &leaf_data)?;
        let computed_root = walk_path(
            cs,
            &self.config,
            leaf,
            &self.sibling_hashes,
            &self.path_directions,
        )?;
        computed_root.enforce_equal(&root)
    }
}

/// `make_merkle_path_circuit(depth)` with `1 <= depth <= 20`.
pub fn make_merkle_path_circuit<F: PrimeField>(
    config: PoseidonConfig<F>,
    depth: usize,
) -> Result<MerklePathCircuit<F>, CircuitError> {
    check_depth(depth)?;
    Ok(MerklePathCircuit {
        config,
        root: None,
        leaf_data: None,
        sibling_hashes: vec![None; depth],
        path_directions: vec![None; depth],
    })
}

/// One path inside a batch circuit; arrays are preallocated to the batch
/// depth.
#[derive(Clone)]
pub struct PathWitness<F: PrimeField> {
    pub leaf_data: Option<F>,
    pub sibling_hashes: Vec<Option<F>>,
    pub path_directions: Vec<Option<bool>>,
}

impl<F: PrimeField> PathWitness<F> {
    fn blank(depth: usize) -> Self {
        Self {
            leaf_data: None,
            sibling_hashes: vec![None; depth],
            path_directions: vec![None; depth],
        }
    }
}

/// Several leaf-inclusion proofs against one public root.
#[derive(Clone)]
pub struct BatchMerklePathCircuit<F: PrimeField> {
    pub config: PoseidonConfig<F>,
    pub root: Option<F>,
    pub paths: Vec<PathWitness<F>>,
}

impl<F: PrimeField> ConstraintSynthesizer<F> for BatchMerklePathCircuit<F> {
    fn generate_constraints(self, cs: ConstraintSystemRef<F>) -> Result<(), SynthesisError> {
        let root = FpVar::new_input(cs.clone(), || {
            self.root.ok_or(SynthesisError::AssignmentMissing)
        })?;

        for path in &self.paths {
            let leaf_data = FpVar::new_witness(cs.clone(), || {
                path.leaf_data.ok_or(SynthesisError::AssignmentMissing)
            })?;
            let leaf = leaf_gadget(cs.clone(), &self.config, &leaf_data)?;
            let computed_root = walk_path(
                cs.clone(),
                &self.config,
                leaf,
                &path.sibling_hashes,
                &path.path_directions,
            )?;
            computed_root.enforce_equal(&root)?;
        }
        Ok(())
    }
}

/// `make_batch_merkle_path_circuit(path_count, depth)`; every inner path's
/// arrays are preallocated to `depth`.
pub fn make_batch_merkle_path_circuit<F: PrimeField>(
    config: PoseidonConfig<F>,
    path_count: usize,
    depth: usize,
) -> Result<BatchMerklePathCircuit<F>, CircuitError> {
    check_depth(depth)?;
    if path_count == 0 {
        return Err(CircuitError::EmptyBatch);
    }
    Ok(BatchMerklePathCircuit {
        config,
        root: None,
        paths: vec![PathWitness::blank(depth); path_count],
    })
}

/// One leaf replacement inside an incremental-update circuit: membership of
/// the old leaf in the old tree and of the new leaf in the new tree, at the
/// same position.
#[derive(Clone)]
pub struct UpdateWitness<F: PrimeField> {
    pub old_leaf_data: Option<F>,
    pub new_leaf_data: Option<F>,
    pub old_sibling_hashes: Vec<Option<F>>,
    pub new_sibling_hashes: Vec<Option<F>>,
    pub path_directions: Vec<Option<bool>>,
}

impl<F: PrimeField> UpdateWitness<F> {
    fn blank(depth: usize) -> Self {
        Self {
            old_leaf_data: None,
            new_leaf_data: None,
            old_sibling_hashes: vec![None; depth],
            new_sibling_hashes: vec![None; depth],
            path_directions: vec![None; depth],
        }
    }
}

/// In-circuit form of an incremental root update: both roots are public,
/// and each update opens the old leaf against `old_root` and the new leaf
/// against `new_root` along the same direction bits.
#[derive(Clone)]
pub struct IncrementalUpdateCircuit<F: PrimeField> {
    pub config: PoseidonConfig<F>,
    pub old_root: Option<F>,
    pub new_root: Option<F>,
    pub updates: Vec<UpdateWitness<F>>,
}

impl<F: PrimeField> ConstraintSynthesizer<F> for IncrementalUpdateCircuit<F> {
    fn generate_constraints(self, cs: ConstraintSystemRef<F>) -> Result<(), SynthesisError> {
        let old_root = FpVar::new_input(cs.clone(), || {
            self.old_root.ok_or(SynthesisError::AssignmentMissing)
        })?;
        let new_root = FpVar::new_input(cs.clone(), || {
            self.new_root.ok_or(SynthesisError::AssignmentMissing)
        })?;

        for update in &self.updates {
            let old_leaf_data = FpVar::new_witness(cs.clone(), || {
                update.old_leaf_data.ok_or(SynthesisError::AssignmentMissing)
            })?;
            let old_leaf = leaf_gadget(cs.clone(), &self.config, &old_leaf_data)?;
            let computed_old = walk_path(
                cs.clone(),
                &self.config,
                old_leaf,
                &update.old_sibling_hashes,
                &update.path_directions,
            )?;
            computed_old.enforce_equal(&old_root)?;

            let new_leaf_data = FpVar::new_witness(cs.clone(), || {
                update.new_leaf_data.ok_or(SynthesisError::AssignmentMissing)
            })?;
            let new_leaf = leaf_gadget(cs.clone(), &self.config, &new_leaf_data)?;
            let computed_new = walk_path(
                cs.clone(),
                &self.config,
                new_leaf,
                &update.new_sibling_hashes,
                &update.path_directions,
            )?;
            computed_new.enforce_equal(&new_root)?;
        }
        Ok(())
    }
}

/// `make_incremental_update_circuit(path_count, depth)` including the
/// preallocated `new_leaf_data[path_count]` slots.
pub fn make_incremental_update_circuit<F: PrimeField>(
    config: PoseidonConfig<F>,
    path_count: usize,
    depth: usize,
) -> Result<IncrementalUpdateCircuit<F>, CircuitError> {
    check_depth(depth)?;
    if path_count == 0 {
        return Err(CircuitError::EmptyBatch);
    }
    Ok(IncrementalUpdateCircuit {
        config,
        old_root: None,
        new_root: None,
        updates: vec![UpdateWitness::blank(depth); path_count],
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ark_bls12_377::Fr;
    use ark_relations::r1cs::{ConstraintSystem, ConstraintSystemRef};
    use weisyn_merkle::{MerkleTree, TraceRecord};
    use weisyn_poseidon::{Poseidon2Hasher, bls12_377_config, field_from_bytes};

    use super::*;

    fn records(data: &[&str]) -> Vec<TraceRecord> {
        let hasher = Poseidon2Hasher::new();
        data.iter()
            .map(|item| TraceRecord::new(item.as_bytes().to_vec(), &hasher))
            .collect()
    }

    fn assigned_path_circuit(
        tree: &MerkleTree,
        records: &[TraceRecord],
        index: u64,
    ) -> MerklePathCircuit<Fr> {
        let path = tree.calculate_path(index).unwrap();
        let siblings = path
            .sibling_hashes
            .iter()
            .map(|hash| field_from_bytes(hash.as_slice()))
            .collect::<Vec<Fr>>();
        let directions = path
            .path_directions
            .iter()
            .map(|direction| *direction == 1)
            .collect::<Vec<_>>();
        make_merkle_path_circuit(bls12_377_config().clone(), path.depth())
            .unwrap()
            .assign(
                field_from_bytes(tree.root().as_slice()),
                field_from_bytes(&records[index as usize].serialized_data),
                siblings,
                directions,
            )
            .unwrap()
    }

    #[test]
    fn test_depth_bounds() {
        let config = bls12_377_config().clone();
        assert_eq!(
            make_merkle_path_circuit::<Fr>(config.clone(), 0).err(),
            Some(CircuitError::UnsupportedDepth(0))
        );
        assert!(make_merkle_path_circuit::<Fr>(config.clone(), 20).is_ok());
        assert_eq!(
            make_merkle_path_circuit::<Fr>(config, 21).err(),
            Some(CircuitError::UnsupportedDepth(21))
        );
    }

    #[test]
    fn test_batch_and_incremental_factories_reject_empty_shapes() {
        let config = bls12_377_config().clone();
        assert_eq!(
            make_batch_merkle_path_circuit::<Fr>(config.clone(), 0, 4).err(),
            Some(CircuitError::EmptyBatch)
        );
        assert_eq!(
            make_incremental_update_circuit::<Fr>(config.clone(), 2, 0).err(),
            Some(CircuitError::UnsupportedDepth(0))
        );
        let circuit = make_incremental_update_circuit::<Fr>(config, 3, 5).unwrap();
        assert_eq!(circuit.updates.len(), 3);
        assert_eq!(circuit.updates[0].new_sibling_hashes.len(), 5);
    }

    #[test]
    fn test_path_circuit_is_satisfied_by_real_tree_path() {
        let records = records(&["r1", "r2", "r3", "r4"]);
        let tree = MerkleTree::build(&records, Arc::new(Poseidon2Hasher::new())).unwrap();

        for index in 0..4 {
            let circuit = assigned_path_circuit(&tree, &records, index);
            let cs: ConstraintSystemRef<Fr> = ConstraintSystem::new_ref();
            circuit.generate_constraints(cs.clone()).unwrap();
            assert!(cs.is_satisfied().unwrap(), "leaf {index} not satisfied");
        }
    }

    #[test]
    fn test_path_circuit_rejects_wrong_root() {
        let records = records(&["r1", "r2", "r3", "r4"]);
        let tree = MerkleTree::build(&records, Arc::new(Poseidon2Hasher::new())).unwrap();

        let mut circuit = assigned_path_circuit(&tree, &records, 0);
        circuit.root = Some(Fr::from(12345u64));

        let cs: ConstraintSystemRef<Fr> = ConstraintSystem::new_ref();
        circuit.generate_constraints(cs.clone()).unwrap();
        assert!(!cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_assign_rejects_wrong_arity() {
        let circuit = make_merkle_path_circuit::<Fr>(bls12_377_config().clone(), 3).unwrap();
        let result = circuit.assign(Fr::from(1u64), Fr::from(2u64), vec![Fr::from(3u64)], vec![
            false,
        ]);
        assert_eq!(
            result.err(),
            Some(CircuitError::ArityMismatch {
                expected: 3,
                actual: 1
            })
        );
    }
}
