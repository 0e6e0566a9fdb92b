use std::collections::HashMap;
use std::sync::Arc;

use ark_bls12_377::Bls12_377;
use ark_bn254::Bn254;
use ark_crypto_primitives::sponge::poseidon::PoseidonConfig;
use ark_ec::pairing::Pairing;
use ark_ff::PrimeField;
use ark_groth16::{Groth16, PreparedVerifyingKey, Proof, ProvingKey};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystem, SynthesisMode};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_snark::{CircuitSpecificSetupSNARK, SNARK};
use ark_std::rand::{SeedableRng, rngs::StdRng};
use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};
use tracing::debug;
use weisyn_circuits::{
    ExecutionCommitmentCircuit, make_batch_merkle_path_circuit, make_incremental_update_circuit,
    make_merkle_path_circuit,
};
use weisyn_poseidon::{bls12_377_config, bn254_config, field_from_bytes, field_to_b256};
use weisyn_types::state_output::{Curve, ProvingScheme, ZkStateProof};

use crate::{errors::ProverError, input::ZkProofInput, selection::select_scheme};

/// Shape of a registered circuit. Array lengths are fixed here because the
/// proving framework needs them at key-generation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CircuitKind {
    ExecutionCommitment {
        public_count: usize,
        private_count: usize,
    },
    MerklePath {
        depth: usize,
    },
    BatchMerklePath {
        path_count: usize,
        depth: usize,
    },
    IncrementalUpdate {
        path_count: usize,
        depth: usize,
    },
}

pub(crate) struct CompiledKeys<E: Pairing> {
    pk: ProvingKey<E>,
    pvk: PreparedVerifyingKey<E>,
    constraint_count: u64,
    vk_hash: Vec<u8>,
}

pub(crate) enum CompiledCircuit {
    Bn254(CompiledKeys<Bn254>),
    Bls12_377(CompiledKeys<Bls12_377>),
}

impl CompiledCircuit {
    fn constraint_count(&self) -> u64 {
        match self {
            CompiledCircuit::Bn254(keys) => keys.constraint_count,
            CompiledCircuit::Bls12_377(keys) => keys.constraint_count,
        }
    }

    fn vk_hash(&self) -> &[u8] {
        match self {
            CompiledCircuit::Bn254(keys) => &keys.vk_hash,
            CompiledCircuit::Bls12_377(keys) => &keys.vk_hash,
        }
    }
}

/// One registry entry. Compilation (constraint system plus proving and
/// verification keys) is memoized behind a lock so concurrent generations
/// for the same circuit share the compiled artifacts.
pub struct RegisteredCircuit {
    pub circuit_id: String,
    pub version: u32,
    pub curve: Curve,
    pub kind: CircuitKind,
    compiled: Mutex<Option<Arc<CompiledCircuit>>>,
}

impl RegisteredCircuit {
    fn compiled(&self) -> Result<Arc<CompiledCircuit>, ProverError> {
        let mut guard = self.compiled.lock();
        if let Some(compiled) = guard.as_ref() {
            return Ok(compiled.clone());
        }
        let compiled = Arc::new(self.compile()?);
        *guard = Some(compiled.clone());
        Ok(compiled)
    }

    fn compile(&self) -> Result<CompiledCircuit, ProverError> {
        let seed = setup_seed(&self.circuit_id, self.version);
        match (&self.curve, &self.kind) {
            (
                Curve::Bn254,
                CircuitKind::ExecutionCommitment {
                    public_count,
                    private_count,
                },
            ) => {
                let blank = ExecutionCommitmentCircuit::blank(
                    bn254_config().clone(),
                    *public_count,
                    *private_count,
                );
                Ok(CompiledCircuit::Bn254(compile_keys::<Bn254, _>(blank, seed)?))
            }
            (
                Curve::Bls12_377,
                CircuitKind::ExecutionCommitment {
                    public_count,
                    private_count,
                },
            ) => {
                let blank = ExecutionCommitmentCircuit::blank(
                    bls12_377_config().clone(),
                    *public_count,
                    *private_count,
                );
                Ok(CompiledCircuit::Bls12_377(compile_keys::<Bls12_377, _>(
                    blank, seed,
                )?))
            }
            (Curve::Bls12_377, CircuitKind::MerklePath { depth }) => {
                let blank = make_merkle_path_circuit(bls12_377_config().clone(), *depth)?;
                Ok(CompiledCircuit::Bls12_377(compile_keys::<Bls12_377, _>(
                    blank, seed,
                )?))
            }
            (Curve::Bls12_377, CircuitKind::BatchMerklePath { path_count, depth }) => {
                let blank =
                    make_batch_merkle_path_circuit(bls12_377_config().clone(), *path_count, *depth)?;
                Ok(CompiledCircuit::Bls12_377(compile_keys::<Bls12_377, _>(
                    blank, seed,
                )?))
            }
            (Curve::Bls12_377, CircuitKind::IncrementalUpdate { path_count, depth }) => {
                let blank = make_incremental_update_circuit(
                    bls12_377_config().clone(),
                    *path_count,
                    *depth,
                )?;
                Ok(CompiledCircuit::Bls12_377(compile_keys::<Bls12_377, _>(
                    blank, seed,
                )?))
            }
            _ => Err(ProverError::UnsupportedCircuit(self.circuit_id.clone())),
        }
    }
}

fn setup_seed(circuit_id: &str, version: u32) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(circuit_id.as_bytes());
    hasher.update(version.to_be_bytes());
    let digest = hasher.finalize();
    u64::from_be_bytes(digest[..8].try_into().unwrap_or_default())
}

fn prove_seed(input: &ZkProofInput) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(input.circuit_id.as_bytes());
    hasher.update(input.circuit_version.to_be_bytes());
    for public in &input.public_inputs {
        hasher.update(public);
    }
    for (name, value) in &input.private_inputs {
        hasher.update(name.as_bytes());
        hasher.update(value);
    }
    let digest = hasher.finalize();
    u64::from_be_bytes(digest[..8].try_into().unwrap_or_default())
}

fn compile_keys<E: Pairing, C: ConstraintSynthesizer<E::ScalarField> + Clone>(
    circuit: C,
    seed: u64,
) -> Result<CompiledKeys<E>, ProverError> {
    let cs = ConstraintSystem::<E::ScalarField>::new_ref();
    cs.set_mode(SynthesisMode::Setup);
    circuit.clone().generate_constraints(cs.clone())?;
    let constraint_count = cs.num_constraints() as u64;

    let mut rng = StdRng::seed_from_u64(seed);
    let (pk, vk) = Groth16::<E>::setup(circuit, &mut rng)?;

    let mut vk_bytes = Vec::new();
    vk.serialize_compressed(&mut vk_bytes)?;
    let vk_hash = Sha256::digest(&vk_bytes).to_vec();
    let pvk = Groth16::<E>::process_vk(&vk)?;

    Ok(CompiledKeys {
        pk,
        pvk,
        constraint_count,
        vk_hash,
    })
}

fn prove_with_keys<E: Pairing, C: ConstraintSynthesizer<E::ScalarField>>(
    keys: &CompiledKeys<E>,
    circuit: C,
    public_inputs: &[E::ScalarField],
    seed: u64,
) -> Result<Vec<u8>, ProverError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let proof = Groth16::<E>::prove(&keys.pk, circuit, &mut rng)?;

    // Local pre-verification before the proof leaves the process.
    if !Groth16::<E>::verify_with_processed_vk(&keys.pvk, public_inputs, &proof)? {
        return Err(ProverError::ProofVerificationFailed);
    }

    let mut bytes = Vec::new();
    proof.serialize_compressed(&mut bytes)?;
    Ok(bytes)
}

fn require_private<'a>(input: &'a ZkProofInput, name: &str) -> Result<&'a [u8], ProverError> {
    input
        .private(name)
        .ok_or_else(|| ProverError::WitnessBinding(format!("missing private input {name}")))
}

fn fields_from_chunks<F: PrimeField>(
    bytes: &[u8],
    expected: usize,
    name: &str,
) -> Result<Vec<F>, ProverError> {
    if bytes.len() != expected * 32 {
        return Err(ProverError::WitnessBinding(format!(
            "{name} must be {} bytes, got {}",
            expected * 32,
            bytes.len()
        )));
    }
    Ok(bytes.chunks(32).map(field_from_bytes).collect())
}

fn directions_from_bytes(bytes: &[u8], expected: usize) -> Result<Vec<bool>, ProverError> {
    if bytes.len() != expected {
        return Err(ProverError::WitnessBinding(format!(
            "path_directions must be {expected} bytes, got {}",
            bytes.len()
        )));
    }
    Ok(bytes.iter().map(|byte| *byte == 1).collect())
}

fn bind_publics<F: PrimeField>(input: &ZkProofInput, expected: usize) -> Result<Vec<F>, ProverError> {
    if input.public_inputs.len() != expected {
        return Err(ProverError::WitnessBinding(format!(
            "expected {expected} public inputs, got {}",
            input.public_inputs.len()
        )));
    }
    Ok(input
        .public_inputs
        .iter()
        .map(|bytes| field_from_bytes(bytes))
        .collect())
}

/// Bind the input to an assigned circuit for the entry's kind, prove, and
/// return the proof bytes plus the byte-level public inputs recorded on the
/// resulting [`ZkStateProof`].
fn generate_for_curve<E: Pairing>(
    entry: &RegisteredCircuit,
    keys: &CompiledKeys<E>,
    config: &PoseidonConfig<E::ScalarField>,
    input: &ZkProofInput,
    seed: u64,
) -> Result<(Vec<u8>, Vec<Vec<u8>>), ProverError>
where
    E::ScalarField: ark_crypto_primitives::sponge::Absorb,
{
    match &entry.kind {
        CircuitKind::ExecutionCommitment {
            public_count,
            private_count,
        } => {
            let publics = bind_publics::<E::ScalarField>(input, *public_count)?;
            if input.private_inputs.len() != *private_count {
                return Err(ProverError::WitnessBinding(format!(
                    "expected {private_count} private inputs, got {}",
                    input.private_inputs.len()
                )));
            }
            let privates: Vec<E::ScalarField> = input
                .private_inputs
                .values()
                .map(|bytes| field_from_bytes(bytes))
                .collect();
            let commitment = ExecutionCommitmentCircuit::commitment_of(config, &privates);

            let circuit = ExecutionCommitmentCircuit {
                config: config.clone(),
                public_inputs: publics.iter().copied().map(Some).collect(),
                private_inputs: privates.into_iter().map(Some).collect(),
                commitment: Some(commitment),
            };

            let mut verifier_publics = publics;
            verifier_publics.push(commitment);
            let proof_bytes = prove_with_keys(keys, circuit, &verifier_publics, seed)?;

            let mut public_bytes = input.public_inputs.clone();
            public_bytes.push(field_to_b256(commitment).to_vec());
            Ok((proof_bytes, public_bytes))
        }
        CircuitKind::MerklePath { depth } => {
            let publics = bind_publics::<E::ScalarField>(input, 1)?;
            let leaf = field_from_bytes(require_private(input, "leaf_data")?);
            let siblings =
                fields_from_chunks(require_private(input, "sibling_hashes")?, *depth, "sibling_hashes")?;
            let directions =
                directions_from_bytes(require_private(input, "path_directions")?, *depth)?;

            let circuit = make_merkle_path_circuit(config.clone(), *depth)?.assign(
                publics[0],
                leaf,
                siblings,
                directions,
            )?;
            let proof_bytes = prove_with_keys(keys, circuit, &publics, seed)?;
            Ok((proof_bytes, input.public_inputs.clone()))
        }
        CircuitKind::BatchMerklePath { path_count, depth } => {
            let publics = bind_publics::<E::ScalarField>(input, 1)?;
            let leaves = fields_from_chunks::<E::ScalarField>(
                require_private(input, "leaf_data")?,
                *path_count,
                "leaf_data",
            )?;
            let siblings = fields_from_chunks::<E::ScalarField>(
                require_private(input, "sibling_hashes")?,
                path_count * depth,
                "sibling_hashes",
            )?;
            let directions = directions_from_bytes(
                require_private(input, "path_directions")?,
                path_count * depth,
            )?;

            let mut circuit = make_batch_merkle_path_circuit(config.clone(), *path_count, *depth)?;
            circuit.root = Some(publics[0]);
            for (index, path) in circuit.paths.iter_mut().enumerate() {
                path.leaf_data = Some(leaves[index]);
                path.sibling_hashes = siblings[index * depth..(index + 1) * depth]
                    .iter()
                    .copied()
                    .map(Some)
                    .collect();
                path.path_directions = directions[index * depth..(index + 1) * depth]
                    .iter()
                    .copied()
                    .map(Some)
                    .collect();
            }

            let proof_bytes = prove_with_keys(keys, circuit, &publics, seed)?;
            Ok((proof_bytes, input.public_inputs.clone()))
        }
        CircuitKind::IncrementalUpdate { path_count, depth } => {
            let publics = bind_publics::<E::ScalarField>(input, 2)?;
            let old_leaves = fields_from_chunks::<E::ScalarField>(
                require_private(input, "old_leaf_data")?,
                *path_count,
                "old_leaf_data",
            )?;
            let new_leaves = fields_from_chunks::<E::ScalarField>(
                require_private(input, "new_leaf_data")?,
                *path_count,
                "new_leaf_data",
            )?;
            let old_siblings = fields_from_chunks::<E::ScalarField>(
                require_private(input, "old_sibling_hashes")?,
                path_count * depth,
                "old_sibling_hashes",
            )?;
            let new_siblings = fields_from_chunks::<E::ScalarField>(
                require_private(input, "new_sibling_hashes")?,
                path_count * depth,
                "new_sibling_hashes",
            )?;
            let directions = directions_from_bytes(
                require_private(input, "path_directions")?,
                path_count * depth,
            )?;

            let mut circuit =
                make_incremental_update_circuit(config.clone(), *path_count, *depth)?;
            circuit.old_root = Some(publics[0]);
            circuit.new_root = Some(publics[1]);
            for (index, update) in circuit.updates.iter_mut().enumerate() {
                let span = index * depth..(index + 1) * depth;
                update.old_leaf_data = Some(old_leaves[index]);
                update.new_leaf_data = Some(new_leaves[index]);
                update.old_sibling_hashes =
                    old_siblings[span.clone()].iter().copied().map(Some).collect();
                update.new_sibling_hashes =
                    new_siblings[span.clone()].iter().copied().map(Some).collect();
                update.path_directions = directions[span].iter().copied().map(Some).collect();
            }

            let proof_bytes = prove_with_keys(keys, circuit, &publics, seed)?;
            Ok((proof_bytes, input.public_inputs.clone()))
        }
    }
}

fn verify_for_curve<E: Pairing>(
    keys: &CompiledKeys<E>,
    proof: &ZkStateProof,
) -> Result<bool, ProverError> {
    let parsed = Proof::<E>::deserialize_compressed(&proof.proof[..])?;
    let publics: Vec<E::ScalarField> = proof
        .public_inputs
        .iter()
        .map(|bytes| field_from_bytes(bytes))
        .collect();
    Ok(Groth16::<E>::verify_with_processed_vk(
        &keys.pvk, &publics, &parsed,
    )?)
}

/// Registry of provable circuits keyed by `(circuit_id, version)`.
pub struct CircuitRegistry {
    entries: RwLock<HashMap<(String, u32), Arc<RegisteredCircuit>>>,
}

impl CircuitRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Registry preloaded with the circuits the coordinator and the Merkle
    /// subsystem rely on.
    pub fn with_default_circuits() -> Self {
        let registry = Self::new();
        registry.register("contract_execution", 1, CircuitKind::ExecutionCommitment {
            public_count: 3,
            private_count: 2,
        }, Curve::Bn254);
        registry.register("aimodel_inference", 1, CircuitKind::ExecutionCommitment {
            public_count: 3,
            private_count: 2,
        }, Curve::Bn254);
        registry.register("merkle_path", 1, CircuitKind::MerklePath { depth: 20 }, Curve::Bls12_377);
        registry.register(
            "batch_merkle_path",
            1,
            CircuitKind::BatchMerklePath {
                path_count: 8,
                depth: 20,
            },
            Curve::Bls12_377,
        );
        registry.register(
            "incremental_update",
            1,
            CircuitKind::IncrementalUpdate {
                path_count: 8,
                depth: 20,
            },
            Curve::Bls12_377,
        );
        registry
    }

    pub fn register(&self, circuit_id: &str, version: u32, kind: CircuitKind, curve: Curve) {
        self.entries.write().insert(
            (circuit_id.to_string(), version),
            Arc::new(RegisteredCircuit {
                circuit_id: circuit_id.to_string(),
                version,
                curve,
                kind,
                compiled: Mutex::new(None),
            }),
        );
    }

    pub fn get(
        &self,
        circuit_id: &str,
        version: u32,
    ) -> Result<Arc<RegisteredCircuit>, ProverError> {
        self.entries
            .read()
            .get(&(circuit_id.to_string(), version))
            .cloned()
            .ok_or_else(|| ProverError::CircuitNotFound {
                circuit_id: circuit_id.to_string(),
                version,
            })
    }

    /// Synchronous proof generation: bind the witness, prove, pre-verify,
    /// and wrap into a [`ZkStateProof`].
    pub fn generate(&self, input: &ZkProofInput) -> Result<ZkStateProof, ProverError> {
        let entry = self.get(&input.circuit_id, input.circuit_version)?;
        let compiled = entry.compiled()?;
        let seed = prove_seed(input);

        let (proof_bytes, public_bytes) = match compiled.as_ref() {
            CompiledCircuit::Bn254(keys) => {
                generate_for_curve::<Bn254>(&entry, keys, bn254_config(), input, seed)?
            }
            CompiledCircuit::Bls12_377(keys) => {
                generate_for_curve::<Bls12_377>(&entry, keys, bls12_377_config(), input, seed)?
            }
        };

        let constraint_count = compiled.constraint_count();
        let (recommended_scheme, recommended_curve) = select_scheme(constraint_count);
        if recommended_scheme != ProvingScheme::Groth16 {
            debug!(
                circuit_id = %entry.circuit_id,
                constraint_count,
                "policy recommends {}/{}; proving with the integrated groth16 backend",
                recommended_scheme.as_str(),
                recommended_curve.as_str(),
            );
        }

        Ok(ZkStateProof {
            proof: proof_bytes,
            public_inputs: public_bytes,
            proving_scheme: ProvingScheme::Groth16,
            curve: entry.curve,
            verification_key_hash: compiled.vk_hash().to_vec(),
            circuit_id: entry.circuit_id.clone(),
            circuit_version: entry.version,
            constraint_count,
            generated_at: None,
        })
    }

    /// Verify a proof produced by [`Self::generate`]. Pending placeholders
    /// never verify.
    pub fn verify(&self, proof: &ZkStateProof) -> Result<bool, ProverError> {
        if proof.is_pending() {
            return Ok(false);
        }
        let entry = self.get(&proof.circuit_id, proof.circuit_version)?;
        let compiled = entry.compiled()?;
        match compiled.as_ref() {
            CompiledCircuit::Bn254(keys) => verify_for_curve::<Bn254>(keys, proof),
            CompiledCircuit::Bls12_377(keys) => verify_for_curve::<Bls12_377>(keys, proof),
        }
    }
}

impl Default for CircuitRegistry {
    fn default() -> Self {
        Self::with_default_circuits()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc as StdArc;

    use weisyn_merkle::{MerkleTree, TraceRecord};
    use weisyn_poseidon::Poseidon2Hasher;

    use super::*;

    fn execution_input() -> ZkProofInput {
        ZkProofInput {
            public_inputs: vec![vec![0x01; 32], vec![0x02; 32], vec![0x03; 32]],
            private_inputs: BTreeMap::from([
                ("state_diff_hash".to_string(), vec![0x05; 32]),
                ("trace_hash".to_string(), vec![0x04; 32]),
            ]),
            circuit_id: "contract_execution".to_string(),
            circuit_version: 1,
        }
    }

    #[test]
    fn test_generate_and_verify_execution_proof() {
        let registry = CircuitRegistry::with_default_circuits();
        let proof = registry.generate(&execution_input()).unwrap();

        assert!(!proof.proof.is_empty());
        assert!(proof.constraint_count > 0);
        assert_eq!(proof.proving_scheme, ProvingScheme::Groth16);
        assert_eq!(proof.curve, Curve::Bn254);
        assert_eq!(proof.verification_key_hash.len(), 32);
        // three caller publics plus the appended commitment
        assert_eq!(proof.public_inputs.len(), 4);
        assert!(registry.verify(&proof).unwrap());
    }

    #[test]
    fn test_proof_generation_is_deterministic() {
        let registry = CircuitRegistry::with_default_circuits();
        let first = registry.generate(&execution_input()).unwrap();
        let second = registry.generate(&execution_input()).unwrap();
        assert_eq!(first.proof, second.proof);
        assert_eq!(first.public_inputs, second.public_inputs);
    }

    #[test]
    fn test_unknown_circuit_is_rejected() {
        let registry = CircuitRegistry::with_default_circuits();
        let mut input = execution_input();
        input.circuit_id = "unknown".to_string();
        assert!(matches!(
            registry.generate(&input),
            Err(ProverError::CircuitNotFound { .. })
        ));
    }

    #[test]
    fn test_wrong_public_arity_is_rejected() {
        let registry = CircuitRegistry::with_default_circuits();
        let mut input = execution_input();
        input.public_inputs.pop();
        assert!(matches!(
            registry.generate(&input),
            Err(ProverError::WitnessBinding(_))
        ));
    }

    #[test]
    fn test_merkle_path_proof_over_real_tree() {
        let registry = CircuitRegistry::new();
        registry.register(
            "merkle_path",
            1,
            CircuitKind::MerklePath { depth: 2 },
            Curve::Bls12_377,
        );

        let hasher = Poseidon2Hasher::new();
        let records = ["r1", "r2", "r3", "r4"]
            .iter()
            .map(|data| TraceRecord::new(data.as_bytes().to_vec(), &hasher))
            .collect::<Vec<_>>();
        let tree = MerkleTree::build(&records, StdArc::new(hasher)).unwrap();
        let path = tree.calculate_path(2).unwrap();

        let mut sibling_bytes = Vec::new();
        for sibling in &path.sibling_hashes {
            sibling_bytes.extend_from_slice(sibling.as_slice());
        }

        let input = ZkProofInput {
            public_inputs: vec![tree.root().as_slice().to_vec()],
            private_inputs: BTreeMap::from([
                ("leaf_data".to_string(), records[2].serialized_data.clone()),
                ("sibling_hashes".to_string(), sibling_bytes),
                ("path_directions".to_string(), path.path_directions.clone()),
            ]),
            circuit_id: "merkle_path".to_string(),
            circuit_version: 1,
        };

        let proof = registry.generate(&input).unwrap();
        assert_eq!(proof.curve, Curve::Bls12_377);
        assert!(registry.verify(&proof).unwrap());
    }

    #[test]
    fn test_pending_proof_never_verifies() {
        let registry = CircuitRegistry::with_default_circuits();
        let pending = ZkStateProof {
            proof: weisyn_types::state_output::PENDING_PROOF_BYTES.to_vec(),
            public_inputs: vec![],
            proving_scheme: ProvingScheme::Groth16,
            curve: Curve::Bn254,
            verification_key_hash: vec![],
            circuit_id: "contract_execution".to_string(),
            circuit_version: 1,
            constraint_count: 0,
            generated_at: None,
        };
        assert!(!registry.verify(&pending).unwrap());
    }
}
