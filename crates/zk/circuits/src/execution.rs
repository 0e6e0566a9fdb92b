use ark_crypto_primitives::sponge::Absorb;
use ark_crypto_primitives::sponge::poseidon::PoseidonConfig;
use ark_ff::PrimeField;
use ark_r1cs_std::{
    alloc::AllocVar,
    eq::EqGadget,
    fields::{FieldVar, fp::FpVar},
};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};
use weisyn_poseidon::{compress_with, constraints::compress_gadget};

/// Binds the pre-hashed private execution digests (trace hash, state-diff
/// hash) to a Poseidon commitment carried as the final public input,
/// alongside the caller's positional public inputs.
///
/// The private inputs reach the proving layer already reduced to 32-byte
/// digests; the circuit never sees raw trace data.
#[derive(Clone)]
pub struct ExecutionCommitmentCircuit<F: PrimeField> {
    pub config: PoseidonConfig<F>,
    pub public_inputs: Vec<Option<F>>,
    pub private_inputs: Vec<Option<F>>,
    pub commitment: Option<F>,
}

impl<F: PrimeField + Absorb> ExecutionCommitmentCircuit<F> {
    /// Blank instance with fixed arity, used for key generation.
    pub fn blank(config: PoseidonConfig<F>, public_count: usize, private_count: usize) -> Self {
        Self {
            config,
            public_inputs: vec![None; public_count],
            private_inputs: vec![None; private_count],
            commitment: None,
        }
    }

    /// The commitment the circuit enforces: a left fold of the two-to-one
    /// compression over the private inputs, starting from a zero
    /// accumulator.
    pub fn commitment_of(config: &PoseidonConfig<F>, private_inputs: &[F]) -> F {
        let mut accumulator = F::zero();
        for private in private_inputs {
            accumulator = compress_with(config, accumulator, *private);
        }
        accumulator
    }
}

impl<F: PrimeField> ConstraintSynthesizer<F> for ExecutionCommitmentCircuit<F> {
    fn generate_constraints(self, cs: ConstraintSystemRef<F>) -> Result<(), SynthesisError> {
        for public in &self.public_inputs {
            let _ = FpVar::new_input(cs.clone(), || {
                public.ok_or(SynthesisError::AssignmentMissing)
            })?;
        }
        let commitment = FpVar::new_input(cs.clone(), || {
            self.commitment.ok_or(SynthesisError::AssignmentMissing)
        })?;

        let mut accumulator = FpVar::zero();
        for private in &self.private_inputs {
            let witness = FpVar::new_witness(cs.clone(), || {
                private.ok_or(SynthesisError::AssignmentMissing)
            })?;
            accumulator = compress_gadget(cs.clone(), &self.config, &accumulator, &witness)?;
        }
        accumulator.enforce_equal(&commitment)
    }
}

#[cfg(test)]
mod tests {
    use ark_bn254::Fr;
    use ark_relations::r1cs::{ConstraintSystem, ConstraintSystemRef};
    use weisyn_poseidon::bn254_config;

    use super::*;

    fn assigned(publics: Vec<Fr>, privates: Vec<Fr>) -> ExecutionCommitmentCircuit<Fr> {
        let config = bn254_config().clone();
        let commitment = ExecutionCommitmentCircuit::commitment_of(&config, &privates);
        ExecutionCommitmentCircuit {
            config,
            public_inputs: publics.into_iter().map(Some).collect(),
            private_inputs: privates.into_iter().map(Some).collect(),
            commitment: Some(commitment),
        }
    }

    #[test]
    fn test_commitment_binds_private_inputs() {
        let circuit = assigned(
            vec![Fr::from(1u64), Fr::from(2u64), Fr::from(3u64)],
            vec![Fr::from(7u64), Fr::from(9u64)],
        );
        let cs: ConstraintSystemRef<Fr> = ConstraintSystem::new_ref();
        circuit.generate_constraints(cs.clone()).unwrap();
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_wrong_commitment_is_rejected() {
        let mut circuit = assigned(vec![Fr::from(1u64)], vec![Fr::from(7u64)]);
        circuit.commitment = Some(Fr::from(999u64));

        let cs: ConstraintSystemRef<Fr> = ConstraintSystem::new_ref();
        circuit.generate_constraints(cs.clone()).unwrap();
        assert!(!cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_commitment_depends_on_order() {
        let config = bn254_config().clone();
        let forward = ExecutionCommitmentCircuit::commitment_of(&config, &[
            Fr::from(1u64),
            Fr::from(2u64),
        ]);
        let reversed = ExecutionCommitmentCircuit::commitment_of(&config, &[
            Fr::from(2u64),
            Fr::from(1u64),
        ]);
        assert_ne!(forward, reversed);
    }
}
