use ark_crypto_primitives::sponge::{
    constraints::CryptographicSpongeVar,
    poseidon::{PoseidonConfig, constraints::PoseidonSpongeVar},
};
use ark_ff::PrimeField;
use ark_r1cs_std::fields::{FieldVar, fp::FpVar};
use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};

/// In-circuit two-to-one compression, mirroring
/// [`Poseidon2Hasher::compress`](crate::hasher::Poseidon2Hasher::compress)
/// exactly so native and in-circuit roots coincide.
pub fn compress_gadget<F: PrimeField>(
    cs: ConstraintSystemRef<F>,
    config: &PoseidonConfig<F>,
    left: &FpVar<F>,
    right: &FpVar<F>,
) -> Result<FpVar<F>, SynthesisError> {
    let mut sponge = PoseidonSpongeVar::new(cs, config);
    sponge.absorb(left)?;
    sponge.absorb(right)?;
    let mut squeezed = sponge.squeeze_field_elements(1)?;
    Ok(squeezed.remove(0))
}

/// In-circuit leaf hash: `H(data, 0)`.
pub fn leaf_gadget<F: PrimeField>(
    cs: ConstraintSystemRef<F>,
    config: &PoseidonConfig<F>,
    leaf_data: &FpVar<F>,
) -> Result<FpVar<F>, SynthesisError> {
    compress_gadget(cs, config, leaf_data, &FpVar::zero())
}

#[cfg(test)]
mod tests {
    use ark_bls12_377::Fr;
    use ark_r1cs_std::{R1CSVar, alloc::AllocVar};
    use ark_relations::r1cs::ConstraintSystem;

    use super::*;
    use crate::{config::bls12_377_config, hasher::Poseidon2Hasher};

    #[test]
    fn test_gadget_matches_native_compression() {
        let cs = ConstraintSystem::<Fr>::new_ref();
        let left = Fr::from(7u64);
        let right = Fr::from(11u64);

        let left_var = FpVar::new_witness(cs.clone(), || Ok(left)).unwrap();
        let right_var = FpVar::new_witness(cs.clone(), || Ok(right)).unwrap();
        let digest_var =
            compress_gadget(cs.clone(), bls12_377_config(), &left_var, &right_var).unwrap();

        let native = Poseidon2Hasher::new().compress(left, right);
        assert_eq!(digest_var.value().unwrap(), native);
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_leaf_gadget_matches_native_leaf_convention() {
        let cs = ConstraintSystem::<Fr>::new_ref();
        let data = Fr::from(42u64);

        let data_var = FpVar::new_witness(cs.clone(), || Ok(data)).unwrap();
        let leaf_var = leaf_gadget(cs.clone(), bls12_377_config(), &data_var).unwrap();

        let native = Poseidon2Hasher::new().compress(data, Fr::from(0u64));
        assert_eq!(leaf_var.value().unwrap(), native);
    }
}
