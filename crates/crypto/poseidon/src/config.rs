use ark_crypto_primitives::sponge::poseidon::{PoseidonConfig, find_poseidon_ark_and_mds};
use ark_ff::PrimeField;

// Sponge shape shared by the native hasher and the in-circuit gadget. Two
// absorbed elements per permutation, one squeezed digest element.
const RATE: usize = 2;
const CAPACITY: usize = 1;
const FULL_ROUNDS: usize = 8;

// Round counts and S-box exponents follow the usual per-curve choices for
// a t = 3 Poseidon instance.
const BLS12_377_PARTIAL_ROUNDS: usize = 31;
const BLS12_377_ALPHA: u64 = 17;
const BN254_PARTIAL_ROUNDS: usize = 57;
const BN254_ALPHA: u64 = 5;

fn build_config<F: PrimeField>(partial_rounds: usize, alpha: u64) -> PoseidonConfig<F> {
    let (ark, mds) = find_poseidon_ark_and_mds::<F>(
        F::MODULUS_BIT_SIZE as u64,
        RATE,
        FULL_ROUNDS as u64,
        partial_rounds as u64,
        0,
    );
    PoseidonConfig::new(FULL_ROUNDS, partial_rounds, alpha, mds, ark, RATE, CAPACITY)
}

lazy_static::lazy_static! {
    static ref BLS12_377_CONFIG: PoseidonConfig<ark_bls12_377::Fr> =
        build_config(BLS12_377_PARTIAL_ROUNDS, BLS12_377_ALPHA);
    static ref BN254_CONFIG: PoseidonConfig<ark_bn254::Fr> =
        build_config(BN254_PARTIAL_ROUNDS, BN254_ALPHA);
}

/// Parameters for the Merkle-trace hash over the BLS12-377 scalar field.
pub fn bls12_377_config() -> &'static PoseidonConfig<ark_bls12_377::Fr> {
    &BLS12_377_CONFIG
}

/// Parameters for the execution-commitment circuits over the BN254 scalar
/// field.
pub fn bn254_config() -> &'static PoseidonConfig<ark_bn254::Fr> {
    &BN254_CONFIG
}
