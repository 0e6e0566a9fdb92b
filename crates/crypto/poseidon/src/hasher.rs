use alloy_primitives::B256;
use ark_bls12_377::Fr;
use ark_crypto_primitives::sponge::{
    Absorb, CryptographicSponge, FieldBasedCryptographicSponge,
    poseidon::{PoseidonConfig, PoseidonSponge},
};
use ark_ff::{BigInteger, PrimeField};

use crate::config::bls12_377_config;

/// Two-to-one compression with an explicit parameter set, generic over the
/// field.
pub fn compress_with<F: PrimeField + Absorb>(config: &PoseidonConfig<F>, left: F, right: F) -> F {
    let mut sponge = PoseidonSponge::new(config);
    sponge.absorb(&left);
    sponge.absorb(&right);
    sponge.squeeze_native_field_elements(1)[0]
}

/// Interpret up to 32 bytes as a big-endian field element.
pub fn field_from_bytes<F: PrimeField>(bytes: &[u8]) -> F {
    F::from_be_bytes_mod_order(bytes)
}

/// Big-endian 32-byte rendering of a field element.
pub fn field_to_b256<F: PrimeField>(element: F) -> B256 {
    let bytes = element.into_bigint().to_bytes_be();
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(&bytes);
    B256::from_slice(&out)
}

/// ZK-friendly hash over the BLS12-377 scalar field, used for Merkle trees
/// whose roots must be recomputable inside a circuit.
///
/// Inputs bind to field elements as follows: up to 32 bytes become the
/// first element with a zero second element (the leaf convention), exactly
/// 64 bytes split into two elements (the internal-node convention), and
/// anything between takes the first 32 bytes on the left and the remainder
/// on the right. Longer inputs chain 32-byte blocks Merkle–Damgård style
/// through the same two-to-one compression, so the off-circuit builder and
/// the in-circuit gadget always agree on roots.
#[derive(Debug, Clone, Copy, Default)]
pub struct Poseidon2Hasher;

impl Poseidon2Hasher {
    pub fn new() -> Self {
        Self
    }

    /// Two-to-one compression over field elements.
    pub fn compress(&self, left: Fr, right: Fr) -> Fr {
        compress_with(bls12_377_config(), left, right)
    }

    /// Hash arbitrary bytes to a 32-byte digest.
    pub fn digest(&self, data: &[u8]) -> B256 {
        field_to_b256(self.digest_field(data))
    }

    /// Hash arbitrary bytes to a field element.
    pub fn digest_field(&self, data: &[u8]) -> Fr {
        if data.len() <= 32 {
            return self.compress(field_from_bytes(data), Fr::from(0u64));
        }
        if data.len() <= 64 {
            let (left, right) = data.split_at(32);
            return self.compress(field_from_bytes(left), field_from_bytes(right));
        }

        let mut blocks = data.chunks(32);
        let first = field_from_bytes::<Fr>(blocks.next().unwrap_or_default());
        let second = field_from_bytes::<Fr>(blocks.next().unwrap_or_default());
        let mut accumulator = self.compress(first, second);
        for block in blocks {
            accumulator = self.compress(accumulator, field_from_bytes(block));
        }
        accumulator
    }

    /// Hash of two 32-byte digests, the internal-node convention.
    pub fn hash_pair(&self, left: B256, right: B256) -> B256 {
        field_to_b256(self.compress(
            field_from_bytes(left.as_slice()),
            field_from_bytes(right.as_slice()),
        ))
    }
}
