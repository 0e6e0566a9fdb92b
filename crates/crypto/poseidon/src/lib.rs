pub mod config;
pub mod constraints;
pub mod hasher;

pub use config::{bls12_377_config, bn254_config};
pub use hasher::{Poseidon2Hasher, compress_with, field_from_bytes, field_to_b256};
