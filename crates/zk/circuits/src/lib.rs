pub mod errors;
pub mod execution;
pub mod merkle;

pub use errors::CircuitError;
pub use execution::ExecutionCommitmentCircuit;
pub use merkle::{
    BatchMerklePathCircuit, IncrementalUpdateCircuit, MAX_CIRCUIT_DEPTH, MerklePathCircuit,
    PathWitness, UpdateWitness, make_batch_merkle_path_circuit, make_incremental_update_circuit,
    make_merkle_path_circuit,
};
