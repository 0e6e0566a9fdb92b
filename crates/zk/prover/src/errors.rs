use thiserror::Error;
use weisyn_circuits::CircuitError;

#[derive(Error, Debug)]
pub enum ProverError {
    #[error("no circuit registered as {circuit_id} v{version}")]
    CircuitNotFound { circuit_id: String, version: u32 },

    #[error("circuit {0} cannot be compiled for the requested curve")]
    UnsupportedCircuit(String),

    #[error("witness binding failed: {0}")]
    WitnessBinding(String),

    #[error(transparent)]
    Circuit(#[from] CircuitError),

    #[error("constraint synthesis failed: {0}")]
    Synthesis(#[from] ark_relations::r1cs::SynthesisError),

    #[error("proof serialization failed: {0}")]
    Serialization(#[from] ark_serialize::SerializationError),

    #[error("generated proof failed local pre-verification")]
    ProofVerificationFailed,

    #[error("task queue is full")]
    QueueFull,

    #[error("no task with id {0}")]
    TaskNotFound(String),

    #[error("asynchronous proof generation is not enabled")]
    AsyncDisabled,

    #[error("invalid worker bounds: workers={workers}, min={min}, max={max}")]
    InvalidWorkerBounds { workers: usize, min: usize, max: usize },
}
