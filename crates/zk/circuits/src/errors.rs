use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CircuitError {
    #[error("circuit depth {0} is outside the supported range 1..=20")]
    UnsupportedDepth(usize),

    #[error("batch circuits need at least one path")]
    EmptyBatch,

    #[error("witness has {actual} entries where the circuit expects {expected}")]
    ArityMismatch { expected: usize, actual: usize },
}
