use std::time::Duration;

use thiserror::Error;
use weisyn_prover::ProverError;

#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("contract hash must not be empty")]
    InvalidContractHash,

    #[error("function name must not be empty")]
    InvalidFunctionName,

    #[error("caller address must not be empty")]
    MissingCallerAddress,

    #[error("model hash must not be empty")]
    InvalidModelHash,

    #[error("at least one input tensor is required")]
    InvalidInputTensors,

    #[error("missing runtime dependency: {0}")]
    MissingRuntimeDependency(&'static str),

    #[error("failed to create execution context")]
    ContextCreationFailed(#[source] anyhow::Error),

    #[error("execution of {contract}::{method} failed")]
    ExecutionFailed {
        contract: String,
        method: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("execution of {contract}::{method} timed out after {timeout:?}")]
    ExecutionTimeout {
        contract: String,
        method: String,
        timeout: Duration,
    },

    #[error("resource limit exceeded: {resource} over {limit}")]
    ResourceExhausted { resource: &'static str, limit: u64 },

    #[error("failed to extract execution trace: {0}")]
    TraceExtractionFailed(String),

    #[error("failed to hash execution result")]
    ExecutionResultHashFailed(#[source] anyhow::Error),

    #[error("zero-knowledge proof generation failed")]
    ZkProofGenerationFailed(#[source] anyhow::Error),

    #[error("proving layer returned an empty proof")]
    ZkProofEmpty,

    #[error("zk proof manager rejected the request")]
    ProofManager(#[source] ProverError),

    #[error("failed to derive the state id: {0}")]
    StateIdGenerationFailed(String),

    #[error("transaction draft update failed")]
    TransactionDraftFailed(#[source] anyhow::Error),

    #[error("sponsor UTXO does not cover the execution: need {needed}, have {available}")]
    InsufficientSponsorUtxo { needed: u64, available: u64 },
}
