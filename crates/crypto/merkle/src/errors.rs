use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MerkleError {
    #[error("cannot build a Merkle tree over an empty record list")]
    EmptyTree,

    #[error("leaf index {index} out of bounds for {leaf_count} leaves")]
    LeafIndexOutOfBounds { index: u64, leaf_count: u64 },

    #[error("path has {siblings} sibling hashes but {directions} direction bits")]
    PathLengthMismatch { siblings: usize, directions: usize },

    #[error("path {index} does not verify against its embedded root")]
    InvalidPath { index: usize },

    #[error("proof mixes paths from different trees")]
    InconsistentRootHashes,

    #[error("conflicting node hash at level {level}, index {index}")]
    NodeHashConflict { level: usize, index: u64 },

    #[error("cannot recompute root: {0}")]
    CannotRecomputeRoot(String),

    #[error("recomputed root does not match the proof's new root")]
    RootMismatch,

    #[error("invalid path encoding: {0}")]
    InvalidEncoding(String),
}
