pub mod changes;
pub mod errors;
pub mod hasher;
pub mod incremental;
pub mod path;
pub mod record;
pub mod tree;

pub use changes::{ChangeInfo, ChangeType, detect_changes};
pub use errors::MerkleError;
pub use hasher::MerkleHasher;
pub use incremental::{IncrementalProof, generate_incremental_proof, verify_incremental_proof};
pub use path::MerklePath;
pub use record::TraceRecord;
pub use tree::MerkleTree;
