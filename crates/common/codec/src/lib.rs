pub mod hash;
pub mod json;
pub mod trace;

pub use hash::{contract_address, sha256, sha256_concat};
pub use json::to_canonical_json;
pub use trace::{encode_state_changes, encode_trace};
