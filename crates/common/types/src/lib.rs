pub mod event;
pub mod execution_proof;
pub mod execution_result;
pub mod state_output;
pub mod tensor;
pub mod timestamp;
pub mod trace;
pub mod transaction;
