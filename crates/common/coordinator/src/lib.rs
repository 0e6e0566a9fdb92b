pub mod coordinator;
pub mod draft;
pub mod errors;
pub mod hashes;

pub use coordinator::{
    ContractCall, CoordinatorConfig, ExecutionCoordinator, HashManager, ModelCall,
};
pub use errors::CoordinatorError;
