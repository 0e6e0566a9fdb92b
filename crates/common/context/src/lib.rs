pub mod clock;
pub mod context;
pub mod errors;
pub mod manager;
pub mod resource;

pub use clock::DeterministicClock;
pub use context::{ExecutionContext, HostFunction, InitParams};
pub use errors::ContextError;
pub use manager::{ContextManagerConfig, ContextParams, ExecutionContextManager};
pub use resource::{ResourceLimits, ResourceTracker, ResourceUsage};
