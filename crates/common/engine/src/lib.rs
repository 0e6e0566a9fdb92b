pub mod engine_trait;
pub mod mock_engine;

pub use engine_trait::{EngineContext, EngineManager};
pub use mock_engine::MockEngineManager;
