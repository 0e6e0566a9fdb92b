use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ContextError {
    #[error("execution context {0} already exists")]
    DuplicateExecutionId(String),

    #[error("resource usage was already finalized")]
    AlreadyFinalized,
}
