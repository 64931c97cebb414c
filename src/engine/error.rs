use thiserror::Error;

/// Error kinds produced by the ranking engine.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i32 },

    #[error("computation invariant violated: {0}")]
    Computation(String),

    #[error("concurrent write on partition {0}, transaction must be retried")]
    ConcurrencyConflict(String)
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> EngineError {
        EngineError::Validation(msg.into())
    }

    pub fn not_found(entity: &'static str, id: i32) -> EngineError {
        EngineError::NotFound { entity, id }
    }

    pub fn computation(msg: impl Into<String>) -> EngineError {
        EngineError::Computation(msg.into())
    }
}
