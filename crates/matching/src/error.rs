use procura_core::error::CoreError;
use procura_events::EmailError;

/// Errors raised by the matching engines.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Email(#[from] EmailError),
}

impl EngineError {
    /// Shorthand for a missing entity.
    pub fn not_found(entity: &'static str, id: procura_core::types::DbId) -> Self {
        EngineError::Core(CoreError::NotFound { entity, id })
    }
}
