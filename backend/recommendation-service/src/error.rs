use thiserror::Error;

use crate::services::exploration::ArmStoreError;

pub type Result<T> = std::result::Result<T, RecommendationError>;

#[derive(Debug, Error)]
pub enum RecommendationError {
    #[error("Invalid recommendation count: {0}")]
    InvalidCount(String),

    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Arm store error: {0}")]
    ArmStore(#[from] ArmStoreError),

    #[error("Data source error: {0}")]
    Source(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RecommendationError {
    /// True when the caller sent a request that can never succeed as-is.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            RecommendationError::InvalidCount(_)
                | RecommendationError::UnknownStrategy(_)
                | RecommendationError::InvalidInput(_)
        )
    }
}

impl From<anyhow::Error> for RecommendationError {
    fn from(err: anyhow::Error) -> Self {
        RecommendationError::Source(format!("{:#}", err))
    }
}

impl From<tokio::task::JoinError> for RecommendationError {
    fn from(err: tokio::task::JoinError) -> Self {
        RecommendationError::Internal(err.to_string())
    }
}
