use thiserror::Error;

use comanda_auth::Unauthorized;
use comanda_cashier::BusinessError;
use comanda_core::{DomainError, RepositoryError};
use comanda_status::IllegalTransition;

/// Error returned by every use case.
///
/// Everything except `Infrastructure` is a business outcome the caller can act
/// on. `Infrastructure` is fatal for the unit of work.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error(transparent)]
    Unauthorized(#[from] Unauthorized),

    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),

    #[error("{0}")]
    Business(String),

    #[error("{0}")]
    NotFound(String),

    /// Stale version or uniqueness violation; the caller may retry.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("infrastructure failure: {0}")]
    Infrastructure(String),
}

impl ServiceError {
    pub fn business(msg: impl Into<String>) -> Self {
        Self::Business(msg.into())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, ServiceError::Infrastructure(_))
    }
}

impl From<RepositoryError> for ServiceError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound { .. } => ServiceError::NotFound(value.to_string()),
            RepositoryError::Conflict(msg) => ServiceError::Conflict(msg),
            RepositoryError::Unavailable(msg) => ServiceError::Infrastructure(msg),
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Conflict(msg) => ServiceError::Conflict(msg),
            other => ServiceError::Business(other.to_string()),
        }
    }
}

impl From<BusinessError> for ServiceError {
    fn from(value: BusinessError) -> Self {
        match value {
            BusinessError::IllegalTransition(err) => ServiceError::IllegalTransition(err),
            BusinessError::Storage(err) => ServiceError::from(err),
            other => ServiceError::Business(other.to_string()),
        }
    }
}
