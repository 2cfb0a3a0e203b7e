use thiserror::Error;

use comanda_core::{CompanyId, RepositoryError};
use comanda_status::{IllegalTransition, SessionStatus};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusinessError {
    #[error("cash register session already open for company {0}")]
    SessionAlreadyOpen(CompanyId),

    #[error("cash register session is {0}, expected open")]
    SessionNotOpen(SessionStatus),

    #[error("cash register session is {0}, expected in_review")]
    SessionNotInReview(SessionStatus),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),

    /// Storage failure, including not-found and stale writes.
    #[error(transparent)]
    Storage(#[from] RepositoryError),
}

impl BusinessError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
