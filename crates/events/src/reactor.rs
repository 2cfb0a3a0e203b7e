use thiserror::Error;

use comanda_core::{DomainError, RepositoryError};

use crate::{Event, EventEnvelope, UnitOfWork};

#[derive(Debug, Error)]
pub enum ReactorError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("{0}")]
    Failed(String),
}

impl ReactorError {
    pub fn failed(msg: impl ToString) -> Self {
        Self::Failed(msg.to_string())
    }
}

/// Handler that recomputes derived state after an event commits.
///
/// Each invocation gets a fresh unit of work: `Ok` commits the follow-up
/// events recorded in it, `Err` rolls it back. Failures are logged and never
/// retried, so reactors must be idempotent and tolerate redelivery.
pub trait Reactor<E: Event>: Send + Sync {
    fn name(&self) -> &'static str;

    /// Event type this reactor is subscribed to.
    fn subscribes_to(&self) -> &'static str;

    fn react(&self, envelope: &EventEnvelope<E>, uow: &mut UnitOfWork<E>) -> Result<(), ReactorError>;
}
