//! Collaborator interface for aggregate persistence.
//!
//! Implemented by the storage layer (see `comanda-infra`); domain code and
//! reactors only ever talk to this trait.

use std::sync::Arc;

use thiserror::Error;

use crate::aggregate::{AggregateRoot, ExpectedVersion};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    /// Stale version or unique-constraint violation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Storage unavailable. Fatal for the current unit of work.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl RepositoryError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, RepositoryError::Conflict(_))
    }
}

/// Sole writer of one aggregate type.
///
/// `save` succeeds only when the stored version matches `expected`; the stored
/// copy is then replaced by `entity` (whose version the caller has already
/// advanced).
pub trait AggregateRepository<T: AggregateRoot>: Send + Sync {
    fn get_by_id(&self, id: &T::Id) -> Result<T, RepositoryError>;

    fn save(&self, entity: T, expected: ExpectedVersion) -> Result<T::Id, RepositoryError>;
}

impl<T, R> AggregateRepository<T> for Arc<R>
where
    T: AggregateRoot,
    R: AggregateRepository<T> + ?Sized,
{
    fn get_by_id(&self, id: &T::Id) -> Result<T, RepositoryError> {
        (**self).get_by_id(id)
    }

    fn save(&self, entity: T, expected: ExpectedVersion) -> Result<T::Id, RepositoryError> {
        (**self).save(entity, expected)
    }
}
