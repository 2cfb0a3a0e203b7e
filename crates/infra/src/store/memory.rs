use std::collections::HashMap;
use std::sync::{RwLock, RwLockWriteGuard};
use std::sync::atomic::{AtomicBool, Ordering};

use comanda_core::{AggregateRepository, AggregateRoot, ExpectedVersion, RepositoryError};

/// Version-checked map of one aggregate type.
pub struct InMemoryRepository<T: AggregateRoot> {
    kind: &'static str,
    rows: RwLock<HashMap<T::Id, T>>,
    available: AtomicBool,
}

impl<T: AggregateRoot + Clone> InMemoryRepository<T> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            rows: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Simulate an outage: while unavailable every call fails with
    /// `RepositoryError::Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Clones of every stored aggregate matching `predicate`.
    pub fn filter(&self, predicate: impl Fn(&T) -> bool) -> Result<Vec<T>, RepositoryError> {
        self.ensure_available()?;
        let rows = self
            .rows
            .read()
            .map_err(|_| RepositoryError::Unavailable(format!("{} store lock poisoned", self.kind)))?;
        Ok(rows.values().filter(|row| predicate(row)).cloned().collect())
    }

    pub fn len(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Exclusive access to the rows, for writes that span several stores.
    pub(crate) fn write_rows(&self) -> Result<RwLockWriteGuard<'_, HashMap<T::Id, T>>, RepositoryError> {
        self.ensure_available()?;
        self.rows
            .write()
            .map_err(|_| RepositoryError::Unavailable(format!("{} store lock poisoned", self.kind)))
    }

    /// Version check for replacing the row of `entity` in `rows`.
    pub(crate) fn check_write(
        &self,
        rows: &HashMap<T::Id, T>,
        entity: &T,
        expected: ExpectedVersion,
    ) -> Result<(), RepositoryError> {
        let id = *entity.id();
        let current = rows.get(&id).map(AggregateRoot::version).unwrap_or(0);
        if !expected.matches(current) {
            return Err(RepositoryError::Conflict(format!(
                "{} {id}: expected {expected:?}, found {current}",
                self.kind
            )));
        }
        if entity.version() <= current {
            return Err(RepositoryError::Conflict(format!(
                "{} {id}: version must advance past {current}, got {}",
                self.kind,
                entity.version()
            )));
        }
        Ok(())
    }

    fn ensure_available(&self) -> Result<(), RepositoryError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RepositoryError::Unavailable(format!("{} store offline", self.kind)))
        }
    }
}

impl<T> AggregateRepository<T> for InMemoryRepository<T>
where
    T: AggregateRoot + Clone + Send + Sync,
    T::Id: Send + Sync,
{
    fn get_by_id(&self, id: &T::Id) -> Result<T, RepositoryError> {
        self.ensure_available()?;
        let rows = self
            .rows
            .read()
            .map_err(|_| RepositoryError::Unavailable(format!("{} store lock poisoned", self.kind)))?;
        rows.get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::not_found(self.kind, id))
    }

    fn save(&self, entity: T, expected: ExpectedVersion) -> Result<T::Id, RepositoryError> {
        let mut rows = self.write_rows()?;
        self.check_write(&rows, &entity, expected)?;
        let id = *entity.id();
        rows.insert(id, entity);
        Ok(id)
    }
}

impl<T: AggregateRoot> core::fmt::Debug for InMemoryRepository<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InMemoryRepository")
            .field("kind", &self.kind)
            .field("available", &self.available.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
