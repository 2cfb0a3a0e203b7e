//! Durable hand-off between commit and dispatch.
//!
//! When a bus is built with an outbox, every committed batch is appended
//! before it is queued and marked delivered once all its reactors ran.
//! [`DomainEventBus::relay_pending`](crate::DomainEventBus::relay_pending)
//! re-queues batches that never got that far (e.g. after a restart). Delivery
//! becomes at-least-once; reactors are already idempotent.

use std::sync::Mutex;

use thiserror::Error;
use uuid::Uuid;

use crate::EventEnvelope;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OutboxError {
    #[error("outbox unavailable: {0}")]
    Unavailable(String),

    #[error("outbox batch {0} not found")]
    UnknownBatch(Uuid),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxBatch<E> {
    pub id: Uuid,
    pub envelopes: Vec<EventEnvelope<E>>,
}

pub trait Outbox<E>: Send + Sync {
    /// Store a committed batch; returns its id.
    fn append(&self, envelopes: &[EventEnvelope<E>]) -> Result<Uuid, OutboxError>;

    fn mark_delivered(&self, batch_id: Uuid) -> Result<(), OutboxError>;

    /// Undelivered batches, oldest first.
    fn undelivered(&self) -> Result<Vec<OutboxBatch<E>>, OutboxError>;
}

#[derive(Debug)]
struct Entry<E> {
    batch: OutboxBatch<E>,
    delivered: bool,
}

/// In-memory outbox for tests/dev. Not durable across processes.
#[derive(Debug)]
pub struct InMemoryOutbox<E> {
    entries: Mutex<Vec<Entry<E>>>,
}

impl<E> InMemoryOutbox<E> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<E> Default for InMemoryOutbox<E> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }
}

impl<E> Outbox<E> for InMemoryOutbox<E>
where
    E: Clone + Send + Sync,
{
    fn append(&self, envelopes: &[EventEnvelope<E>]) -> Result<Uuid, OutboxError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| OutboxError::Unavailable("lock poisoned".into()))?;
        let id = Uuid::now_v7();
        entries.push(Entry {
            batch: OutboxBatch {
                id,
                envelopes: envelopes.to_vec(),
            },
            delivered: false,
        });
        Ok(id)
    }

    fn mark_delivered(&self, batch_id: Uuid) -> Result<(), OutboxError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| OutboxError::Unavailable("lock poisoned".into()))?;
        let entry = entries
            .iter_mut()
            .find(|e| e.batch.id == batch_id)
            .ok_or(OutboxError::UnknownBatch(batch_id))?;
        entry.delivered = true;
        Ok(())
    }

    fn undelivered(&self) -> Result<Vec<OutboxBatch<E>>, OutboxError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| OutboxError::Unavailable("lock poisoned".into()))?;
        Ok(entries
            .iter()
            .filter(|e| !e.delivered)
            .map(|e| e.batch.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivered_batches_leave_the_pending_list() {
        let outbox = InMemoryOutbox::<u8>::new();
        let first = outbox.append(&[]).unwrap();
        let second = outbox.append(&[]).unwrap();

        outbox.mark_delivered(first).unwrap();
        let pending = outbox.undelivered().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, second);

        let unknown = Uuid::nil();
        assert_eq!(outbox.mark_delivered(unknown), Err(OutboxError::UnknownBatch(unknown)));
    }
}
