use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use comanda_core::{Clock, CompanyId};

use crate::{Event, EventEnvelope};

/// Scope of one business transaction.
///
/// Collects events in publish order. It is passed by `&mut` through the call
/// chain and consumed by the bus at commit or rollback; there is no ambient
/// "current transaction".
pub struct UnitOfWork<E> {
    id: Uuid,
    company_id: CompanyId,
    depth: u32,
    clock: Arc<dyn Clock>,
    pending: Vec<EventEnvelope<E>>,
    finished: bool,
}

impl<E: Event> UnitOfWork<E> {
    pub fn new(company_id: CompanyId, clock: Arc<dyn Clock>) -> Self {
        Self::at_depth(company_id, clock, 0)
    }

    pub(crate) fn at_depth(company_id: CompanyId, clock: Arc<dyn Clock>, depth: u32) -> Self {
        Self {
            id: Uuid::now_v7(),
            company_id,
            depth,
            clock,
            pending: Vec::new(),
            finished: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn company_id(&self) -> CompanyId {
        self.company_id
    }

    /// Cascade depth of events recorded here.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Queue `event`. Reactors raise follow-up events through this.
    pub fn record(&mut self, event: E) {
        let envelope = EventEnvelope::new(
            Uuid::now_v7(),
            self.id,
            self.company_id,
            event.event_type(),
            event.aggregate_id(),
            self.clock.now(),
            self.pending.len() as u64 + 1,
            self.depth,
            event,
        );
        self.pending.push(envelope);
    }

    pub fn pending(&self) -> &[EventEnvelope<E>] {
        &self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub(crate) fn finish(mut self) -> Vec<EventEnvelope<E>> {
        self.finished = true;
        std::mem::take(&mut self.pending)
    }
}

impl<E> Drop for UnitOfWork<E> {
    fn drop(&mut self) {
        if !self.finished && !self.pending.is_empty() {
            warn!(
                unit_of_work_id = %self.id,
                pending = self.pending.len(),
                "unit of work dropped without commit or rollback; events discarded"
            );
        }
    }
}

impl<E> core::fmt::Debug for UnitOfWork<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("id", &self.id)
            .field("company_id", &self.company_id)
            .field("depth", &self.depth)
            .field("pending", &self.pending.len())
            .finish()
    }
}
