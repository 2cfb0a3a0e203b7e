//! Transaction boundary for use cases.
//!
//! `run` opens a [`UnitOfWork`], hands it to the use case body and then
//! either commits it to the bus (body returned `Ok`) or rolls it back (body
//! returned `Err`). Reactors therefore only ever see events of committed
//! work.
//!
//! The in-memory stores write through immediately; use-case bodies validate
//! and check transitions before their first write so that a rejected request
//! leaves storage untouched.

use tracing::{debug, error, warn};

use comanda_core::CompanyId;
use comanda_events::{DomainEventBus, Event, UnitOfWork};

use crate::ServiceError;

pub struct TransactionBoundary<E: Event> {
    bus: DomainEventBus<E>,
}

impl<E: Event> Clone for TransactionBoundary<E> {
    fn clone(&self) -> Self {
        Self {
            bus: self.bus.clone(),
        }
    }
}

impl<E: Event> TransactionBoundary<E> {
    pub fn new(bus: DomainEventBus<E>) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &DomainEventBus<E> {
        &self.bus
    }

    /// Run `body` inside a unit of work scoped to `company_id`.
    pub fn run<T>(
        &self,
        company_id: CompanyId,
        use_case: &str,
        body: impl FnOnce(&mut UnitOfWork<E>) -> Result<T, ServiceError>,
    ) -> Result<T, ServiceError> {
        let mut uow = self.bus.begin(company_id);
        let unit_of_work_id = uow.id();
        match body(&mut uow) {
            Ok(value) => {
                debug!(use_case, %unit_of_work_id, events = uow.pending().len(), "committing");
                self.bus.on_commit(uow);
                Ok(value)
            }
            Err(err) => {
                if err.is_fatal() {
                    error!(use_case, %unit_of_work_id, error = %err, "use case failed; rolling back");
                } else {
                    warn!(use_case, %unit_of_work_id, error = %err, "use case rejected; rolling back");
                }
                self.bus.on_rollback(uow);
                Err(err)
            }
        }
    }

    /// Queue `event` in `uow`.
    pub fn publish(&self, uow: &mut UnitOfWork<E>, event: E) {
        self.bus.publish(uow, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use comanda_core::CommandId;
    use comanda_dining::DiningEvent;
    use comanda_events::{EventEnvelope, Reactor, ReactorError};

    #[derive(Default)]
    struct Counter {
        seen: AtomicUsize,
    }

    impl Reactor<DiningEvent> for Counter {
        fn name(&self) -> &'static str {
            "counter"
        }

        fn subscribes_to(&self) -> &'static str {
            DiningEvent::COMMAND
        }

        fn react(&self, _envelope: &EventEnvelope<DiningEvent>, _uow: &mut UnitOfWork<DiningEvent>) -> Result<(), ReactorError> {
            self.seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn boundary() -> (TransactionBoundary<DiningEvent>, Arc<Counter>) {
        let counter = Arc::new(Counter::default());
        let bus = DomainEventBus::<DiningEvent>::builder()
            .reactor(counter.clone())
            .start()
            .unwrap();
        (TransactionBoundary::new(bus), counter)
    }

    #[test]
    fn ok_commits_and_err_rolls_back() {
        let (tx, counter) = boundary();
        let company = CompanyId::new();

        tx.run(company, "ok", |uow| {
            tx.publish(uow, DiningEvent::command(CommandId::new()));
            Ok(())
        })
        .unwrap();

        let rejected: Result<(), ServiceError> = tx.run(company, "err", |uow| {
            tx.publish(uow, DiningEvent::command(CommandId::new()));
            Err(ServiceError::business("nope"))
        });
        assert!(rejected.is_err());

        assert!(tx.bus().wait_idle(Duration::from_secs(5)));
        assert_eq!(counter.seen.load(Ordering::SeqCst), 1);
    }
}
