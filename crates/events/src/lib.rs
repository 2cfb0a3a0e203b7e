//! `comanda-events`: post-commit domain event dispatch.
//!
//! Use cases publish into an explicit [`UnitOfWork`]; the transaction boundary
//! hands it to [`DomainEventBus::on_commit`] or [`DomainEventBus::on_rollback`].
//! Committed batches run on a worker pool, each reactor invocation in its own
//! unit of work.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod outbox;
pub mod reactor;
pub mod unit_of_work;
mod worker;

pub use bus::{BusSettings, DomainEventBus, DomainEventBusBuilder};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use outbox::{InMemoryOutbox, Outbox, OutboxBatch, OutboxError};
pub use reactor::{Reactor, ReactorError};
pub use unit_of_work::UnitOfWork;
