//! Post-commit event bus.
//!
//! ```text
//! use case ──publish──▶ UnitOfWork ──on_commit──▶ queue ──▶ worker pool ──▶ reactors
//!                                   └─on_rollback─▶ (discarded)
//! ```
//!
//! - `on_commit` returns as soon as the batch is queued; reactors run later.
//! - A batch is processed by one worker, event by event, so events of one unit
//!   of work reach reactors in publish order. Batches from different units of
//!   work have no relative order.
//! - Each reactor invocation runs in its own unit of work. Follow-up events it
//!   records are dispatched on success, up to `max_cascade_depth`.

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use comanda_core::{Clock, CompanyId, SystemClock};

use crate::worker::{Batch, Dispatcher, spawn_worker};
use crate::{Event, Outbox, OutboxError, Reactor, UnitOfWork};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusSettings {
    pub workers: usize,
    pub max_cascade_depth: u32,
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            workers: 4,
            max_cascade_depth: 4,
        }
    }
}

pub struct DomainEventBusBuilder<E: Event> {
    settings: BusSettings,
    reactors: Vec<Arc<dyn Reactor<E>>>,
    clock: Arc<dyn Clock>,
    outbox: Option<Arc<dyn Outbox<E>>>,
}

impl<E: Event> DomainEventBusBuilder<E> {
    pub fn settings(mut self, settings: BusSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn outbox(mut self, outbox: Arc<dyn Outbox<E>>) -> Self {
        self.outbox = Some(outbox);
        self
    }

    /// Register a reactor. Reactors for the same event type run in
    /// registration order.
    pub fn reactor(mut self, reactor: Arc<dyn Reactor<E>>) -> Self {
        self.reactors.push(reactor);
        self
    }

    /// Spawn the worker pool.
    pub fn start(self) -> std::io::Result<DomainEventBus<E>> {
        let (dispatcher, receiver) = Dispatcher::new(
            self.reactors,
            self.clock,
            self.outbox,
            self.settings.max_cascade_depth,
        );
        let runtime = Arc::new(Runtime {
            dispatcher: Arc::new(dispatcher),
            workers: Mutex::new(Vec::new()),
        });

        let receiver = Arc::new(Mutex::new(receiver));
        let workers = self.settings.workers.max(1);
        for index in 0..workers {
            let handle = spawn_worker(index, runtime.dispatcher.clone(), receiver.clone())?;
            if let Ok(mut joins) = runtime.workers.lock() {
                joins.push(handle);
            }
        }
        debug!(workers, max_cascade_depth = self.settings.max_cascade_depth, "domain event bus started");
        Ok(DomainEventBus { runtime })
    }
}

/// Owns the worker threads; stops them when the last bus handle goes away.
struct Runtime<E: Event> {
    dispatcher: Arc<Dispatcher<E>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl<E: Event> Runtime<E> {
    fn stop(&self) {
        self.dispatcher.close();
        let joins = match self.workers.lock() {
            Ok(mut joins) => std::mem::take(&mut *joins),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for join in joins {
            if join.join().is_err() {
                warn!("reactor worker panicked during shutdown");
            }
        }
    }
}

impl<E: Event> Drop for Runtime<E> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Collects events per unit of work and dispatches them after commit.
///
/// Cheap to clone; all clones share one worker pool.
pub struct DomainEventBus<E: Event> {
    runtime: Arc<Runtime<E>>,
}

impl<E: Event> Clone for DomainEventBus<E> {
    fn clone(&self) -> Self {
        Self {
            runtime: self.runtime.clone(),
        }
    }
}

impl<E: Event> DomainEventBus<E> {
    pub fn builder() -> DomainEventBusBuilder<E> {
        DomainEventBusBuilder {
            settings: BusSettings::default(),
            reactors: Vec::new(),
            clock: Arc::new(SystemClock),
            outbox: None,
        }
    }

    fn dispatcher(&self) -> &Dispatcher<E> {
        &self.runtime.dispatcher
    }

    /// Open a unit of work for `company_id`.
    pub fn begin(&self, company_id: CompanyId) -> UnitOfWork<E> {
        UnitOfWork::new(company_id, self.dispatcher().clock.clone())
    }

    /// Queue `event` in `uow`. Nothing is dispatched until commit.
    pub fn publish(&self, uow: &mut UnitOfWork<E>, event: E) {
        debug!(
            unit_of_work_id = %uow.id(),
            event_type = event.event_type(),
            aggregate_id = %event.aggregate_id(),
            "event published"
        );
        uow.record(event);
    }

    /// Hand the committed unit of work's events to the worker pool.
    ///
    /// Only the transaction boundary calls this. Returns before any reactor
    /// runs.
    pub fn on_commit(&self, uow: UnitOfWork<E>) {
        let id = uow.id();
        let events = uow.finish();
        debug!(unit_of_work_id = %id, events = events.len(), "unit of work committed");
        self.dispatcher().dispatch(events);
    }

    /// Discard the unit of work's events. No reactor sees them.
    pub fn on_rollback(&self, uow: UnitOfWork<E>) {
        let id = uow.id();
        let discarded = uow.finish().len();
        debug!(unit_of_work_id = %id, discarded, "unit of work rolled back");
    }

    /// Re-queue outbox batches that were never marked delivered.
    ///
    /// Returns the number of batches re-queued; `0` without an outbox.
    pub fn relay_pending(&self) -> Result<usize, OutboxError> {
        let Some(outbox) = self.dispatcher().outbox.clone() else {
            return Ok(0);
        };
        let batches = outbox.undelivered()?;
        let count = batches.len();
        for batch in batches {
            debug!(batch_id = %batch.id, events = batch.envelopes.len(), "relaying outbox batch");
            self.dispatcher().enqueue(Batch {
                outbox_id: Some(batch.id),
                envelopes: batch.envelopes,
            });
        }
        Ok(count)
    }

    /// Block until every queued batch (and its follow-ups) has been processed.
    ///
    /// Returns `false` on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.dispatcher().wait_idle(timeout)
    }

    /// Batches queued or running.
    pub fn in_flight(&self) -> usize {
        self.dispatcher().in_flight()
    }

    /// Reactor invocations that failed since start.
    pub fn reactor_failures(&self) -> u64 {
        self.dispatcher().failures()
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.dispatcher().clock.clone()
    }
}

impl<E: Event> core::fmt::Debug for DomainEventBus<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DomainEventBus")
            .field("reactors", &self.dispatcher().reactors.len())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EventEnvelope, InMemoryOutbox, ReactorError};
    use uuid::Uuid;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Ping {
        Ping(u32),
        Echo(u32),
    }

    impl Event for Ping {
        fn event_type(&self) -> &'static str {
            match self {
                Ping::Ping(_) => "test.ping",
                Ping::Echo(_) => "test.echo",
            }
        }

        fn aggregate_id(&self) -> Uuid {
            Uuid::nil()
        }
    }

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<u32>>,
    }

    impl Recorder {
        fn seen(&self) -> Vec<u32> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl Reactor<Ping> for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn subscribes_to(&self) -> &'static str {
            "test.ping"
        }

        fn react(&self, envelope: &EventEnvelope<Ping>, _uow: &mut UnitOfWork<Ping>) -> Result<(), ReactorError> {
            if let Ping::Ping(n) = envelope.payload() {
                self.seen.lock().unwrap().push(*n);
            }
            Ok(())
        }
    }

    /// Answers every ping with an echo, and every echo with another echo.
    #[derive(Default)]
    struct Echoer {
        depths: Mutex<Vec<u32>>,
        subscribed: &'static str,
    }

    impl Reactor<Ping> for Echoer {
        fn name(&self) -> &'static str {
            "echoer"
        }

        fn subscribes_to(&self) -> &'static str {
            self.subscribed
        }

        fn react(&self, envelope: &EventEnvelope<Ping>, uow: &mut UnitOfWork<Ping>) -> Result<(), ReactorError> {
            self.depths.lock().unwrap().push(envelope.depth());
            let n = match envelope.payload() {
                Ping::Ping(n) | Ping::Echo(n) => *n,
            };
            uow.record(Ping::Echo(n + 1));
            Ok(())
        }
    }

    struct Failing;

    impl Reactor<Ping> for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn subscribes_to(&self) -> &'static str {
            "test.ping"
        }

        fn react(&self, _envelope: &EventEnvelope<Ping>, uow: &mut UnitOfWork<Ping>) -> Result<(), ReactorError> {
            uow.record(Ping::Echo(0));
            Err(ReactorError::failed("boom"))
        }
    }

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn rolled_back_events_never_reach_reactors() {
        let recorder = Arc::new(Recorder::default());
        let bus = DomainEventBus::<Ping>::builder().reactor(recorder.clone()).start().unwrap();

        let mut uow = bus.begin(CompanyId::new());
        bus.publish(&mut uow, Ping::Ping(1));
        bus.publish(&mut uow, Ping::Ping(2));
        bus.on_rollback(uow);

        assert!(bus.wait_idle(WAIT));
        assert!(recorder.seen().is_empty());
    }

    #[test]
    fn events_of_one_unit_of_work_arrive_in_publish_order() {
        let recorder = Arc::new(Recorder::default());
        let bus = DomainEventBus::<Ping>::builder()
            .settings(BusSettings { workers: 8, max_cascade_depth: 4 })
            .reactor(recorder.clone())
            .start()
            .unwrap();

        let mut uow = bus.begin(CompanyId::new());
        for n in 0..50 {
            bus.publish(&mut uow, Ping::Ping(n));
        }
        assert_eq!(uow.pending().last().map(|e| e.sequence()), Some(50));
        bus.on_commit(uow);

        assert!(bus.wait_idle(WAIT));
        assert_eq!(recorder.seen(), (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn reactor_failure_is_contained_and_its_follow_ups_discarded() {
        let recorder = Arc::new(Recorder::default());
        let echoer = Arc::new(Echoer { subscribed: "test.echo", ..Default::default() });
        let bus = DomainEventBus::<Ping>::builder()
            .reactor(Arc::new(Failing))
            .reactor(recorder.clone())
            .reactor(echoer.clone())
            .start()
            .unwrap();

        let mut uow = bus.begin(CompanyId::new());
        bus.publish(&mut uow, Ping::Ping(7));
        bus.on_commit(uow);

        assert!(bus.wait_idle(WAIT));
        assert_eq!(recorder.seen(), vec![7]);
        assert_eq!(bus.reactor_failures(), 1);
        assert!(echoer.depths.lock().unwrap().is_empty());
    }

    #[test]
    fn follow_up_cascade_stops_at_max_depth() {
        let pinger = Arc::new(Echoer { subscribed: "test.ping", ..Default::default() });
        let echoer = Arc::new(Echoer { subscribed: "test.echo", ..Default::default() });
        let bus = DomainEventBus::<Ping>::builder()
            .settings(BusSettings { workers: 2, max_cascade_depth: 3 })
            .reactor(pinger.clone())
            .reactor(echoer.clone())
            .start()
            .unwrap();

        let mut uow = bus.begin(CompanyId::new());
        bus.publish(&mut uow, Ping::Ping(0));
        bus.on_commit(uow);

        assert!(bus.wait_idle(WAIT));
        assert_eq!(*pinger.depths.lock().unwrap(), vec![0]);
        assert_eq!(*echoer.depths.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn outbox_batches_are_marked_delivered_and_relayable() {
        let outbox = Arc::new(InMemoryOutbox::<Ping>::new());
        let recorder = Arc::new(Recorder::default());
        let company = CompanyId::new();

        // A batch appended by a previous process that never dispatched it.
        let mut stale = UnitOfWork::new(company, Arc::new(SystemClock));
        stale.record(Ping::Ping(41));
        let stale_events = stale.finish();
        outbox.append(&stale_events).unwrap();

        let bus = DomainEventBus::<Ping>::builder()
            .outbox(outbox.clone())
            .reactor(recorder.clone())
            .start()
            .unwrap();

        let mut uow = bus.begin(company);
        bus.publish(&mut uow, Ping::Ping(42));
        bus.on_commit(uow);
        assert!(bus.wait_idle(WAIT));
        assert_eq!(outbox.undelivered().unwrap().len(), 1);

        assert_eq!(bus.relay_pending().unwrap(), 1);
        assert!(bus.wait_idle(WAIT));
        assert_eq!(recorder.seen(), vec![42, 41]);
        assert!(outbox.undelivered().unwrap().is_empty());
    }
}
