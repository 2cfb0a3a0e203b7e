use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use tracing::{debug, error, warn};
use uuid::Uuid;

use comanda_core::Clock;

use crate::{Event, EventEnvelope, Outbox, Reactor, UnitOfWork};

/// One committed unit of work, dispatched as a whole to a single worker.
pub(crate) struct Batch<E> {
    pub(crate) outbox_id: Option<Uuid>,
    pub(crate) envelopes: Vec<EventEnvelope<E>>,
}

/// State shared by the bus handles and the worker threads.
pub(crate) struct Dispatcher<E: Event> {
    pub(crate) reactors: Vec<Arc<dyn Reactor<E>>>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) outbox: Option<Arc<dyn Outbox<E>>>,
    pub(crate) max_cascade_depth: u32,
    sender: Mutex<Option<Sender<Batch<E>>>>,
    in_flight: Mutex<usize>,
    idle: Condvar,
    failures: AtomicU64,
}

impl<E: Event> Dispatcher<E> {
    pub(crate) fn new(
        reactors: Vec<Arc<dyn Reactor<E>>>,
        clock: Arc<dyn Clock>,
        outbox: Option<Arc<dyn Outbox<E>>>,
        max_cascade_depth: u32,
    ) -> (Self, Receiver<Batch<E>>) {
        let (tx, rx) = mpsc::channel();
        let dispatcher = Self {
            reactors,
            clock,
            outbox,
            max_cascade_depth,
            sender: Mutex::new(Some(tx)),
            in_flight: Mutex::new(0),
            idle: Condvar::new(),
            failures: AtomicU64::new(0),
        };
        (dispatcher, rx)
    }

    /// Persist (if configured) and queue a committed batch.
    pub(crate) fn dispatch(&self, envelopes: Vec<EventEnvelope<E>>) {
        if envelopes.is_empty() {
            return;
        }
        let outbox_id = match &self.outbox {
            Some(outbox) => match outbox.append(&envelopes) {
                Ok(id) => Some(id),
                Err(err) => {
                    error!(error = %err, events = envelopes.len(), "outbox append failed; dispatching without it");
                    None
                }
            },
            None => None,
        };
        self.enqueue(Batch { outbox_id, envelopes });
    }

    pub(crate) fn enqueue(&self, batch: Batch<E>) {
        self.begin_batch();
        let events = batch.envelopes.len();
        let sent = match self.sender.lock() {
            Ok(guard) => match guard.as_ref() {
                Some(tx) => tx.send(batch).map_err(|_| "reactor pool stopped"),
                None => Err("reactor pool stopped"),
            },
            Err(_) => Err("dispatch lock poisoned"),
        };
        if let Err(reason) = sent {
            error!(reason, events, "batch not dispatched");
            self.end_batch();
        }
    }

    /// Drop the only sender; workers drain the queue and exit.
    pub(crate) fn close(&self) {
        match self.sender.lock() {
            Ok(mut guard) => {
                guard.take();
            }
            Err(poisoned) => {
                poisoned.into_inner().take();
            }
        }
    }

    pub(crate) fn wait_idle(&self, timeout: Duration) -> bool {
        let Ok(guard) = self.in_flight.lock() else {
            return false;
        };
        match self.idle.wait_timeout_while(guard, timeout, |n| *n > 0) {
            Ok((_, result)) => !result.timed_out(),
            Err(_) => false,
        }
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.lock().map(|n| *n).unwrap_or(0)
    }

    pub(crate) fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    fn begin_batch(&self) {
        if let Ok(mut n) = self.in_flight.lock() {
            *n += 1;
        }
    }

    fn end_batch(&self) {
        if let Ok(mut n) = self.in_flight.lock() {
            *n = n.saturating_sub(1);
            if *n == 0 {
                self.idle.notify_all();
            }
        }
    }

    /// Run every matching reactor for each event, in publish order.
    fn process(&self, batch: Batch<E>) {
        for envelope in &batch.envelopes {
            for reactor in self
                .reactors
                .iter()
                .filter(|r| r.subscribes_to() == envelope.event_type())
            {
                self.run_reactor(reactor.as_ref(), envelope);
            }
        }

        if let (Some(outbox), Some(id)) = (&self.outbox, batch.outbox_id) {
            if let Err(err) = outbox.mark_delivered(id) {
                warn!(batch_id = %id, error = %err, "failed to mark outbox batch delivered");
            }
        }
        self.end_batch();
    }

    fn run_reactor(&self, reactor: &dyn Reactor<E>, envelope: &EventEnvelope<E>) {
        let mut uow = UnitOfWork::at_depth(envelope.company_id(), self.clock.clone(), envelope.depth() + 1);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| reactor.react(envelope, &mut uow)));

        let failure = match outcome {
            Ok(Ok(())) => {
                self.commit_follow_ups(reactor.name(), uow);
                return;
            }
            Ok(Err(err)) => err.to_string(),
            Err(_) => "reactor panicked".to_string(),
        };

        self.failures.fetch_add(1, Ordering::Relaxed);
        error!(
            reactor = reactor.name(),
            event_id = %envelope.event_id(),
            event_type = envelope.event_type(),
            aggregate_id = %envelope.aggregate_id(),
            error = %failure,
            "reactor failed; derived state left stale, event not retried"
        );
        let discarded = uow.finish().len();
        if discarded > 0 {
            debug!(reactor = reactor.name(), discarded, "reactor unit of work rolled back");
        }
    }

    fn commit_follow_ups(&self, reactor: &'static str, uow: UnitOfWork<E>) {
        let depth = uow.depth();
        let follow_ups = uow.finish();
        if follow_ups.is_empty() {
            return;
        }
        if depth > self.max_cascade_depth {
            warn!(
                reactor,
                depth,
                max_cascade_depth = self.max_cascade_depth,
                dropped = follow_ups.len(),
                "cascade depth exceeded; follow-up events dropped"
            );
            return;
        }
        debug!(reactor, depth, events = follow_ups.len(), "reactor unit of work committed");
        self.dispatch(follow_ups);
    }
}

pub(crate) fn spawn_worker<E: Event>(
    index: usize,
    dispatcher: Arc<Dispatcher<E>>,
    receiver: Arc<Mutex<Receiver<Batch<E>>>>,
) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("comanda-reactor-{index}"))
        .spawn(move || worker_loop(index, &dispatcher, &receiver))
}

fn worker_loop<E: Event>(index: usize, dispatcher: &Dispatcher<E>, receiver: &Mutex<Receiver<Batch<E>>>) {
    loop {
        let next = match receiver.lock() {
            Ok(rx) => rx.recv(),
            Err(_) => {
                error!(worker = index, "reactor queue lock poisoned; worker exiting");
                break;
            }
        };
        match next {
            Ok(batch) => dispatcher.process(batch),
            Err(_) => break,
        }
    }
    debug!(worker = index, "reactor worker stopped");
}
