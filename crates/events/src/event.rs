use uuid::Uuid;

/// A domain event raised by a completed business operation.
///
/// Events are facts: immutable, cheap to clone, and safe to deliver more than
/// once to an idempotent reactor.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name reactors subscribe to (e.g. "dining.command").
    fn event_type(&self) -> &'static str;

    /// Public id of the aggregate the event is about.
    fn aggregate_id(&self) -> Uuid;
}
