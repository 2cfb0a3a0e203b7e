use core::fmt::Debug;
use core::hash::Hash;

use thiserror::Error;

use comanda_core::AggregateRoot;

use crate::table::TransitionTable;

/// A finite set of lifecycle states with a legal-transition table.
pub trait Lifecycle: Copy + Eq + Hash + Debug + Send + Sync + 'static {
    /// Lifecycle name used in errors and logs ("command", "order", ...).
    const NAME: &'static str;

    /// Every state, in declaration order.
    fn all() -> &'static [Self];

    /// Stable seed key (e.g. "partially_paid").
    fn key(self) -> &'static str;

    /// Human-readable name.
    fn label(self) -> &'static str;

    fn table() -> &'static TransitionTable<Self>;

    fn from_key(key: &str) -> Option<Self> {
        Self::all().iter().copied().find(|s| s.key().eq_ignore_ascii_case(key))
    }

    fn can_transition_to(self, to: Self) -> bool {
        Self::table().allows(self, to)
    }

    fn is_terminal(self) -> bool {
        Self::table().is_terminal(self)
    }
}

/// Proof that a transition was checked against the lifecycle table.
///
/// Only [`transition`] can construct one, so aggregates that require it in
/// their status setter cannot be moved to an unchecked state.
#[derive(Debug)]
pub struct Transitioned(());

/// An aggregate that owns exactly one lifecycle status.
pub trait Stateful: AggregateRoot + Clone {
    type Status: Lifecycle;

    fn status(&self) -> Self::Status;

    /// Set the status and bump the version by one.
    fn apply_transition(&mut self, to: Self::Status, proof: Transitioned);
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("illegal {lifecycle} transition: {from} -> {to}")]
pub struct IllegalTransition {
    pub lifecycle: &'static str,
    pub from: &'static str,
    pub to: &'static str,
}

impl IllegalTransition {
    pub fn new<S: Lifecycle>(from: S, to: S) -> Self {
        Self {
            lifecycle: S::NAME,
            from: from.key(),
            to: to.key(),
        }
    }

    pub fn is<S: Lifecycle>(&self, from: S, to: S) -> bool {
        self.lifecycle == S::NAME && self.from == from.key() && self.to == to.key()
    }
}

/// Move `aggregate` to `to` if the lifecycle table allows it.
///
/// Returns a new value with `status = to` and `version + 1`. Persisting it is
/// the caller's job.
pub fn transition<A: Stateful>(aggregate: &A, to: A::Status) -> Result<A, IllegalTransition> {
    let from = aggregate.status();
    if !from.can_transition_to(to) {
        return Err(IllegalTransition::new(from, to));
    }
    let mut next = aggregate.clone();
    next.apply_transition(to, Transitioned(()));
    Ok(next)
}
