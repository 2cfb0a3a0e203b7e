use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::lifecycle::Lifecycle;
use crate::table::TransitionTable;

/// Lifecycle of a cash register session.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Open,
    Closed,
    InReview,
}

impl Lifecycle for SessionStatus {
    const NAME: &'static str = "session";

    fn all() -> &'static [Self] {
        &[SessionStatus::Open, SessionStatus::Closed, SessionStatus::InReview]
    }

    fn key(self) -> &'static str {
        match self {
            SessionStatus::Open => "open",
            SessionStatus::Closed => "closed",
            SessionStatus::InReview => "in_review",
        }
    }

    fn label(self) -> &'static str {
        match self {
            SessionStatus::Open => "Open",
            SessionStatus::Closed => "Closed",
            SessionStatus::InReview => "In review",
        }
    }

    fn table() -> &'static TransitionTable<Self> {
        static TABLE: OnceLock<TransitionTable<SessionStatus>> = OnceLock::new();
        TABLE.get_or_init(|| {
            use SessionStatus::*;
            TransitionTable::new(&[
                (Open, &[Closed, InReview][..]),
                (InReview, &[Closed][..]),
                (Closed, &[][..]),
            ])
        })
    }
}

impl core::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.key())
    }
}
