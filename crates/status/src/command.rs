use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::lifecycle::Lifecycle;
use crate::table::TransitionTable;

/// Lifecycle of a command (a table's tab).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Open,
    Paying,
    PartiallyPaid,
    Closed,
    Canceled,
}

impl CommandStatus {
    /// States that keep a table occupied.
    pub const ACTIVE: [CommandStatus; 3] = [
        CommandStatus::Open,
        CommandStatus::Paying,
        CommandStatus::PartiallyPaid,
    ];

    pub fn is_active(self) -> bool {
        Self::ACTIVE.contains(&self)
    }
}

impl Lifecycle for CommandStatus {
    const NAME: &'static str = "command";

    fn all() -> &'static [Self] {
        use CommandStatus::*;
        &[Open, Paying, PartiallyPaid, Closed, Canceled]
    }

    fn key(self) -> &'static str {
        match self {
            CommandStatus::Open => "open",
            CommandStatus::Paying => "paying",
            CommandStatus::PartiallyPaid => "partially_paid",
            CommandStatus::Closed => "closed",
            CommandStatus::Canceled => "canceled",
        }
    }

    fn label(self) -> &'static str {
        match self {
            CommandStatus::Open => "Open",
            CommandStatus::Paying => "Paying",
            CommandStatus::PartiallyPaid => "Partially paid",
            CommandStatus::Closed => "Closed",
            CommandStatus::Canceled => "Canceled",
        }
    }

    fn table() -> &'static TransitionTable<Self> {
        static TABLE: OnceLock<TransitionTable<CommandStatus>> = OnceLock::new();
        TABLE.get_or_init(|| {
            use CommandStatus::*;
            TransitionTable::new(&[
                (Open, &[Paying, Canceled][..]),
                (Paying, &[PartiallyPaid, Closed][..]),
                (PartiallyPaid, &[Paying, Closed][..]),
                (Closed, &[Open][..]),
                (Canceled, &[Open][..]),
            ])
        })
    }
}

impl core::fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.key())
    }
}
