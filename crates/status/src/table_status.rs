use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::lifecycle::Lifecycle;
use crate::table::TransitionTable;

/// Lifecycle of a dining table.
///
/// Every state may move to every other state; `Available` and `Occupied` are
/// normally derived from the table's commands rather than set by hand.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    Available,
    Occupied,
    Reserved,
    Cleaning,
    Unavailable,
}

impl TableStatus {
    /// Whether the state is derived from command activity.
    pub fn is_derived(self) -> bool {
        matches!(self, TableStatus::Available | TableStatus::Occupied)
    }
}

impl Lifecycle for TableStatus {
    const NAME: &'static str = "table";

    fn all() -> &'static [Self] {
        use TableStatus::*;
        &[Available, Occupied, Reserved, Cleaning, Unavailable]
    }

    fn key(self) -> &'static str {
        match self {
            TableStatus::Available => "available",
            TableStatus::Occupied => "occupied",
            TableStatus::Reserved => "reserved",
            TableStatus::Cleaning => "cleaning",
            TableStatus::Unavailable => "unavailable",
        }
    }

    fn label(self) -> &'static str {
        match self {
            TableStatus::Available => "Available",
            TableStatus::Occupied => "Occupied",
            TableStatus::Reserved => "Reserved",
            TableStatus::Cleaning => "Cleaning",
            TableStatus::Unavailable => "Unavailable",
        }
    }

    fn table() -> &'static TransitionTable<Self> {
        static TABLE: OnceLock<TransitionTable<TableStatus>> = OnceLock::new();
        TABLE.get_or_init(|| {
            let rows: Vec<(TableStatus, Vec<TableStatus>)> = Self::all()
                .iter()
                .map(|from| {
                    let others = Self::all().iter().copied().filter(|to| to != from).collect();
                    (*from, others)
                })
                .collect();
            let borrowed: Vec<(TableStatus, &[TableStatus])> =
                rows.iter().map(|(from, to)| (*from, to.as_slice())).collect();
            TransitionTable::new(&borrowed)
        })
    }
}

impl core::fmt::Display for TableStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.key())
    }
}
