//! Pure recomputation rules for derived state.

use comanda_core::Money;
use comanda_status::TableStatus;

use crate::{Command, Order};

/// Sum of billable line totals minus `discount`, never below zero.
pub fn command_total<'a>(orders: impl IntoIterator<Item = &'a Order>, discount: Money) -> Money {
    let gross: Money = orders
        .into_iter()
        .filter(|o| o.is_billable())
        .map(Order::line_total)
        .sum();
    (gross - discount).non_negative()
}

/// OCCUPIED if any command on the table is active, else AVAILABLE.
pub fn derived_table_status<'a>(commands: impl IntoIterator<Item = &'a Command>) -> TableStatus {
    if commands.into_iter().any(Command::is_active) {
        TableStatus::Occupied
    } else {
        TableStatus::Available
    }
}
