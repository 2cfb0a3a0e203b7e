//! `comanda-dining`: commands (tabs), orders and tables.
//!
//! Aggregates are plain values: every accepted change returns or produces a
//! new version, and persistence goes through `AggregateRepository`. Derived
//! state (command totals, table occupancy) is owned by the reactors in
//! [`reactors`].

pub mod command;
pub mod event;
pub mod order;
pub mod queries;
pub mod reactors;
pub mod table;
pub mod totals;

pub use command::{Cancellation, Command, Discount};
pub use event::{CommandEvent, DiningEvent, TableStatusEvent};
pub use order::Order;
pub use queries::{CommandBatchWriter, CommandQueries, OrderQueries};
pub use reactors::{CommandTotalReactor, TableOccupancyReactor};
pub use table::Table;
pub use totals::{command_total, derived_table_status};
