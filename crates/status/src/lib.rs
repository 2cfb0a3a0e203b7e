//! Status registry: typed lifecycles and their legal-transition tables.
//!
//! Transition rules are data (`TransitionTable`), not scattered conditionals,
//! so they can be tested in isolation from the aggregates that use them.
//! `transition()` is the only way an aggregate changes lifecycle state.

pub mod catalog;
pub mod command;
pub mod lifecycle;
pub mod order;
pub mod session;
pub mod table;
pub mod table_status;

pub use catalog::{StatusCatalog, StatusKey};
pub use command::CommandStatus;
pub use lifecycle::{IllegalTransition, Lifecycle, Stateful, Transitioned, transition};
pub use order::OrderStatus;
pub use session::SessionStatus;
pub use table::TransitionTable;
pub use table_status::TableStatus;
