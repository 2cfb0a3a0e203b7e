//! `comanda-cashier`: cash register sessions and their closing arithmetic.

pub mod closing;
pub mod error;
pub mod ledger;
pub mod session;

pub use closing::{Closing, Counted, Reconciliation};
pub use error::BusinessError;
pub use ledger::{CashSessionLedger, SessionMovements, SessionStore};
pub use session::CashRegisterSession;
