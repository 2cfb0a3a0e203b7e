//! Use-case entry points.
//!
//! Every operation checks its feature requirement through the
//! `AuthorizationGuard` before touching storage, and runs inside a
//! [`TransactionBoundary`](crate::TransactionBoundary) when it publishes
//! domain events.

pub mod cashier;
pub mod dining;

pub use cashier::{
    ApproveCashReview, CashierService, CloseCashSession, CloseSessionInput, OpenCashSession,
    OpenSessionInput, SubmitCashReview,
};
pub use dining::{AddOrderInput, DiningRepositories, DiningService};

use comanda_auth::Caller;
use comanda_core::CompanyId;

use crate::ServiceError;

/// Rows of another company are reported as missing.
pub(crate) fn ensure_company(
    caller: &Caller,
    owner: CompanyId,
    kind: &str,
    id: impl core::fmt::Display,
) -> Result<(), ServiceError> {
    if caller.company_id == owner {
        Ok(())
    } else {
        Err(ServiceError::NotFound(format!("{kind} {id} not found")))
    }
}
