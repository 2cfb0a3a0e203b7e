//! `comanda-auth`: capability-based authorization guard.
//!
//! Decoupled from transport and storage: the caller's feature set is obtained
//! through [`GroupMembershipLookup`] on every check.

pub mod feature;
pub mod group;
pub mod guard;
pub mod requirement;

pub use comanda_core::GroupId;
pub use feature::{Feature, features};
pub use group::{Grant, GroupMembershipLookup, LookupError, Membership, resolve_features};
pub use guard::{AuthorizationGuard, Caller, Decision, Guarded, Unauthorized, UseCase};
pub use requirement::Requirement;
