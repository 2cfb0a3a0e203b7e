//! `comanda-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, money, audit stamps, the aggregate contract and the narrow
//! repository/clock interfaces the rest of the workspace is written against.

pub mod aggregate;
pub mod audit;
pub mod clock;
pub mod error;
pub mod id;
pub mod repository;
pub mod value_object;

pub use aggregate::{AggregateRoot, ExpectedVersion};
pub use audit::AuditStamps;
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{DomainError, DomainResult};
pub use id::{
    ClosingId, CommandId, CompanyId, EmployeeId, GroupId, OrderId, SessionId, TableId, UserId,
};
pub use repository::{AggregateRepository, RepositoryError};
pub use value_object::{Money, ValueObject};
