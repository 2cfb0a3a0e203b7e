//! In-memory storage adapters.
//!
//! Intended for tests/dev and single-process deployments. Every store guards
//! its state with a lock; a poisoned lock surfaces as
//! `RepositoryError::Unavailable`.

pub mod dining;
pub mod grants;
pub mod memory;
pub mod session;

pub use dining::InMemoryDiningStore;
pub use grants::InMemoryGrantStore;
pub use memory::InMemoryRepository;
pub use session::InMemorySessionStore;
