//! Infrastructure layer: in-memory stores, configuration, transaction
//! boundary and the guarded use-case services.

pub mod config;
pub mod engine;
pub mod error;
pub mod services;
pub mod store;
pub mod transaction;


pub use config::EngineConfig;
pub use engine::Engine;
pub use error::ServiceError;
pub use transaction::TransactionBoundary;
