//! Tracing/logging setup shared by binaries, benches and tests.

pub mod logging;

pub use logging::{LogFormat, LoggingConfig, UnknownLogFormat};

/// Initialize process-wide logging from the environment.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    let _ = logging::try_init(&LoggingConfig::from_env());
}
