//! Engine configuration from environment variables.
//!
//! Every variable is optional. A malformed value falls back to the default
//! and is reported with `warn!`.

use serde::{Deserialize, Serialize};
use tracing::warn;

use comanda_auth::guard::DEFAULT_DENIAL_MESSAGE;
use comanda_events::BusSettings;

pub const ENV_REACTOR_WORKERS: &str = "COMANDA_REACTOR_WORKERS";
pub const ENV_MAX_CASCADE_DEPTH: &str = "COMANDA_MAX_CASCADE_DEPTH";
pub const ENV_REACTOR_CONFLICT_RETRIES: &str = "COMANDA_REACTOR_CONFLICT_RETRIES";
pub const ENV_DENIAL_MESSAGE: &str = "COMANDA_DENIAL_MESSAGE";
pub const ENV_OUTBOX_ENABLED: &str = "COMANDA_OUTBOX_ENABLED";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub reactor_workers: usize,
    pub max_cascade_depth: u32,
    pub reactor_conflict_retries: u32,
    pub denial_message: String,
    pub outbox_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reactor_workers: 4,
            max_cascade_depth: 4,
            reactor_conflict_retries: 3,
            denial_message: DEFAULT_DENIAL_MESSAGE.to_string(),
            outbox_enabled: false,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let reactor_workers = parsed(&lookup, ENV_REACTOR_WORKERS, defaults.reactor_workers);
        Self {
            reactor_workers: if reactor_workers == 0 {
                warn!(var = ENV_REACTOR_WORKERS, "reactor pool needs at least one worker; using 1");
                1
            } else {
                reactor_workers
            },
            max_cascade_depth: parsed(&lookup, ENV_MAX_CASCADE_DEPTH, defaults.max_cascade_depth),
            reactor_conflict_retries: parsed(
                &lookup,
                ENV_REACTOR_CONFLICT_RETRIES,
                defaults.reactor_conflict_retries,
            ),
            denial_message: lookup(ENV_DENIAL_MESSAGE)
                .filter(|m| !m.trim().is_empty())
                .unwrap_or(defaults.denial_message),
            outbox_enabled: parsed(&lookup, ENV_OUTBOX_ENABLED, defaults.outbox_enabled),
        }
    }

    pub fn bus_settings(&self) -> BusSettings {
        BusSettings {
            workers: self.reactor_workers,
            max_cascade_depth: self.max_cascade_depth,
        }
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: core::str::FromStr + core::fmt::Debug,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!(var = key, value = %raw, default = ?default, "malformed configuration value; using default");
                default
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from(pairs: &[(&str, &str)]) -> EngineConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EngineConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        assert_eq!(from(&[]), EngineConfig::default());
    }

    #[test]
    fn reads_every_variable() {
        let config = from(&[
            (ENV_REACTOR_WORKERS, "2"),
            (ENV_MAX_CASCADE_DEPTH, "1"),
            (ENV_REACTOR_CONFLICT_RETRIES, "0"),
            (ENV_DENIAL_MESSAGE, "acesso negado"),
            (ENV_OUTBOX_ENABLED, "true"),
        ]);
        assert_eq!(config.reactor_workers, 2);
        assert_eq!(config.max_cascade_depth, 1);
        assert_eq!(config.reactor_conflict_retries, 0);
        assert_eq!(config.denial_message, "acesso negado");
        assert!(config.outbox_enabled);
    }

    #[test]
    fn malformed_values_fall_back() {
        let config = from(&[(ENV_REACTOR_WORKERS, "many"), (ENV_OUTBOX_ENABLED, "yes"), (ENV_DENIAL_MESSAGE, " ")]);
        assert_eq!(config.reactor_workers, 4);
        assert!(!config.outbox_enabled);
        assert_eq!(config.denial_message, DEFAULT_DENIAL_MESSAGE);
        assert_eq!(from(&[(ENV_REACTOR_WORKERS, "0")]).reactor_workers, 1);
    }
}
