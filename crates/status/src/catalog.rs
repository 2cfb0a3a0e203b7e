use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lifecycle::Lifecycle;

/// Persisted form of one status row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusKey {
    pub internal_id: i32,
    pub public_id: Uuid,
    pub key: String,
    pub name: String,
    pub description: Option<String>,
}

/// Seeded status rows of one lifecycle, addressable by value or by key.
///
/// Stores join on `internal_id`; everything above the store speaks the enum.
#[derive(Debug, Clone)]
pub struct StatusCatalog<S: Lifecycle> {
    rows: HashMap<S, StatusKey>,
}

impl<S: Lifecycle> StatusCatalog<S> {
    /// Seed one row per state with sequential internal ids starting at 1.
    pub fn seed() -> Self {
        let rows = S::all()
            .iter()
            .enumerate()
            .map(|(idx, status)| {
                let row = StatusKey {
                    internal_id: idx as i32 + 1,
                    public_id: Uuid::now_v7(),
                    key: status.key().to_string(),
                    name: status.label().to_string(),
                    description: None,
                };
                (*status, row)
            })
            .collect();
        Self { rows }
    }

    pub fn with_description(mut self, status: S, description: impl Into<String>) -> Self {
        if let Some(row) = self.rows.get_mut(&status) {
            row.description = Some(description.into());
        }
        self
    }

    pub fn get(&self, status: S) -> Option<&StatusKey> {
        self.rows.get(&status)
    }

    pub fn by_key(&self, key: &str) -> Option<(S, &StatusKey)> {
        let status = S::from_key(key)?;
        self.rows.get(&status).map(|row| (status, row))
    }

    pub fn by_internal_id(&self, internal_id: i32) -> Option<S> {
        self.rows
            .iter()
            .find(|(_, row)| row.internal_id == internal_id)
            .map(|(status, _)| *status)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
