use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit timestamps carried by every aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStamps {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl AuditStamps {
    pub fn created(at: DateTime<Utc>) -> Self {
        Self {
            created_at: at,
            updated_at: at,
            deleted_at: None,
        }
    }

    pub fn touched(self, at: DateTime<Utc>) -> Self {
        Self {
            updated_at: at,
            ..self
        }
    }

    pub fn deleted(self, at: DateTime<Utc>) -> Self {
        Self {
            updated_at: at,
            deleted_at: Some(at),
            ..self
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}
