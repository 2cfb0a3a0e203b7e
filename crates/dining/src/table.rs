use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use comanda_core::{AggregateRoot, AuditStamps, CompanyId, DomainError, DomainResult, TableId};
use comanda_status::{Stateful, TableStatus, Transitioned};

/// Aggregate root: a dining table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    id: TableId,
    company_id: CompanyId,
    name: String,
    seats: Option<u32>,
    status: TableStatus,
    version: u64,
    stamps: AuditStamps,
}

impl Table {
    pub fn new(
        id: TableId,
        company_id: CompanyId,
        name: impl Into<String>,
        seats: Option<u32>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("table name must not be empty"));
        }
        Ok(Self {
            id,
            company_id,
            name,
            seats,
            status: TableStatus::Available,
            version: 1,
            stamps: AuditStamps::created(now),
        })
    }

    pub fn company_id(&self) -> CompanyId {
        self.company_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn seats(&self) -> Option<u32> {
        self.seats
    }

    pub fn stamps(&self) -> &AuditStamps {
        &self.stamps
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.stamps = self.stamps.touched(now);
    }
}

impl AggregateRoot for Table {
    type Id = TableId;

    fn id(&self) -> &TableId {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Stateful for Table {
    type Status = TableStatus;

    fn status(&self) -> TableStatus {
        self.status
    }

    fn apply_transition(&mut self, to: TableStatus, _proof: Transitioned) {
        self.status = to;
        self.version += 1;
    }
}
