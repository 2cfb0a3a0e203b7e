use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use comanda_core::{AggregateRoot, AuditStamps, CompanyId, EmployeeId, Money, SessionId, UserId};
use comanda_status::{SessionStatus, Stateful, Transitioned};

/// Aggregate root: one shift of a cash register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashRegisterSession {
    id: SessionId,
    company_id: CompanyId,
    employee_id: EmployeeId,
    status: SessionStatus,
    initial_value: Money,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    opened_by: UserId,
    closed_by: Option<UserId>,
    notes: Option<String>,
    version: u64,
    stamps: AuditStamps,
}

impl CashRegisterSession {
    pub fn open(
        id: SessionId,
        company_id: CompanyId,
        employee_id: EmployeeId,
        opened_by: UserId,
        initial_value: Money,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            company_id,
            employee_id,
            status: SessionStatus::Open,
            initial_value,
            started_at: now,
            ended_at: None,
            opened_by,
            closed_by: None,
            notes,
            version: 1,
            stamps: AuditStamps::created(now),
        }
    }

    pub fn company_id(&self) -> CompanyId {
        self.company_id
    }

    pub fn employee_id(&self) -> EmployeeId {
        self.employee_id
    }

    pub fn initial_value(&self) -> Money {
        self.initial_value
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    pub fn opened_by(&self) -> UserId {
        self.opened_by
    }

    pub fn closed_by(&self) -> Option<UserId> {
        self.closed_by
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn stamps(&self) -> &AuditStamps {
        &self.stamps
    }

    /// OPEN or IN_REVIEW: the register is not yet settled.
    pub fn is_unsettled(&self) -> bool {
        self.status != SessionStatus::Closed
    }

    /// Stamp the submission of a disputed count. Part of the transition to
    /// IN_REVIEW.
    pub fn mark_reviewing(&mut self, at: DateTime<Utc>) {
        self.stamps = self.stamps.touched(at);
    }

    /// Stamp the end of the session. Part of the transition to CLOSED.
    pub fn mark_ended(&mut self, by: UserId, at: DateTime<Utc>) {
        self.ended_at = Some(at);
        self.closed_by = Some(by);
        self.stamps = self.stamps.touched(at);
    }
}

impl AggregateRoot for CashRegisterSession {
    type Id = SessionId;

    fn id(&self) -> &SessionId {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Stateful for CashRegisterSession {
    type Status = SessionStatus;

    fn status(&self) -> SessionStatus {
        self.status
    }

    fn apply_transition(&mut self, to: SessionStatus, _proof: Transitioned) {
        self.status = to;
        self.version += 1;
    }
}
