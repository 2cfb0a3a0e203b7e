use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use comanda_core::{
    AggregateRoot, AuditStamps, CommandId, CompanyId, DomainError, DomainResult, EmployeeId, Money,
    TableId, UserId,
};
use comanda_status::{CommandStatus, Stateful, Transitioned};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discount {
    pub amount: Money,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    pub reason: Option<String>,
    pub canceled_by: UserId,
    pub canceled_at: DateTime<Utc>,
}

/// Aggregate root: a table's tab.
///
/// `total_amount` is derived (see `CommandTotalReactor`) and never set by use
/// cases directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    id: CommandId,
    company_id: CompanyId,
    table_id: TableId,
    employee_id: Option<EmployeeId>,
    name: String,
    people: Option<u32>,
    status: CommandStatus,
    total_amount: Money,
    discount: Option<Discount>,
    cancellation: Option<Cancellation>,
    /// Set when the command reaches CLOSED, cleared on reopen.
    #[serde(default)]
    closed_at: Option<DateTime<Utc>>,
    version: u64,
    stamps: AuditStamps,
}

impl Command {
    /// A new OPEN command at version 1.
    pub fn open(
        id: CommandId,
        company_id: CompanyId,
        table_id: TableId,
        name: impl Into<String>,
        people: Option<u32>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("command name must not be empty"));
        }
        if people == Some(0) {
            return Err(DomainError::validation("people must be at least 1 when given"));
        }
        Ok(Self {
            id,
            company_id,
            table_id,
            employee_id: None,
            name,
            people,
            status: CommandStatus::Open,
            total_amount: Money::ZERO,
            discount: None,
            cancellation: None,
            closed_at: None,
            version: 1,
            stamps: AuditStamps::created(now),
        })
    }

    pub fn with_employee(mut self, employee_id: EmployeeId) -> Self {
        self.employee_id = Some(employee_id);
        self
    }

    pub fn company_id(&self) -> CompanyId {
        self.company_id
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn employee_id(&self) -> Option<EmployeeId> {
        self.employee_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn people(&self) -> Option<u32> {
        self.people
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn discount(&self) -> Option<&Discount> {
        self.discount.as_ref()
    }

    pub fn discount_amount(&self) -> Money {
        self.discount.as_ref().map_or(Money::ZERO, |d| d.amount)
    }

    pub fn cancellation(&self) -> Option<&Cancellation> {
        self.cancellation.as_ref()
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }

    pub fn stamps(&self) -> &AuditStamps {
        &self.stamps
    }

    pub fn is_active(&self) -> bool {
        !self.stamps.is_deleted() && self.status.is_active()
    }

    /// Copy with a recomputed total, one version later.
    pub fn with_total(&self, total: Money, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.total_amount = total;
        next.bump(now);
        next
    }

    pub fn with_discount(
        &self,
        amount: Money,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if amount.is_negative() {
            return Err(DomainError::validation("discount must not be negative"));
        }
        if !self.status.is_active() {
            return Err(DomainError::invariant(format!(
                "cannot discount a {} command",
                self.status
            )));
        }
        let mut next = self.clone();
        next.discount = Some(Discount { amount, description });
        next.bump(now);
        Ok(next)
    }

    /// Copy attached to `table_id`. Only OPEN commands move.
    pub fn moved_to(&self, table_id: TableId, now: DateTime<Utc>) -> DomainResult<Self> {
        if self.status != CommandStatus::Open {
            return Err(DomainError::invariant("only open commands can change table"));
        }
        if self.table_id == table_id {
            return Err(DomainError::validation("command is already on this table"));
        }
        let mut next = self.clone();
        next.table_id = table_id;
        next.bump(now);
        Ok(next)
    }

    /// Record who canceled and why. Part of the cancel transition; does not
    /// bump the version on its own.
    pub fn record_cancellation(&mut self, reason: Option<String>, by: UserId, at: DateTime<Utc>) {
        self.cancellation = Some(Cancellation {
            reason,
            canceled_by: by,
            canceled_at: at,
        });
        self.stamps = self.stamps.touched(at);
    }

    /// Stamp the sale. Part of the transition to CLOSED; later total
    /// recomputes do not move it.
    pub fn mark_closed(&mut self, at: DateTime<Utc>) {
        self.closed_at = Some(at);
        self.stamps = self.stamps.touched(at);
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.stamps = self.stamps.touched(now);
    }

    fn bump(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        self.stamps = self.stamps.touched(now);
    }
}

impl AggregateRoot for Command {
    type Id = CommandId;

    fn id(&self) -> &CommandId {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Stateful for Command {
    type Status = CommandStatus;

    fn status(&self) -> CommandStatus {
        self.status
    }

    fn apply_transition(&mut self, to: CommandStatus, _proof: Transitioned) {
        if to != CommandStatus::Closed {
            self.closed_at = None;
        }
        self.status = to;
        self.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use comanda_status::transition;

    fn open() -> Command {
        Command::open(CommandId::new(), CompanyId::new(), TableId::new(), "Mesa 4", Some(2), Utc::now()).unwrap()
    }

    #[test]
    fn starts_open_with_zero_total() {
        let command = open();
        assert_eq!(command.status(), CommandStatus::Open);
        assert_eq!(command.total_amount(), Money::ZERO);
        assert_eq!(command.version(), 1);
        assert!(command.is_active());
    }

    #[test]
    fn rejects_blank_name_and_zero_people() {
        let now = Utc::now();
        assert!(Command::open(CommandId::new(), CompanyId::new(), TableId::new(), "  ", None, now).is_err());
        assert!(Command::open(CommandId::new(), CompanyId::new(), TableId::new(), "A", Some(0), now).is_err());
    }

    #[test]
    fn only_open_commands_move_tables() {
        let command = open();
        let target = TableId::new();
        let moved = command.moved_to(target, Utc::now()).unwrap();
        assert_eq!(moved.table_id(), target);
        assert_eq!(moved.version(), 2);

        let paying = transition(&command, CommandStatus::Paying).unwrap();
        assert!(paying.moved_to(target, Utc::now()).is_err());
        assert!(command.moved_to(command.table_id(), Utc::now()).is_err());
    }

    #[test]
    fn discount_requires_active_command() {
        let command = open();
        let discounted = command
            .with_discount(Money::from_cents(500), Some("birthday".into()), Utc::now())
            .unwrap();
        assert_eq!(discounted.discount_amount(), Money::from_cents(500));

        let canceled = transition(&command, CommandStatus::Canceled).unwrap();
        assert!(canceled.with_discount(Money::from_cents(1), None, Utc::now()).is_err());
        assert!(command.with_discount(Money::from_cents(-1), None, Utc::now()).is_err());
    }

    #[test]
    fn closed_at_survives_total_recomputes_and_clears_on_reopen() {
        let paying = transition(&open(), CommandStatus::Paying).unwrap();
        let closed_time = Utc::now();
        let mut closed = transition(&paying, CommandStatus::Closed).unwrap();
        closed.mark_closed(closed_time);
        assert_eq!(closed.closed_at(), Some(closed_time));

        let recomputed = closed.with_total(Money::from_cents(900), closed_time + chrono::Duration::hours(2));
        assert_eq!(recomputed.closed_at(), Some(closed_time));

        let reopened = transition(&recomputed, CommandStatus::Open).unwrap();
        assert_eq!(reopened.closed_at(), None);
    }
}
