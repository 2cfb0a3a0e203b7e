use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use comanda_core::{
    AggregateRoot, AuditStamps, CommandId, CompanyId, DomainError, DomainResult, Money, OrderId,
    UserId,
};
use comanda_status::{OrderStatus, Stateful, Transitioned};

/// Aggregate root: one ordered item on a command.
///
/// Prices are captured at order time; later catalogue changes do not affect
/// the line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    company_id: CompanyId,
    command_id: CommandId,
    product_ref: String,
    base_price: Money,
    modifiers_price: Money,
    notes: Option<String>,
    status: OrderStatus,
    cancel_reason: Option<String>,
    canceled_by: Option<UserId>,
    version: u64,
    stamps: AuditStamps,
}

impl Order {
    #[allow(clippy::too_many_arguments)]
    pub fn place(
        id: OrderId,
        company_id: CompanyId,
        command_id: CommandId,
        product_ref: impl Into<String>,
        base_price: Money,
        modifiers_price: Money,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if base_price.is_negative() || modifiers_price.is_negative() {
            return Err(DomainError::validation("order prices must not be negative"));
        }
        Ok(Self {
            id,
            company_id,
            command_id,
            product_ref: product_ref.into(),
            base_price,
            modifiers_price,
            notes,
            status: OrderStatus::PendingConfirmation,
            cancel_reason: None,
            canceled_by: None,
            version: 1,
            stamps: AuditStamps::created(now),
        })
    }

    pub fn company_id(&self) -> CompanyId {
        self.company_id
    }

    pub fn command_id(&self) -> CommandId {
        self.command_id
    }

    pub fn product_ref(&self) -> &str {
        &self.product_ref
    }

    pub fn base_price(&self) -> Money {
        self.base_price
    }

    pub fn modifiers_price(&self) -> Money {
        self.modifiers_price
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn cancel_reason(&self) -> Option<&str> {
        self.cancel_reason.as_deref()
    }

    pub fn canceled_by(&self) -> Option<UserId> {
        self.canceled_by
    }

    pub fn stamps(&self) -> &AuditStamps {
        &self.stamps
    }

    pub fn is_deleted(&self) -> bool {
        self.stamps.is_deleted()
    }

    /// `base_price + modifiers_price`.
    pub fn line_total(&self) -> Money {
        self.base_price + self.modifiers_price
    }

    /// Whether the line counts toward its command's total.
    pub fn is_billable(&self) -> bool {
        !self.is_deleted() && self.status.is_billable()
    }

    /// Soft-delete, one version later.
    pub fn removed(&self, now: DateTime<Utc>) -> DomainResult<Self> {
        if self.is_deleted() {
            return Err(DomainError::invariant("order already removed"));
        }
        let mut next = self.clone();
        next.stamps = next.stamps.deleted(now);
        next.version += 1;
        Ok(next)
    }

    /// Record why and by whom the line was canceled. Part of the cancel
    /// transition; does not bump the version on its own.
    pub fn record_cancellation(&mut self, reason: Option<String>, by: UserId, at: DateTime<Utc>) {
        self.cancel_reason = reason;
        self.canceled_by = Some(by);
        self.stamps = self.stamps.touched(at);
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.stamps = self.stamps.touched(now);
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &OrderId {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Stateful for Order {
    type Status = OrderStatus;

    fn status(&self) -> OrderStatus {
        self.status
    }

    fn apply_transition(&mut self, to: OrderStatus, _proof: Transitioned) {
        self.status = to;
        self.version += 1;
    }
}
