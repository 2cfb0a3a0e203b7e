use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use comanda_core::{
    AggregateRoot, ClosingId, CompanyId, DomainError, DomainResult, Money, SessionId, UserId,
};

use crate::CashRegisterSession;

/// Amounts counted at the register, per payment method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counted {
    pub cash: Money,
    pub card: Money,
    pub pix: Money,
    pub others: Money,
}

impl Counted {
    pub fn new(cash: Money, card: Money, pix: Money, others: Money) -> Self {
        Self { cash, card, pix, others }
    }

    /// `None` when the amounts overflow.
    pub fn total(&self) -> Option<Money> {
        Money::checked_sum([self.cash, self.card, self.pix, self.others])
    }

    pub fn has_negative(&self) -> bool {
        [self.cash, self.card, self.pix, self.others]
            .iter()
            .any(|m| m.is_negative())
    }
}

/// `final_balance = Σ counted`, `difference = final_balance - expected`.
///
/// A positive difference is a surplus, a negative one a shortfall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub final_balance: Money,
    pub final_balance_expected: Money,
    pub final_balance_difference: Money,
}

impl Reconciliation {
    pub fn compute(counted: &Counted, expected: Money) -> DomainResult<Self> {
        let final_balance = counted
            .total()
            .ok_or_else(|| DomainError::validation("counted amounts overflow"))?;
        let final_balance_difference = final_balance
            .checked_sub(expected)
            .ok_or_else(|| DomainError::validation("balance difference overflows"))?;
        Ok(Self {
            final_balance,
            final_balance_expected: expected,
            final_balance_difference,
        })
    }
}

/// One-to-one completion record of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Closing {
    id: ClosingId,
    session_id: SessionId,
    company_id: CompanyId,
    counted: Counted,
    reconciliation: Reconciliation,
    observations: Option<String>,
    closed_by: UserId,
    created_at: DateTime<Utc>,
}

impl Closing {
    pub fn new(
        id: ClosingId,
        session: &CashRegisterSession,
        counted: Counted,
        expected: Money,
        observations: Option<String>,
        closed_by: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        Ok(Self {
            id,
            session_id: *session.id(),
            company_id: session.company_id(),
            counted,
            reconciliation: Reconciliation::compute(&counted, expected)?,
            observations,
            closed_by,
            created_at: now,
        })
    }

    pub fn id(&self) -> ClosingId {
        self.id
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn company_id(&self) -> CompanyId {
        self.company_id
    }

    pub fn counted(&self) -> &Counted {
        &self.counted
    }

    pub fn final_balance(&self) -> Money {
        self.reconciliation.final_balance
    }

    pub fn final_balance_expected(&self) -> Money {
        self.reconciliation.final_balance_expected
    }

    pub fn final_balance_difference(&self) -> Money {
        self.reconciliation.final_balance_difference
    }

    pub fn observations(&self) -> Option<&str> {
        self.observations.as_deref()
    }

    pub fn closed_by(&self) -> UserId {
        self.closed_by
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
