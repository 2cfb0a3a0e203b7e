use comanda_auth::{AuthorizationGuard, Caller, Guarded, Requirement, UseCase, features};
use comanda_cashier::{CashRegisterSession, CashSessionLedger, Closing, Counted};
use comanda_core::{ClosingId, EmployeeId, Money, SessionId};

use super::ensure_company;
use crate::ServiceError;

#[derive(Debug, Clone)]
pub struct OpenSessionInput {
    /// Defaults to the caller's employee.
    pub employee_id: Option<EmployeeId>,
    pub initial_value: Money,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CloseSessionInput {
    pub session_id: SessionId,
    pub counted: Counted,
    pub observations: Option<String>,
}

fn owned_session(
    ledger: &CashSessionLedger,
    caller: &Caller,
    session_id: SessionId,
) -> Result<CashRegisterSession, ServiceError> {
    let session = ledger.session(session_id)?;
    ensure_company(caller, session.company_id(), "cash register session", session_id)?;
    Ok(session)
}

pub struct OpenCashSession {
    ledger: CashSessionLedger,
}

impl UseCase for OpenCashSession {
    type Input = OpenSessionInput;
    type Output = SessionId;
    type Error = ServiceError;

    fn name(&self) -> &'static str {
        "open_cash_session"
    }

    fn execute(&self, caller: &Caller, input: OpenSessionInput) -> Result<SessionId, ServiceError> {
        let employee_id = input
            .employee_id
            .or(caller.employee_id)
            .ok_or_else(|| ServiceError::business("a cash register session needs an employee"))?;
        Ok(self.ledger.open(
            caller.user_id,
            employee_id,
            caller.company_id,
            input.initial_value,
            input.notes,
        )?)
    }
}

pub struct CloseCashSession {
    ledger: CashSessionLedger,
}

impl UseCase for CloseCashSession {
    type Input = CloseSessionInput;
    type Output = ClosingId;
    type Error = ServiceError;

    fn name(&self) -> &'static str {
        "close_cash_session"
    }

    fn execute(&self, caller: &Caller, input: CloseSessionInput) -> Result<ClosingId, ServiceError> {
        owned_session(&self.ledger, caller, input.session_id)?;
        Ok(self
            .ledger
            .close(input.session_id, input.counted, input.observations, caller.user_id)?)
    }
}

pub struct SubmitCashReview {
    ledger: CashSessionLedger,
}

impl UseCase for SubmitCashReview {
    type Input = CloseSessionInput;
    type Output = ClosingId;
    type Error = ServiceError;

    fn name(&self) -> &'static str {
        "submit_cash_review"
    }

    fn execute(&self, caller: &Caller, input: CloseSessionInput) -> Result<ClosingId, ServiceError> {
        owned_session(&self.ledger, caller, input.session_id)?;
        Ok(self.ledger.submit_for_review(
            input.session_id,
            input.counted,
            input.observations,
            caller.user_id,
        )?)
    }
}

pub struct ApproveCashReview {
    ledger: CashSessionLedger,
}

impl UseCase for ApproveCashReview {
    type Input = SessionId;
    type Output = ();
    type Error = ServiceError;

    fn name(&self) -> &'static str {
        "approve_cash_review"
    }

    fn execute(&self, caller: &Caller, session_id: SessionId) -> Result<(), ServiceError> {
        owned_session(&self.ledger, caller, session_id)?;
        Ok(self.ledger.approve_review(session_id, caller.user_id)?)
    }
}

/// Cash register use cases with their requirements attached.
pub struct CashierService {
    ledger: CashSessionLedger,
    open: Guarded<OpenCashSession>,
    close: Guarded<CloseCashSession>,
    submit_review: Guarded<SubmitCashReview>,
    approve_review: Guarded<ApproveCashReview>,
}

impl CashierService {
    pub fn new(ledger: CashSessionLedger, guard: AuthorizationGuard) -> Self {
        let reviewer = Requirement::any([features::CASH_REGISTER_REVIEW, features::COMPANY_ADMIN]);
        Self {
            open: Guarded::new(
                OpenCashSession { ledger: ledger.clone() },
                Requirement::all([features::CASH_REGISTER_OPEN]),
                guard.clone(),
            ),
            close: Guarded::new(
                CloseCashSession { ledger: ledger.clone() },
                Requirement::all([features::CASH_REGISTER_CLOSE]),
                guard.clone(),
            ),
            submit_review: Guarded::new(
                SubmitCashReview { ledger: ledger.clone() },
                Requirement::all([features::CASH_REGISTER_CLOSE]),
                guard.clone(),
            ),
            approve_review: Guarded::new(ApproveCashReview { ledger: ledger.clone() }, reviewer, guard),
            ledger,
        }
    }

    pub fn open(&self, caller: &Caller, input: OpenSessionInput) -> Result<SessionId, ServiceError> {
        self.open.execute(caller, input)
    }

    pub fn close(&self, caller: &Caller, input: CloseSessionInput) -> Result<ClosingId, ServiceError> {
        self.close.execute(caller, input)
    }

    pub fn submit_for_review(&self, caller: &Caller, input: CloseSessionInput) -> Result<ClosingId, ServiceError> {
        self.submit_review.execute(caller, input)
    }

    pub fn approve_review(&self, caller: &Caller, session_id: SessionId) -> Result<(), ServiceError> {
        self.approve_review.execute(caller, session_id)
    }

    pub fn session(&self, caller: &Caller, session_id: SessionId) -> Result<CashRegisterSession, ServiceError> {
        owned_session(&self.ledger, caller, session_id)
    }

    pub fn closing(&self, caller: &Caller, session_id: SessionId) -> Result<Option<Closing>, ServiceError> {
        owned_session(&self.ledger, caller, session_id)?;
        Ok(self.ledger.closing(session_id)?)
    }
}
