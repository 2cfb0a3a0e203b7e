use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use comanda_core::{
    AggregateRoot, Clock, ClosingId, CompanyId, EmployeeId, ExpectedVersion, Money, RepositoryError,
    SessionId, UserId,
};
use comanda_status::{SessionStatus, Stateful, transition};

use crate::{BusinessError, CashRegisterSession, Closing, Counted};

/// Storage boundary for sessions and closings.
///
/// Implementations must enforce "at most one unsettled (OPEN or IN_REVIEW)
/// session per company" on insert, atomically with the insert itself, and
/// report a violation as `RepositoryError::Conflict`.
pub trait SessionStore: Send + Sync {
    fn insert_open(&self, session: CashRegisterSession) -> Result<SessionId, RepositoryError>;

    fn get(&self, id: SessionId) -> Result<CashRegisterSession, RepositoryError>;

    fn unsettled_for_company(&self, company_id: CompanyId) -> Result<Option<CashRegisterSession>, RepositoryError>;

    /// Store `session` (checked against `expected`) and, if given, `closing`,
    /// as one atomic write.
    fn complete(
        &self,
        session: CashRegisterSession,
        closing: Option<Closing>,
        expected: ExpectedVersion,
    ) -> Result<(), RepositoryError>;

    fn closing_for(&self, session_id: SessionId) -> Result<Option<Closing>, RepositoryError>;
}

/// Money that entered the register during a session.
pub trait SessionMovements: Send + Sync {
    /// Σ `total_amount` of the company's CLOSED commands whose close stamp
    /// lies in `[from, to]`.
    fn closed_commands_total(
        &self,
        company_id: CompanyId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Money, RepositoryError>;
}

/// Opening, closing and review of cash register sessions.
#[derive(Clone)]
pub struct CashSessionLedger {
    store: Arc<dyn SessionStore>,
    movements: Arc<dyn SessionMovements>,
    clock: Arc<dyn Clock>,
}

impl CashSessionLedger {
    pub fn new(
        store: Arc<dyn SessionStore>,
        movements: Arc<dyn SessionMovements>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            movements,
            clock,
        }
    }

    /// Open a session for `company_id`.
    ///
    /// Fails with `SessionAlreadyOpen` when the company already has an
    /// unsettled session, whether seen by the pre-check or by the store's
    /// unique constraint on a racing insert.
    pub fn open(
        &self,
        opened_by: UserId,
        employee_id: EmployeeId,
        company_id: CompanyId,
        initial_value: Money,
        notes: Option<String>,
    ) -> Result<SessionId, BusinessError> {
        if initial_value.is_negative() {
            return Err(BusinessError::validation("initial value must not be negative"));
        }
        if self.store.unsettled_for_company(company_id)?.is_some() {
            warn!(company_id = %company_id, "cash register session already open");
            return Err(BusinessError::SessionAlreadyOpen(company_id));
        }

        let session = CashRegisterSession::open(
            SessionId::new(),
            company_id,
            employee_id,
            opened_by,
            initial_value,
            notes,
            self.clock.now(),
        );
        let id = match self.store.insert_open(session) {
            Ok(id) => id,
            Err(RepositoryError::Conflict(reason)) => {
                warn!(company_id = %company_id, reason = %reason, "lost race opening cash register session");
                return Err(BusinessError::SessionAlreadyOpen(company_id));
            }
            Err(err) => return Err(err.into()),
        };
        info!(session_id = %id, company_id = %company_id, initial_value = %initial_value, "cash register session opened");
        Ok(id)
    }

    /// `initial_value + Σ closed command totals` since the session started.
    pub fn expected_balance(
        &self,
        session: &CashRegisterSession,
        until: DateTime<Utc>,
    ) -> Result<Money, BusinessError> {
        let sales = self
            .movements
            .closed_commands_total(session.company_id(), session.started_at(), until)?;
        session
            .initial_value()
            .checked_add(sales)
            .ok_or_else(|| BusinessError::validation("expected balance overflows"))
    }

    /// Write the closing and move the session OPEN → CLOSED atomically.
    pub fn close(
        &self,
        session_id: SessionId,
        counted: Counted,
        observations: Option<String>,
        closed_by: UserId,
    ) -> Result<ClosingId, BusinessError> {
        let (session, closing) = self.prepare_closing(session_id, counted, observations, closed_by)?;
        let now = closing.created_at();

        let mut closed = transition(&session, SessionStatus::Closed)?;
        closed.mark_ended(closed_by, now);
        let closing_id = closing.id();
        self.write(closed, Some(closing.clone()), session.version())?;

        info!(
            session_id = %session_id,
            closing_id = %closing_id,
            final_balance = %closing.final_balance(),
            expected = %closing.final_balance_expected(),
            difference = %closing.final_balance_difference(),
            "cash register session closed"
        );
        Ok(closing_id)
    }

    /// Write the closing and move the session OPEN → IN_REVIEW (disputed
    /// count). The session stays unsettled until [`approve_review`](Self::approve_review).
    pub fn submit_for_review(
        &self,
        session_id: SessionId,
        counted: Counted,
        observations: Option<String>,
        submitted_by: UserId,
    ) -> Result<ClosingId, BusinessError> {
        let (session, closing) = self.prepare_closing(session_id, counted, observations, submitted_by)?;

        let mut in_review = transition(&session, SessionStatus::InReview)?;
        in_review.mark_reviewing(closing.created_at());
        let closing_id = closing.id();
        self.write(in_review, Some(closing.clone()), session.version())?;

        warn!(
            session_id = %session_id,
            closing_id = %closing_id,
            difference = %closing.final_balance_difference(),
            "cash register closing submitted for review"
        );
        Ok(closing_id)
    }

    /// Settle a reviewed session: IN_REVIEW → CLOSED.
    pub fn approve_review(&self, session_id: SessionId, approved_by: UserId) -> Result<(), BusinessError> {
        let session = self.store.get(session_id)?;
        if session.status() != SessionStatus::InReview {
            return Err(BusinessError::SessionNotInReview(session.status()));
        }
        let mut closed = transition(&session, SessionStatus::Closed)?;
        closed.mark_ended(approved_by, self.clock.now());
        self.write(closed, None, session.version())?;
        info!(session_id = %session_id, "cash register review approved");
        Ok(())
    }

    pub fn session(&self, session_id: SessionId) -> Result<CashRegisterSession, BusinessError> {
        Ok(self.store.get(session_id)?)
    }

    pub fn closing(&self, session_id: SessionId) -> Result<Option<Closing>, BusinessError> {
        Ok(self.store.closing_for(session_id)?)
    }

    fn prepare_closing(
        &self,
        session_id: SessionId,
        counted: Counted,
        observations: Option<String>,
        by: UserId,
    ) -> Result<(CashRegisterSession, Closing), BusinessError> {
        if counted.has_negative() {
            return Err(BusinessError::validation("counted amounts must not be negative"));
        }
        let session = self.store.get(session_id)?;
        if session.status() != SessionStatus::Open {
            return Err(BusinessError::SessionNotOpen(session.status()));
        }
        let now = self.clock.now();
        let expected = self.expected_balance(&session, now)?;
        let closing = Closing::new(ClosingId::new(), &session, counted, expected, observations, by, now)
            .map_err(|err| BusinessError::validation(err.to_string()))?;
        Ok((session, closing))
    }

    fn write(
        &self,
        session: CashRegisterSession,
        closing: Option<Closing>,
        read_version: u64,
    ) -> Result<(), BusinessError> {
        let status = session.status();
        self.store
            .complete(session, closing, ExpectedVersion::Exact(read_version))
            .map_err(|err| {
                if err.is_conflict() {
                    warn!(error = %err, target = %status, "cash register session changed concurrently");
                }
                BusinessError::from(err)
            })
    }
}

impl core::fmt::Debug for CashSessionLedger {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CashSessionLedger").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use chrono::Duration;
    use comanda_core::FixedClock;

    #[derive(Default)]
    struct Store {
        sessions: Mutex<HashMap<SessionId, CashRegisterSession>>,
        closings: Mutex<HashMap<SessionId, Closing>>,
        /// Pretend the pre-check saw nothing (a racing insert slipped in).
        blind_precheck: AtomicBool,
    }

    impl SessionStore for Store {
        fn insert_open(&self, session: CashRegisterSession) -> Result<SessionId, RepositoryError> {
            let mut sessions = self.sessions.lock().unwrap();
            if sessions
                .values()
                .any(|s| s.company_id() == session.company_id() && s.is_unsettled())
            {
                return Err(RepositoryError::Conflict("unique open session".into()));
            }
            let id = *session.id();
            sessions.insert(id, session);
            Ok(id)
        }

        fn get(&self, id: SessionId) -> Result<CashRegisterSession, RepositoryError> {
            self.sessions
                .lock()
                .unwrap()
                .get(&id)
                .cloned()
                .ok_or_else(|| RepositoryError::not_found("session", id))
        }

        fn unsettled_for_company(&self, company_id: CompanyId) -> Result<Option<CashRegisterSession>, RepositoryError> {
            if self.blind_precheck.load(Ordering::SeqCst) {
                return Ok(None);
            }
            Ok(self
                .sessions
                .lock()
                .unwrap()
                .values()
                .find(|s| s.company_id() == company_id && s.is_unsettled())
                .cloned())
        }

        fn complete(
            &self,
            session: CashRegisterSession,
            closing: Option<Closing>,
            expected: ExpectedVersion,
        ) -> Result<(), RepositoryError> {
            let mut sessions = self.sessions.lock().unwrap();
            let current = sessions.get(session.id()).map_or(0, |s| s.version());
            if !expected.matches(current) {
                return Err(RepositoryError::Conflict("stale session".into()));
            }
            if let Some(closing) = closing {
                self.closings.lock().unwrap().insert(closing.session_id(), closing);
            }
            sessions.insert(*session.id(), session);
            Ok(())
        }

        fn closing_for(&self, session_id: SessionId) -> Result<Option<Closing>, RepositoryError> {
            Ok(self.closings.lock().unwrap().get(&session_id).cloned())
        }
    }

    struct Sales(Money);

    impl SessionMovements for Sales {
        fn closed_commands_total(
            &self,
            _company_id: CompanyId,
            _from: DateTime<Utc>,
            _to: DateTime<Utc>,
        ) -> Result<Money, RepositoryError> {
            Ok(self.0)
        }
    }

    fn reais(units: i64) -> Money {
        Money::from_cents(units * 100)
    }

    fn ledger(sales: Money) -> (CashSessionLedger, Arc<Store>, Arc<FixedClock>) {
        let store = Arc::new(Store::default());
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let ledger = CashSessionLedger::new(store.clone(), Arc::new(Sales(sales)), clock.clone());
        (ledger, store, clock)
    }

    fn open(ledger: &CashSessionLedger, company: CompanyId, initial: Money) -> Result<SessionId, BusinessError> {
        ledger.open(UserId::new(), EmployeeId::new(), company, initial, None)
    }

    #[test]
    fn second_open_session_is_rejected() {
        let (ledger, _, _) = ledger(Money::ZERO);
        let company = CompanyId::new();
        open(&ledger, company, reais(40)).unwrap();

        let err = open(&ledger, company, reais(10)).unwrap_err();
        assert_eq!(err, BusinessError::SessionAlreadyOpen(company));
        assert!(err.to_string().contains("already open"));

        assert!(open(&ledger, CompanyId::new(), reais(10)).is_ok());
    }

    #[test]
    fn racing_insert_maps_to_already_open() {
        let (ledger, store, _) = ledger(Money::ZERO);
        let company = CompanyId::new();
        open(&ledger, company, reais(40)).unwrap();

        store.blind_precheck.store(true, Ordering::SeqCst);
        let err = open(&ledger, company, reais(40)).unwrap_err();
        assert_eq!(err, BusinessError::SessionAlreadyOpen(company));
    }

    #[test]
    fn close_reconciles_counted_against_expected() {
        let (ledger, _, clock) = ledger(reais(100));
        let company = CompanyId::new();
        let session_id = open(&ledger, company, reais(40)).unwrap();
        clock.advance(Duration::hours(8));

        let counted = Counted::new(reais(100), reais(50), Money::ZERO, Money::ZERO);
        let closer = UserId::new();
        let closing_id = ledger.close(session_id, counted, Some("ok".into()), closer).unwrap();

        let closing = ledger.closing(session_id).unwrap().unwrap();
        assert_eq!(closing.id(), closing_id);
        assert_eq!(closing.final_balance_expected(), reais(140));
        assert_eq!(closing.final_balance(), reais(150));
        assert_eq!(closing.final_balance_difference(), reais(10));

        let session = ledger.session(session_id).unwrap();
        assert_eq!(session.status(), SessionStatus::Closed);
        assert_eq!(session.closed_by(), Some(closer));
        assert_eq!(session.ended_at(), Some(clock.now()));

        // Settled: a new session may open, the old one cannot close again.
        assert!(open(&ledger, company, reais(40)).is_ok());
        let err = ledger.close(session_id, counted, None, closer).unwrap_err();
        assert_eq!(err, BusinessError::SessionNotOpen(SessionStatus::Closed));
    }

    #[test]
    fn disputed_count_goes_through_review() {
        let (ledger, _, _) = ledger(reais(100));
        let company = CompanyId::new();
        let session_id = open(&ledger, company, Money::ZERO).unwrap();
        let counted = Counted::new(reais(60), Money::ZERO, Money::ZERO, Money::ZERO);

        ledger.submit_for_review(session_id, counted, Some("short 40".into()), UserId::new()).unwrap();
        let session = ledger.session(session_id).unwrap();
        assert_eq!(session.status(), SessionStatus::InReview);
        assert_eq!(session.ended_at(), None);
        assert_eq!(ledger.closing(session_id).unwrap().unwrap().final_balance_difference(), reais(-40));

        // Still unsettled: no second session, no direct close.
        assert!(matches!(open(&ledger, company, Money::ZERO), Err(BusinessError::SessionAlreadyOpen(_))));
        assert!(matches!(
            ledger.close(session_id, counted, None, UserId::new()),
            Err(BusinessError::SessionNotOpen(SessionStatus::InReview))
        ));

        ledger.approve_review(session_id, UserId::new()).unwrap();
        assert_eq!(ledger.session(session_id).unwrap().status(), SessionStatus::Closed);
        assert!(matches!(
            ledger.approve_review(session_id, UserId::new()),
            Err(BusinessError::SessionNotInReview(SessionStatus::Closed))
        ));
    }

    #[test]
    fn negative_amounts_are_rejected() {
        let (ledger, _, _) = ledger(Money::ZERO);
        let company = CompanyId::new();
        assert!(matches!(open(&ledger, company, Money::from_cents(-1)), Err(BusinessError::Validation(_))));

        let session_id = open(&ledger, company, Money::ZERO).unwrap();
        let counted = Counted::new(Money::from_cents(-5), Money::ZERO, Money::ZERO, Money::ZERO);
        assert!(matches!(
            ledger.close(session_id, counted, None, UserId::new()),
            Err(BusinessError::Validation(_))
        ));
    }

    #[test]
    fn overflowing_balances_are_rejected_and_the_session_stays_open() {
        let (ledger, _, _) = ledger(Money::from_cents(i64::MAX));
        let company = CompanyId::new();
        let session_id = open(&ledger, company, reais(10)).unwrap();
        let counted = Counted::new(reais(10), Money::ZERO, Money::ZERO, Money::ZERO);

        assert!(matches!(
            ledger.close(session_id, counted, None, UserId::new()),
            Err(BusinessError::Validation(_))
        ));
        assert_eq!(ledger.session(session_id).unwrap().status(), SessionStatus::Open);
        assert!(ledger.closing(session_id).unwrap().is_none());
    }
}
