use std::collections::HashMap;
use std::sync::Mutex;

use comanda_cashier::{CashRegisterSession, Closing, SessionStore};
use comanda_core::{AggregateRoot, CompanyId, ExpectedVersion, RepositoryError, SessionId};

#[derive(Debug, Default)]
struct SessionState {
    sessions: HashMap<SessionId, CashRegisterSession>,
    closings: HashMap<SessionId, Closing>,
}

/// Sessions and closings behind one lock, so the "one unsettled session per
/// company" check and the insert happen together.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    state: Mutex<SessionState>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, SessionState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("session store lock poisoned".to_string()))
    }
}

impl SessionStore for InMemorySessionStore {
    fn insert_open(&self, session: CashRegisterSession) -> Result<SessionId, RepositoryError> {
        let mut state = self.lock()?;
        let company_id = session.company_id();
        if state
            .sessions
            .values()
            .any(|s| s.company_id() == company_id && s.is_unsettled())
        {
            return Err(RepositoryError::Conflict(format!(
                "unsettled cash register session exists for company {company_id}"
            )));
        }
        let id = *session.id();
        if state.sessions.contains_key(&id) {
            return Err(RepositoryError::Conflict(format!("session {id} already stored")));
        }
        state.sessions.insert(id, session);
        Ok(id)
    }

    fn get(&self, id: SessionId) -> Result<CashRegisterSession, RepositoryError> {
        self.lock()?
            .sessions
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::not_found("cash register session", id))
    }

    fn unsettled_for_company(&self, company_id: CompanyId) -> Result<Option<CashRegisterSession>, RepositoryError> {
        Ok(self
            .lock()?
            .sessions
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
        let mut state = self.lock()?;
        let id = *session.id();
        let current = state
            .sessions
            .get(&id)
            .map(AggregateRoot::version)
            .ok_or_else(|| RepositoryError::not_found("cash register session", id))?;
        if !expected.matches(current) {
            return Err(RepositoryError::Conflict(format!(
                "session {id}: expected {expected:?}, found {current}"
            )));
        }
        if let Some(closing) = closing {
            if state.closings.contains_key(&id) {
                return Err(RepositoryError::Conflict(format!("session {id} already has a closing")));
            }
            state.closings.insert(id, closing);
        }
        state.sessions.insert(id, session);
        Ok(())
    }

    fn closing_for(&self, session_id: SessionId) -> Result<Option<Closing>, RepositoryError> {
        Ok(self.lock()?.closings.get(&session_id).cloned())
    }
}
