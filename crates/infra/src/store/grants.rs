use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tracing::info;

use comanda_auth::{Feature, Grant, GroupId, GroupMembershipLookup, LookupError, Membership, resolve_features};
use comanda_core::{Clock, RepositoryError, UserId};

#[derive(Debug, Default)]
struct GrantState {
    memberships: Vec<Membership>,
    grants: Vec<Grant>,
}

/// Group memberships and group → feature grants.
///
/// Features are resolved from current state on every lookup, so a revoked
/// membership or disabled grant is denied on the very next check.
pub struct InMemoryGrantStore {
    state: RwLock<GrantState>,
    clock: Arc<dyn Clock>,
    available: AtomicBool,
}

impl InMemoryGrantStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(GrantState::default()),
            clock,
            available: AtomicBool::new(true),
        }
    }

    pub fn add_membership(&self, membership: Membership) -> Result<(), RepositoryError> {
        info!(user_id = %membership.user_id, group_id = %membership.group_id, "group membership added");
        self.write()?.memberships.push(membership);
        Ok(())
    }

    /// Revoke every active membership of `user` in `group`, effective now.
    /// Returns how many were revoked.
    pub fn revoke_membership(&self, user: UserId, group: GroupId) -> Result<usize, RepositoryError> {
        let now = self.clock.now();
        let mut state = self.write()?;
        let mut revoked = 0;
        for membership in state
            .memberships
            .iter_mut()
            .filter(|m| m.user_id == user && m.group_id == group && m.is_active_at(now))
        {
            membership.revoked_at = Some(now);
            revoked += 1;
        }
        info!(user_id = %user, group_id = %group, revoked, "group membership revoked");
        Ok(revoked)
    }

    /// Insert or update the grant of `feature` to `group`.
    pub fn set_grant(&self, group: GroupId, feature: Feature, enabled: bool) -> Result<(), RepositoryError> {
        let mut state = self.write()?;
        match state
            .grants
            .iter()
            .position(|g| g.group_id == group && g.feature == feature)
        {
            Some(index) => state.grants[index].enabled = enabled,
            None => state.grants.push(Grant {
                group_id: group,
                feature: feature.clone(),
                enabled,
            }),
        }
        info!(group_id = %group, feature = %feature, enabled, "feature grant updated");
        Ok(())
    }

    /// Grant every feature in `features` to `group`.
    pub fn grant_all(&self, group: GroupId, features: impl IntoIterator<Item = Feature>) -> Result<(), RepositoryError> {
        for feature in features {
            self.set_grant(group, feature, true)?;
        }
        Ok(())
    }

    /// Simulate an outage of the membership source.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, GrantState>, RepositoryError> {
        self.state
            .write()
            .map_err(|_| RepositoryError::Unavailable("grant store lock poisoned".to_string()))
    }
}

impl GroupMembershipLookup for InMemoryGrantStore {
    fn effective_features(&self, user: UserId) -> Result<HashSet<Feature>, LookupError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(LookupError("grant store offline".to_string()));
        }
        let state = self
            .state
            .read()
            .map_err(|_| LookupError("grant store lock poisoned".to_string()))?;
        Ok(resolve_features(user, &state.memberships, &state.grants, self.clock.now()))
    }
}

impl core::fmt::Debug for InMemoryGrantStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InMemoryGrantStore")
            .field("available", &self.available.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
