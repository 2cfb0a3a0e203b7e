use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use comanda_core::{GroupId, UserId};

use crate::Feature;

/// A user's membership in a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub user_id: UserId,
    pub group_id: GroupId,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Membership {
    pub fn new(user_id: UserId, group_id: GroupId) -> Self {
        Self {
            user_id,
            group_id,
            expires_at: None,
            revoked_at: None,
        }
    }

    pub fn expiring_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }

    /// Whether the membership contributes features at `now`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        let expired = self.expires_at.is_some_and(|at| at <= now);
        let revoked = self.revoked_at.is_some_and(|at| at <= now);
        !expired && !revoked
    }
}

/// Group → feature grant. Disabled grants contribute nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub group_id: GroupId,
    pub feature: Feature,
    pub enabled: bool,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("feature lookup unavailable: {0}")]
pub struct LookupError(pub String);

/// Source of a user's effective feature set.
///
/// Implementations must resolve on every call: revocations and grant changes
/// take effect on the next check.
pub trait GroupMembershipLookup: Send + Sync {
    fn effective_features(&self, user: UserId) -> Result<HashSet<Feature>, LookupError>;
}

impl<L: GroupMembershipLookup + ?Sized> GroupMembershipLookup for std::sync::Arc<L> {
    fn effective_features(&self, user: UserId) -> Result<HashSet<Feature>, LookupError> {
        (**self).effective_features(user)
    }
}

/// Union of enabled features across `user`'s active memberships at `now`.
pub fn resolve_features<'a>(
    user: UserId,
    memberships: impl IntoIterator<Item = &'a Membership>,
    grants: &[Grant],
    now: DateTime<Utc>,
) -> HashSet<Feature> {
    let groups: HashSet<GroupId> = memberships
        .into_iter()
        .filter(|m| m.user_id == user && m.is_active_at(now))
        .map(|m| m.group_id)
        .collect();

    grants
        .iter()
        .filter(|g| g.enabled && groups.contains(&g.group_id))
        .map(|g| g.feature.clone())
        .collect()
}
