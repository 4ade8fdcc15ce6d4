//! Cached group-membership decisions.
//!
//! The gate answers "may this principal use the bot" by asking the
//! [`MembershipOracle`] about each configured group, stopping at the first
//! active membership. Decisions are cached per principal for a fixed TTL and
//! refreshed single-flight, so a burst of clicks costs one oracle sequence.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use protocol::{BotError, Principal, Upstream};
use thiserror::Error;

use crate::cache::TtlCell;
use crate::config::AccessConfig;
use crate::outcome::ProbeOutcome;

/// Membership status reported by the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStatus {
    Creator,
    Administrator,
    Member,
    Restricted,
    Left,
    Kicked,
}

impl MemberStatus {
    /// Parse a wire status name.
    pub fn parse(status: &str) -> Option<Self> {
        match status {
            "creator" => Some(Self::Creator),
            "administrator" => Some(Self::Administrator),
            "member" => Some(Self::Member),
            "restricted" => Some(Self::Restricted),
            "left" => Some(Self::Left),
            "kicked" => Some(Self::Kicked),
            _ => None,
        }
    }

    /// Whether the principal currently belongs to the group.
    ///
    /// Restricted members still count.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Left | Self::Kicked)
    }
}

/// Failures of a single membership query.
#[derive(Debug, Clone, Error)]
pub enum OracleError {
    /// The bot cannot see the group (not a member, or lacks rights).
    #[error("no visibility into group {0}")]
    NoVisibility(i64),

    /// Any other failure.
    #[error("membership query failed: {0}")]
    Other(String),
}

impl From<OracleError> for BotError {
    fn from(err: OracleError) -> Self {
        BotError::upstream(Upstream::Membership, err.to_string())
    }
}

/// Source of truth for group membership.
pub trait MembershipOracle: Send + Sync {
    /// Status of `principal_id` in `group_id`.
    fn member_status(
        &self,
        group_id: i64,
        principal_id: i64,
    ) -> impl Future<Output = Result<MemberStatus, OracleError>> + Send;
}

/// TTL-cached "is authorized" decisions keyed by principal id.
pub struct MembershipGate<O> {
    oracle: O,
    groups: Vec<i64>,
    admin_ids: HashSet<i64>,
    admin_usernames: HashSet<String>,
    ttl: Duration,
    records: DashMap<i64, Arc<TtlCell<bool>>>,
}

impl<O: MembershipOracle> MembershipGate<O> {
    /// Create a gate from access configuration.
    pub fn new(oracle: O, config: &AccessConfig) -> Self {
        Self {
            oracle,
            groups: config.allowed_group_ids.clone(),
            admin_ids: config.admin_ids.iter().copied().collect(),
            admin_usernames: config
                .admin_usernames
                .iter()
                .map(|name| normalize_username(name))
                .filter(|name| !name.is_empty())
                .collect(),
            ttl: config.member_cache_ttl(),
            records: DashMap::new(),
        }
    }

    /// The oracle behind the gate.
    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Groups whose members are authorized, in query order.
    pub fn groups(&self) -> &[i64] {
        &self.groups
    }

    /// Whether the principal is configured as privileged.
    pub fn is_admin(&self, principal: &Principal) -> bool {
        if self.admin_ids.contains(&principal.id) {
            return true;
        }
        principal
            .username
            .as_deref()
            .map(normalize_username)
            .is_some_and(|name| self.admin_usernames.contains(&name))
    }

    /// Decide whether the principal may use the bot.
    ///
    /// A non-expired cached decision is returned without contacting the
    /// oracle.
    pub async fn is_authorized(&self, principal: &Principal) -> bool {
        if self.is_admin(principal) {
            tracing::debug!(principal = principal.id, "Privileged principal, skipping membership check");
            return true;
        }

        let principal_id = principal.id;
        // Clone the cell out so no map shard lock is held across the await.
        let cell = self
            .records
            .entry(principal_id)
            .or_insert_with(|| Arc::new(TtlCell::new(self.ttl)))
            .clone();

        cell.get_or_refresh(|| async move {
            Ok::<_, std::convert::Infallible>(self.check_groups(principal_id).await)
        })
        .await
        .unwrap_or(false)
    }

    /// Run one oracle sequence over the configured groups.
    async fn check_groups(&self, principal_id: i64) -> bool {
        if self.groups.is_empty() {
            return true;
        }

        let mut outcomes = Vec::with_capacity(self.groups.len());
        for &group_id in &self.groups {
            let outcome = match self.oracle.member_status(group_id, principal_id).await {
                Ok(status) => ProbeOutcome::from_bool(status.is_active()),
                Err(e) => {
                    tracing::debug!(group = group_id, principal = principal_id, error = %e, "Membership inconclusive");
                    ProbeOutcome::Inconclusive
                }
            };
            outcomes.push(outcome);
            if outcome.is_positive() {
                break;
            }
        }

        let allowed = ProbeOutcome::any_positive(outcomes);
        tracing::info!(principal = principal_id, allowed, "Membership checked");
        allowed
    }

    /// Number of principals with a cache slot.
    pub fn cached_principals(&self) -> usize {
        self.records.len()
    }
}

fn normalize_username(name: &str) -> String {
    name.trim().trim_start_matches('@').to_lowercase()
}
