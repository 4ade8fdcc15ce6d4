//! Context-dependent access rule.

use std::collections::HashSet;

use protocol::{ChatContext, ContextKind, Principal};

use super::membership::{MembershipGate, MembershipOracle};

/// Combines the chat allow-list with the membership gate.
///
/// - Group and supergroup chats must be allow-listed, and the principal must
///   also pass the membership check.
/// - Private chats only need the membership check.
/// - Every other context is denied.
pub struct AccessPolicy<O> {
    gate: MembershipGate<O>,
    allowed_chats: HashSet<i64>,
}

impl<O: MembershipOracle> AccessPolicy<O> {
    /// Build a policy allow-listing the gate's own groups.
    pub fn new(gate: MembershipGate<O>) -> Self {
        let allowed_chats = gate.groups().iter().copied().collect();
        Self {
            gate,
            allowed_chats,
        }
    }

    /// The membership gate behind this policy.
    pub fn gate(&self) -> &MembershipGate<O> {
        &self.gate
    }

    /// Whether a shared chat is on the allow-list.
    pub fn chat_is_allowed(&self, chat_id: i64) -> bool {
        self.allowed_chats.contains(&chat_id)
    }

    /// Decide whether `principal` may act in `context`.
    pub async fn permits(&self, principal: &Principal, context: &ChatContext) -> bool {
        if context.kind.is_shared() {
            if !self.chat_is_allowed(context.id) {
                tracing::debug!(chat = context.id, "Chat is not allow-listed");
                return false;
            }
            return self.gate.is_authorized(principal).await;
        }
        match context.kind {
            ContextKind::Private => self.gate.is_authorized(principal).await,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::membership::tests::MockOracle;
    use crate::access::membership::MemberStatus;
    use crate::config::AccessConfig;

    fn policy(oracle: MockOracle) -> AccessPolicy<MockOracle> {
        let config = AccessConfig {
            allowed_group_ids: vec![-100],
            ..AccessConfig::default()
        };
        AccessPolicy::new(MembershipGate::new(oracle, &config))
    }

    #[tokio::test]
    async fn test_unlisted_group_is_always_denied() {
        let policy = policy(MockOracle::default().status(-100, 7, MemberStatus::Member));
        let member = Principal::new(7);

        assert!(!policy.permits(&member, &ChatContext::group(-555)).await);
        assert_eq!(policy.gate().oracle().call_count(), 0);
    }

    #[tokio::test]
    async fn test_listed_group_requires_membership() {
        let policy = policy(MockOracle::default().status(-100, 7, MemberStatus::Member));

        assert!(policy.permits(&Principal::new(7), &ChatContext::group(-100)).await);
        assert!(!policy.permits(&Principal::new(8), &ChatContext::group(-100)).await);
    }

    #[tokio::test]
    async fn test_private_uses_membership_alone() {
        let policy = policy(MockOracle::default().status(-100, 7, MemberStatus::Restricted));

        assert!(policy.permits(&Principal::new(7), &ChatContext::private(7)).await);
        assert!(!policy.permits(&Principal::new(8), &ChatContext::private(8)).await);
    }

    #[tokio::test]
    async fn test_channel_is_denied() {
        let policy = policy(MockOracle::default().status(-100, 7, MemberStatus::Member));
        let channel = ChatContext {
            id: -100,
            kind: ContextKind::Channel,
        };
        assert!(!policy.permits(&Principal::new(7), &channel).await);
    }
}
