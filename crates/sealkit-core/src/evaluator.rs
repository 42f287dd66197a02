//! The authorization evaluator.
//!
//! A pure function of (policy, identity, contact override, current time).
//! Evaluation order, first match wins:
//!
//! 1. Author: always Allowed(Owner), overriding block and expiry.
//! 2. Blocked: Denied(Blocked).
//! 3. Expiry elapsed: Denied(Expired). The boundary is exclusive for
//!    non-authors: access at exactly the expiry instant is denied.
//! 4. Contact override: Trust is an Owner-equivalent delegate, Deny refuses
//!    regardless of membership.
//! 5. Membership lookup; absent means Denied(NotAuthorized).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::policy::Policy;
use crate::types::{ContactLevel, Identity, Role};

/// Outcome of one evaluation. Denials are values, not errors: they are
/// normal results that must stay distinguishable from transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Access granted with the requester's effective role.
    Allowed(Role),
    /// Access denied with the cause.
    Denied(DenialReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed(_))
    }

    /// The effective role, if allowed.
    pub fn role(&self) -> Option<Role> {
        match self {
            Decision::Allowed(role) => Some(*role),
            Decision::Denied(_) => None,
        }
    }
}

/// Why an evaluation denied access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DenialReason {
    /// The author revoked access for everyone else.
    Blocked,
    /// The expiry elapsed.
    Expired,
    /// The requester is neither a member, a trusted delegate, nor the author.
    NotAuthorized,
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::Blocked => write!(f, "Blocked"),
            DenialReason::Expired => write!(f, "Expired"),
            DenialReason::NotAuthorized => write!(f, "NotAuthorized"),
        }
    }
}

/// Evaluate a policy for a requester at a point in time.
///
/// `contact` is the author's contact-level override for the requester,
/// looked up from the external contact store by the caller.
pub fn evaluate(
    policy: &Policy,
    identity: &Identity,
    contact: Option<ContactLevel>,
    now_ms: i64,
) -> Decision {
    if identity == policy.author() {
        return Decision::Allowed(Role::Owner);
    }

    if policy.blocked() {
        return Decision::Denied(DenialReason::Blocked);
    }

    if let Some(expiry) = policy.expiry() {
        if now_ms >= expiry {
            return Decision::Denied(DenialReason::Expired);
        }
    }

    match contact {
        Some(ContactLevel::Trust) => return Decision::Allowed(Role::Owner),
        Some(ContactLevel::Deny) => return Decision::Denied(DenialReason::NotAuthorized),
        Some(ContactLevel::Allow) | None => {}
    }

    match policy.member_role(identity) {
        Some(role) => Decision::Allowed(role),
        None => Decision::Denied(DenialReason::NotAuthorized),
    }
}

/// Resolve the role an identity holds, for gating mutations.
///
/// Unlike [`evaluate`], block and expiry do not strip the role: an Owner can
/// still administer blocked or lapsed content, and BlockAccess stays
/// idempotent for the Owner who just blocked it. A Deny contact override
/// still removes the role entirely.
pub fn resolve_role(
    policy: &Policy,
    identity: &Identity,
    contact: Option<ContactLevel>,
) -> Option<Role> {
    if identity == policy.author() {
        return Some(Role::Owner);
    }
    match contact {
        Some(ContactLevel::Trust) => return Some(Role::Owner),
        Some(ContactLevel::Deny) => return None,
        Some(ContactLevel::Allow) | None => {}
    }
    policy.member_role(identity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyBuilder;

    fn identity(s: &str) -> Identity {
        Identity::parse(s).unwrap()
    }

    fn base_policy() -> Policy {
        PolicyBuilder::new(identity("sara@example.com"))
            .member(identity("jon@example.com"), Role::Editor)
            .member(identity("info@lockmagic.com"), Role::Viewer)
            .build()
            .unwrap()
    }

    #[test]
    fn test_author_is_owner() {
        let policy = base_policy();
        let decision = evaluate(&policy, &identity("sara@example.com"), None, 0);
        assert_eq!(decision, Decision::Allowed(Role::Owner));
    }

    #[test]
    fn test_member_gets_explicit_role() {
        let policy = base_policy();
        assert_eq!(
            evaluate(&policy, &identity("jon@example.com"), None, 0),
            Decision::Allowed(Role::Editor)
        );
        assert_eq!(
            evaluate(&policy, &identity("info@lockmagic.com"), None, 0),
            Decision::Allowed(Role::Viewer)
        );
    }

    #[test]
    fn test_stranger_not_authorized() {
        let policy = base_policy();
        assert_eq!(
            evaluate(&policy, &identity("eve@example.com"), None, 0),
            Decision::Denied(DenialReason::NotAuthorized)
        );
    }

    #[test]
    fn test_blocked_denies_members_not_author() {
        let mut policy = base_policy();
        let author = identity("sara@example.com");
        policy.set_blocked(true, &author);

        assert_eq!(
            evaluate(&policy, &identity("jon@example.com"), None, 0),
            Decision::Denied(DenialReason::Blocked)
        );
        assert_eq!(
            evaluate(&policy, &author, None, 0),
            Decision::Allowed(Role::Owner)
        );
    }

    #[test]
    fn test_expiry_boundary_exclusive() {
        let author = identity("sara@example.com");
        let policy = PolicyBuilder::new(author.clone())
            .member(identity("jon@example.com"), Role::Editor)
            .expiry(1000)
            .build()
            .unwrap();

        let jon = identity("jon@example.com");
        // One millisecond before the boundary still succeeds.
        assert_eq!(evaluate(&policy, &jon, None, 999), Decision::Allowed(Role::Editor));
        // Exactly at the boundary is elapsed.
        assert_eq!(
            evaluate(&policy, &jon, None, 1000),
            Decision::Denied(DenialReason::Expired)
        );
        assert_eq!(
            evaluate(&policy, &jon, None, 2000),
            Decision::Denied(DenialReason::Expired)
        );
        // Author is unaffected by expiry.
        assert_eq!(
            evaluate(&policy, &author, None, 2000),
            Decision::Allowed(Role::Owner)
        );
    }

    #[test]
    fn test_blocked_takes_precedence_over_expiry() {
        let mut policy = PolicyBuilder::new(identity("sara@example.com"))
            .expiry(1000)
            .build()
            .unwrap();
        policy.set_blocked(true, &identity("sara@example.com"));

        assert_eq!(
            evaluate(&policy, &identity("jon@example.com"), None, 5000),
            Decision::Denied(DenialReason::Blocked)
        );
    }

    #[test]
    fn test_trust_override_is_owner_equivalent() {
        let policy = base_policy();
        let stranger = identity("delegate@example.com");
        assert_eq!(
            evaluate(&policy, &stranger, Some(ContactLevel::Trust), 0),
            Decision::Allowed(Role::Owner)
        );
    }

    #[test]
    fn test_deny_override_beats_membership() {
        let policy = base_policy();
        // Jon is an Editor, but the author's Deny contact entry wins.
        assert_eq!(
            evaluate(
                &policy,
                &identity("jon@example.com"),
                Some(ContactLevel::Deny),
                0
            ),
            Decision::Denied(DenialReason::NotAuthorized)
        );
    }

    #[test]
    fn test_trust_does_not_bypass_block() {
        let mut policy = base_policy();
        policy.set_blocked(true, &identity("sara@example.com"));
        assert_eq!(
            evaluate(
                &policy,
                &identity("delegate@example.com"),
                Some(ContactLevel::Trust),
                0
            ),
            Decision::Denied(DenialReason::Blocked)
        );
    }

    #[test]
    fn test_resolve_role_survives_block_and_expiry() {
        let mut policy = PolicyBuilder::new(identity("sara@example.com"))
            .member(identity("owner2@example.com"), Role::Owner)
            .member(identity("jon@example.com"), Role::Editor)
            .expiry(1000)
            .build()
            .unwrap();
        policy.set_blocked(true, &identity("sara@example.com"));

        // Blocked and expired, yet roles remain resolvable for mutations.
        assert_eq!(
            resolve_role(&policy, &identity("owner2@example.com"), None),
            Some(Role::Owner)
        );
        assert_eq!(
            resolve_role(&policy, &identity("jon@example.com"), None),
            Some(Role::Editor)
        );
        assert_eq!(
            resolve_role(&policy, &identity("sara@example.com"), None),
            Some(Role::Owner)
        );
        assert_eq!(resolve_role(&policy, &identity("eve@example.com"), None), None);
        assert_eq!(
            resolve_role(
                &policy,
                &identity("jon@example.com"),
                Some(ContactLevel::Deny)
            ),
            None
        );
    }

    #[test]
    fn test_allow_override_falls_through_to_members() {
        let policy = base_policy();
        assert_eq!(
            evaluate(
                &policy,
                &identity("jon@example.com"),
                Some(ContactLevel::Allow),
                0
            ),
            Decision::Allowed(Role::Editor)
        );
        assert_eq!(
            evaluate(
                &policy,
                &identity("eve@example.com"),
                Some(ContactLevel::Allow),
                0
            ),
            Decision::Denied(DenialReason::NotAuthorized)
        );
    }
}
