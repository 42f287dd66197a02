//! Audit records: one immutable event per evaluation.

use serde::{Deserialize, Serialize};

use crate::evaluator::DenialReason;
use crate::types::{Identity, PolicyId, Role};

/// Outcome of the evaluation an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Allowed,
    Denied,
}

/// One audit record. Created once per evaluation, never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEvent {
    /// The policy that was evaluated.
    pub policy_id: PolicyId,

    /// Who requested access.
    pub actor: Identity,

    /// When the evaluation happened (Unix ms).
    pub timestamp: i64,

    /// Allowed or Denied.
    pub outcome: Outcome,

    /// The role used, or the denial cause.
    pub reason: String,

    /// Approximate network-origin-derived location, when known.
    pub source_location: Option<String>,
}

impl AccessEvent {
    /// Record a successful evaluation with the effective role.
    pub fn allowed(policy_id: PolicyId, actor: Identity, timestamp: i64, role: Role) -> Self {
        Self {
            policy_id,
            actor,
            timestamp,
            outcome: Outcome::Allowed,
            reason: role.to_string(),
            source_location: None,
        }
    }

    /// Record a denial with its cause.
    pub fn denied(
        policy_id: PolicyId,
        actor: Identity,
        timestamp: i64,
        reason: DenialReason,
    ) -> Self {
        Self {
            policy_id,
            actor,
            timestamp,
            outcome: Outcome::Denied,
            reason: reason.to_string(),
            source_location: None,
        }
    }

    /// Attach an approximate source location.
    pub fn with_source_location(mut self, location: impl Into<String>) -> Self {
        self.source_location = Some(location.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(s: &str) -> Identity {
        Identity::parse(s).unwrap()
    }

    #[test]
    fn test_allowed_event_records_role() {
        let event = AccessEvent::allowed(
            PolicyId::from_bytes([1; 16]),
            identity("jon@example.com"),
            42,
            Role::Editor,
        );
        assert_eq!(event.outcome, Outcome::Allowed);
        assert_eq!(event.reason, "Editor");
    }

    #[test]
    fn test_denied_event_records_cause() {
        let event = AccessEvent::denied(
            PolicyId::from_bytes([1; 16]),
            identity("eve@example.com"),
            42,
            DenialReason::Blocked,
        )
        .with_source_location("somewhere, earth");
        assert_eq!(event.outcome, Outcome::Denied);
        assert_eq!(event.reason, "Blocked");
        assert_eq!(event.source_location.as_deref(), Some("somewhere, earth"));
    }
}
