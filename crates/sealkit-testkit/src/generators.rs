//! Proptest generators for property-based testing.

use std::collections::BTreeMap;

use proptest::prelude::*;

use sealkit_core::{ContactLevel, Identity, Policy, PolicyBuilder, Role};

/// Generate a valid identity (lowercase email).
pub fn identity() -> impl Strategy<Value = Identity> {
    "[a-z][a-z0-9]{0,7}@[a-z]{1,8}\\.(com|org|net)"
        .prop_map(|s| Identity::parse(&s).expect("generated identity must parse"))
}

/// Generate a role.
pub fn role() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::Viewer), Just(Role::Editor), Just(Role::Owner)]
}

/// Generate a contact level.
pub fn contact_level() -> impl Strategy<Value = ContactLevel> {
    prop_oneof![
        Just(ContactLevel::Trust),
        Just(ContactLevel::Deny),
        Just(ContactLevel::Allow),
    ]
}

/// Generate a member map of bounded size.
pub fn members(max: usize) -> impl Strategy<Value = BTreeMap<Identity, Role>> {
    prop::collection::btree_map(identity(), role(), 0..=max)
}

/// Generate a plausible expiry timestamp (Unix ms, whole seconds so the
/// RFC 3339 wire form round-trips losslessly).
pub fn expiry_ms() -> impl Strategy<Value = i64> {
    (0i64..=4_102_444_800i64).prop_map(|secs| secs * 1000)
}

/// Generate a label string.
pub fn label() -> impl Strategy<Value = String> {
    "[A-Za-z0-9 _.-]{0,24}".prop_map(String::from)
}

/// Parameters for generating a policy.
#[derive(Debug, Clone)]
pub struct PolicyParams {
    pub author: Identity,
    pub members: BTreeMap<Identity, Role>,
    pub expiry: Option<i64>,
    pub blocked: bool,
    pub label: String,
}

impl Arbitrary for PolicyParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            identity(),
            members(8),
            prop::option::of(expiry_ms()),
            any::<bool>(),
            label(),
        )
            .prop_map(|(author, members, expiry, blocked, label)| PolicyParams {
                author,
                members,
                expiry,
                blocked,
                label,
            })
            .boxed()
    }
}

/// Build a policy from parameters. The id is freshly generated each call.
pub fn policy_from_params(params: &PolicyParams) -> Policy {
    let mut builder = PolicyBuilder::new(params.author.clone())
        .members(params.members.clone())
        .label(params.label.clone());
    if let Some(expiry) = params.expiry {
        builder = builder.expiry(expiry);
    }
    let mut policy = builder.build().expect("generated policy must build");
    if params.blocked {
        policy.set_blocked(true, &params.author);
    }
    policy
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealkit_core::policy::{decode_members, encode_members};
    use sealkit_core::{canonical_policy_bytes, evaluate, Decision};

    proptest! {
        #[test]
        fn test_wire_document_roundtrip(params: PolicyParams) {
            let policy = policy_from_params(&params);
            let doc = policy.to_document(None);
            let json = serde_json::to_string(&doc).unwrap();
            let parsed = serde_json::from_str(&json).unwrap();
            let recovered = Policy::from_document(&parsed).unwrap();
            prop_assert_eq!(recovered, policy);
        }

        #[test]
        fn test_canonical_bytes_stable_across_clones(params: PolicyParams) {
            let policy = policy_from_params(&params);
            let b1 = canonical_policy_bytes(&policy).unwrap();
            let b2 = canonical_policy_bytes(&policy.clone()).unwrap();
            prop_assert_eq!(b1, b2);
        }

        #[test]
        fn test_canonical_bytes_distinguish_policies(
            p1: PolicyParams,
            p2: PolicyParams,
        ) {
            // Distinct ids alone guarantee distinct canonical bytes.
            let a = policy_from_params(&p1);
            let b = policy_from_params(&p2);
            prop_assert_ne!(
                canonical_policy_bytes(&a).unwrap(),
                canonical_policy_bytes(&b).unwrap()
            );
        }

        #[test]
        fn test_members_codec_roundtrip(members in members(8)) {
            let encoded = encode_members(&members);
            prop_assert_eq!(decode_members(&encoded).unwrap(), members);
        }

        #[test]
        fn test_author_always_allowed(params: PolicyParams, now in 0i64..=i64::MAX / 2) {
            let policy = policy_from_params(&params);
            let decision = evaluate(&policy, &params.author, None, now);
            prop_assert_eq!(decision, Decision::Allowed(Role::Owner));
        }

        #[test]
        fn test_blocked_denies_every_non_author(
            params: PolicyParams,
            accessor in identity(),
            level in prop::option::of(contact_level()),
        ) {
            prop_assume!(accessor != params.author);
            let mut blocked = PolicyParams { blocked: true, ..params };
            // Even an explicit Owner membership must not survive a block.
            blocked.members.insert(accessor.clone(), Role::Owner);
            let policy = policy_from_params(&blocked);
            let decision = evaluate(&policy, &accessor, level, 0);
            prop_assert!(!decision.is_allowed());
        }
    }
}
