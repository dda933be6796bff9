//! Grant and revoke against the in-memory platform.

use std::sync::Arc;

use vip_relay::audit::ActionTag;
use vip_relay::error::RelayError;
use vip_relay::membership::{ALREADY_ABSENT, ALREADY_ASSIGNED, MEMBER_NOT_FOUND};

use crate::support::{self, Fault, MockPlatform, Mutation, LIFETIME, LOGS, MEMBER, MONTHLY};

fn member_id() -> String {
    MEMBER.to_string()
}

#[tokio::test]
async fn grant_attaches_role_and_posts_audit() {
    let platform = Arc::new(MockPlatform::healthy());
    let relay = support::relay(&platform);

    let result = relay
        .membership()
        .grant(&member_id(), "VIP Mensuel")
        .await
        .expect("grant");

    assert!(result.success);
    assert_eq!(result.member.as_deref(), Some("nelly"));
    assert_eq!(result.role.as_deref(), Some("VIP Mensuel"));
    assert_eq!(result.action, Some(ActionTag::Attribution));
    assert_eq!(
        platform.mutations(),
        vec![Mutation::Add {
            user: MEMBER,
            role: MONTHLY
        }]
    );

    let sent = platform.sent();
    assert_eq!(sent.len(), 1);
    let (channel, embed) = &sent[0];
    assert_eq!(*channel, LOGS);
    assert_eq!(embed.title, "🎉 New VIP member!");
    assert_eq!(embed.color, 0x00ff00);
    assert_eq!(embed.description, "<@123> - role **VIP Mensuel** granted");
    assert_eq!(embed.fields[2].value, "attribution");
}

#[tokio::test]
async fn lifetime_label_selects_lifetime_role() {
    let platform = Arc::new(MockPlatform::healthy());
    let relay = support::relay(&platform);

    let result = relay
        .membership()
        .grant(&member_id(), "Abonnement à Vie")
        .await
        .expect("grant");

    assert!(result.success);
    assert_eq!(result.role.as_deref(), Some("VIP à Vie"));
    assert_eq!(
        platform.mutations(),
        vec![Mutation::Add {
            user: MEMBER,
            role: LIFETIME
        }]
    );
}

#[tokio::test]
async fn repeated_grant_is_a_no_op() {
    let platform = Arc::new(MockPlatform::healthy());
    let relay = support::relay(&platform);

    relay
        .membership()
        .grant(&member_id(), "VIP Mensuel")
        .await
        .expect("first grant");
    let second = relay
        .membership()
        .grant(&member_id(), "VIP Mensuel")
        .await
        .expect("second grant");

    assert!(second.success);
    assert_eq!(second.message.as_deref(), Some(ALREADY_ASSIGNED));
    assert_eq!(second.member.as_deref(), Some("nelly"));
    assert!(second.action.is_none());
    assert_eq!(platform.mutations().len(), 1);
    assert_eq!(platform.sent().len(), 1);
}

#[tokio::test]
async fn revoke_detaches_role_and_posts_audit() {
    let platform = Arc::new(MockPlatform::healthy());
    platform
        .state()
        .members
        .insert(MEMBER, support::member(MEMBER, "nelly", &[MONTHLY]));
    let relay = support::relay(&platform);

    let result = relay
        .membership()
        .revoke(&member_id(), "VIP Mensuel")
        .await
        .expect("revoke");

    assert!(result.success);
    assert_eq!(result.action, Some(ActionTag::Suppression));
    assert_eq!(
        platform.mutations(),
        vec![Mutation::Remove {
            user: MEMBER,
            role: MONTHLY
        }]
    );
    let sent = platform.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1.title, "⏰ VIP role removed");
    assert_eq!(sent[0].1.color, 0xff9900);
}

#[tokio::test]
async fn revoke_without_role_is_a_no_op() {
    let platform = Arc::new(MockPlatform::healthy());
    let relay = support::relay(&platform);

    let result = relay
        .membership()
        .revoke(&member_id(), "Vie")
        .await
        .expect("revoke");

    assert!(result.success);
    assert_eq!(result.message.as_deref(), Some(ALREADY_ABSENT));
    assert!(platform.mutations().is_empty());
    assert!(platform.sent().is_empty());
}

#[tokio::test]
async fn unknown_member_is_a_failed_result() {
    let platform = Arc::new(MockPlatform::healthy());
    let relay = support::relay(&platform);

    let result = relay
        .membership()
        .grant("987654321", "VIP Mensuel")
        .await
        .expect("well-formed result");

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some(MEMBER_NOT_FOUND));
    assert!(platform.mutations().is_empty());
}

#[tokio::test]
async fn unparsable_member_id_is_not_found() {
    let platform = Arc::new(MockPlatform::healthy());
    let relay = support::relay(&platform);

    let result = relay
        .membership()
        .revoke("not-a-snowflake", "VIP Mensuel")
        .await
        .expect("well-formed result");

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some(MEMBER_NOT_FOUND));
}

#[tokio::test]
async fn unrecognized_role_label_is_a_failed_result() {
    let platform = Arc::new(MockPlatform::healthy());
    let relay = support::relay(&platform);

    let result = relay
        .membership()
        .grant(&member_id(), "Gold")
        .await
        .expect("well-formed result");

    assert!(!result.success);
    assert_eq!(
        result.error.as_deref(),
        Some("unrecognized role type: Gold")
    );
    assert!(platform.mutations().is_empty());
}

#[tokio::test]
async fn missing_guild_is_a_configuration_error() {
    let platform = Arc::new(MockPlatform::healthy());
    platform.state().guild = None;
    let relay = support::relay(&platform);

    let err = relay
        .membership()
        .grant(&member_id(), "VIP Mensuel")
        .await
        .expect_err("missing guild");

    match err {
        RelayError::Configuration(msg) => assert_eq!(msg, "guild not found"),
        other => panic!("expected configuration error, got: {other:?}"),
    }
}

#[tokio::test]
async fn missing_role_is_a_configuration_error() {
    let platform = Arc::new(MockPlatform::healthy());
    platform.state().roles.retain(|r| r.id != MONTHLY);
    let relay = support::relay(&platform);

    let err = relay
        .membership()
        .grant(&member_id(), "VIP Mensuel")
        .await
        .expect_err("missing role");

    match err {
        RelayError::Configuration(msg) => assert_eq!(msg, "role not found"),
        other => panic!("expected configuration error, got: {other:?}"),
    }
    assert!(platform.mutations().is_empty());
}

#[tokio::test]
async fn failed_mutation_surfaces_and_skips_audit() {
    let platform = Arc::new(MockPlatform::healthy());
    platform.state().mutation_fault = Fault::Error;
    let relay = support::relay(&platform);

    let err = relay
        .membership()
        .grant(&member_id(), "VIP Mensuel")
        .await
        .expect_err("mutation failure");

    assert!(matches!(err, RelayError::Platform(_)), "got: {err:?}");
    assert!(platform.sent().is_empty());
}

#[tokio::test]
async fn audit_failure_does_not_fail_the_action() {
    let platform = Arc::new(MockPlatform::healthy());
    platform.state().send_fault = Fault::Error;
    let relay = support::relay(&platform);

    let result = relay
        .membership()
        .grant(&member_id(), "VIP Mensuel")
        .await
        .expect("grant");

    assert!(result.success);
    assert_eq!(platform.mutations().len(), 1);
    assert_eq!(relay.audit().failures(), 1);
}

#[tokio::test]
async fn rejected_audit_post_drops_session() {
    let platform = Arc::new(MockPlatform::healthy());
    platform.state().send_fault = Fault::Unauthorized;
    let relay = support::relay(&platform);

    let result = relay
        .membership()
        .grant(&member_id(), "VIP Mensuel")
        .await
        .expect("grant");

    assert!(result.success);
    assert_eq!(relay.audit().failures(), 1);
    assert!(!relay.session().is_ready().await);
}

#[tokio::test]
async fn missing_audit_channel_is_skipped_silently() {
    let platform = Arc::new(MockPlatform::healthy());
    platform.state().channels.remove(&LOGS);
    let relay = support::relay(&platform);

    let result = relay
        .membership()
        .grant(&member_id(), "VIP Mensuel")
        .await
        .expect("grant");

    assert!(result.success);
    assert!(platform.sent().is_empty());
    assert_eq!(relay.audit().failures(), 0);
}

#[tokio::test]
async fn unconfigured_audit_channel_posts_nothing() {
    let platform = Arc::new(MockPlatform::healthy());
    let mut config = support::config();
    config.discord.logs_channel_id = None;
    let relay = support::relay_with(&config, &platform);

    relay
        .membership()
        .grant(&member_id(), "VIP Mensuel")
        .await
        .expect("grant");

    assert!(platform.sent().is_empty());
    assert_eq!(relay.audit().failures(), 0);
}
