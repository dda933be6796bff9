//! Audit notifications for grant/revoke actions.
//!
//! Each successful role mutation is mirrored as an embed in a fixed
//! channel. The side channel is best-effort: a missing channel is skipped
//! silently, and post failures are logged under the
//! `vip_relay::audit_gap` target and counted, never returned.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::RelayError;
use crate::platform::{
    Embed, EmbedField, EmbedFooter, EmbedImage, Member, Platform, Role, Snowflake,
};
use crate::session::SessionManager;

/// Tracing target for swallowed audit failures.
pub const AUDIT_GAP_TARGET: &str = "vip_relay::audit_gap";

const GRANT_COLOR: u32 = 0x00ff00;
const REVOKE_COLOR: u32 = 0xff9900;

/// What happened to the member's role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionTag {
    /// The role was granted.
    Attribution,
    /// The role was revoked.
    Suppression,
}

impl ActionTag {
    /// Wire name of the tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Attribution => "attribution",
            Self::Suppression => "suppression",
        }
    }
}

impl std::fmt::Display for ActionTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the audit embed for an action.
pub fn audit_embed(
    member: &Member,
    role: &Role,
    tag: ActionTag,
    footer: &str,
    at: DateTime<Utc>,
) -> Embed {
    let (title, color, verb) = match tag {
        ActionTag::Attribution => ("🎉 New VIP member!", GRANT_COLOR, "granted"),
        ActionTag::Suppression => ("⏰ VIP role removed", REVOKE_COLOR, "removed"),
    };

    Embed {
        title: title.to_owned(),
        description: format!("<@{}> - role **{}** {verb}", member.id(), role.name),
        color,
        fields: vec![
            EmbedField {
                name: "👤 User".to_owned(),
                value: format!("{}\n`{}`", member.tag(), member.id()),
                inline: true,
            },
            EmbedField {
                name: "🏷️ Role".to_owned(),
                value: role.name.clone(),
                inline: true,
            },
            EmbedField {
                name: "⚡ Action".to_owned(),
                value: tag.to_string(),
                inline: true,
            },
        ],
        thumbnail: Some(EmbedImage {
            url: member.user.avatar_url(),
        }),
        timestamp: Some(at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        footer: Some(EmbedFooter {
            text: footer.to_owned(),
        }),
    }
}

/// Posts audit embeds to the configured channel.
pub struct AuditNotifier {
    platform: Arc<dyn Platform>,
    session: Arc<SessionManager>,
    channel_id: Option<Snowflake>,
    footer: String,
    call_timeout: Duration,
    failures: AtomicU64,
}

impl AuditNotifier {
    /// Create a notifier. With no channel configured every call is a no-op.
    ///
    /// Calls go through `session`, so a rejected credential on the audit
    /// path drops the session like any other platform call.
    pub fn new(
        platform: Arc<dyn Platform>,
        session: Arc<SessionManager>,
        channel_id: Option<Snowflake>,
        footer: impl Into<String>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            platform,
            session,
            channel_id,
            footer: footer.into(),
            call_timeout,
            failures: AtomicU64::new(0),
        }
    }

    /// Number of audit entries lost to lookup or post failures.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Record an action in the audit channel. Never fails.
    pub async fn log_action(&self, member: &Member, role: &Role, tag: ActionTag) {
        let Some(channel_id) = self.channel_id else {
            debug!("no audit channel configured, skipping audit entry");
            return;
        };

        let lookup = self
            .session
            .call(
                self.call_timeout,
                "audit channel lookup",
                self.platform.channel(channel_id),
            )
            .await;
        match lookup {
            Ok(Some(_)) => {}
            Ok(None) => {
                debug!(channel_id = %channel_id, "audit channel not found, skipping audit entry");
                return;
            }
            Err(e) => {
                self.record_gap(member, role, tag, &e);
                return;
            }
        }

        let embed = audit_embed(member, role, tag, &self.footer, Utc::now());
        let posted = self
            .session
            .call(
                self.call_timeout,
                "audit post",
                self.platform.send_embed(channel_id, &embed),
            )
            .await;
        match posted {
            Ok(()) => info!(
                member_id = %member.id(),
                role = %role.name,
                action = %tag,
                "audit entry posted"
            ),
            Err(e) => self.record_gap(member, role, tag, &e),
        }
    }

    fn record_gap(&self, member: &Member, role: &Role, tag: ActionTag, err: &RelayError) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        warn!(
            target: AUDIT_GAP_TARGET,
            member_id = %member.id(),
            role = %role.name,
            action = %tag,
            error = %err,
            "audit entry lost"
        );
    }
}
