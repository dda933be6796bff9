//! The relay context.
//!
//! Built once at startup from [`RelayConfig`] and shared by every request
//! handler. Owns the platform client, the session manager, the audit
//! notifier and the membership service.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::warn;

use crate::audit::AuditNotifier;
use crate::config::RelayConfig;
use crate::error::RelayResult;
use crate::membership::MembershipService;
use crate::platform::discord::DiscordClient;
use crate::platform::{Platform, PlatformError, Snowflake};
use crate::roles::{RoleKind, RoleResolver};
use crate::session::SessionManager;

/// Placeholder reported for lookups that found nothing.
pub const NOT_FOUND: &str = "not found";

/// Body of the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    /// Always `"ok"` when the report could be produced.
    pub status: String,
    /// Whether a platform session is ready.
    pub bot_ready: bool,
    /// Display tag of the bot account.
    pub bot_tag: String,
    /// Name of the managed guild.
    pub guild_name: String,
    /// Approximate guild member count; 0 when unknown.
    pub member_count: u64,
    /// RFC 3339 time of the report.
    pub timestamp: String,
    /// Audit entries lost since startup.
    pub audit_failures: u64,
}

/// Body of the diagnostics endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    /// Always `"ok"`.
    pub test: String,
    /// What the relay can see of its configured entities.
    pub info: DiagnosticsInfo,
}

/// Names of the configured entities, or [`NOT_FOUND`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsInfo {
    /// Whether a platform session is ready.
    pub bot_connected: bool,
    /// Guild name.
    pub guild: String,
    /// VIP role names.
    pub roles: RoleNames,
    /// Configured channel names.
    pub channels: ChannelNames,
}

/// VIP role names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleNames {
    /// Monthly role name.
    pub monthly: String,
    /// Lifetime role name.
    pub lifetime: String,
}

/// Configured channel names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelNames {
    /// Audit channel name.
    pub logs: String,
    /// Command channel name.
    pub commands: String,
}

/// Process-wide relay context.
pub struct Relay {
    platform: Arc<dyn Platform>,
    session: Arc<SessionManager>,
    audit: Arc<AuditNotifier>,
    membership: MembershipService,
    resolver: RoleResolver,
    secret: String,
    guild_id: Snowflake,
    logs_channel_id: Option<Snowflake>,
    commands_channel_id: Option<Snowflake>,
    call_timeout: Duration,
}

impl Relay {
    /// Build the relay against the Discord REST API.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is incomplete or the HTTP
    /// client cannot be built.
    pub fn from_config(config: &RelayConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let token = config
            .discord
            .bot_token
            .clone()
            .context("missing Discord bot token")?;
        let client = DiscordClient::new(
            config.discord.api_base.clone(),
            token,
            Duration::from_secs(config.discord.call_timeout_secs),
        )
        .context("failed to build Discord client")?;
        Self::with_platform(config, Arc::new(client))
    }

    /// Build the relay against any [`Platform`] implementation.
    ///
    /// # Errors
    ///
    /// Returns an error if the guild id or webhook secret is missing.
    pub fn with_platform(config: &RelayConfig, platform: Arc<dyn Platform>) -> anyhow::Result<Self> {
        let guild_id = config.discord.guild_id.context("missing guild id")?;
        let secret = config
            .webhook
            .secret
            .clone()
            .filter(|s| !s.is_empty())
            .context("missing webhook secret")?;
        let call_timeout = Duration::from_secs(config.discord.call_timeout_secs);

        let session = Arc::new(SessionManager::new(
            Arc::clone(&platform),
            Duration::from_secs(config.discord.connect_timeout_secs),
        ));
        let audit = Arc::new(AuditNotifier::new(
            Arc::clone(&platform),
            Arc::clone(&session),
            config.discord.logs_channel_id,
            config.audit.footer.clone(),
            call_timeout,
        ));
        let resolver = RoleResolver::from_config(&config.roles);
        let membership = MembershipService::new(
            Arc::clone(&platform),
            Arc::clone(&session),
            resolver.clone(),
            Arc::clone(&audit),
            guild_id,
            call_timeout,
        );

        Ok(Self {
            platform,
            session,
            audit,
            membership,
            resolver,
            secret,
            guild_id,
            logs_channel_id: config.discord.logs_channel_id,
            commands_channel_id: config.discord.commands_channel_id,
            call_timeout,
        })
    }

    /// The membership service.
    pub fn membership(&self) -> &MembershipService {
        &self.membership
    }

    /// The session manager.
    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// The audit notifier.
    pub fn audit(&self) -> &AuditNotifier {
        &self.audit
    }

    /// Compare a caller-supplied secret with the configured one.
    ///
    /// Runs in time independent of where the inputs differ.
    pub fn verify_secret(&self, candidate: Option<&str>) -> bool {
        candidate.is_some_and(|c| constant_time_eq(c.as_bytes(), self.secret.as_bytes()))
    }

    /// Produce the status report, connecting first if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be established.
    pub async fn status(&self) -> RelayResult<StatusReport> {
        let session = self.session.ensure_session().await?;
        let guild = self
            .lookup("guild lookup", self.platform.guild(self.guild_id))
            .await;

        Ok(StatusReport {
            status: "ok".to_owned(),
            bot_ready: true,
            bot_tag: session.bot.tag(),
            guild_name: guild
                .as_ref()
                .map_or_else(|| "guild not found".to_owned(), |g| g.name.clone()),
            member_count: guild.and_then(|g| g.member_count).unwrap_or(0),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            audit_failures: self.audit.failures(),
        })
    }

    /// Report which configured entities the relay can see.
    ///
    /// Each missing entity reports [`NOT_FOUND`] instead of failing.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be established.
    pub async fn diagnostics(&self) -> RelayResult<Diagnostics> {
        self.session.ensure_session().await?;

        let guild = self
            .lookup("guild lookup", self.platform.guild(self.guild_id))
            .await;
        let roles = match guild {
            Some(_) => self
                .lookup_list("role lookup", self.platform.guild_roles(self.guild_id))
                .await,
            None => Vec::new(),
        };
        let role_name = |kind: RoleKind| {
            self.resolver
                .role_id(kind)
                .and_then(|id| roles.iter().find(|r| r.id == id))
                .map_or_else(|| NOT_FOUND.to_owned(), |r| r.name.clone())
        };

        Ok(Diagnostics {
            test: "ok".to_owned(),
            info: DiagnosticsInfo {
                bot_connected: self.session.is_ready().await,
                guild: guild.map_or_else(|| NOT_FOUND.to_owned(), |g| g.name),
                roles: RoleNames {
                    monthly: role_name(RoleKind::Monthly),
                    lifetime: role_name(RoleKind::Lifetime),
                },
                channels: ChannelNames {
                    logs: self.channel_name(self.logs_channel_id).await,
                    commands: self.channel_name(self.commands_channel_id).await,
                },
            },
        })
    }

    async fn channel_name(&self, channel_id: Option<Snowflake>) -> String {
        let Some(id) = channel_id else {
            return NOT_FOUND.to_owned();
        };
        self.lookup("channel lookup", self.platform.channel(id))
            .await
            .and_then(|c| c.name)
            .unwrap_or_else(|| NOT_FOUND.to_owned())
    }

    /// Run a best-effort lookup; failures are logged and read as absent.
    async fn lookup<T>(
        &self,
        operation: &str,
        fut: impl std::future::Future<Output = Result<Option<T>, PlatformError>>,
    ) -> Option<T> {
        match self.session.call(self.call_timeout, operation, fut).await {
            Ok(found) => found,
            Err(e) => {
                warn!(operation, error = %e, "lookup failed, reporting as not found");
                None
            }
        }
    }

    async fn lookup_list<T>(
        &self,
        operation: &str,
        fut: impl std::future::Future<Output = Result<Vec<T>, PlatformError>>,
    ) -> Vec<T> {
        self.session
            .call(self.call_timeout, operation, fut)
            .await
            .unwrap_or_else(|e| {
                warn!(operation, error = %e, "lookup failed, reporting as not found");
                Vec::new()
            })
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0_u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
