//! Grant and revoke VIP roles.
//!
//! Both operations are idempotent: granting a role the member already has,
//! or revoking one they lack, reports success without touching the platform
//! or the audit channel. Recoverable input problems (unknown member,
//! unrecognized role label) come back as a failed [`ActionResult`];
//! configuration and platform failures come back as [`RelayError`].

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::audit::{ActionTag, AuditNotifier};
use crate::error::{RelayError, RelayResult};
use crate::platform::{Member, Platform, Snowflake};
use crate::roles::RoleResolver;
use crate::session::SessionManager;

/// Message returned when the member id does not match a guild member.
pub const MEMBER_NOT_FOUND: &str = "member not found";
/// Message returned when a grant finds the role already attached.
pub const ALREADY_ASSIGNED: &str = "role already assigned";
/// Message returned when a revoke finds the role already detached.
pub const ALREADY_ABSENT: &str = "role already absent";

/// Outcome of a grant or revoke, serialized as the webhook response body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActionResult {
    /// Whether the member ends up in the requested state.
    pub success: bool,
    /// Display tag of the member acted on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member: Option<String>,
    /// Display name of the role acted on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Which mutation was performed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionTag>,
    /// Why the action failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Informational note for no-op successes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ActionResult {
    /// A failed, well-formed result.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// A success where nothing had to change.
    pub fn unchanged(message: impl Into<String>, member: Option<String>) -> Self {
        Self {
            success: true,
            member,
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// A success after mutating the member's roles.
    pub fn applied(member: String, role: String, action: ActionTag) -> Self {
        Self {
            success: true,
            member: Some(member),
            role: Some(role),
            action: Some(action),
            ..Self::default()
        }
    }
}

/// Grants and revokes the configured VIP roles.
pub struct MembershipService {
    platform: Arc<dyn Platform>,
    session: Arc<SessionManager>,
    resolver: RoleResolver,
    audit: Arc<AuditNotifier>,
    guild_id: Snowflake,
    call_timeout: Duration,
}

impl MembershipService {
    /// Wire the service to its collaborators.
    pub fn new(
        platform: Arc<dyn Platform>,
        session: Arc<SessionManager>,
        resolver: RoleResolver,
        audit: Arc<AuditNotifier>,
        guild_id: Snowflake,
        call_timeout: Duration,
    ) -> Self {
        Self {
            platform,
            session,
            resolver,
            audit,
            guild_id,
            call_timeout,
        }
    }

    /// Attach the role selected by `role_type` to the member.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Configuration`] if the guild or role is missing,
    /// [`RelayError::Platform`] or [`RelayError::Timeout`] if a platform call
    /// fails.
    pub async fn grant(&self, member_id: &str, role_type: &str) -> RelayResult<ActionResult> {
        self.apply(member_id, role_type, ActionTag::Attribution)
            .await
    }

    /// Detach the role selected by `role_type` from the member.
    ///
    /// # Errors
    ///
    /// Same as [`MembershipService::grant`].
    pub async fn revoke(&self, member_id: &str, role_type: &str) -> RelayResult<ActionResult> {
        self.apply(member_id, role_type, ActionTag::Suppression)
            .await
    }

    #[instrument(skip(self), fields(guild_id = %self.guild_id))]
    async fn apply(
        &self,
        member_id: &str,
        role_type: &str,
        action: ActionTag,
    ) -> RelayResult<ActionResult> {
        self.apply_inner(member_id, role_type, action)
            .await
            .inspect_err(|e| {
                error!(member_id, role_type, %action, error = %e, "role action failed");
            })
    }

    async fn apply_inner(
        &self,
        member_id: &str,
        role_type: &str,
        action: ActionTag,
    ) -> RelayResult<ActionResult> {
        self.session.ensure_session().await?;

        let guild = self
            .session
            .call(
                self.call_timeout,
                "guild lookup",
                self.platform.guild(self.guild_id),
            )
            .await?
            .ok_or_else(|| RelayError::Configuration("guild not found".to_owned()))?;

        let Some(member) = self.find_member(member_id).await? else {
            info!(member_id, %action, "member not found in guild");
            return Ok(ActionResult::failure(MEMBER_NOT_FOUND));
        };

        let resolved = match self.resolver.resolve(role_type) {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(member_id, role_type, %action, "unrecognized role type");
                return Ok(ActionResult::failure(e.to_string()));
            }
        };

        let roles = self
            .session
            .call(
                self.call_timeout,
                "role lookup",
                self.platform.guild_roles(guild.id),
            )
            .await?;
        let role = roles
            .into_iter()
            .find(|r| r.id == resolved.role_id)
            .ok_or_else(|| RelayError::Configuration("role not found".to_owned()))?;

        let has_role = member.has_role(role.id);
        match action {
            ActionTag::Attribution if has_role => {
                info!(member_id, role = %role.name, "role already assigned");
                return Ok(ActionResult::unchanged(ALREADY_ASSIGNED, Some(member.tag())));
            }
            ActionTag::Suppression if !has_role => {
                info!(member_id, role = %role.name, "role already absent");
                return Ok(ActionResult::unchanged(ALREADY_ABSENT, None));
            }
            ActionTag::Attribution => {
                self.session
                    .call(
                        self.call_timeout,
                        "role grant",
                        self.platform
                            .add_member_role(guild.id, member.id(), role.id),
                    )
                    .await?;
                info!(member = %member.tag(), role = %role.name, "role granted");
            }
            ActionTag::Suppression => {
                self.session
                    .call(
                        self.call_timeout,
                        "role revoke",
                        self.platform
                            .remove_member_role(guild.id, member.id(), role.id),
                    )
                    .await?;
                info!(member = %member.tag(), role = %role.name, "role revoked");
            }
        }

        self.audit.log_action(&member, &role, action).await;

        Ok(ActionResult::applied(member.tag(), role.name, action))
    }

    /// Look up a member by its textual id; unparsable ids are not members.
    async fn find_member(&self, member_id: &str) -> RelayResult<Option<Member>> {
        let Ok(user_id) = member_id.parse::<Snowflake>() else {
            return Ok(None);
        };
        self.session
            .call(
                self.call_timeout,
                "member lookup",
                self.platform.member(self.guild_id, user_id),
            )
            .await
    }
}
