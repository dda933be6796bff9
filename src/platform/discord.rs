//! Discord REST API v10 client.
//!
//! The "session" on this transport is a validated bot token: `login` calls
//! `GET /users/@me` and every later call carries `Authorization: Bot <token>`.

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{Channel, Embed, Guild, Member, Platform, PlatformError, Role, Snowflake, User};

/// Default API base URL.
pub const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

const USER_AGENT: &str = concat!(
    "DiscordBot (https://github.com/pycckuu/vip-relay, ",
    env!("CARGO_PKG_VERSION"),
    ")"
);

const MAX_ERROR_BODY_CHARS: usize = 256;

/// Discord REST client.
#[derive(Clone)]
pub struct DiscordClient {
    api_base: String,
    token: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for DiscordClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordClient")
            .field("api_base", &self.api_base)
            .field("token", &"__REDACTED__")
            .finish()
    }
}

impl DiscordClient {
    /// Create a client against `api_base` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::Request`] if the HTTP client cannot be built.
    pub fn new(
        api_base: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, PlatformError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            api_base: api_base.into().trim_end_matches('/').to_owned(),
            token: token.into(),
            client,
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.api_base))
            .header("authorization", format!("Bot {}", self.token))
    }

    /// Send a request and return the body of a 2xx response.
    ///
    /// A 404 yields `Ok(None)`.
    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<Option<String>, PlatformError> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        match status {
            s if s.is_success() => Ok(Some(body)),
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::UNAUTHORIZED => Err(PlatformError::Unauthorized),
            s => Err(PlatformError::HttpStatus {
                status: s.as_u16(),
                body: sanitize_error_body(&body, &self.token),
            }),
        }
    }

    async fn get_optional<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, PlatformError> {
        match self.send(self.request(Method::GET, path)).await? {
            Some(body) => parse_body(&body).map(Some),
            None => Ok(None),
        }
    }

    /// Send a request whose success response carries no payload we need.
    async fn send_expect_found(
        &self,
        builder: reqwest::RequestBuilder,
        path: &str,
    ) -> Result<(), PlatformError> {
        match self.send(builder).await? {
            Some(_) => Ok(()),
            None => Err(PlatformError::HttpStatus {
                status: StatusCode::NOT_FOUND.as_u16(),
                body: format!("{path} not found"),
            }),
        }
    }
}

#[async_trait]
impl Platform for DiscordClient {
    async fn login(&self) -> Result<User, PlatformError> {
        let path = "/users/@me";
        let user: Option<User> = self.get_optional(path).await?;
        let user = user.ok_or(PlatformError::Unauthorized)?;
        debug!(bot = %user.tag(), "Discord credential accepted");
        Ok(user)
    }

    async fn guild(&self, guild_id: Snowflake) -> Result<Option<Guild>, PlatformError> {
        self.get_optional(&format!("/guilds/{guild_id}?with_counts=true"))
            .await
    }

    async fn guild_roles(&self, guild_id: Snowflake) -> Result<Vec<Role>, PlatformError> {
        let roles: Option<Vec<Role>> = self
            .get_optional(&format!("/guilds/{guild_id}/roles"))
            .await?;
        Ok(roles.unwrap_or_default())
    }

    async fn member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
    ) -> Result<Option<Member>, PlatformError> {
        self.get_optional(&format!("/guilds/{guild_id}/members/{user_id}"))
            .await
    }

    async fn add_member_role(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
        role_id: Snowflake,
    ) -> Result<(), PlatformError> {
        let path = format!("/guilds/{guild_id}/members/{user_id}/roles/{role_id}");
        self.send_expect_found(self.request(Method::PUT, &path), &path)
            .await
    }

    async fn remove_member_role(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
        role_id: Snowflake,
    ) -> Result<(), PlatformError> {
        let path = format!("/guilds/{guild_id}/members/{user_id}/roles/{role_id}");
        self.send_expect_found(self.request(Method::DELETE, &path), &path)
            .await
    }

    async fn channel(&self, channel_id: Snowflake) -> Result<Option<Channel>, PlatformError> {
        self.get_optional(&format!("/channels/{channel_id}")).await
    }

    async fn send_embed(&self, channel_id: Snowflake, embed: &Embed) -> Result<(), PlatformError> {
        let path = format!("/channels/{channel_id}/messages");
        let body = serde_json::json!({ "embeds": [embed] });
        self.send_expect_found(self.request(Method::POST, &path).json(&body), &path)
            .await
    }
}

fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, PlatformError> {
    serde_json::from_str(body).map_err(|e| PlatformError::Parse(e.to_string()))
}

/// Collapse whitespace, redact credentials and truncate an error body.
#[doc(hidden)]
pub fn sanitize_error_body(raw: &str, token: &str) -> String {
    let mut sanitized = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    if !token.is_empty() {
        sanitized = sanitized.replace(token, "[REDACTED]");
    }
    if let Ok(regex) = Regex::new(r"[A-Za-z0-9_\-]{23,28}\.[A-Za-z0-9_\-]{6,7}\.[A-Za-z0-9_\-]{27,}")
    {
        sanitized = regex.replace_all(&sanitized, "[REDACTED]").into_owned();
    }

    if sanitized.chars().count() > MAX_ERROR_BODY_CHARS {
        let shortened = sanitized
            .chars()
            .take(MAX_ERROR_BODY_CHARS)
            .collect::<String>();
        return format!("{shortened}...[truncated]");
    }

    sanitized
}
