//! Community platform abstraction.
//!
//! Defines the [`Platform`] trait the relay talks to and the shared entity
//! types it exchanges (guilds, members, roles, channels, embeds).
//!
//! One implementation ships with the crate:
//! - [`discord::DiscordClient`]: Discord REST API v10 over `reqwest`

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub mod discord;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// A 64-bit platform identifier.
///
/// Travels as a decimal string on the wire; integers are accepted on input
/// so hand-written TOML and JSON payloads can use either form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Snowflake(u64);

impl Snowflake {
    /// Wrap a raw identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw numeric value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Returned when a string is not a valid [`Snowflake`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid snowflake: {0:?}")]
pub struct ParseSnowflakeError(String);

impl FromStr for Snowflake {
    type Err = ParseSnowflakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| ParseSnowflakeError(s.to_owned()))
    }
}

impl Serialize for Snowflake {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Snowflake {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(Self(n)),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// A platform user account (the bot itself or a guild member's user).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User identifier.
    pub id: Snowflake,
    /// Account name.
    pub username: String,
    /// Legacy four-digit discriminator; `"0"` for migrated accounts.
    #[serde(default)]
    pub discriminator: Option<String>,
    /// Avatar hash, if the user uploaded one.
    #[serde(default)]
    pub avatar: Option<String>,
}

const CDN_BASE: &str = "https://cdn.discordapp.com";

/// Number of built-in default avatars on the CDN.
const DEFAULT_AVATAR_COUNT: u64 = 6;

impl User {
    /// Display tag: `name#1234`, or bare `name` for accounts without a
    /// legacy discriminator.
    pub fn tag(&self) -> String {
        match self.discriminator.as_deref() {
            None | Some("") | Some("0") => self.username.clone(),
            Some(d) => format!("{}#{d}", self.username),
        }
    }

    /// CDN URL of the user's avatar, falling back to a default avatar.
    pub fn avatar_url(&self) -> String {
        match self.avatar.as_deref() {
            Some(hash) if !hash.is_empty() => {
                format!("{CDN_BASE}/avatars/{}/{hash}.png", self.id)
            }
            _ => {
                let index = self
                    .id
                    .get()
                    .checked_shr(22)
                    .and_then(|v| v.checked_rem(DEFAULT_AVATAR_COUNT))
                    .unwrap_or(0);
                format!("{CDN_BASE}/embed/avatars/{index}.png")
            }
        }
    }
}

/// The community the relay operates on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Guild {
    /// Guild identifier.
    pub id: Snowflake,
    /// Guild display name.
    pub name: String,
    /// Approximate member count, when the platform reports one.
    #[serde(default, rename = "approximate_member_count")]
    pub member_count: Option<u64>,
}

/// A role defined in the guild.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Role {
    /// Role identifier.
    pub id: Snowflake,
    /// Role display name.
    pub name: String,
}

/// A user's membership in the guild.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Member {
    /// The underlying user account.
    pub user: User,
    /// Identifiers of the roles currently attached to the member.
    #[serde(default)]
    pub roles: Vec<Snowflake>,
}

impl Member {
    /// Member identifier (same as the user id).
    pub fn id(&self) -> Snowflake {
        self.user.id
    }

    /// Display tag of the member's user.
    pub fn tag(&self) -> String {
        self.user.tag()
    }

    /// Whether the role is attached to this member.
    pub fn has_role(&self, role_id: Snowflake) -> bool {
        self.roles.contains(&role_id)
    }
}

/// A guild channel.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Channel {
    /// Channel identifier.
    pub id: Snowflake,
    /// Channel name; absent for DM channels.
    #[serde(default)]
    pub name: Option<String>,
}

// ---------------------------------------------------------------------------
// Embeds
// ---------------------------------------------------------------------------

/// A rich message: title, colored bar, fields, thumbnail and footer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Embed {
    /// Title line.
    pub title: String,
    /// Body text (markdown).
    pub description: String,
    /// RGB color of the side bar.
    pub color: u32,
    /// Name/value fields.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    /// Small image shown at the top right.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<EmbedImage>,
    /// RFC 3339 timestamp shown next to the footer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Footer line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
}

/// A single embed field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedField {
    /// Field heading.
    pub name: String,
    /// Field content.
    pub value: String,
    /// Render side by side with neighbouring inline fields.
    pub inline: bool,
}

/// Embed image reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedImage {
    /// Image URL.
    pub url: String,
}

/// Embed footer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedFooter {
    /// Footer text.
    pub text: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by platform implementations.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// HTTP transport failure.
    #[error("platform request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The platform rejected the bot credential.
    #[error("platform rejected the bot credential")]
    Unauthorized,
    /// Upstream responded with an error status.
    #[error("platform returned non-success status {status}: {body}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Sanitized response body.
        body: String,
    },
    /// Response did not match the expected schema.
    #[error("platform response parse error: {0}")]
    Parse(String),
}

impl PlatformError {
    /// Whether the error means the session credential is no longer valid.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Operations the relay needs from the community platform.
///
/// Lookups return `Ok(None)` when the entity does not exist; `Err` is
/// reserved for transport, credential and upstream failures.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Authenticate and return the bot's own account.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::Unauthorized`] for a rejected credential,
    /// or another variant on transport/upstream failure.
    async fn login(&self) -> Result<User, PlatformError>;

    /// Fetch a guild with its approximate member count.
    async fn guild(&self, guild_id: Snowflake) -> Result<Option<Guild>, PlatformError>;

    /// List the roles defined in a guild.
    async fn guild_roles(&self, guild_id: Snowflake) -> Result<Vec<Role>, PlatformError>;

    /// Fetch a guild member.
    async fn member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
    ) -> Result<Option<Member>, PlatformError>;

    /// Attach a role to a member.
    async fn add_member_role(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
        role_id: Snowflake,
    ) -> Result<(), PlatformError>;

    /// Detach a role from a member.
    async fn remove_member_role(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
        role_id: Snowflake,
    ) -> Result<(), PlatformError>;

    /// Fetch a channel.
    async fn channel(&self, channel_id: Snowflake) -> Result<Option<Channel>, PlatformError>;

    /// Post an embed message to a channel.
    async fn send_embed(&self, channel_id: Snowflake, embed: &Embed) -> Result<(), PlatformError>;
}
