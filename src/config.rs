//! Configuration loading and validation.
//!
//! Loads relay configuration from `./vip-relay.toml` (or `$VIP_RELAY_CONFIG_PATH`).
//! Environment variables override file values; file values override defaults.
//!
//! Precedence: env vars > config file > defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::platform::discord::DISCORD_API_BASE;
use crate::platform::Snowflake;

/// Env var holding an explicit config file path.
pub const CONFIG_PATH_ENV: &str = "VIP_RELAY_CONFIG_PATH";

/// Config file used when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "vip-relay.toml";

// ── Top-level config ────────────────────────────────────────────

/// Top-level relay configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// HTTP listener and logging (`[server]`).
    pub server: ServerConfig,
    /// Discord connection and fixed ids (`[discord]`).
    pub discord: DiscordConfig,
    /// VIP role ids and label markers (`[roles]`).
    pub roles: RolesConfig,
    /// Webhook authentication (`[webhook]`).
    pub webhook: WebhookConfig,
    /// Audit embed presentation (`[audit]`).
    pub audit: AuditConfig,
}

impl RelayConfig {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    ///
    /// `path` overrides the file location; otherwise `$VIP_RELAY_CONFIG_PATH`
    /// or `./vip-relay.toml` is used. A missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Load using a custom env resolver (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_with(path: Option<&Path>, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path_with(&env),
        };
        let mut config = Self::load_from_file(&path)?;
        config.apply_overrides(env);
        Ok(config)
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                Self::from_toml(&contents)
                    .with_context(|| format!("invalid config at {}", path.display()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no config file found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "failed to read config file {}: {e}",
                path.display()
            )),
        }
    }

    fn config_path_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
        env(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Apply environment variable overrides (env > config > defaults).
    ///
    /// Takes a resolver function for testability (avoids unsafe `set_var` in tests).
    fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        // Secrets keep the names the hosting platform already provides.
        if let Some(v) = env("DISCORD_TOKEN") {
            self.discord.bot_token = Some(v);
        }
        if let Some(v) = env("WEBHOOK_SECRET") {
            self.webhook.secret = Some(v);
        }

        // Server.
        if let Some(v) = env("VIP_RELAY_BIND") {
            self.server.bind = v;
        }
        if let Some(v) = env("VIP_RELAY_LOG_LEVEL") {
            self.server.log_level = v;
        }
        if let Some(v) = env("VIP_RELAY_LOGS_DIR") {
            self.server.logs_dir = Some(PathBuf::from(v));
        }

        // Discord.
        if let Some(v) = env("VIP_RELAY_API_BASE") {
            self.discord.api_base = v;
        }
        override_id(&env, "VIP_RELAY_GUILD_ID", &mut self.discord.guild_id);
        override_id(
            &env,
            "VIP_RELAY_LOGS_CHANNEL_ID",
            &mut self.discord.logs_channel_id,
        );
        override_id(
            &env,
            "VIP_RELAY_COMMANDS_CHANNEL_ID",
            &mut self.discord.commands_channel_id,
        );

        // Roles.
        override_id(
            &env,
            "VIP_RELAY_MONTHLY_ROLE_ID",
            &mut self.roles.monthly_role_id,
        );
        override_id(
            &env,
            "VIP_RELAY_LIFETIME_ROLE_ID",
            &mut self.roles.lifetime_role_id,
        );
    }

    /// Parse a TOML string into config (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or has wrong types.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: RelayConfig =
            toml::from_str(toml_str).context("failed to parse config TOML")?;
        Ok(config)
    }

    /// Check that every value the relay cannot run without is present.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first missing or inconsistent value.
    pub fn validate(&self) -> Result<()> {
        if self.discord.bot_token.as_deref().map_or(true, str::is_empty) {
            anyhow::bail!("missing Discord bot token (set DISCORD_TOKEN or [discord].bot_token)");
        }
        if self.webhook.secret.as_deref().map_or(true, str::is_empty) {
            anyhow::bail!("missing webhook secret (set WEBHOOK_SECRET or [webhook].secret)");
        }
        if self.discord.guild_id.is_none() {
            anyhow::bail!("missing guild id (set VIP_RELAY_GUILD_ID or [discord].guild_id)");
        }
        let monthly = self.roles.monthly_role_id.context(
            "missing monthly role id (set VIP_RELAY_MONTHLY_ROLE_ID or [roles].monthly_role_id)",
        )?;
        let lifetime = self.roles.lifetime_role_id.context(
            "missing lifetime role id (set VIP_RELAY_LIFETIME_ROLE_ID or [roles].lifetime_role_id)",
        )?;
        if monthly == lifetime {
            anyhow::bail!("monthly and lifetime role ids must differ");
        }
        if self.roles.monthly_markers.is_empty() || self.roles.lifetime_markers.is_empty() {
            anyhow::bail!("each role kind needs at least one label marker");
        }
        if self.discord.connect_timeout_secs == 0 || self.discord.call_timeout_secs == 0 {
            anyhow::bail!("platform timeouts must be at least one second");
        }
        Ok(())
    }
}

fn override_id(env: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut Option<Snowflake>) {
    if let Some(v) = env(key) {
        match v.parse() {
            Ok(id) => *slot = Some(id),
            Err(_) => tracing::warn!(var = key, value = %v, "ignoring invalid env override"),
        }
    }
}

// ── Server config ───────────────────────────────────────────────

/// HTTP listener and logging settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on.
    pub bind: String,
    /// Tracing log level filter, used when `RUST_LOG` is unset.
    pub log_level: String,
    /// Directory for daily-rotated JSON logs; console only when unset.
    pub logs_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
            log_level: "info".to_string(),
            logs_dir: None,
        }
    }
}

// ── Discord config ──────────────────────────────────────────────

/// Discord connection settings and the fixed guild/channel ids.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    /// REST API base URL.
    pub api_base: String,
    /// Bot token.
    pub bot_token: Option<String>,
    /// The guild the relay manages.
    pub guild_id: Option<Snowflake>,
    /// Channel receiving audit embeds.
    pub logs_channel_id: Option<Snowflake>,
    /// Bot command channel, reported by the diagnostics endpoint.
    pub commands_channel_id: Option<Snowflake>,
    /// Upper bound on establishing a session, in seconds.
    pub connect_timeout_secs: u64,
    /// Upper bound on each platform call, in seconds.
    pub call_timeout_secs: u64,
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("api_base", &self.api_base)
            .field(
                "bot_token",
                &self.bot_token.as_ref().map(|_| "__REDACTED__"),
            )
            .field("guild_id", &self.guild_id)
            .field("logs_channel_id", &self.logs_channel_id)
            .field("commands_channel_id", &self.commands_channel_id)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("call_timeout_secs", &self.call_timeout_secs)
            .finish()
    }
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            api_base: DISCORD_API_BASE.to_string(),
            bot_token: None,
            guild_id: None,
            logs_channel_id: None,
            commands_channel_id: None,
            connect_timeout_secs: 15,
            call_timeout_secs: 10,
        }
    }
}

// ── Roles config ────────────────────────────────────────────────

/// VIP role ids and the label markers that select them.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RolesConfig {
    /// Role granted for monthly subscriptions.
    pub monthly_role_id: Option<Snowflake>,
    /// Role granted for lifetime purchases.
    pub lifetime_role_id: Option<Snowflake>,
    /// Substrings of a role label that select the monthly role.
    pub monthly_markers: Vec<String>,
    /// Substrings of a role label that select the lifetime role.
    pub lifetime_markers: Vec<String>,
}

impl Default for RolesConfig {
    fn default() -> Self {
        Self {
            monthly_role_id: None,
            lifetime_role_id: None,
            monthly_markers: vec!["Mensuel".to_string()],
            lifetime_markers: vec!["Vie".to_string()],
        }
    }
}

// ── Webhook config ──────────────────────────────────────────────

/// Webhook authentication.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Shared secret callers must echo in the request body.
    pub secret: Option<String>,
}

impl std::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("secret", &self.secret.as_ref().map(|_| "__REDACTED__"))
            .finish()
    }
}

// ── Audit config ────────────────────────────────────────────────

/// Audit embed presentation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Footer text on every audit embed.
    pub footer: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            footer: "VIP Relay".to_string(),
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────
