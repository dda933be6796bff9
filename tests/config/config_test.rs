//! Config file loading and environment precedence.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use vip_relay::config::{RelayConfig, CONFIG_PATH_ENV};
use vip_relay::platform::Snowflake;

const FULL_TOML: &str = r#"
[server]
bind = "127.0.0.1:8080"
log_level = "debug"

[discord]
bot_token = "file-token"
guild_id = "1421669500109066375"
logs_channel_id = 1421697626830798938
call_timeout_secs = 4

[roles]
monthly_role_id = "1421670147709468762"
lifetime_role_id = "1421735904401297489"
lifetime_markers = ["Vie", "Lifetime"]

[webhook]
secret = "file-secret"

[audit]
footer = "Brawl VIP"
"#;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = match tempfile::NamedTempFile::new() {
        Ok(file) => file,
        Err(err) => panic!("temp file should be created: {err}"),
    };
    if let Err(err) = file.write_all(contents.as_bytes()) {
        panic!("temp file should be writable: {err}");
    }
    file
}

fn load(path: Option<&Path>, env: &[(&str, &str)]) -> RelayConfig {
    match RelayConfig::load_with(path, env_from(env)) {
        Ok(config) => config,
        Err(err) => panic!("config should load: {err:#}"),
    }
}

#[test]
fn file_values_are_loaded() {
    let file = write_config(FULL_TOML);
    let config = load(Some(file.path()), &[]);

    assert_eq!(config.server.bind, "127.0.0.1:8080");
    assert_eq!(config.server.log_level, "debug");
    assert_eq!(config.discord.bot_token.as_deref(), Some("file-token"));
    assert_eq!(
        config.discord.guild_id,
        Some(Snowflake::new(1_421_669_500_109_066_375))
    );
    assert_eq!(
        config.discord.logs_channel_id,
        Some(Snowflake::new(1_421_697_626_830_798_938))
    );
    assert!(config.discord.commands_channel_id.is_none());
    assert_eq!(config.discord.call_timeout_secs, 4);
    assert_eq!(config.discord.connect_timeout_secs, 15);
    assert_eq!(config.roles.monthly_markers, vec!["Mensuel".to_owned()]);
    assert_eq!(
        config.roles.lifetime_markers,
        vec!["Vie".to_owned(), "Lifetime".to_owned()]
    );
    assert_eq!(config.webhook.secret.as_deref(), Some("file-secret"));
    assert_eq!(config.audit.footer, "Brawl VIP");
    assert!(config.validate().is_ok());
}

#[test]
fn environment_overrides_file() {
    let file = write_config(FULL_TOML);
    let config = load(
        Some(file.path()),
        &[
            ("DISCORD_TOKEN", "env-token"),
            ("WEBHOOK_SECRET", "env-secret"),
            ("VIP_RELAY_BIND", "0.0.0.0:9000"),
            ("VIP_RELAY_GUILD_ID", "42"),
        ],
    );

    assert_eq!(config.discord.bot_token.as_deref(), Some("env-token"));
    assert_eq!(config.webhook.secret.as_deref(), Some("env-secret"));
    assert_eq!(config.server.bind, "0.0.0.0:9000");
    assert_eq!(config.discord.guild_id, Some(Snowflake::new(42)));
    assert_eq!(config.audit.footer, "Brawl VIP");
}

#[test]
fn invalid_id_in_environment_keeps_file_value() {
    let file = write_config(FULL_TOML);
    let config = load(Some(file.path()), &[("VIP_RELAY_GUILD_ID", "not-a-number")]);

    assert_eq!(
        config.discord.guild_id,
        Some(Snowflake::new(1_421_669_500_109_066_375))
    );
}

#[test]
fn config_path_comes_from_environment() {
    let file = write_config(FULL_TOML);
    let path = file.path().to_string_lossy().into_owned();
    let config = load(None, &[(CONFIG_PATH_ENV, path.as_str())]);

    assert_eq!(config.audit.footer, "Brawl VIP");
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(err) => panic!("temp dir should be created: {err}"),
    };
    let config = load(Some(&dir.path().join("absent.toml")), &[]);

    assert_eq!(config.server.bind, "0.0.0.0:3000");
    assert!(config.discord.bot_token.is_none());
    assert!(config.validate().is_err());
}

#[test]
fn malformed_file_is_an_error() {
    let file = write_config("[server\nbind = ");
    let result = RelayConfig::load_with(Some(file.path()), env_from(&[]));
    assert!(result.is_err());
}

#[test]
fn environment_alone_is_sufficient() {
    let dir = match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(err) => panic!("temp dir should be created: {err}"),
    };
    let config = load(
        Some(&dir.path().join("absent.toml")),
        &[
            ("DISCORD_TOKEN", "tok"),
            ("WEBHOOK_SECRET", "s3cret"),
            ("VIP_RELAY_GUILD_ID", "1421669500109066375"),
            ("VIP_RELAY_MONTHLY_ROLE_ID", "1421670147709468762"),
            ("VIP_RELAY_LIFETIME_ROLE_ID", "1421735904401297489"),
        ],
    );

    assert!(config.validate().is_ok());
}

#[test]
fn debug_output_redacts_secrets() {
    let file = write_config(FULL_TOML);
    let config = load(Some(file.path()), &[]);
    let rendered = format!("{config:?}");

    assert!(!rendered.contains("file-token"), "rendered: {rendered}");
    assert!(!rendered.contains("file-secret"), "rendered: {rendered}");
}
