//! Discord client behavior against a one-shot local HTTP responder.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use vip_relay::platform::discord::DiscordClient;
use vip_relay::platform::{Embed, Platform, PlatformError, Snowflake};

const TOKEN: &str = "test-bot-token";

/// Answer a single request and hand back its request head.
async fn serve_once(status_line: &str, body: &str) -> (String, JoinHandle<String>) {
    let listener = match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(err) => panic!("listener should bind: {err}"),
    };
    let addr = match listener.local_addr() {
        Ok(addr) => addr,
        Err(err) => panic!("listener should expose local addr: {err}"),
    };

    let status_line_owned = status_line.to_owned();
    let body_owned = body.to_owned();
    let handle = tokio::spawn(async move {
        let mut head = String::new();
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut read_buf = [0_u8; 4096];
            if let Ok(n) = socket.read(&mut read_buf).await {
                head = String::from_utf8_lossy(&read_buf[..n]).into_owned();
            }

            let response = format!(
                "HTTP/1.1 {status_line_owned}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body_owned}",
                body_owned.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
        }
        head
    });

    (format!("http://{addr}/"), handle)
}

fn client(base: &str) -> DiscordClient {
    match DiscordClient::new(base, TOKEN, Duration::from_secs(5)) {
        Ok(client) => client,
        Err(err) => panic!("client should build: {err}"),
    }
}

async fn request_head(handle: JoinHandle<String>) -> String {
    match handle.await {
        Ok(head) => head,
        Err(err) => panic!("responder should not panic: {err}"),
    }
}

#[tokio::test]
async fn login_returns_bot_user() {
    let (base, handle) = serve_once(
        "200 OK",
        r#"{"id":"999000","username":"VIP Relay","discriminator":"4242","avatar":null}"#,
    )
    .await;

    let bot = match client(&base).login().await {
        Ok(bot) => bot,
        Err(err) => panic!("login should succeed: {err}"),
    };
    assert_eq!(bot.id, Snowflake::new(999_000));
    assert_eq!(bot.tag(), "VIP Relay#4242");

    let head = request_head(handle).await;
    assert!(head.starts_with("GET /users/@me "), "head: {head}");
    assert!(
        head.to_ascii_lowercase()
            .contains(&format!("authorization: bot {}", TOKEN.to_ascii_lowercase())),
        "head: {head}"
    );
}

#[tokio::test]
async fn login_rejection_is_unauthorized() {
    let (base, _handle) = serve_once("401 Unauthorized", r#"{"message":"401: Unauthorized"}"#).await;

    let err = match client(&base).login().await {
        Ok(_) => panic!("login should fail"),
        Err(err) => err,
    };
    assert!(err.is_unauthorized(), "got: {err:?}");
}

#[tokio::test]
async fn missing_guild_reads_as_none() {
    let (base, handle) = serve_once("404 Not Found", r#"{"message":"Unknown Guild","code":10004}"#).await;

    let guild = match client(&base).guild(Snowflake::new(42)).await {
        Ok(guild) => guild,
        Err(err) => panic!("404 should not be an error: {err}"),
    };
    assert!(guild.is_none());

    let head = request_head(handle).await;
    assert!(
        head.starts_with("GET /guilds/42?with_counts=true "),
        "head: {head}"
    );
}

#[tokio::test]
async fn member_is_parsed_with_roles() {
    let (base, handle) = serve_once(
        "200 OK",
        r#"{"user":{"id":"123","username":"nelly","discriminator":"0","avatar":null},"roles":["1421670147709468762"],"nick":null}"#,
    )
    .await;

    let member = match client(&base)
        .member(Snowflake::new(42), Snowflake::new(123))
        .await
    {
        Ok(Some(member)) => member,
        Ok(None) => panic!("member should be found"),
        Err(err) => panic!("member lookup should succeed: {err}"),
    };
    assert_eq!(member.tag(), "nelly");
    assert!(member.has_role(Snowflake::new(1_421_670_147_709_468_762)));

    let head = request_head(handle).await;
    assert!(head.starts_with("GET /guilds/42/members/123 "), "head: {head}");
}

#[tokio::test]
async fn role_grant_uses_put() {
    let (base, handle) = serve_once("204 No Content", "").await;

    let result = client(&base)
        .add_member_role(Snowflake::new(42), Snowflake::new(123), Snowflake::new(7))
        .await;
    assert!(result.is_ok(), "got: {result:?}");

    let head = request_head(handle).await;
    assert!(
        head.starts_with("PUT /guilds/42/members/123/roles/7 "),
        "head: {head}"
    );
}

#[tokio::test]
async fn role_revoke_on_missing_member_is_an_error() {
    let (base, _handle) = serve_once("404 Not Found", r#"{"message":"Unknown Member"}"#).await;

    let result = client(&base)
        .remove_member_role(Snowflake::new(42), Snowflake::new(123), Snowflake::new(7))
        .await;
    match result {
        Err(PlatformError::HttpStatus { status, .. }) => assert_eq!(status, 404),
        other => panic!("expected http status error, got: {other:?}"),
    }
}

#[tokio::test]
async fn server_error_body_is_redacted() {
    let body = format!("upstream failure for Bot {TOKEN}");
    let (base, _handle) = serve_once("500 Internal Server Error", &body).await;

    let result = client(&base)
        .send_embed(Snowflake::new(9), &Embed::default())
        .await;
    match result {
        Err(PlatformError::HttpStatus { status, body }) => {
            assert_eq!(status, 500);
            assert!(!body.contains(TOKEN), "body: {body}");
            assert!(body.contains("[REDACTED]"), "body: {body}");
        }
        other => panic!("expected http status error, got: {other:?}"),
    }
}

#[tokio::test]
async fn malformed_body_is_a_parse_error() {
    let (base, _handle) = serve_once("200 OK", "{not json").await;

    let result = client(&base).channel(Snowflake::new(9)).await;
    assert!(
        matches!(result, Err(PlatformError::Parse(_))),
        "got: {result:?}"
    );
}
