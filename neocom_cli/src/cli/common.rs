use std::env;

use anyhow::Context;
use neocom_core::{Timestamp, ids::CharacterId};
use neocom_sso::{
    AuthService, AuthorizedCharacterData, DataSource, EveSsoClient, KeyringTokenStore, SsoConfig,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};
use url::Url;

const DEFAULT_SCOPES: &str = "publicData,esi-location.read_location.v1";
const KEYRING_SERVICE: &str = "neocom";
const KEYRING_ACCOUNT_PREFIX: &str = "sso-session";

pub(crate) type CliAuthService = AuthService<EveSsoClient, KeyringTokenStore>;

pub(crate) fn load_sso_config() -> anyhow::Result<SsoConfig> {
    let mut config = SsoConfig::new(
        required_env("EVE_CLIENT_ID")?,
        required_env("EVE_CALLBACK_URL")?,
    );
    config.client_secret = optional_env("EVE_CLIENT_SECRET");
    config.scopes = scopes_from_env();
    if let Some(raw) = optional_env("EVE_DATASOURCE") {
        config.data_source = raw
            .parse::<DataSource>()
            .context("invalid EVE_DATASOURCE")?;
    }
    if let Some(esi_base_url) = optional_env("ESI_BASE_URL") {
        config.esi_base_url = esi_base_url;
    }
    if let Some(user_agent) = optional_env("NEOCOM_USER_AGENT") {
        config.user_agent = user_agent;
    }

    config.validate().context("invalid SSO configuration")?;
    Ok(config)
}

pub(crate) fn build_auth_service(config: &SsoConfig) -> anyhow::Result<CliAuthService> {
    let client = EveSsoClient::new(config).context("failed to create EVE SSO client")?;
    let store = KeyringTokenStore::new(KEYRING_SERVICE, KEYRING_ACCOUNT_PREFIX);
    Ok(AuthService::new(client, store, config.scopes.clone()))
}

pub(crate) fn selected_character_id(explicit: Option<u64>) -> Option<CharacterId> {
    explicit.map(CharacterId).or_else(|| {
        env::var("EVE_CHARACTER_ID")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .map(CharacterId)
    })
}

pub(crate) fn required_character_id(explicit: Option<u64>) -> anyhow::Result<CharacterId> {
    selected_character_id(explicit)
        .context("character id is required; provide --character-id or set EVE_CHARACTER_ID")
}

pub(crate) fn print_session_details(session: &AuthorizedCharacterData) {
    println!("Character: {} ({})", session.character_name, session.character_id);
    println!("Owner: {}", session.owner_hash);
    println!("Scopes: {}", session.scopes_joined());
    println!("Corporation: {}", display_or_none(session.corporation_id));
    println!("Alliance: {}", display_or_none(session.alliance_id));
    println!("Faction: {}", display_or_none(session.faction_id));
    println!(
        "Valid until: {}",
        validity_line(session.expires_on, Timestamp::now())
    );
}

fn validity_line(expires_on: Timestamp, now: Timestamp) -> String {
    let valid_for = expires_on.signed_duration_since(now).num_seconds();
    let relative = if valid_for >= 0 {
        format!("in {valid_for}s")
    } else {
        format!("expired {}s ago", -valid_for)
    };
    format!("{expires_on} (epoch {}, {relative})", expires_on.as_epoch_secs())
}

fn display_or_none<T: std::fmt::Display>(value: Option<T>) -> String {
    value
        .map(|value| value.to_string())
        .unwrap_or_else(|| "<none>".to_owned())
}

/// Serves a single request on the callback address and returns the
/// `(code, state)` pair the login page redirected with.
pub(crate) async fn wait_for_callback(callback_url: &str) -> anyhow::Result<(String, String)> {
    let parsed = Url::parse(callback_url).context("invalid callback URL")?;
    if parsed.scheme() != "http" {
        anyhow::bail!("callback URL must use http for local callback server");
    }

    let host = parsed
        .host_str()
        .context("callback URL must include host")?;
    let port = parsed
        .port_or_known_default()
        .context("callback URL must include a valid port")?;

    let bind_addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind callback listener on {bind_addr}"))?;

    let (mut stream, peer) = listener.accept().await.context("failed to accept callback")?;
    log::debug!("callback connection from {peer}");

    let request = read_http_request(&mut stream)
        .await
        .context("failed to read callback request")?;
    let request_line = request
        .lines()
        .next()
        .context("empty callback HTTP request")?;

    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default();
    let target = parts.next().unwrap_or_default();
    if method != "GET" {
        write_http_response(&mut stream, 405, "Method Not Allowed", "Only GET is supported.")
            .await?;
        anyhow::bail!("callback request must be GET");
    }

    let target_url = Url::parse(&format!("http://{bind_addr}{target}"))
        .context("invalid callback request target URL")?;
    if target_url.path() != parsed.path() {
        write_http_response(&mut stream, 404, "Not Found", "Unexpected callback path.").await?;
        anyhow::bail!("callback path does not match configured callback URL");
    }

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in target_url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error_description" => error = Some(value.into_owned()),
            "error" if error.is_none() => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        write_http_response(&mut stream, 400, "Bad Request", "Login was not completed.").await?;
        anyhow::bail!("login provider returned an error: {error}");
    }

    match (code, state) {
        (Some(code), Some(state)) => {
            write_http_response(
                &mut stream,
                200,
                "OK",
                "Authentication captured. You can close this tab.",
            )
            .await?;
            Ok((code, state))
        }
        _ => {
            write_http_response(
                &mut stream,
                400,
                "Bad Request",
                "Missing code/state query parameters.",
            )
            .await?;
            anyhow::bail!("callback query is missing code and/or state");
        }
    }
}

fn required_env(name: &str) -> anyhow::Result<String> {
    optional_env(name).with_context(|| format!("missing required env var `{name}`"))
}

/// Unset and blank variables are treated the same.
fn optional_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn scopes_from_env() -> Vec<String> {
    let raw = env::var("EVE_SCOPES").unwrap_or_else(|_| DEFAULT_SCOPES.to_owned());
    raw.split(',')
        .map(str::trim)
        .filter(|scope| !scope.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

async fn read_http_request(stream: &mut TcpStream) -> anyhow::Result<String> {
    let mut buffer = vec![0_u8; 8192];
    let size = stream.read(&mut buffer).await?;
    buffer.truncate(size);
    Ok(String::from_utf8(buffer)?)
}

async fn write_http_response(
    stream: &mut TcpStream,
    code: u16,
    reason: &str,
    body: &str,
) -> anyhow::Result<()> {
    let response = format!(
        "HTTP/1.1 {code} {reason}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len(),
    );
    stream
        .write_all(response.as_bytes())
        .await
        .context("failed writing callback response")?;
    stream.flush().await?;
    Ok(())
}
