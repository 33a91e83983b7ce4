use std::time::Duration;

use clap::{Args, Subcommand};
use neocom_sso::{EnsureSessionResult, NextRefreshDelay};

use crate::cli::common::{
    build_auth_service, load_sso_config, print_session_details, required_character_id,
    selected_character_id, wait_for_callback,
};

const MAX_RETRY_DELAY: Duration = Duration::from_secs(300);

#[derive(Debug, Args)]
pub(crate) struct AuthCommand {
    #[command(subcommand)]
    subcmd: AuthSubcommand,
}

#[derive(Debug, Subcommand)]
enum AuthSubcommand {
    /// Log in through the browser and persist a session in keyring.
    Login(LoginCommand),

    /// Show stored session metadata.
    Status(StatusCommand),

    /// Refresh the stored session if it is close to expiry.
    Refresh(RefreshCommand),

    /// Keep the stored session fresh until Ctrl+C.
    Watch(WatchCommand),

    /// Revoke the refresh token and remove the stored session.
    Logout(LogoutCommand),
}

impl AuthCommand {
    pub(crate) async fn run(&self) -> anyhow::Result<()> {
        match &self.subcmd {
            AuthSubcommand::Login(cmd) => cmd.run().await,
            AuthSubcommand::Status(cmd) => cmd.run().await,
            AuthSubcommand::Refresh(cmd) => cmd.run().await,
            AuthSubcommand::Watch(cmd) => cmd.run().await,
            AuthSubcommand::Logout(cmd) => cmd.run().await,
        }
    }
}

#[derive(Debug, Args)]
struct LoginCommand {
    #[arg(long)]
    character_id: Option<u64>,
}

impl LoginCommand {
    async fn run(&self) -> anyhow::Result<()> {
        let config = load_sso_config()?;
        let mut auth = build_auth_service(&config)?;

        if let Some(character_id) = selected_character_id(self.character_id) {
            match auth.ensure_valid_session(character_id).await? {
                EnsureSessionResult::Ready(session) => {
                    println!("Session already valid for character {character_id}.");
                    print_session_details(&session);
                    return Ok(());
                }
                EnsureSessionResult::NeedsReauth { reason } => {
                    println!("Existing session needs reauth: {reason}");
                }
                EnsureSessionResult::Missing => {
                    println!("No existing session found for {character_id}; starting login flow.");
                }
            }
        }

        let login = auth.begin_login()?;
        println!(
            "Open this URL in your browser:\n\n{}\n",
            login.authorization_url
        );
        println!("Waiting for callback on {}", config.callback_url);

        let (code, callback_state) = wait_for_callback(&config.callback_url).await?;
        let verified = auth
            .complete_login(code.trim(), callback_state.trim())
            .await?;

        println!("Authenticated {}.", verified.character.character_name);
        if let Some(err) = &verified.affiliation_error {
            println!(
                "Warning: affiliation unavailable, corporation/alliance may be out of date: {}",
                err.display_chain()
            );
        }
        print_session_details(&verified.character);
        Ok(())
    }
}

#[derive(Debug, Args)]
struct StatusCommand {
    #[arg(long)]
    character_id: Option<u64>,
}

impl StatusCommand {
    async fn run(&self) -> anyhow::Result<()> {
        let character_id = required_character_id(self.character_id)?;
        let config = load_sso_config()?;
        let auth = build_auth_service(&config)?;

        match auth.load_session(character_id)? {
            Some(session) => print_session_details(&session),
            None => println!("No session found in keyring for character {character_id}."),
        }

        Ok(())
    }
}

#[derive(Debug, Args)]
struct RefreshCommand {
    #[arg(long)]
    character_id: Option<u64>,

    /// Refresh even when the access token is not close to expiry.
    #[arg(long)]
    force: bool,
}

impl RefreshCommand {
    async fn run(&self) -> anyhow::Result<()> {
        let character_id = required_character_id(self.character_id)?;
        let config = load_sso_config()?;
        let mut auth = build_auth_service(&config)?;
        if self.force {
            // every expiry falls inside an unbounded skew
            auth = auth.with_refresh_skew(Duration::MAX);
        }

        match auth.ensure_valid_session(character_id).await? {
            EnsureSessionResult::Ready(session) => print_session_details(&session),
            EnsureSessionResult::NeedsReauth { reason } => {
                anyhow::bail!("session for {character_id} needs reauth: {reason}")
            }
            EnsureSessionResult::Missing => {
                anyhow::bail!("no session found in keyring for character {character_id}")
            }
        }
        Ok(())
    }
}

#[derive(Debug, Args)]
struct WatchCommand {
    #[arg(long)]
    character_id: Option<u64>,

    /// Shortest wait between two refresh checks.
    #[arg(long, default_value_t = 30)]
    min_interval_secs: u64,
}

impl WatchCommand {
    async fn run(&self) -> anyhow::Result<()> {
        let character_id = required_character_id(self.character_id)?;
        let config = load_sso_config()?;
        let mut auth = build_auth_service(&config)?;
        let floor = Duration::from_secs(self.min_interval_secs);
        let mut retry_delay: Option<Duration> = None;

        println!("Keeping session for {character_id} fresh. Press Ctrl+C to stop.");
        loop {
            match auth.next_refresh_delay(character_id, floor)? {
                NextRefreshDelay::NeedsReauth { reason } => {
                    anyhow::bail!("session for {character_id} needs reauth: {reason}");
                }
                NextRefreshDelay::Wait(delay) => {
                    log::info!("next refresh check in {}s", delay.as_secs());
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        signal = tokio::signal::ctrl_c() => {
                            signal?;
                            println!("Stopping.");
                            return Ok(());
                        }
                    }
                }
                NextRefreshDelay::ReadyNow => match auth.ensure_valid_session(character_id).await {
                    Ok(EnsureSessionResult::Ready(session)) => {
                        retry_delay = None;
                        println!("Refreshed; access token valid until {}", session.expires_on);
                    }
                    Ok(EnsureSessionResult::NeedsReauth { reason }) => {
                        anyhow::bail!("session for {character_id} needs reauth: {reason}");
                    }
                    Ok(EnsureSessionResult::Missing) => {
                        anyhow::bail!("session for {character_id} disappeared from keyring");
                    }
                    Err(err) if err.is_transient() => {
                        let delay = next_retry_delay(retry_delay, floor);
                        retry_delay = Some(delay);
                        log::warn!(
                            "refresh failed, retrying in {}s: {:?}",
                            delay.as_secs(),
                            err.display_chain()
                        );
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            signal = tokio::signal::ctrl_c() => {
                                signal?;
                                println!("Stopping.");
                                return Ok(());
                            }
                        }
                    }
                    Err(err) => return Err(err.into()),
                },
            }
        }
    }
}

/// Doubles the previous retry wait, starting at `floor` and capped at
/// `MAX_RETRY_DELAY`.
fn next_retry_delay(previous: Option<Duration>, floor: Duration) -> Duration {
    match previous {
        None => floor.min(MAX_RETRY_DELAY),
        Some(previous) => previous
            .saturating_mul(2)
            .clamp(floor.min(MAX_RETRY_DELAY), MAX_RETRY_DELAY),
    }
}

#[derive(Debug, Args)]
struct LogoutCommand {
    #[arg(long)]
    character_id: Option<u64>,
}

impl LogoutCommand {
    async fn run(&self) -> anyhow::Result<()> {
        let character_id = required_character_id(self.character_id)?;
        let config = load_sso_config()?;
        let mut auth = build_auth_service(&config)?;

        auth.logout(character_id).await?;
        println!("Revoked and cleared stored session for character {character_id}.");
        Ok(())
    }
}
