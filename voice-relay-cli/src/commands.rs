use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use voice_relay::config::{RelayConfig, SessionConfig};
use voice_relay::token::{TokenClaims, TokenIssuer};
use voice_relay_server::ServerConfig;

use crate::cli::{Commands, RunArgs};

pub async fn execute(command: Commands) -> Result<()> {
    match command {
        Commands::Run(args) => run(args).await,
        Commands::Serve { port, static_dir, allowed_origins } => {
            serve(port, static_dir, allowed_origins).await
        }
        Commands::Token { identity, room, name, agent, ttl_secs } => {
            let claims = token_claims(identity, room, name, agent, ttl_secs);
            let issuer = TokenIssuer::from_env()
                .context("LIVEKIT_API_KEY and LIVEKIT_API_SECRET must be set")?;
            println!("{}", issuer.mint(&claims)?);
            Ok(())
        }
        Commands::Devices => devices(),
    }
}

/// Relay settings: file (if given) or defaults, then environment, then flags.
pub fn relay_config(args: &RunArgs) -> Result<RelayConfig> {
    let mut config = match &args.config {
        Some(path) => RelayConfig::from_toml_file(path)
            .with_context(|| format!("reading {}", path.display()))?
            .overlay_env()?,
        None => RelayConfig::from_env()?,
    };
    if let Some(url) = &args.agent_url {
        config = config.with_agent_url(url);
    }
    config.validate()?;
    Ok(config)
}

/// Room settings from the environment with flag overrides.
pub fn session_config(args: &RunArgs) -> SessionConfig {
    let mut session = SessionConfig::from_env();
    if let Some(url) = &args.url {
        session.url = url.clone();
    }
    if let Some(room) = &args.room {
        session.room = room.clone();
    }
    if let Some(identity) = &args.identity {
        session.identity = identity.clone();
    }
    if let Some(secs) = args.participant_timeout {
        session.participant_timeout_secs = secs;
    }
    session
}

pub fn token_claims(
    identity: String,
    room: String,
    name: Option<String>,
    agent: bool,
    ttl_secs: Option<u64>,
) -> TokenClaims {
    let mut claims = TokenClaims::participant(identity, room);
    if let Some(name) = name {
        claims = claims.with_name(name);
    }
    if let Some(secs) = ttl_secs {
        claims = claims.with_ttl(Duration::from_secs(secs));
    }
    if agent {
        claims = claims.as_agent();
    }
    claims
}

#[cfg(feature = "livekit")]
async fn run(args: RunArgs) -> Result<()> {
    use voice_relay::livekit::{HarnessOptions, run_session};

    let relay_config = relay_config(&args)?;
    let session = session_config(&args);
    tracing::info!(agent_url = %relay_config.agent_url, room = %session.room, "Starting relay");

    let options = HarnessOptions { local_playback: args.local_playback };
    match run_session(session, relay_config, options, shutdown_signal()).await? {
        Some(stats) => tracing::info!(
            frames = stats.frames,
            monitor_dropped = stats.monitor_dropped,
            "Session finished"
        ),
        None => tracing::warn!("Nobody joined the room"),
    }
    Ok(())
}

#[cfg(not(feature = "livekit"))]
async fn run(args: RunArgs) -> Result<()> {
    relay_config(&args)?;
    anyhow::bail!("voice-relay was built without the `livekit` feature")
}

async fn serve(port: u16, static_dir: Option<PathBuf>, allowed_origins: Vec<String>) -> Result<()> {
    let mut config = ServerConfig::from_env().with_port(port).with_allowed_origins(allowed_origins);
    if let Some(dir) = static_dir {
        config = config.with_static_dir(dir);
    }
    if config.issuer().is_none() {
        tracing::warn!("LIVEKIT_API_KEY / LIVEKIT_API_SECRET missing, /api/token will return 500");
    }
    voice_relay_server::serve(config, shutdown_signal()).await.context("token server failed")
}

#[cfg(feature = "desktop-audio")]
fn devices() -> Result<()> {
    let names = voice_relay::device::list_output_devices()?;
    if names.is_empty() {
        println!("No output devices found");
    }
    for name in names {
        println!("{name}");
    }
    Ok(())
}

#[cfg(not(feature = "desktop-audio"))]
fn devices() -> Result<()> {
    anyhow::bail!("voice-relay was built without the `desktop-audio` feature")
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Ctrl-C received");
    }
}
