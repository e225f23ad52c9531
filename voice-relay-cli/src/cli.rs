use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "voice-relay")]
#[command(about = "Relay LiveKit room audio to a voice agent", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Join a room and relay the first speaker to the voice agent
    Run(RunArgs),

    /// Start the access-token HTTP helper
    Serve {
        /// Server port
        #[arg(short, long, default_value = "8000")]
        port: u16,

        /// Directory served for non-API paths
        #[arg(long)]
        static_dir: Option<PathBuf>,

        /// Allowed CORS origin (repeatable; none = any)
        #[arg(long = "allow-origin")]
        allowed_origins: Vec<String>,
    },

    /// Mint a single access token and print it
    Token {
        /// Participant identity
        #[arg(short, long)]
        identity: String,

        /// Room to join
        #[arg(short, long)]
        room: String,

        /// Display name (defaults to the identity)
        #[arg(short, long)]
        name: Option<String>,

        /// Grant the agent role
        #[arg(long)]
        agent: bool,

        /// Token lifetime in seconds
        #[arg(long)]
        ttl_secs: Option<u64>,
    },

    /// List local audio output devices
    Devices,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Relay settings file (TOML); environment variables still apply on top
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Voice agent WebSocket URL
    #[arg(long)]
    pub agent_url: Option<String>,

    /// LiveKit server URL
    #[arg(long)]
    pub url: Option<String>,

    /// Room to join
    #[arg(short, long)]
    pub room: Option<String>,

    /// Identity of the relay participant
    #[arg(long)]
    pub identity: Option<String>,

    /// Seconds to wait for a participant before leaving
    #[arg(long)]
    pub participant_timeout: Option<u64>,

    /// Play room audio on the local output device
    #[arg(long)]
    pub local_playback: bool,
}
