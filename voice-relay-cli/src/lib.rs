//! # voice-relay-cli
//!
//! Command-line launcher for the relay.
//!
//! - `voice-relay run`: join a LiveKit room and bridge it to the voice agent
//!   (feature `livekit`)
//! - `voice-relay serve`: token HTTP helper for browser clients
//! - `voice-relay token`: print one access token
//! - `voice-relay devices`: list output devices (feature `desktop-audio`)
//!
//! Settings come from the environment (a `.env` file is loaded first) and
//! are overridden by flags.

pub mod cli;
pub mod commands;
pub mod telemetry;

pub use cli::{Cli, Commands, RunArgs};
