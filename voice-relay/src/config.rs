//! Configuration for the relay and the room session.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};

/// Default voice-agent endpoint.
pub const DEFAULT_AGENT_URL: &str = "ws://localhost:8001/api/v2/ws/Minh";
/// Session (room) sample rate.
pub const SESSION_SAMPLE_RATE: u32 = 48000;
/// Rate the voice agent expects on its input.
pub const AGENT_INPUT_RATE: u32 = 16000;
/// Rate the voice agent produces.
pub const AGENT_OUTPUT_RATE: u32 = 24000;
/// Samples per playback block (10 ms at 48 kHz).
pub const DEFAULT_BLOCKSIZE: usize = 480;
/// Capacity of each bounded frame queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 50;

/// Relay pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// WebSocket URL of the voice agent.
    pub agent_url: String,
    /// Sample rate of session audio, in both directions.
    pub session_sample_rate: u32,
    /// Channel count of session audio.
    pub channels: u16,
    /// Samples per playback block.
    pub blocksize: usize,
    /// Sample rate sent to the voice agent.
    pub agent_input_rate: u32,
    /// Sample rate received from the voice agent.
    pub agent_output_rate: u32,
    /// Capacity of the monitor and inbound queues.
    pub queue_capacity: usize,
    /// Maximum wait for the `ready` message, in milliseconds.
    pub handshake_timeout_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            agent_url: DEFAULT_AGENT_URL.to_string(),
            session_sample_rate: SESSION_SAMPLE_RATE,
            channels: 1,
            blocksize: DEFAULT_BLOCKSIZE,
            agent_input_rate: AGENT_INPUT_RATE,
            agent_output_rate: AGENT_OUTPUT_RATE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            handshake_timeout_ms: 10_000,
        }
    }
}

impl RelayConfig {
    /// Create a config with defaults and the given agent URL.
    pub fn new(agent_url: impl Into<String>) -> Self {
        Self { agent_url: agent_url.into(), ..Default::default() }
    }

    /// Set the voice-agent URL.
    pub fn with_agent_url(mut self, url: impl Into<String>) -> Self {
        self.agent_url = url.into();
        self
    }

    /// Set the playback block size.
    pub fn with_blocksize(mut self, blocksize: usize) -> Self {
        self.blocksize = blocksize;
        self
    }

    /// Set the capacity of both frame queues.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the handshake timeout.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the agent-side sample rates.
    pub fn with_agent_rates(mut self, input_rate: u32, output_rate: u32) -> Self {
        self.agent_input_rate = input_rate;
        self.agent_output_rate = output_rate;
        self
    }

    /// Handshake timeout as a [`Duration`].
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    /// Check that rates, sizes and the URL are usable.
    pub fn validate(&self) -> Result<()> {
        if !(self.agent_url.starts_with("ws://") || self.agent_url.starts_with("wss://")) {
            return Err(RelayError::config(format!(
                "agent_url must use ws:// or wss://, got '{}'",
                self.agent_url
            )));
        }
        for (name, rate) in [
            ("session_sample_rate", self.session_sample_rate),
            ("agent_input_rate", self.agent_input_rate),
            ("agent_output_rate", self.agent_output_rate),
        ] {
            if rate == 0 {
                return Err(RelayError::config(format!("{name} must be non-zero")));
            }
        }
        if self.channels == 0 {
            return Err(RelayError::config("channels must be non-zero"));
        }
        if self.blocksize == 0 {
            return Err(RelayError::config("blocksize must be non-zero"));
        }
        if self.queue_capacity == 0 {
            return Err(RelayError::config("queue_capacity must be non-zero"));
        }
        Ok(())
    }

    /// Defaults overlaid with `VOICE_AGENT_URL`, `RELAY_QUEUE_CAPACITY` and
    /// `RELAY_BLOCKSIZE`.
    pub fn from_env() -> Result<Self> {
        Self::default().overlay_env()
    }

    /// Apply environment overrides on top of `self`.
    pub fn overlay_env(mut self) -> Result<Self> {
        if let Ok(url) = std::env::var("VOICE_AGENT_URL") {
            self.agent_url = url;
        }
        if let Some(capacity) = env_parse::<usize>("RELAY_QUEUE_CAPACITY")? {
            self.queue_capacity = capacity;
        }
        if let Some(blocksize) = env_parse::<usize>("RELAY_BLOCKSIZE")? {
            self.blocksize = blocksize;
        }
        self.validate()?;
        Ok(self)
    }

    /// Load from a TOML file. Missing keys take their defaults.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&raw)
            .map_err(|e| RelayError::config(format!("{}: {e}", path.display())))?;
        Ok(config)
    }

    /// Parse from a TOML string.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).map_err(|e| RelayError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

/// Room connection settings used by the session harness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// LiveKit server URL.
    pub url: String,
    /// API key used to mint the relay's access token.
    pub api_key: String,
    /// API secret used to mint the relay's access token.
    pub api_secret: String,
    /// Room to join.
    pub room: String,
    /// Identity the relay joins as.
    pub identity: String,
    /// Display name of the relay participant.
    pub name: String,
    /// Maximum wait for a remote participant, in seconds.
    pub participant_timeout_secs: u64,
    /// Interval between audio-track progress logs, in seconds.
    pub track_poll_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:7880".to_string(),
            api_key: "devkey".to_string(),
            api_secret: "secret".to_string(),
            room: "voice-relay".to_string(),
            identity: "voice-relay-agent".to_string(),
            name: "Voice Agent".to_string(),
            participant_timeout_secs: 30,
            track_poll_secs: 2,
        }
    }
}

impl SessionConfig {
    /// Defaults overlaid with `LIVEKIT_URL`, `LIVEKIT_API_KEY`,
    /// `LIVEKIT_API_SECRET` and `LIVEKIT_ROOM`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("LIVEKIT_URL") {
            config.url = url;
        }
        if let Ok(key) = std::env::var("LIVEKIT_API_KEY") {
            config.api_key = key;
        }
        if let Ok(secret) = std::env::var("LIVEKIT_API_SECRET") {
            config.api_secret = secret;
        }
        if let Ok(room) = std::env::var("LIVEKIT_ROOM") {
            config.room = room;
        }
        config
    }

    /// Set the room to join.
    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = room.into();
        self
    }

    /// Set the identity and display name.
    pub fn with_identity(mut self, identity: impl Into<String>, name: impl Into<String>) -> Self {
        self.identity = identity.into();
        self.name = name.into();
        self
    }

    /// Participant wait as a [`Duration`].
    pub fn participant_timeout(&self) -> Duration {
        Duration::from_secs(self.participant_timeout_secs)
    }

    /// Track-progress interval as a [`Duration`].
    pub fn track_poll_interval(&self) -> Duration {
        Duration::from_secs(self.track_poll_secs.max(1))
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| RelayError::config(format!("{key}='{raw}': {e}"))),
        Err(_) => Ok(None),
    }
}
