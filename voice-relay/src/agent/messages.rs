//! JSON envelopes exchanged with the voice agent.

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};

/// A message on the voice-agent socket, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AgentMessage {
    /// First message from the agent once it can accept audio.
    Ready,
    /// Base64 PCM16LE mono audio.
    Audio {
        #[serde(default)]
        data: String,
    },
    /// UTF-8 text.
    Text {
        #[serde(default)]
        data: String,
    },
    /// Any other `type`; ignored by the client.
    #[serde(other)]
    Unknown,
}

impl AgentMessage {
    pub fn audio(data: impl Into<String>) -> Self {
        Self::Audio { data: data.into() }
    }

    pub fn text(data: impl Into<String>) -> Self {
        Self::Text { data: data.into() }
    }

    /// Parse a text frame from the socket.
    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| RelayError::protocol(format!("Parse error: {e}")))
    }

    /// Serialize for sending.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// The `type` tag as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Audio { .. } => "audio",
            Self::Text { .. } => "text",
            Self::Unknown => "unknown",
        }
    }
}
