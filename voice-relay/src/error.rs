//! Error types for the relay.

use thiserror::Error;

/// Result type for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Errors that can occur while relaying audio.
#[derive(Error, Debug)]
pub enum RelayError {
    /// The voice-agent socket could not be opened.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The voice agent did not open the session with a `ready` message.
    #[error("Handshake rejected: {0}")]
    Handshake(String),

    /// The client is not in the `Ready` state.
    #[error("Voice agent not connected")]
    NotConnected,

    /// Malformed message from the voice agent.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Transport failure on an open socket.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Audio conversion error.
    #[error("Audio error: {0}")]
    Audio(String),

    /// Session (room) error.
    #[error("Session error: {0}")]
    Session(String),

    /// Local output device error.
    #[error("Audio device error: {0}")]
    Device(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// Create a new connection error.
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        Self::ConnectionFailed(msg.into())
    }

    /// Create a new handshake error.
    pub fn handshake<S: Into<String>>(msg: S) -> Self {
        Self::Handshake(msg.into())
    }

    /// Create a new protocol error.
    pub fn protocol<S: Into<String>>(msg: S) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a new transport error.
    pub fn websocket<S: Into<String>>(msg: S) -> Self {
        Self::WebSocket(msg.into())
    }

    /// Create a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new audio error.
    pub fn audio<S: Into<String>>(msg: S) -> Self {
        Self::Audio(msg.into())
    }

    /// Create a new session error.
    pub fn session<S: Into<String>>(msg: S) -> Self {
        Self::Session(msg.into())
    }

    /// Create a new device error.
    pub fn device<S: Into<String>>(msg: S) -> Self {
        Self::Device(msg.into())
    }

    /// True for errors raised while establishing the agent connection.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Self::ConnectionFailed(_) | Self::Handshake(_))
    }
}
