//! # voice-relay
//!
//! Bridges a LiveKit room to a voice-agent WebSocket service.
//!
//! Room audio (48 kHz mono PCM16) is resampled to 16 kHz and streamed to the
//! agent; agent audio (24 kHz) is resampled to 48 kHz and published back
//! into the room. A local monitor path plays room audio through a
//! fixed-blocksize pull buffer.
//!
//! ## Features
//!
//! - `token`: access-token minting ([`token`])
//! - `livekit`: the room harness ([`livekit`]); implies `token`
//! - `desktop-audio`: playback on the local output device ([`device`])
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use voice_relay::{AudioRelay, RelayConfig};
//!
//! let relay = AudioRelay::with_client(RelayConfig::from_env()?)?;
//! relay.agent().connect().await?;
//! relay.start(sink)?;
//! let stats = relay.run(frames).await;
//! relay.shutdown().await;
//! ```

pub mod agent;
pub mod audio;
pub mod config;
pub mod error;
pub mod playback;
pub mod queue;
pub mod relay;
pub mod session;
pub mod tasks;

#[cfg(feature = "desktop-audio")]
pub mod device;
#[cfg(feature = "livekit")]
pub mod livekit;
#[cfg(feature = "token")]
pub mod token;

pub use agent::{AgentMessage, ConnectionState, VoiceAgent, VoiceAgentClient};
pub use audio::{AudioBuffer, AudioFrame, Resampler, resample};
pub use config::{RelayConfig, SessionConfig};
pub use error::{RelayError, Result};
pub use playback::PlaybackBuffer;
pub use queue::{FrameQueue, FrameReceiver, PushOutcome, frame_queue};
pub use relay::{AudioRelay, RelayStats};
pub use session::{AudioSink, TextMessage, TopicRouter};
pub use tasks::TaskSet;
