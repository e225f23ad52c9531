//! Voice-agent WebSocket client.
//!
//! The agent speaks a small JSON protocol over a single socket:
//!
//! | `type`  | Direction        | `data`                              |
//! |---------|------------------|-------------------------------------|
//! | `ready` | agent -> relay   | none; must be the first message     |
//! | `audio` | both             | base64 PCM16LE mono (16 kHz out, 24 kHz in) |
//! | `text`  | both             | UTF-8 text                          |
//!
//! Any other `type` is ignored.

mod client;
mod messages;

pub use client::{AgentStats, ConnectionState, TextCallback, VoiceAgent, VoiceAgentClient};
pub use messages::AgentMessage;
