//! LiveKit room harness for the relay.
//!
//! Requires the **`livekit`** Cargo feature.
//!
//! | Item | Purpose |
//! |------|---------|
//! | [`run_session`] | Join a room, relay the first remote audio track, publish agent audio. |
//! | [`RoomAudioSink`] | [`AudioSink`](crate::session::AudioSink) backed by a `NativeAudioSource`. |
//! | [`track_frames`] | Remote audio track as a stream of [`AudioFrame`](crate::audio::AudioFrame)s. |

mod bridge;
mod harness;

pub use bridge::{AGENT_TRACK_NAME, RoomAudioSink, track_frames};
pub use harness::{HarnessOptions, run_session};
