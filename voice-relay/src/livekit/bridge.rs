//! Audio adapters between LiveKit tracks and relay frames.

use std::borrow::Cow;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use livekit::options::TrackPublishOptions;
use livekit::prelude::{LocalAudioTrack, LocalTrack, RemoteAudioTrack, Room, TrackSource};
use livekit::webrtc::audio_frame::AudioFrame as RtcAudioFrame;
use livekit::webrtc::audio_source::native::NativeAudioSource;
use livekit::webrtc::audio_source::{AudioSourceOptions, RtcAudioSource};
use livekit::webrtc::audio_stream::native::NativeAudioStream;

use crate::audio::AudioFrame;
use crate::error::{RelayError, Result};
use crate::session::AudioSink;

/// Name of the track carrying voice-agent audio.
pub const AGENT_TRACK_NAME: &str = "voice-agent-response";

/// Internal buffering of the native source, in milliseconds.
const SOURCE_QUEUE_MS: u32 = 100;

/// Read a remote audio track as relay frames at the given format.
///
/// The WebRTC stack converts to `sample_rate` and `channels` before frames
/// reach the stream. The stream ends when the track does.
pub fn track_frames(
    track: &RemoteAudioTrack,
    sample_rate: u32,
    channels: u16,
) -> impl Stream<Item = AudioFrame> + Send + 'static {
    NativeAudioStream::new(track.rtc_track(), sample_rate as i32, channels as i32).map(|frame| {
        AudioFrame::new(frame.sample_rate, frame.num_channels as u16, frame.data.into_owned())
    })
}

/// Pushes relay frames into a published LiveKit track.
#[derive(Clone)]
pub struct RoomAudioSink {
    source: NativeAudioSource,
    sample_rate: u32,
    channels: u16,
}

impl RoomAudioSink {
    /// Create the native source without publishing it.
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        let source = NativeAudioSource::new(
            AudioSourceOptions::default(),
            sample_rate,
            channels as u32,
            SOURCE_QUEUE_MS,
        );
        Self { source, sample_rate, channels }
    }

    /// Publish the source as a microphone track named
    /// [`AGENT_TRACK_NAME`] and return the sink feeding it.
    pub async fn publish(room: &Room, sample_rate: u32, channels: u16) -> Result<Self> {
        let sink = Self::new(sample_rate, channels);
        let track = LocalAudioTrack::create_audio_track(
            AGENT_TRACK_NAME,
            RtcAudioSource::Native(sink.source.clone()),
        );
        let options =
            TrackPublishOptions { source: TrackSource::Microphone, ..Default::default() };
        room.local_participant()
            .publish_track(LocalTrack::Audio(track), options)
            .await
            .map_err(|e| RelayError::session(format!("Failed to publish agent track: {e}")))?;
        tracing::info!(track = AGENT_TRACK_NAME, sample_rate, "Published agent audio track");
        Ok(sink)
    }
}

#[async_trait]
impl AudioSink for RoomAudioSink {
    async fn capture_frame(&self, frame: &AudioFrame) -> Result<()> {
        if frame.sample_rate != self.sample_rate || frame.channels != self.channels {
            return Err(RelayError::audio(format!(
                "frame format {} Hz x{} does not match track {} Hz x{}",
                frame.sample_rate, frame.channels, self.sample_rate, self.channels
            )));
        }
        let rtc_frame = RtcAudioFrame {
            data: Cow::Borrowed(frame.samples.as_slice()),
            sample_rate: frame.sample_rate,
            num_channels: frame.channels as u32,
            samples_per_channel: frame.samples_per_channel() as u32,
        };
        self.source
            .capture_frame(&rtc_frame)
            .await
            .map_err(|e| RelayError::session(format!("capture_frame failed: {e}")))
    }
}
