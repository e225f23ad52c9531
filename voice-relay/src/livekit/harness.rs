//! End-to-end session: join a room, wait for a speaker, relay until done.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use livekit::data_stream::api::StreamReader;
use livekit::prelude::{RemoteAudioTrack, RemoteTrack, Room, RoomEvent, RoomOptions};
use tokio::sync::mpsc;

use super::bridge::{RoomAudioSink, track_frames};
use crate::agent::VoiceAgentClient;
use crate::config::{RelayConfig, SessionConfig};
use crate::error::{RelayError, Result};
use crate::relay::{AudioRelay, RelayStats};
use crate::session::{CHAT_TOPIC, TextMessage, TopicRouter, forward_text_stream};
use crate::tasks::TaskSet;
use crate::token::{TokenClaims, TokenIssuer};

/// How often the participant wait re-checks the room.
const PARTICIPANT_POLL: Duration = Duration::from_secs(1);

/// Options for [`run_session`].
#[derive(Debug, Clone, Default)]
pub struct HarnessOptions {
    /// Play session audio on the local output device.
    pub local_playback: bool,
}

/// Join the room, bridge the first remote audio track to the voice agent
/// and publish the agent's replies, until the track ends or `shutdown`
/// resolves.
///
/// The agent is connected and its audio published before the relay waits
/// for a participant. Returns `Ok(None)` if no participant joined within the
/// configured wait.
pub async fn run_session<F>(
    session: SessionConfig,
    relay_config: RelayConfig,
    options: HarnessOptions,
    shutdown: F,
) -> Result<Option<RelayStats>>
where
    F: Future<Output = ()> + Send,
{
    let relay = AudioRelay::with_client(relay_config)?;

    let issuer = TokenIssuer::new(&session.api_key, &session.api_secret)?;
    let claims = TokenClaims::participant(&session.identity, &session.room)
        .with_name(&session.name)
        .as_agent();
    let token = issuer.mint(&claims)?;

    tracing::info!(url = %session.url, room = %session.room, "Connecting to room");
    let room_options = RoomOptions { auto_subscribe: true, ..Default::default() };
    let (room, events) = Room::connect(&session.url, &token, room_options)
        .await
        .map_err(|e| RelayError::session(format!("Failed to connect to room: {e}")))?;
    tracing::info!(room = %room.name(), "Connected to room");

    let router = TopicRouter::new();
    let (track_tx, mut track_rx) = mpsc::channel(4);
    relay.tasks().spawn(
        "room-events",
        room_events(events, router.clone(), track_tx, relay.tasks().clone()),
    );

    let result = relay_in_room(
        &room,
        &relay,
        &router,
        &mut track_rx,
        &session,
        &options,
        shutdown,
    )
    .await;

    relay.shutdown().await;
    if let Err(e) = room.close().await {
        tracing::warn!(error = %e, "Error closing room");
    }
    tracing::info!("Left room");
    result
}

async fn relay_in_room<F>(
    room: &Room,
    relay: &AudioRelay<VoiceAgentClient>,
    router: &TopicRouter,
    track_rx: &mut mpsc::Receiver<RemoteAudioTrack>,
    session: &SessionConfig,
    options: &HarnessOptions,
    shutdown: F,
) -> Result<Option<RelayStats>>
where
    F: Future<Output = ()> + Send,
{
    let config = relay.config();
    let sink = RoomAudioSink::publish(room, config.session_sample_rate, config.channels).await?;
    relay.connect(Arc::new(sink)).await?;
    router.register_handler(CHAT_TOPIC, relay.chat_handler());

    if !wait_for_participant(room, session.participant_timeout()).await {
        tracing::warn!(
            timeout_secs = session.participant_timeout_secs,
            "No participant joined, leaving room"
        );
        return Ok(None);
    }

    let track = wait_for_audio_track(track_rx, session.track_poll_interval())
        .await
        .ok_or_else(|| RelayError::session("Room closed before an audio track arrived"))?;

    #[cfg(feature = "desktop-audio")]
    let _device = if options.local_playback {
        start_local_playback(relay)
    } else {
        relay.disable_monitor();
        None
    };
    #[cfg(not(feature = "desktop-audio"))]
    {
        if options.local_playback {
            tracing::warn!("Built without desktop-audio, local playback disabled");
        }
        relay.disable_monitor();
    }

    let frames = track_frames(&track, config.session_sample_rate, config.channels);
    let stats = tokio::select! {
        stats = relay.run(frames) => stats,
        _ = shutdown => {
            tracing::info!("Shutdown requested");
            relay.stats()
        }
    };
    Ok(Some(stats))
}

#[cfg(feature = "desktop-audio")]
fn start_local_playback<A: crate::agent::VoiceAgent>(
    relay: &AudioRelay<A>,
) -> Option<crate::device::OutputDevice> {
    let playback = relay.playback();
    match crate::device::OutputDevice::start(playback, relay.config().session_sample_rate) {
        Ok(device) => {
            if let Err(e) = relay.spawn_player() {
                tracing::warn!(error = %e, "Player not started");
            }
            Some(device)
        }
        Err(e) => {
            tracing::error!(error = %e, "Local playback unavailable");
            relay.disable_monitor();
            None
        }
    }
}

/// Poll the room until a remote participant is present or `timeout` elapses.
async fn wait_for_participant(room: &Room, timeout: Duration) -> bool {
    let started = Instant::now();
    loop {
        let count = room.remote_participants().len();
        if count > 0 {
            tracing::info!(participants = count, "Participant present");
            return true;
        }
        if started.elapsed() >= timeout {
            return false;
        }
        tracing::debug!("Waiting for a participant to join");
        tokio::time::sleep(PARTICIPANT_POLL).await;
    }
}

/// Wait for the first subscribed audio track, logging while waiting.
async fn wait_for_audio_track(
    tracks: &mut mpsc::Receiver<RemoteAudioTrack>,
    poll: Duration,
) -> Option<RemoteAudioTrack> {
    let started = Instant::now();
    let mut ticker = tokio::time::interval(poll);
    ticker.tick().await;
    loop {
        tokio::select! {
            track = tracks.recv() => return track,
            _ = ticker.tick() => tracing::info!(
                waited_secs = started.elapsed().as_secs(),
                "Waiting for an audio track"
            ),
        }
    }
}

/// Log room activity, route topic text and hand out subscribed audio tracks.
///
/// Text arrives as streams or as plain data packets. Streams are read to the
/// end on `tasks` before dispatch.
async fn room_events(
    mut events: mpsc::UnboundedReceiver<RoomEvent>,
    router: TopicRouter,
    tracks: mpsc::Sender<RemoteAudioTrack>,
    tasks: TaskSet,
) {
    while let Some(event) = events.recv().await {
        match event {
            RoomEvent::ParticipantConnected(participant) => {
                tracing::info!(participant = %participant.identity().0, "Participant connected");
            }
            RoomEvent::ParticipantDisconnected(participant) => {
                tracing::info!(
                    participant = %participant.identity().0,
                    "Participant disconnected"
                );
            }
            RoomEvent::TrackSubscribed { track, participant, .. } => {
                let identity = participant.identity().0;
                match track {
                    RemoteTrack::Audio(audio) => {
                        tracing::info!(participant = %identity, "Subscribed to audio track");
                        if tracks.try_send(audio).is_err() {
                            tracing::debug!(participant = %identity, "Extra audio track ignored");
                        }
                    }
                    _ => tracing::debug!(participant = %identity, "Ignoring non-audio track"),
                }
            }
            RoomEvent::TrackUnsubscribed { participant, .. } => {
                tracing::info!(participant = %participant.identity().0, "Track unsubscribed");
            }
            RoomEvent::TextStreamOpened { reader, topic, participant_identity } => {
                let Some(reader) = reader.take() else {
                    tracing::debug!(%topic, "Text stream already taken");
                    continue;
                };
                let router = router.clone();
                tasks.spawn("text-stream", async move {
                    forward_text_stream(router, topic, participant_identity.0, reader.read_all())
                        .await;
                });
            }
            RoomEvent::DataReceived { payload, topic, participant, .. } => {
                let Some(topic) = topic else {
                    tracing::debug!("Data packet without topic ignored");
                    continue;
                };
                let identity =
                    participant.map(|p| p.identity().0).unwrap_or_else(|| "server".to_string());
                let text = String::from_utf8_lossy(&payload).into_owned();
                router.dispatch(TextMessage::new(topic, identity, text));
            }
            RoomEvent::Disconnected { reason } => {
                tracing::warn!(?reason, "Disconnected from room");
                break;
            }
            _ => {}
        }
    }
    tracing::debug!("Room event stream ended");
}
