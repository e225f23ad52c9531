use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::messages::AgentMessage;
use crate::audio::{AudioFrame, Resampler};
use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::queue::{FrameQueue, PushOutcome};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;
type WsSink = futures::stream::SplitSink<WsStream, Message>;
type WsSource = futures::stream::SplitStream<WsStream>;

/// Callback for text messages from the voice agent.
pub type TextCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Lifecycle of the voice-agent connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Ready => write!(f, "ready"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Counters kept by [`VoiceAgentClient`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AgentStats {
    /// Audio messages sent to the agent.
    pub audio_sent: u64,
    /// Audio messages received and queued for the session.
    pub audio_received: u64,
    /// Text messages received.
    pub text_received: u64,
    /// Inbound messages discarded as malformed.
    pub protocol_errors: u64,
}

#[derive(Debug, Default)]
struct Counters {
    audio_sent: AtomicU64,
    audio_received: AtomicU64,
    text_received: AtomicU64,
    protocol_errors: AtomicU64,
}

/// The operations the relay needs from a voice agent.
#[async_trait]
pub trait VoiceAgent: Send + Sync + 'static {
    /// True when audio will be forwarded.
    fn is_ready(&self) -> bool;

    /// Forward one session frame. Never fails; problems are logged.
    async fn send_audio(&self, frame: &AudioFrame);

    /// Forward a text message. Best effort.
    async fn send_text(&self, text: &str);

    /// Run the receive loop until the agent closes the socket.
    async fn listen_for_responses(&self) -> Result<()>;

    /// Close the connection. Safe to call more than once.
    async fn disconnect(&self);
}

/// WebSocket client for the voice agent.
///
/// Session audio is downmixed, resampled to the agent's input rate and sent
/// as base64 PCM16. Agent audio is resampled back to the session rate and
/// pushed onto the inbound queue, dropping frames when it is full.
pub struct VoiceAgentClient {
    config: RelayConfig,
    state: RwLock<ConnectionState>,
    sender: Mutex<Option<WsSink>>,
    receiver: Mutex<Option<WsSource>>,
    inbound: FrameQueue,
    to_agent: Resampler,
    from_agent: Resampler,
    on_text: RwLock<TextCallback>,
    counters: Counters,
}

impl VoiceAgentClient {
    /// Create a disconnected client that delivers agent audio to `inbound`.
    pub fn new(config: RelayConfig, inbound: FrameQueue) -> Self {
        let to_agent = Resampler::new(config.session_sample_rate, config.agent_input_rate);
        let from_agent = Resampler::new(config.agent_output_rate, config.session_sample_rate);
        let on_text: TextCallback = Arc::new(|text: &str| {
            tracing::info!(%text, "Voice agent text");
        });
        Self {
            config,
            state: RwLock::new(ConnectionState::Disconnected),
            sender: Mutex::new(None),
            receiver: Mutex::new(None),
            inbound,
            to_agent,
            from_agent,
            on_text: RwLock::new(on_text),
            counters: Counters::default(),
        }
    }

    /// Replace the consumer of agent text messages.
    pub fn set_text_handler<F>(&self, handler: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        *self.on_text.write() = Arc::new(handler);
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ConnectionState::Ready
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn stats(&self) -> AgentStats {
        AgentStats {
            audio_sent: self.counters.audio_sent.load(Ordering::Relaxed),
            audio_received: self.counters.audio_received.load(Ordering::Relaxed),
            text_received: self.counters.text_received.load(Ordering::Relaxed),
            protocol_errors: self.counters.protocol_errors.load(Ordering::Relaxed),
        }
    }

    fn set_state(&self, next: ConnectionState) -> ConnectionState {
        let previous = std::mem::replace(&mut *self.state.write(), next);
        if previous != next {
            tracing::debug!(from = %previous, to = %next, "Voice agent state change");
        }
        previous
    }

    /// Open the socket and wait for the agent's `ready` message.
    ///
    /// Fails with [`RelayError::ConnectionFailed`] when the socket cannot be
    /// opened and [`RelayError::Handshake`] when the first data message is
    /// anything other than `ready`. There is no retry.
    pub async fn connect(&self) -> Result<()> {
        if self.is_ready() {
            tracing::warn!("Voice agent already connected");
            return Ok(());
        }
        self.set_state(ConnectionState::Connecting);
        let url = self.config.agent_url.as_str();
        tracing::info!(%url, "Connecting to voice agent");

        let (stream, _response) = match connect_async(url).await {
            Ok(pair) => pair,
            Err(e) => {
                self.set_state(ConnectionState::Disconnected);
                tracing::error!(%url, error = %e, "Failed to connect to voice agent");
                return Err(RelayError::connection(format!("WebSocket connect error: {e}")));
            }
        };
        let (mut sink, mut source) = stream.split();

        let handshake =
            match tokio::time::timeout(self.config.handshake_timeout(), wait_ready(&mut source))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(RelayError::handshake(format!(
                    "no ready message within {:?}",
                    self.config.handshake_timeout()
                ))),
            };

        if let Err(e) = handshake {
            let _ = sink.send(Message::Close(None)).await;
            let _ = sink.close().await;
            self.set_state(ConnectionState::Closed);
            tracing::error!(%url, error = %e, "Voice agent handshake failed");
            return Err(e);
        }

        *self.sender.lock().await = Some(sink);
        *self.receiver.lock().await = Some(source);
        self.set_state(ConnectionState::Ready);
        tracing::info!(%url, "Voice agent ready");
        Ok(())
    }

    /// Resample a session frame to the agent's input rate and send it.
    ///
    /// Does nothing unless the client is ready. Send failures are logged.
    pub async fn send_audio(&self, frame: &AudioFrame) {
        if !self.is_ready() || frame.is_empty() {
            return;
        }
        let mono;
        let frame = if frame.channels > 1 {
            mono = frame.to_mono();
            &mono
        } else {
            frame
        };

        let samples = if frame.sample_rate == self.to_agent.from_rate() {
            self.to_agent.process(&frame.samples)
        } else {
            crate::audio::resample(&frame.samples, frame.sample_rate, self.config.agent_input_rate)
        };
        let sent = samples.len();
        let payload = AudioFrame::mono(self.config.agent_input_rate, samples).to_base64();

        match self.send_message(&AgentMessage::audio(payload)).await {
            Ok(()) => {
                self.counters.audio_sent.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(samples = sent, "Sent audio to voice agent");
            }
            Err(e) => tracing::error!(error = %e, "Error sending audio to voice agent"),
        }
    }

    /// Send a text message to the agent. Best effort.
    pub async fn send_text(&self, text: &str) {
        if !self.is_ready() {
            tracing::debug!("Voice agent not ready, dropping text message");
            return;
        }
        if let Err(e) = self.send_message(&AgentMessage::text(text)).await {
            tracing::error!(error = %e, "Error sending text to voice agent");
        }
    }

    async fn send_message(&self, message: &AgentMessage) -> Result<()> {
        let json = message.to_json()?;
        let mut sender = self.sender.lock().await;
        let sink = sender.as_mut().ok_or(RelayError::NotConnected)?;
        sink.send(Message::Text(json.into()))
            .await
            .map_err(|e| RelayError::websocket(format!("Send error: {e}")))
    }

    /// Receive loop. Returns `Ok` when the agent closes the socket and an
    /// error on transport failure; either way the client ends up `Closed`.
    /// Malformed messages are logged and skipped.
    pub async fn listen_for_responses(&self) -> Result<()> {
        let mut receiver = self.receiver.lock().await;
        let source = receiver.as_mut().ok_or(RelayError::NotConnected)?;

        loop {
            match source.next().await {
                Some(Ok(Message::Text(text))) => self.handle_frame(text.as_str()),
                Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => self.handle_frame(text),
                    Err(e) => self.protocol_error(&RelayError::protocol(format!(
                        "Invalid UTF-8 in binary message: {e}"
                    ))),
                },
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(?frame, "Voice agent closed the connection");
                    self.set_state(ConnectionState::Closed);
                    return Ok(());
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    self.set_state(ConnectionState::Closed);
                    tracing::error!(error = %e, "Voice agent receive error");
                    return Err(RelayError::websocket(format!("Receive error: {e}")));
                }
                None => {
                    self.set_state(ConnectionState::Closed);
                    tracing::info!("Voice agent stream ended");
                    return Ok(());
                }
            }
        }
    }

    fn handle_frame(&self, raw: &str) {
        match AgentMessage::parse(raw) {
            Ok(AgentMessage::Audio { data }) => {
                if let Err(e) = self.handle_audio(&data) {
                    self.protocol_error(&e);
                }
            }
            Ok(AgentMessage::Text { data }) => {
                self.counters.text_received.fetch_add(1, Ordering::Relaxed);
                let callback = self.on_text.read().clone();
                callback(&data);
            }
            Ok(AgentMessage::Ready) => tracing::debug!("Ignoring repeated ready message"),
            Ok(AgentMessage::Unknown) => tracing::trace!(%raw, "Ignoring unknown message type"),
            Err(e) => self.protocol_error(&e),
        }
    }

    fn handle_audio(&self, data: &str) -> Result<()> {
        let frame = AudioFrame::from_base64(self.config.agent_output_rate, 1, data)?;
        if frame.is_empty() {
            return Ok(());
        }
        let samples = self.from_agent.process(&frame.samples);
        let received = samples.len();
        let outcome = self.inbound.push(AudioFrame::mono(self.config.session_sample_rate, samples));
        if outcome == PushOutcome::Queued {
            self.counters.audio_received.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(samples = received, "Received audio from voice agent");
        }
        Ok(())
    }

    fn protocol_error(&self, error: &RelayError) {
        self.counters.protocol_errors.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(%error, "Discarding malformed voice agent message");
    }

    /// Close the socket. Idempotent.
    pub async fn disconnect(&self) {
        let previous = self.set_state(ConnectionState::Closed);
        if let Some(mut sink) = self.sender.lock().await.take() {
            if let Err(e) = sink.send(Message::Close(None)).await {
                tracing::debug!(error = %e, "Close frame not delivered");
            }
            let _ = sink.close().await;
        }
        // A running listener holds the receiver; it exits on the close reply.
        if let Ok(mut receiver) = self.receiver.try_lock() {
            receiver.take();
        }
        if previous != ConnectionState::Closed {
            tracing::info!("Disconnected from voice agent");
        }
    }
}

/// Skip control frames until the first data message and require `ready`.
async fn wait_ready(source: &mut WsSource) -> Result<()> {
    while let Some(message) = source.next().await {
        let raw = match message {
            Ok(Message::Text(text)) => text.as_str().to_owned(),
            Ok(Message::Binary(bytes)) => String::from_utf8(bytes.to_vec())
                .map_err(|e| RelayError::handshake(format!("invalid UTF-8: {e}")))?,
            Ok(Message::Close(frame)) => {
                return Err(RelayError::handshake(format!("closed before ready: {frame:?}")));
            }
            Ok(_) => continue,
            Err(e) => return Err(RelayError::handshake(format!("receive error: {e}"))),
        };
        return match AgentMessage::parse(&raw) {
            Ok(AgentMessage::Ready) => Ok(()),
            Ok(other) => Err(RelayError::handshake(format!(
                "expected ready, got '{}' message",
                other.kind()
            ))),
            Err(e) => Err(RelayError::handshake(e.to_string())),
        };
    }
    Err(RelayError::handshake("connection closed before ready"))
}

#[async_trait]
impl VoiceAgent for VoiceAgentClient {
    fn is_ready(&self) -> bool {
        VoiceAgentClient::is_ready(self)
    }

    async fn send_audio(&self, frame: &AudioFrame) {
        VoiceAgentClient::send_audio(self, frame).await
    }

    async fn send_text(&self, text: &str) {
        VoiceAgentClient::send_text(self, text).await
    }

    async fn listen_for_responses(&self) -> Result<()> {
        VoiceAgentClient::listen_for_responses(self).await
    }

    async fn disconnect(&self) {
        VoiceAgentClient::disconnect(self).await
    }
}
