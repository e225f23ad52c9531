//! Relay orchestration.
//!
//! ```text
//!  session track ──► run() ──► VoiceAgent::send_audio ──► agent socket
//!                      │
//!                      └──► monitor queue ──► player ──► PlaybackBuffer ──► device
//!
//!  agent socket ──► listener ──► inbound queue ──► publisher ──► AudioSink
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::{Stream, StreamExt};
use parking_lot::Mutex;

use crate::agent::{VoiceAgent, VoiceAgentClient};
use crate::audio::AudioFrame;
use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::playback::{PlaybackBuffer, run_player};
use crate::queue::{FrameQueue, FrameReceiver, PushOutcome, frame_queue};
use crate::session::{AudioSink, TopicHandler, chat_bridge};
use crate::tasks::TaskSet;

/// Relay totals, see [`AudioRelay::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Session frames taken from the track.
    pub frames: u64,
    /// Frames the monitor queue had no room for.
    pub monitor_dropped: u64,
}

/// Wires a session audio track, a voice agent and local playback together.
pub struct AudioRelay<A: VoiceAgent> {
    config: RelayConfig,
    agent: Arc<A>,
    tasks: TaskSet,
    monitor: FrameQueue,
    monitor_rx: Mutex<Option<FrameReceiver>>,
    inbound_rx: Mutex<Option<FrameReceiver>>,
    playback: PlaybackBuffer,
    frames: AtomicU64,
    monitor_dropped: AtomicU64,
}

impl AudioRelay<VoiceAgentClient> {
    /// Build a relay around a new, unconnected [`VoiceAgentClient`].
    pub fn with_client(config: RelayConfig) -> Result<Self> {
        config.validate()?;
        let (inbound, inbound_rx) = frame_queue("inbound", config.queue_capacity);
        let client = VoiceAgentClient::new(config.clone(), inbound);
        Self::new(config, Arc::new(client), inbound_rx)
    }

    /// Connect the agent, then start the listener and publisher so agent
    /// audio reaches `sink` before any session audio is relayed.
    pub async fn connect<S: AudioSink>(&self, sink: Arc<S>) -> Result<()> {
        self.agent.connect().await?;
        self.start(sink)
    }
}

impl<A: VoiceAgent> AudioRelay<A> {
    /// Build a relay. `inbound` is the receiving end of the queue the agent
    /// writes its audio to. Fails if `config` does not validate.
    pub fn new(config: RelayConfig, agent: Arc<A>, inbound: FrameReceiver) -> Result<Self> {
        config.validate()?;
        let (monitor, monitor_rx) = frame_queue("monitor", config.queue_capacity);
        let playback = PlaybackBuffer::new(config.blocksize);
        Ok(Self {
            config,
            agent,
            tasks: TaskSet::new(),
            monitor,
            monitor_rx: Mutex::new(Some(monitor_rx)),
            inbound_rx: Mutex::new(Some(inbound)),
            playback,
            frames: AtomicU64::new(0),
            monitor_dropped: AtomicU64::new(0),
        })
    }

    pub fn agent(&self) -> &Arc<A> {
        &self.agent
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn tasks(&self) -> &TaskSet {
        &self.tasks
    }

    /// Frames relayed so far. Kept on the relay, so totals survive a
    /// [`run`](Self::run) future that is dropped mid-stream.
    pub fn stats(&self) -> RelayStats {
        RelayStats {
            frames: self.frames.load(Ordering::Relaxed),
            monitor_dropped: self.monitor_dropped.load(Ordering::Relaxed),
        }
    }

    /// Shared buffer the local device pulls from.
    pub fn playback(&self) -> PlaybackBuffer {
        self.playback.clone()
    }

    /// Producer side of the monitor queue.
    pub fn monitor(&self) -> &FrameQueue {
        &self.monitor
    }

    /// Take the monitor receiver to consume it elsewhere. `None` if the
    /// player was started or the monitor disabled.
    pub fn take_monitor_receiver(&self) -> Option<FrameReceiver> {
        self.monitor_rx.lock().take()
    }

    /// Drop the monitor receiver; session frames are then only sent to the
    /// agent.
    pub fn disable_monitor(&self) {
        if self.monitor_rx.lock().take().is_some() {
            tracing::info!("Local monitor disabled");
        }
    }

    /// Handler for the `chat` topic that forwards messages to the agent.
    pub fn chat_handler(&self) -> TopicHandler {
        chat_bridge(self.agent.clone(), self.tasks.clone())
    }

    /// Run the agent's receive loop in the background.
    pub fn spawn_listener(&self) {
        let agent = self.agent.clone();
        self.tasks.spawn("agent-listener", async move {
            match agent.listen_for_responses().await {
                Ok(()) => tracing::info!("Voice agent listener finished"),
                Err(e) => tracing::error!(error = %e, "Voice agent listener failed"),
            }
        });
    }

    /// Publish agent audio into `sink` in the background.
    pub fn spawn_publisher<S: AudioSink>(&self, sink: Arc<S>) -> Result<()> {
        let inbound = self
            .inbound_rx
            .lock()
            .take()
            .ok_or_else(|| RelayError::config("publisher already started"))?;
        self.tasks.spawn("publisher", publish(inbound, sink));
        Ok(())
    }

    /// Drain the monitor queue into the playback buffer in the background.
    pub fn spawn_player(&self) -> Result<()> {
        let monitor = self
            .take_monitor_receiver()
            .ok_or_else(|| RelayError::config("monitor receiver unavailable"))?;
        let playback = self.playback.clone();
        let rate = self.config.session_sample_rate;
        self.tasks.spawn("player", run_player(monitor, playback, rate));
        Ok(())
    }

    /// Start the listener and publisher.
    pub fn start<S: AudioSink>(&self, sink: Arc<S>) -> Result<()> {
        self.spawn_listener();
        self.spawn_publisher(sink)
    }

    /// Relay session frames until the stream ends or the relay is shut down.
    ///
    /// Each frame goes to the agent first, then onto the monitor queue.
    /// Returns the relay totals, which also count earlier runs.
    pub async fn run<S>(&self, frames: S) -> RelayStats
    where
        S: Stream<Item = AudioFrame> + Send,
    {
        let token = self.tasks.token().clone();
        let mut frames = std::pin::pin!(frames);
        tracing::info!("Relaying session audio");

        loop {
            let frame = tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!("Relay cancelled");
                    break;
                }
                next = frames.next() => match next {
                    Some(frame) => frame,
                    None => {
                        tracing::info!("Session audio track ended");
                        break;
                    }
                },
            };
            self.frames.fetch_add(1, Ordering::Relaxed);
            self.agent.send_audio(&frame).await;
            if self.monitor.push(frame) == PushOutcome::Dropped {
                self.monitor_dropped.fetch_add(1, Ordering::Relaxed);
            }
        }

        let stats = self.stats();

        tracing::info!(frames = stats.frames, dropped = stats.monitor_dropped, "Relay stopped");
        stats
    }

    /// Cancel background tasks, wait for them, then disconnect the agent.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down relay");
        self.tasks.shutdown().await;
        self.agent.disconnect().await;
    }
}

async fn publish<S: AudioSink>(mut inbound: FrameReceiver, sink: Arc<S>) {
    let mut published: u64 = 0;
    while let Some(frame) = inbound.recv().await {
        match sink.capture_frame(&frame).await {
            Ok(()) => published += 1,
            Err(e) => tracing::warn!(error = %e, "Failed to publish agent audio"),
        }
    }
    tracing::debug!(published, "Inbound queue closed, publisher stopping");
}
