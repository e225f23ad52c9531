//! Narrow interfaces to the real-time session: an outbound audio sink and a
//! topic dispatch table for inbound text.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::agent::VoiceAgent;
use crate::audio::AudioFrame;
use crate::error::Result;
use crate::tasks::TaskSet;

/// Topic carrying participant chat messages.
pub const CHAT_TOPIC: &str = "chat";

/// Destination for audio published into the session.
#[async_trait]
pub trait AudioSink: Send + Sync + 'static {
    /// Push one frame into the outbound track.
    async fn capture_frame(&self, frame: &AudioFrame) -> Result<()>;
}

/// A text message received on a session topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMessage {
    pub topic: String,
    pub participant_identity: String,
    pub text: String,
}

impl TextMessage {
    pub fn new(
        topic: impl Into<String>,
        participant_identity: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            topic: topic.into(),
            participant_identity: participant_identity.into(),
            text: text.into(),
        }
    }
}

/// Synchronous topic handler. Runs on the session event task, so anything
/// slow must be spawned.
pub type TopicHandler = Arc<dyn Fn(TextMessage) + Send + Sync>;

/// Maps topic names to handlers.
#[derive(Clone, Default)]
pub struct TopicRouter {
    handlers: Arc<RwLock<HashMap<String, TopicHandler>>>,
}

impl std::fmt::Debug for TopicRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicRouter").field("topics", &self.topics()).finish()
    }
}

impl TopicRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `topic`, replacing any previous handler.
    pub fn register<F>(&self, topic: impl Into<String>, handler: F)
    where
        F: Fn(TextMessage) + Send + Sync + 'static,
    {
        self.register_handler(topic, Arc::new(handler));
    }

    pub fn register_handler(&self, topic: impl Into<String>, handler: TopicHandler) {
        let topic = topic.into();
        tracing::debug!(%topic, "Registered topic handler");
        self.handlers.write().insert(topic, handler);
    }

    /// Remove the handler for `topic`. Returns whether one was registered.
    pub fn unregister(&self, topic: &str) -> bool {
        self.handlers.write().remove(topic).is_some()
    }

    /// Deliver `message` to its topic handler. Returns `false` when no
    /// handler is registered.
    pub fn dispatch(&self, message: TextMessage) -> bool {
        let handler = self.handlers.read().get(&message.topic).cloned();
        match handler {
            Some(handler) => {
                handler(message);
                true
            }
            None => {
                tracing::debug!(topic = %message.topic, "No handler for topic");
                false
            }
        }
    }

    /// Registered topic names, sorted.
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.handlers.read().keys().cloned().collect();
        topics.sort();
        topics
    }
}

/// Handler that logs chat messages and forwards them to `agent` as text.
///
/// Forwarding happens on a task in `tasks` so the dispatcher never waits on
/// the socket.
pub fn chat_bridge<A: VoiceAgent>(agent: Arc<A>, tasks: TaskSet) -> TopicHandler {
    Arc::new(move |message: TextMessage| {
        tracing::info!(
            participant = %message.participant_identity,
            text = %message.text,
            "Chat message"
        );
        let agent = agent.clone();
        tasks.spawn("chat-forward", async move {
            agent.send_text(&message.text).await;
        });
    })
}

/// Read one incoming text stream to the end and dispatch it on `topic`.
///
/// A failed read is logged and nothing is dispatched.
pub async fn forward_text_stream<F, E>(
    router: TopicRouter,
    topic: String,
    participant_identity: String,
    read: F,
) -> bool
where
    F: Future<Output = std::result::Result<String, E>>,
    E: std::fmt::Display,
{
    match read.await {
        Ok(text) => router.dispatch(TextMessage::new(topic, participant_identity, text)),
        Err(e) => {
            tracing::warn!(%topic, participant = %participant_identity, error = %e, "Text stream read failed");
            false
        }
    }
}
