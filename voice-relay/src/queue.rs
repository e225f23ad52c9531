//! Bounded, non-blocking frame queues.
//!
//! Producers never wait: when a queue is full the frame being pushed is
//! dropped and counted. Frames already queued keep their order.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};

use crate::audio::AudioFrame;

/// Result of a non-blocking push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The frame was queued.
    Queued,
    /// The queue was full; the frame was discarded.
    Dropped,
    /// The receiving side is gone.
    Closed,
}

/// Create a bounded queue. `name` labels overflow warnings.
pub fn frame_queue(name: &'static str, capacity: usize) -> (FrameQueue, FrameReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    (FrameQueue { name, tx, dropped: dropped.clone() }, FrameReceiver { name, rx, dropped })
}

/// Producer half of a bounded frame queue.
#[derive(Debug, Clone)]
pub struct FrameQueue {
    name: &'static str,
    tx: mpsc::Sender<AudioFrame>,
    dropped: Arc<AtomicU64>,
}

impl FrameQueue {
    /// Push without waiting, dropping the frame if the queue is full.
    pub fn push(&self, frame: AudioFrame) -> PushOutcome {
        match self.tx.try_send(frame) {
            Ok(()) => PushOutcome::Queued,
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(queue = self.name, dropped, "Queue full, dropping audio frame");
                PushOutcome::Dropped
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(queue = self.name, "Queue closed, discarding audio frame");
                PushOutcome::Closed
            }
        }
    }

    /// Frames currently queued.
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Frames discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Consumer half of a bounded frame queue.
#[derive(Debug)]
pub struct FrameReceiver {
    name: &'static str,
    rx: mpsc::Receiver<AudioFrame>,
    dropped: Arc<AtomicU64>,
}

impl FrameReceiver {
    /// Wait for the next frame. `None` once every producer is gone and the
    /// queue is drained.
    pub async fn recv(&mut self) -> Option<AudioFrame> {
        self.rx.recv().await
    }

    /// Take the next frame if one is queued.
    pub fn try_recv(&mut self) -> Option<AudioFrame> {
        match self.rx.try_recv() {
            Ok(frame) => Some(frame),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Take everything currently queued, in order.
    pub fn drain(&mut self) -> Vec<AudioFrame> {
        let mut frames = Vec::with_capacity(self.len());
        while let Some(frame) = self.try_recv() {
            frames.push(frame);
        }
        frames
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Frames discarded by producers because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(tag: i16) -> AudioFrame {
        AudioFrame::mono(48000, vec![tag; 4])
    }

    #[test]
    fn full_queue_drops_newest() {
        let (queue, mut rx) = frame_queue("test", 3);
        for tag in 0..3 {
            assert_eq!(queue.push(frame(tag)), PushOutcome::Queued);
        }
        assert_eq!(queue.push(frame(99)), PushOutcome::Dropped);
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.dropped(), 1);
        assert_eq!(rx.dropped(), 1);

        let tags: Vec<i16> = rx.drain().iter().map(|f| f.samples[0]).collect();
        assert_eq!(tags, vec![0, 1, 2]);
        assert!(rx.is_empty());
    }

    #[test]
    fn push_after_receiver_dropped_is_closed() {
        let (queue, rx) = frame_queue("test", 1);
        drop(rx);
        assert_eq!(queue.push(frame(1)), PushOutcome::Closed);
        assert_eq!(queue.dropped(), 0);
    }

    #[tokio::test]
    async fn recv_ends_when_producers_gone() {
        let (queue, mut rx) = frame_queue("test", 2);
        queue.push(frame(5));
        drop(queue);
        assert_eq!(rx.recv().await.map(|f| f.samples[0]), Some(5));
        assert!(rx.recv().await.is_none());
    }
}
