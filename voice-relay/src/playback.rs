//! Pull-style local playback.
//!
//! The monitor queue is drained into a shared [`AudioBuffer`] by an async
//! task; an audio device callback pulls fixed-size blocks out of it with
//! [`PlaybackBuffer::pull`], which never blocks.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::audio::AudioBuffer;
use crate::queue::FrameReceiver;

/// Seconds of audio between progress logs.
const PROGRESS_LOG_SECS: u64 = 5;

/// Playback counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackStats {
    /// Buffered samples handed to the device.
    pub samples_played: u64,
    /// Blocks that had to be padded with silence.
    pub underruns: u64,
    /// Pulls that found the buffer locked and produced silence.
    pub contended: u64,
}

#[derive(Debug, Default)]
struct Counters {
    samples_played: AtomicU64,
    underruns: AtomicU64,
    contended: AtomicU64,
}

/// Shared playback FIFO, cheap to clone.
#[derive(Debug, Clone)]
pub struct PlaybackBuffer {
    buffer: Arc<Mutex<AudioBuffer>>,
    blocksize: usize,
    counters: Arc<Counters>,
}

impl PlaybackBuffer {
    pub fn new(blocksize: usize) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(AudioBuffer::new(blocksize))),
            blocksize,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn blocksize(&self) -> usize {
        self.blocksize
    }

    /// Append samples for playback.
    pub fn push(&self, samples: &[i16]) {
        self.buffer.lock().add_frame(samples);
    }

    /// Samples waiting to be played.
    pub fn buffered(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Fill `out` for the device. Full blocks come from
    /// [`AudioBuffer::get_chunk`]; short ones are padded with silence. If
    /// the producer holds the lock, `out` is silenced instead of waiting.
    ///
    /// Returns the number of buffered samples copied into `out`.
    pub fn pull(&self, out: &mut [i16]) -> usize {
        let Some(mut buffer) = self.buffer.try_lock() else {
            out.fill(0);
            self.counters.contended.fetch_add(1, Ordering::Relaxed);
            return 0;
        };

        let mut copied = 0;
        let mut padded = false;
        for block in out.chunks_mut(self.blocksize) {
            if block.len() == self.blocksize {
                match buffer.get_chunk() {
                    Some(chunk) => {
                        block.copy_from_slice(&chunk);
                        copied += chunk.len();
                    }
                    None => {
                        let available = buffer.len();
                        block.copy_from_slice(&buffer.get_padded_chunk());
                        copied += available;
                        padded = true;
                    }
                }
            } else {
                let taken = buffer.read_into(block);
                copied += taken;
                padded |= taken < block.len();
            }
        }
        drop(buffer);

        if padded {
            self.counters.underruns.fetch_add(1, Ordering::Relaxed);
        }
        self.counters.samples_played.fetch_add(copied as u64, Ordering::Relaxed);
        copied
    }

    pub fn stats(&self) -> PlaybackStats {
        PlaybackStats {
            samples_played: self.counters.samples_played.load(Ordering::Relaxed),
            underruns: self.counters.underruns.load(Ordering::Relaxed),
            contended: self.counters.contended.load(Ordering::Relaxed),
        }
    }
}

/// Drain `monitor` into `playback` until the queue closes.
///
/// Logs progress every few seconds of audio at `sample_rate`.
pub async fn run_player(mut monitor: FrameReceiver, playback: PlaybackBuffer, sample_rate: u32) {
    let log_every = sample_rate as u64 * PROGRESS_LOG_SECS;
    let mut queued: u64 = 0;
    let mut next_log = log_every;

    while let Some(frame) = monitor.recv().await {
        playback.push(&frame.samples);
        queued += frame.samples_per_channel() as u64;
        if log_every > 0 && queued >= next_log {
            tracing::info!(
                seconds = queued / sample_rate as u64,
                buffered = playback.buffered(),
                dropped = monitor.dropped(),
                "Local playback progress"
            );
            next_log += log_every;
        }
    }
    tracing::debug!("Monitor queue closed, player stopping");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioFrame;
    use crate::queue::frame_queue;

    #[test]
    fn pull_full_and_padded_blocks() {
        let playback = PlaybackBuffer::new(4);
        playback.push(&[1, 2, 3, 4, 5, 6]);

        let mut out = [0i16; 8];
        assert_eq!(playback.pull(&mut out), 6);
        assert_eq!(out, [1, 2, 3, 4, 5, 6, 0, 0]);

        let stats = playback.stats();
        assert_eq!(stats.samples_played, 6);
        assert_eq!(stats.underruns, 1);
    }

    #[test]
    fn pull_on_empty_is_silence() {
        let playback = PlaybackBuffer::new(480);
        let mut out = [7i16; 480];
        assert_eq!(playback.pull(&mut out), 0);
        assert!(out.iter().all(|&s| s == 0));
    }

    #[test]
    fn pull_while_locked_does_not_block() {
        let playback = PlaybackBuffer::new(2);
        playback.push(&[5, 5]);
        let guard = playback.buffer.lock();
        let mut out = [1i16; 2];
        assert_eq!(playback.pull(&mut out), 0);
        assert_eq!(out, [0, 0]);
        drop(guard);
        assert_eq!(playback.stats().contended, 1);
        assert_eq!(playback.buffered(), 2);
    }

    #[test]
    fn pull_odd_sized_output() {
        let playback = PlaybackBuffer::new(4);
        playback.push(&[1, 2, 3, 4, 5]);
        let mut out = [0i16; 5];
        assert_eq!(playback.pull(&mut out), 5);
        assert_eq!(out, [1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn player_drains_monitor_queue() {
        let (queue, rx) = frame_queue("monitor", 50);
        let playback = PlaybackBuffer::new(480);
        for tag in 0..3 {
            queue.push(AudioFrame::mono(48000, vec![tag; 480]));
        }
        drop(queue);

        run_player(rx, playback.clone(), 48000).await;

        assert_eq!(playback.buffered(), 1440);
        let mut out = [0i16; 480];
        playback.pull(&mut out);
        assert!(out.iter().all(|&s| s == 0));
        playback.pull(&mut out);
        assert!(out.iter().all(|&s| s == 1));
    }
}
