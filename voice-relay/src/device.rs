//! Local output device playback.

use std::sync::mpsc;
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::error::{RelayError, Result};
use crate::playback::PlaybackBuffer;

/// Names of the output devices on the default host.
pub fn list_output_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = host
        .output_devices()
        .map_err(|e| RelayError::device(format!("Failed to enumerate devices: {e}")))?;
    Ok(devices.filter_map(|device| device.name().ok()).collect())
}

/// A running output stream fed by a [`PlaybackBuffer`].
///
/// The stream lives on its own thread; dropping the handle stops it.
pub struct OutputDevice {
    name: String,
    stop: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl OutputDevice {
    /// Open the default output device at `sample_rate`, with buffers of the
    /// playback block size. Mono PCM16 is used when the device supports it;
    /// otherwise float and multi-channel layouts are converted to.
    pub fn start(playback: PlaybackBuffer, sample_rate: u32) -> Result<Self> {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<String>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread = std::thread::Builder::new()
            .name("voice-relay-output".into())
            .spawn(move || {
                let stream = match open_stream(playback, sample_rate) {
                    Ok((name, stream)) => {
                        let _ = ready_tx.send(Ok(name));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                // Park until told to stop or the handle is dropped.
                let _ = stop_rx.recv();
                drop(stream);
            })?;

        let name = ready_rx
            .recv()
            .map_err(|_| RelayError::device("Output thread exited before opening a stream"))??;
        tracing::info!(device = %name, sample_rate, "Local playback started");

        Ok(Self { name, stop: Some(stop_tx), thread: Some(thread) })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop the stream and join its thread.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("Output thread panicked");
            }
            tracing::info!(device = %self.name, "Local playback stopped");
        }
    }
}

impl Drop for OutputDevice {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Sample layout used for the device stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OutputFormat {
    sample_format: cpal::SampleFormat,
    channels: u16,
}

/// Pick a supported layout at `sample_rate` from `(format, channels, min
/// rate, max rate)` ranges. PCM16 is preferred over float, then the fewest
/// channels.
fn choose_output_format<I>(ranges: I, sample_rate: u32) -> Option<OutputFormat>
where
    I: IntoIterator<Item = (cpal::SampleFormat, u16, u32, u32)>,
{
    ranges
        .into_iter()
        .filter(|&(_, channels, min, max)| channels > 0 && (min..=max).contains(&sample_rate))
        .filter_map(|(sample_format, channels, _, _)| {
            let rank = match sample_format {
                cpal::SampleFormat::I16 => 0,
                cpal::SampleFormat::F32 => 1,
                _ => return None,
            };
            Some((rank, channels, OutputFormat { sample_format, channels }))
        })
        .min_by_key(|&(rank, channels, _)| (rank, channels))
        .map(|(_, _, format)| format)
}

/// Copy mono samples into an interleaved buffer, repeating each sample on
/// every channel.
fn fill_interleaved<T, F>(mono: &[i16], out: &mut [T], channels: usize, convert: F)
where
    T: Copy,
    F: Fn(i16) -> T,
{
    for (slot, &sample) in out.chunks_mut(channels).zip(mono) {
        slot.fill(convert(sample));
    }
}

fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / 32768.0
}

fn build_stream<T, F>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    playback: PlaybackBuffer,
    convert: F,
) -> std::result::Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample,
    F: Fn(i16) -> T + Send + 'static,
{
    let channels = config.channels as usize;
    let mut mono: Vec<i16> = Vec::with_capacity(playback.blocksize());
    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            mono.resize(data.len() / channels, 0);
            playback.pull(&mut mono);
            fill_interleaved(&mono, data, channels, &convert);
        },
        |err| tracing::error!(error = %err, "Output stream error"),
        None,
    )
}

fn open_stream(playback: PlaybackBuffer, sample_rate: u32) -> Result<(String, cpal::Stream)> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| RelayError::device("No default output device"))?;
    let name = device.name().unwrap_or_else(|_| "unknown".to_string());

    let ranges = device
        .supported_output_configs()
        .map_err(|e| RelayError::device(format!("Failed to query {name}: {e}")))?
        .map(|range| {
            let (min, max) = (range.min_sample_rate().0, range.max_sample_rate().0);
            (range.sample_format(), range.channels(), min, max)
        });
    let format = choose_output_format(ranges, sample_rate).ok_or_else(|| {
        RelayError::device(format!("{name} has no PCM16 or float output at {sample_rate} Hz"))
    })?;
    tracing::debug!(device = %name, ?format, "Selected output format");

    let config = cpal::StreamConfig {
        channels: format.channels,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Fixed(playback.blocksize() as u32),
    };

    let stream = match format.sample_format {
        cpal::SampleFormat::F32 => build_stream(&device, &config, playback, i16_to_f32),
        _ => build_stream(&device, &config, playback, |sample: i16| sample),
    }
    .map_err(|e| RelayError::device(format!("Failed to open output stream on {name}: {e}")))?;
    stream.play().map_err(|e| RelayError::device(format!("Failed to start playback: {e}")))?;
    Ok((name, stream))
}
