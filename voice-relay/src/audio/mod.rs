//! PCM16 audio primitives: frames, the playback FIFO and the resampler.

mod buffer;
mod frame;
mod resample;

pub use buffer::AudioBuffer;
pub use frame::{AudioFrame, pcm16_from_le_bytes, pcm16_to_le_bytes};
pub use resample::{Resampler, resample, resampled_len};
