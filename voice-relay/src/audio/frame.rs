use base64::Engine;

use crate::error::{RelayError, Result};

/// A block of interleaved PCM16 samples at a known rate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channels: u16,
    /// Interleaved samples.
    pub samples: Vec<i16>,
}

impl AudioFrame {
    /// Create a frame from interleaved samples.
    pub fn new(sample_rate: u32, channels: u16, samples: Vec<i16>) -> Self {
        Self { sample_rate, channels, samples }
    }

    /// Create a mono frame.
    pub fn mono(sample_rate: u32, samples: Vec<i16>) -> Self {
        Self::new(sample_rate, 1, samples)
    }

    /// Samples in each channel.
    pub fn samples_per_channel(&self) -> usize {
        if self.channels == 0 { 0 } else { self.samples.len() / self.channels as usize }
    }

    /// Duration of the frame in milliseconds.
    pub fn duration_ms(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples_per_channel() as f64 * 1000.0 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Average interleaved channels into a mono frame.
    pub fn to_mono(&self) -> AudioFrame {
        if self.channels <= 1 {
            return self.clone();
        }
        let channels = self.channels as usize;
        let samples = self
            .samples
            .chunks_exact(channels)
            .map(|group| {
                let sum: i32 = group.iter().map(|&s| s as i32).sum();
                (sum / channels as i32) as i16
            })
            .collect();
        AudioFrame::mono(self.sample_rate, samples)
    }

    /// Encode the samples as PCM16 little-endian bytes.
    pub fn to_pcm16_bytes(&self) -> Vec<u8> {
        pcm16_to_le_bytes(&self.samples)
    }

    /// Decode PCM16 little-endian bytes into a frame.
    pub fn from_pcm16_bytes(sample_rate: u32, channels: u16, bytes: &[u8]) -> Result<Self> {
        Ok(Self::new(sample_rate, channels, pcm16_from_le_bytes(bytes)?))
    }

    /// Base64 of the PCM16 little-endian bytes.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.to_pcm16_bytes())
    }

    /// Decode a base64 PCM16 payload into a frame.
    pub fn from_base64(sample_rate: u32, channels: u16, encoded: &str) -> Result<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| RelayError::protocol(format!("invalid base64 audio: {e}")))?;
        Self::from_pcm16_bytes(sample_rate, channels, &bytes)
    }
}

/// Convert i16 samples to PCM16 little-endian bytes.
pub fn pcm16_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    let mut data = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        data.extend_from_slice(&sample.to_le_bytes());
    }
    data
}

/// Convert PCM16 little-endian bytes to i16 samples.
///
/// Odd byte counts are rejected as a protocol error.
pub fn pcm16_from_le_bytes(bytes: &[u8]) -> Result<Vec<i16>> {
    if bytes.len() % 2 != 0 {
        return Err(RelayError::protocol(format!(
            "invalid data length for PCM16: {} (must be even)",
            bytes.len()
        )));
    }
    Ok(bytes.chunks_exact(2).map(|pair| i16::from_le_bytes([pair[0], pair[1]])).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm16_bytes_are_little_endian() {
        let bytes = pcm16_to_le_bytes(&[1, -2, 0x1234]);
        assert_eq!(bytes, vec![0x01, 0x00, 0xFE, 0xFF, 0x34, 0x12]);
        assert_eq!(pcm16_from_le_bytes(&bytes).unwrap(), vec![1, -2, 0x1234]);
    }

    #[test]
    fn odd_length_is_protocol_error() {
        let err = pcm16_from_le_bytes(&[0, 1, 2]).unwrap_err();
        assert!(matches!(err, RelayError::Protocol(_)));
    }

    #[test]
    fn base64_payload() {
        let frame = AudioFrame::mono(16000, vec![0, 256, -1]);
        let encoded = frame.to_base64();
        assert_eq!(encoded, "AAAAAf//");
        assert_eq!(AudioFrame::from_base64(16000, 1, &encoded).unwrap(), frame);
        assert!(AudioFrame::from_base64(16000, 1, "not base64!").is_err());
    }

    #[test]
    fn to_mono_averages_channels() {
        let frame = AudioFrame::new(48000, 2, vec![100, 300, -50, -150]);
        let mono = frame.to_mono();
        assert_eq!(mono.channels, 1);
        assert_eq!(mono.samples, vec![200, -100]);
        assert_eq!(frame.samples_per_channel(), 2);
    }

    #[test]
    fn duration() {
        let frame = AudioFrame::mono(48000, vec![0; 480]);
        assert!((frame.duration_ms() - 10.0).abs() < f64::EPSILON);
    }
}
