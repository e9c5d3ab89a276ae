//! Whole-utterance PCM buffer passed between pipeline stages.
//!
//! An [`AudioBuffer`] is produced once (by capture or by the pitch
//! transform) and then moved into the next stage.  Samples are mono 16-bit
//! signed integers; the wire form is little-endian bytes.
//!
//! # Example
//!
//! ```rust
//! use voice_morph::audio::AudioBuffer;
//!
//! let buf = AudioBuffer::new(vec![0, 1200, -3000], 44_100);
//! assert_eq!(buf.len(), 3);
//! assert_eq!(buf.peak(), 3000);
//!
//! let bytes = buf.to_le_bytes();
//! assert_eq!(bytes.len(), 6);
//! assert_eq!(AudioBuffer::from_le_bytes(&bytes, 44_100).unwrap(), buf);
//! ```

use thiserror::Error;

/// Width of one sample in bytes (16-bit PCM).
pub const SAMPLE_WIDTH: usize = 2;

// ---------------------------------------------------------------------------
// BufferError
// ---------------------------------------------------------------------------

/// Raw bytes could not be interpreted as 16-bit PCM.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BufferError {
    #[error("byte length {0} is not a multiple of the {SAMPLE_WIDTH}-byte sample width")]
    Misaligned(usize),
}

// ---------------------------------------------------------------------------
// AudioBuffer
// ---------------------------------------------------------------------------

/// Mono 16-bit PCM samples at a known sample rate.
///
/// The channel count is fixed at one.  An empty buffer is valid and means
/// "no input".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioBuffer {
    samples: Vec<i16>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Channel count of every buffer in the pipeline.
    pub const CHANNELS: u16 = 1;

    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// An empty buffer at `sample_rate`.
    pub fn empty(sample_rate: u32) -> Self {
        Self::new(Vec::new(), sample_rate)
    }

    /// Decode little-endian 16-bit PCM bytes.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::Misaligned`] when `bytes.len()` is odd.
    pub fn from_le_bytes(bytes: &[u8], sample_rate: u32) -> Result<Self, BufferError> {
        if bytes.len() % SAMPLE_WIDTH != 0 {
            return Err(BufferError::Misaligned(bytes.len()));
        }
        let samples = bytes
            .chunks_exact(SAMPLE_WIDTH)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Ok(Self::new(samples, sample_rate))
    }

    /// Encode as little-endian 16-bit PCM bytes.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Consume the buffer and return its samples.
    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of samples (frames, since the buffer is mono).
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Largest absolute sample value, `0` for an empty buffer.
    ///
    /// Returned as `u16` so that `i16::MIN` (32768) is representable.
    pub fn peak(&self) -> u16 {
        peak_amplitude(&self.samples)
    }

    /// Duration in seconds; `0.0` when the sample rate is zero.
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Peak absolute amplitude of a sample slice.
pub fn peak_amplitude(samples: &[i16]) -> u16 {
    samples
        .iter()
        .map(|s| s.unsigned_abs())
        .max()
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odd_byte_length_is_rejected() {
        let err = AudioBuffer::from_le_bytes(&[0x01, 0x02, 0x03], 44_100).unwrap_err();
        assert_eq!(err, BufferError::Misaligned(3));
    }

    #[test]
    fn bytes_are_little_endian() {
        let buf = AudioBuffer::from_le_bytes(&[0x34, 0x12, 0xff, 0xff], 44_100).unwrap();
        assert_eq!(buf.samples(), &[0x1234, -1]);
    }

    #[test]
    fn empty_bytes_make_empty_buffer() {
        let buf = AudioBuffer::from_le_bytes(&[], 44_100).unwrap();
        assert!(buf.is_empty());
        assert_eq!(buf.peak(), 0);
    }

    #[test]
    fn peak_handles_most_negative_sample() {
        let buf = AudioBuffer::new(vec![10, i16::MIN, 300], 44_100);
        assert_eq!(buf.peak(), 32_768);
    }

    #[test]
    fn duration_secs_calculation() {
        let buf = AudioBuffer::new(vec![0; 22_050], 44_100);
        assert!((buf.duration_secs() - 0.5).abs() < 1e-6);
        assert_eq!(AudioBuffer::new(vec![0; 10], 0).duration_secs(), 0.0);
    }
}
