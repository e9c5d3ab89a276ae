//! Peak-amplitude end-of-utterance detection.
//!
//! [`SilenceDetector`] looks at one chunk at a time.  A chunk whose peak
//! absolute amplitude is below the threshold counts as silent; any louder
//! chunk resets the count.  The utterance ends once `debounce_chunks`
//! consecutive silent chunks have been seen.
//!
//! Leading silence (microphone hum before the speaker starts) is counted the
//! same way.  Deciding whether a short capture contained any speech is the
//! controller's job, not the detector's.
//!
//! # Example
//!
//! ```rust
//! use voice_morph::audio::{SilenceConfig, SilenceDetector};
//!
//! let cfg = SilenceConfig { threshold: 1000, debounce_chunks: 2 };
//! let mut det = SilenceDetector::new(cfg);
//!
//! assert!(!det.observe(&[5000, -4000])); // speech
//! assert!(!det.observe(&[10, -20]));     // 1 silent chunk
//! assert!(det.observe(&[0, 3]));         // 2 silent chunks → done
//! ```

use crate::audio::buffer::peak_amplitude;

// ---------------------------------------------------------------------------
// SilenceConfig
// ---------------------------------------------------------------------------

/// Threshold and debounce length for a [`SilenceDetector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SilenceConfig {
    /// Peak amplitude (16-bit scale) below which a chunk is silent.
    pub threshold: u16,
    /// Consecutive silent chunks that end an utterance.  Always ≥ 1.
    pub debounce_chunks: usize,
}

impl SilenceConfig {
    /// Derive the debounce length from the stream format:
    /// `ceil(sample_rate / chunk_size × silence_secs)`, at least one chunk.
    ///
    /// ```
    /// use voice_morph::audio::SilenceConfig;
    ///
    /// // 44.1 kHz, 2048-sample chunks, 1 s of silence
    /// let cfg = SilenceConfig::from_duration(1000, 44_100, 2048, 1.0);
    /// assert_eq!(cfg.debounce_chunks, 22);
    /// ```
    pub fn from_duration(
        threshold: u16,
        sample_rate: u32,
        chunk_size: usize,
        silence_secs: f32,
    ) -> Self {
        let chunks = if chunk_size == 0 {
            1.0
        } else {
            (sample_rate as f64 / chunk_size as f64 * silence_secs.max(0.0) as f64).ceil()
        };
        Self {
            threshold,
            debounce_chunks: (chunks as usize).max(1),
        }
    }
}

// ---------------------------------------------------------------------------
// SilenceDetector
// ---------------------------------------------------------------------------

/// Running debounce counter over a stream of chunks.
///
/// Created fresh for every capture; never shared between captures.
#[derive(Debug, Clone)]
pub struct SilenceDetector {
    config: SilenceConfig,
    silent_chunks: usize,
}

impl SilenceDetector {
    pub fn new(config: SilenceConfig) -> Self {
        Self {
            config,
            silent_chunks: 0,
        }
    }

    /// Feed one chunk; returns `true` when the utterance should end.
    pub fn observe(&mut self, chunk: &[i16]) -> bool {
        if peak_amplitude(chunk) < self.config.threshold {
            self.silent_chunks += 1;
        } else {
            self.silent_chunks = 0;
        }
        self.silent_chunks >= self.config.debounce_chunks
    }

    /// Consecutive silent chunks seen so far.
    pub fn silent_chunks(&self) -> usize {
        self.silent_chunks
    }

    pub fn config(&self) -> SilenceConfig {
        self.config
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn detector(debounce_chunks: usize) -> SilenceDetector {
        SilenceDetector::new(SilenceConfig {
            threshold: 1000,
            debounce_chunks,
        })
    }

    #[test]
    fn fires_exactly_on_last_debounce_chunk() {
        let mut det = detector(5);
        let quiet = vec![100_i16; 64];
        for i in 0..4 {
            assert!(!det.observe(&quiet), "fired early on chunk {i}");
        }
        assert!(det.observe(&quiet));
    }

    #[test]
    fn loud_chunk_resets_counter() {
        let mut det = detector(3);
        let quiet = vec![0_i16; 64];
        let loud = vec![-1500_i16; 64];

        assert!(!det.observe(&quiet));
        assert!(!det.observe(&quiet));
        assert_eq!(det.silent_chunks(), 2);

        assert!(!det.observe(&loud));
        assert_eq!(det.silent_chunks(), 0);

        assert!(!det.observe(&quiet));
        assert!(!det.observe(&quiet));
        assert!(det.observe(&quiet));
    }

    #[test]
    fn threshold_is_exclusive() {
        // A peak exactly at the threshold counts as sound.
        let mut det = detector(1);
        assert!(!det.observe(&[1000]));
        assert!(det.observe(&[999]));
    }

    #[test]
    fn negative_peak_counts_as_loud() {
        let mut det = detector(1);
        assert!(!det.observe(&[0, i16::MIN, 0]));
    }

    #[test]
    fn leading_silence_is_counted() {
        let mut det = detector(2);
        assert!(!det.observe(&[0; 16]));
        assert!(det.observe(&[0; 16]));
    }

    #[test]
    fn from_duration_rounds_up() {
        let cfg = SilenceConfig::from_duration(1000, 8_000, 1000, 0.25);
        assert_eq!(cfg.debounce_chunks, 2);

        let cfg = SilenceConfig::from_duration(1000, 8_000, 3000, 1.0);
        assert_eq!(cfg.debounce_chunks, 3); // 2.67 → 3
    }

    #[test]
    fn from_duration_never_below_one_chunk() {
        assert_eq!(
            SilenceConfig::from_duration(1000, 44_100, 2048, 0.0).debounce_chunks,
            1
        );
        assert_eq!(
            SilenceConfig::from_duration(1000, 44_100, 0, 1.0).debounce_chunks,
            1
        );
    }
}
