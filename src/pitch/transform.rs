//! 16-bit buffer → pitch-shifted 16-bit buffer.
//!
//! [`PitchTransform::shift`] runs four steps:
//!
//! 1. normalize `i16` samples to `[-1, 1]` (divide by 32768),
//! 2. hand them to the [`PitchShifter`],
//! 3. rescale by 32768 × gain (default 1.2; pitch shifting loses loudness),
//! 4. clip to `[-32768, 32767]`.
//!
//! Both scale factors are constants, so silent or all-zero input never
//! divides by a peak value.
//!
//! # Degradation policy
//!
//! Pitch shifting is cosmetic and never blocks playback.  When the shifter
//! fails (or produces non-finite samples) `shift` logs a warning and returns
//! the input buffer unchanged.  Use [`PitchTransform::try_shift`] to observe
//! the failure instead.

use crate::audio::AudioBuffer;
use crate::pitch::shifter::{PitchShifter, ShiftError};

/// Full-scale value used to normalize and rescale 16-bit samples.
const FULL_SCALE: f32 = 32_768.0;

/// Default gain compensation applied after shifting.
pub const DEFAULT_GAIN: f32 = 1.2;

// ---------------------------------------------------------------------------
// Sample conversion
// ---------------------------------------------------------------------------

/// `i16` → `f32` in `[-1.0, 1.0)`.
pub fn normalize(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / FULL_SCALE).collect()
}

/// `f32` → `i16` with gain, clipped to the 16-bit range.
///
/// Non-finite values map to 0.
pub fn rescale(samples: &[f32], gain: f32) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| {
            let v = s * FULL_SCALE * gain;
            if v.is_finite() {
                v.clamp(i16::MIN as f32, i16::MAX as f32) as i16
            } else {
                0
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// PitchTransform
// ---------------------------------------------------------------------------

pub struct PitchTransform {
    shifter: Box<dyn PitchShifter>,
    gain: f32,
}

impl std::fmt::Debug for PitchTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PitchTransform")
            .field("gain", &self.gain)
            .finish_non_exhaustive()
    }
}

impl PitchTransform {
    pub fn new(shifter: Box<dyn PitchShifter>, gain: f32) -> Self {
        Self { shifter, gain }
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Shift `buffer` by `factor` semitones.  Never fails: on any shifter
    /// error the original buffer comes back untouched.
    pub fn shift(&self, buffer: AudioBuffer, factor: f64) -> AudioBuffer {
        if buffer.is_empty() {
            return buffer;
        }
        match self.try_shift(&buffer, factor) {
            Ok(shifted) => shifted,
            Err(e) => {
                log::warn!("pitch shift failed ({e}); playing unmodified audio");
                buffer
            }
        }
    }

    /// Shift `buffer`, surfacing shifter errors.
    pub fn try_shift(&self, buffer: &AudioBuffer, factor: f64) -> Result<AudioBuffer, ShiftError> {
        log::debug!("pitch: shifting {} samples by {factor:+.2}", buffer.len());

        let normalized = normalize(buffer.samples());
        let shifted = self
            .shifter
            .shift(&normalized, buffer.sample_rate(), factor)?;
        if shifted.iter().any(|s| !s.is_finite()) {
            return Err(ShiftError::NonFinite);
        }

        Ok(AudioBuffer::new(
            rescale(&shifted, self.gain),
            buffer.sample_rate(),
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch::shifter::{FailingShifter, ResampleShifter, ScaleShifter};

    /// Speech-like test signal: a few harmonics at full-ish scale.
    fn voice(len: usize, rate: u32) -> AudioBuffer {
        let samples = (0..len)
            .map(|i| {
                let t = i as f32 / rate as f32;
                let v = 0.6 * (2.0 * std::f32::consts::PI * 180.0 * t).sin()
                    + 0.3 * (2.0 * std::f32::consts::PI * 360.0 * t).sin();
                (v * 30_000.0) as i16
            })
            .collect();
        AudioBuffer::new(samples, rate)
    }

    #[test]
    fn empty_buffer_returns_empty() {
        let t = PitchTransform::new(Box::new(ResampleShifter::default()), DEFAULT_GAIN);
        let out = t.shift(AudioBuffer::empty(44_100), 8.0);
        assert!(out.is_empty());
        assert_eq!(out.sample_rate(), 44_100);
    }

    #[test]
    fn failing_shifter_returns_input_byte_identical() {
        let t = PitchTransform::new(Box::new(FailingShifter), DEFAULT_GAIN);
        let input = voice(4_000, 8_000);
        let expected = input.to_le_bytes();

        let out = t.shift(input, 5.0);

        assert_eq!(out.to_le_bytes(), expected);
    }

    #[test]
    fn try_shift_surfaces_the_failure() {
        let t = PitchTransform::new(Box::new(FailingShifter), DEFAULT_GAIN);
        assert!(t.try_shift(&voice(100, 8_000), 5.0).is_err());
    }

    #[test]
    fn non_finite_factor_falls_back() {
        let t = PitchTransform::new(Box::new(ResampleShifter::default()), DEFAULT_GAIN);
        let input = voice(1_000, 8_000);
        let out = t.shift(input.clone(), f64::NAN);
        assert_eq!(out, input);
    }

    #[test]
    fn out_of_range_factor_returns_input_unchanged() {
        let t = PitchTransform::new(Box::new(ResampleShifter::default()), DEFAULT_GAIN);
        let input = AudioBuffer::new(vec![1000; 4096], 44_100);
        for factor in [-1_000.0, -250.0, 1_000.0] {
            assert_eq!(t.shift(input.clone(), factor), input);
        }
    }

    #[test]
    fn non_finite_shifter_output_falls_back() {
        let t = PitchTransform::new(Box::new(ScaleShifter(f32::INFINITY)), DEFAULT_GAIN);
        let input = voice(100, 8_000);
        assert_eq!(t.shift(input.clone(), 1.0), input);
    }

    #[test]
    fn loud_output_is_clipped_to_i16_range() {
        // 4× amplification on a near-full-scale signal overflows before the clip.
        let t = PitchTransform::new(Box::new(ScaleShifter(4.0)), DEFAULT_GAIN);
        let out = t.shift(AudioBuffer::new(vec![32_000, -32_000, 100], 8_000), 1.0);
        assert_eq!(out.samples(), &[i16::MAX, i16::MIN, 480]);
    }

    #[test]
    fn gain_is_applied() {
        let t = PitchTransform::new(Box::new(ScaleShifter(1.0)), 1.5);
        let out = t.shift(AudioBuffer::new(vec![1000, -2000], 8_000), 1.0);
        assert_eq!(out.samples(), &[1500, -3000]);
    }

    #[test]
    fn all_zero_input_stays_zero() {
        let t = PitchTransform::new(Box::new(ResampleShifter::default()), DEFAULT_GAIN);
        let out = t.shift(AudioBuffer::new(vec![0; 5_000], 8_000), 8.0);
        assert_eq!(out.len(), 5_000);
        assert!(out.samples().iter().all(|&s| s == 0));
    }

    #[test]
    fn speech_sized_buffer_shifts_up_and_keeps_length() {
        let t = PitchTransform::new(Box::new(ResampleShifter::default()), DEFAULT_GAIN);
        let input = voice(50_000, 44_100);

        let out = t.shift(input.clone(), 8.0);

        assert!(!out.is_empty());
        assert_eq!(out.len(), input.len());
        assert_ne!(out, input);
        assert!(out.peak() > 1_000, "shifted signal lost its energy");
    }

    #[test]
    fn heavy_gain_saturates_at_both_rails() {
        let t = PitchTransform::new(Box::new(ResampleShifter::default()), 8.0);
        let out = t.shift(voice(20_000, 16_000), 5.0);

        assert_eq!(out.len(), 20_000);
        assert!(out.samples().contains(&i16::MAX));
        assert!(out.samples().contains(&i16::MIN));
    }

    #[test]
    fn negative_factor_shifts_down() {
        let t = PitchTransform::new(Box::new(ResampleShifter::default()), DEFAULT_GAIN);
        let input = voice(20_000, 16_000);
        let out = t.shift(input.clone(), -12.0);
        assert_eq!(out.len(), input.len());
        assert_ne!(out, input);
    }

    #[test]
    fn normalize_then_rescale_at_unity_gain_round_trips() {
        let input = vec![0_i16, 1, -1, 12_345, i16::MIN, i16::MAX];
        assert_eq!(rescale(&normalize(&input), 1.0), input);
    }
}
