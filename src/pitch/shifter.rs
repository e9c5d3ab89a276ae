//! Pitch shifter trait and the `rubato`-based production implementation.
//!
//! # Overview
//!
//! [`PitchShifter`] takes normalized `f32` samples and a signed shift in
//! semitones and returns normalized samples of the same duration.  It is
//! object-safe and `Send + Sync` so [`PitchTransform`](crate::pitch::PitchTransform)
//! can hold it as `Box<dyn PitchShifter>`.
//!
//! [`ResampleShifter`] shifts in two steps:
//!
//! ```text
//! resample by 2^(-n/12)   (rubato SincFixedIn; pitch and tempo both change)
//!        │
//!        ▼
//! overlap-add stretch back to the input length   (tempo restored)
//! ```

use std::f32::consts::PI;

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use thiserror::Error;

// ---------------------------------------------------------------------------
// ShiftError
// ---------------------------------------------------------------------------

/// Failures of a [`PitchShifter`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ShiftError {
    #[error("pitch factor must be finite, got {0}")]
    InvalidFactor(f64),

    #[error("pitch factor {0} is outside ±48 semitones")]
    FactorOutOfRange(f64),

    #[error("sample rate must be non-zero")]
    InvalidSampleRate,

    #[error("resampler failed: {0}")]
    Resampler(String),

    #[error("resample ratio {0} is outside the supported range")]
    RatioOutOfRange(f64),

    #[error("shifter produced non-finite samples")]
    NonFinite,
}

// ---------------------------------------------------------------------------
// PitchShifter trait
// ---------------------------------------------------------------------------

/// Duration-preserving pitch shift over normalized samples.
///
/// # Contract
///
/// - `samples` are in `[-1.0, 1.0]`.
/// - `semitones > 0` raises the pitch, `< 0` lowers it.
/// - The output has the same logical duration as the input; its values may
///   slightly exceed `[-1.0, 1.0]` and are clipped by the caller.
pub trait PitchShifter: Send + Sync {
    fn shift(&self, samples: &[f32], sample_rate: u32, semitones: f64)
        -> Result<Vec<f32>, ShiftError>;
}

// Compile-time assertion: Box<dyn PitchShifter> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn PitchShifter>) {}
};

// ---------------------------------------------------------------------------
// ResampleShifter
// ---------------------------------------------------------------------------

/// Largest shift, in either direction, [`ResampleShifter`] accepts: four
/// octaves, i.e. a resample ratio between 1/16 and 16.
pub const MAX_SEMITONES: f64 = 48.0;

/// Resample ratios outside `[1 / MAX_RATIO, MAX_RATIO]` are rejected.
const MAX_RATIO: f64 = 32.0;

/// Frames per resampler call.
const RESAMPLE_CHUNK: usize = 1024;
/// Sinc filter length; the resampler delays its output by half of this.
const SINC_LEN: usize = 128;

/// Resample-then-stretch pitch shifter.
#[derive(Debug, Clone)]
pub struct ResampleShifter {
    /// Overlap-add grain length in samples.
    grain_size: usize,
}

impl Default for ResampleShifter {
    fn default() -> Self {
        Self::new(2048)
    }
}

impl ResampleShifter {
    /// `grain_size` is clamped to at least 4 samples.
    pub fn new(grain_size: usize) -> Self {
        Self {
            grain_size: grain_size.max(4),
        }
    }

    pub fn grain_size(&self) -> usize {
        self.grain_size
    }
}

impl PitchShifter for ResampleShifter {
    fn shift(
        &self,
        samples: &[f32],
        sample_rate: u32,
        semitones: f64,
    ) -> Result<Vec<f32>, ShiftError> {
        if !semitones.is_finite() {
            return Err(ShiftError::InvalidFactor(semitones));
        }
        if semitones.abs() > MAX_SEMITONES {
            return Err(ShiftError::FactorOutOfRange(semitones));
        }
        if sample_rate == 0 {
            return Err(ShiftError::InvalidSampleRate);
        }
        if samples.is_empty() || semitones == 0.0 {
            return Ok(samples.to_vec());
        }

        let pitch_ratio = 2f64.powf(semitones / 12.0);
        let squeezed = resample(samples, 1.0 / pitch_ratio)?;
        let out = stretch_to(&squeezed, samples.len(), self.grain_size);

        if out.iter().any(|s| !s.is_finite()) {
            return Err(ShiftError::NonFinite);
        }
        Ok(out)
    }
}

/// Resample `input` by `ratio` (output length ≈ `input.len() × ratio`).
///
/// The resampler's group delay is trimmed, so output sample `i` lines up
/// with input position `i / ratio`.
pub(crate) fn resample(input: &[f32], ratio: f64) -> Result<Vec<f32>, ShiftError> {
    if !ratio.is_finite() || !(1.0 / MAX_RATIO..=MAX_RATIO).contains(&ratio) {
        return Err(ShiftError::RatioOutOfRange(ratio));
    }
    if input.is_empty() {
        return Ok(Vec::new());
    }

    let params = SincInterpolationParameters {
        sinc_len: SINC_LEN,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window: WindowFunction::BlackmanHarris2,
    };

    //                                   ratio, drift, params, chunk, channels
    let mut rs = SincFixedIn::<f32>::new(ratio, 1.0, params, RESAMPLE_CHUNK, 1)
        .map_err(|e| ShiftError::Resampler(e.to_string()))?;

    let expected = ((input.len() as f64) * ratio).round().max(1.0) as usize;
    let delay = ((SINC_LEN / 2) as f64 * ratio).round() as usize;
    let wanted = expected
        .checked_add(delay)
        .ok_or(ShiftError::RatioOutOfRange(ratio))?;
    let capacity = wanted
        .checked_add(RESAMPLE_CHUNK)
        .ok_or(ShiftError::RatioOutOfRange(ratio))?;
    let mut out = Vec::with_capacity(capacity);

    let mut seg = vec![0.0f32; RESAMPLE_CHUNK];
    let mut idx = 0usize;
    // Keep feeding (zero-padded) chunks until the delayed tail is out.
    while out.len() < wanted {
        seg.fill(0.0);
        if idx < input.len() {
            let end = (idx + RESAMPLE_CHUNK).min(input.len());
            seg[..end - idx].copy_from_slice(&input[idx..end]);
        }
        idx += RESAMPLE_CHUNK;

        let produced = rs
            .process(std::slice::from_ref(&seg), None)
            .map_err(|e| ShiftError::Resampler(e.to_string()))?;
        let Some(channel) = produced.first() else {
            return Err(ShiftError::Resampler("no output channel".into()));
        };
        out.extend_from_slice(channel);

        if idx > input.len().saturating_add(4 * RESAMPLE_CHUNK) && out.len() < wanted {
            return Err(ShiftError::Resampler("resampler made no progress".into()));
        }
    }

    out.drain(..delay.min(out.len()));
    out.truncate(expected);
    Ok(out)
}

/// Overlap-add (Hann window, 50 % overlap) time-stretch of `input` to
/// exactly `target_len` samples.
///
/// The first grain starts half a grain before the output so every output
/// sample is covered by two grains.  Reads past either end of `input` repeat
/// the edge sample, so each output sample is a weighted average of input
/// samples and the peak never grows.
fn stretch_to(input: &[f32], target_len: usize, grain_size: usize) -> Vec<f32> {
    if target_len == 0 {
        return Vec::new();
    }
    if input.is_empty() {
        return vec![0.0; target_len];
    }

    let grain = grain_size.max(4);
    let hop = (grain / 2) as isize;
    let last = (input.len() - 1) as isize;
    let len = target_len as isize;
    let step = input.len() as f64 / target_len as f64;
    let window: Vec<f32> = (0..grain)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / grain as f32).cos())
        .collect();

    let mut acc = vec![0.0f32; target_len];
    let mut weight = vec![0.0f32; target_len];

    let mut start = -hop;
    while start < len {
        let in_start = (start as f64 * step).round() as isize;
        for (i, &w) in window.iter().enumerate() {
            let o = start + i as isize;
            if !(0..len).contains(&o) {
                continue;
            }
            let src = (in_start + i as isize).clamp(0, last) as usize;
            acc[o as usize] += input[src] * w;
            weight[o as usize] += w;
        }
        start += hop;
    }

    for (s, &w) in acc.iter_mut().zip(weight.iter()) {
        if w > 1e-3 {
            *s /= w;
        }
    }
    acc
}

// ---------------------------------------------------------------------------
// Test shifters
// ---------------------------------------------------------------------------

/// Shifter that always fails: exercises the degradation path.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct FailingShifter;

#[cfg(test)]
impl PitchShifter for FailingShifter {
    fn shift(&self, _: &[f32], _: u32, _: f64) -> Result<Vec<f32>, ShiftError> {
        Err(ShiftError::Resampler("forced failure".into()))
    }
}

/// Shifter that multiplies every sample by a constant.
#[cfg(test)]
#[derive(Debug)]
pub struct ScaleShifter(pub f32);

#[cfg(test)]
impl PitchShifter for ScaleShifter {
    fn shift(&self, samples: &[f32], _: u32, _: f64) -> Result<Vec<f32>, ShiftError> {
        Ok(samples.iter().map(|s| s * self.0).collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
