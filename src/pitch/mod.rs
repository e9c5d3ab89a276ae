//! Pitch transformation.
//!
//! * [`PitchShifter`]: trait for the duration-preserving shift itself.
//! * [`ResampleShifter`]: production shifter (rubato resample + overlap-add).
//! * [`PitchTransform`]: 16-bit in, 16-bit out, with gain, clipping and a
//!   fall-back to the original buffer when shifting fails.
//! * [`VoiceProfile`]: named factor range a cycle draws its factor from.
//!
//! # Quick start
//!
//! ```rust
//! use voice_morph::audio::AudioBuffer;
//! use voice_morph::pitch::{PitchTransform, ResampleShifter, DEFAULT_GAIN};
//!
//! let transform = PitchTransform::new(Box::new(ResampleShifter::default()), DEFAULT_GAIN);
//! let input = AudioBuffer::new(vec![0; 4_410], 44_100);
//! let output = transform.shift(input, 7.0);
//! assert_eq!(output.len(), 4_410);
//! ```

pub mod profile;
pub mod shifter;
pub mod transform;

pub use profile::VoiceProfile;
pub use shifter::{PitchShifter, ResampleShifter, ShiftError};
pub use transform::{normalize, rescale, PitchTransform, DEFAULT_GAIN};

#[cfg(test)]
pub use shifter::{FailingShifter, ScaleShifter};
