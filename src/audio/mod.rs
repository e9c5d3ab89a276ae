//! Audio device access with utterance capture and playback.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → CpalDevice::read_chunk ─┐
//!                                                      ▼
//!                     CaptureSession (SilenceDetector per chunk) → AudioBuffer
//!
//! AudioBuffer → PlaybackSession → CpalDevice::write_all → wait idle → Completion
//! ```
//!
//! [`AudioEngine`] owns the device for its whole lifetime and refuses work
//! once terminated.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use voice_morph::audio::{
//!     AudioEngine, AudioFormat, CaptureSession, CpalDevice, PlaybackSession, SilenceConfig,
//! };
//!
//! let format = AudioFormat::default();
//! let device = CpalDevice::new(format).unwrap();
//! let silence = SilenceConfig::from_duration(1000, format.sample_rate, format.chunk_size, 1.0);
//! let mut engine = AudioEngine::new(
//!     device,
//!     CaptureSession::new(silence),
//!     PlaybackSession::default(),
//! );
//!
//! let utterance = engine.record().unwrap();
//! let done = engine.play(&utterance);
//! assert!(done.is_ok());
//! ```

pub mod backend;
pub mod buffer;
pub mod capture;
pub mod device;
pub mod engine;
pub mod playback;
pub mod silence;

pub use backend::CpalDevice;
pub use buffer::{AudioBuffer, BufferError};
pub use capture::{CaptureError, CaptureSession};
pub use device::{AudioDevice, AudioFormat, DeviceError};
pub use engine::AudioEngine;
pub use playback::{Completion, PlaybackError, PlaybackSession};
pub use silence::{SilenceConfig, SilenceDetector};

#[cfg(test)]
pub use device::{MockDevice, MockState, PlaybackGate};
