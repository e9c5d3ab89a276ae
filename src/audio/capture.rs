//! Utterance capture: read chunks until the speaker stops talking.
//!
//! [`CaptureSession::capture`] arms the input stream, pulls fixed-size
//! chunks through a fresh [`SilenceDetector`], and returns every chunk it
//! read (trailing silence included) as one [`AudioBuffer`].  The input
//! stream is always disarmed before returning, on success and on failure.

use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

use crate::audio::buffer::AudioBuffer;
use crate::audio::device::{AudioDevice, DeviceError};
use crate::audio::silence::{SilenceConfig, SilenceDetector};

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that abort a capture.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to open input stream: {0}")]
    Open(#[source] DeviceError),

    #[error("error during recording: {0}")]
    Read(#[source] DeviceError),

    #[error("audio engine terminated")]
    EngineTerminated,
}

// ---------------------------------------------------------------------------
// CaptureSession
// ---------------------------------------------------------------------------

/// Reads one utterance from an [`AudioDevice`].
#[derive(Debug, Clone)]
pub struct CaptureSession {
    silence: SilenceConfig,
    /// Hard cap on captured samples; `None` means unbounded.
    max_samples: Option<usize>,
}

impl CaptureSession {
    pub fn new(silence: SilenceConfig) -> Self {
        Self {
            silence,
            max_samples: None,
        }
    }

    /// Stop capturing once at least `max_samples` have been read, even if
    /// the speaker has not gone quiet.
    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = Some(max_samples);
        self
    }

    /// Capture one utterance.
    ///
    /// # Errors
    ///
    /// [`CaptureError::Open`] when the input stream cannot be armed,
    /// [`CaptureError::Read`] when a chunk read fails.
    pub fn capture<D: AudioDevice + ?Sized>(
        &self,
        device: &mut D,
    ) -> Result<AudioBuffer, CaptureError> {
        self.capture_until(device, &AtomicBool::new(false))
    }

    /// Like [`capture`](Self::capture), but checks `terminated` before every
    /// read and aborts with [`CaptureError::EngineTerminated`] once it is set.
    pub fn capture_until<D: AudioDevice + ?Sized>(
        &self,
        device: &mut D,
        terminated: &AtomicBool,
    ) -> Result<AudioBuffer, CaptureError> {
        if terminated.load(Ordering::Acquire) {
            return Err(CaptureError::EngineTerminated);
        }

        device.open_input().map_err(CaptureError::Open)?;
        let result = self.read_utterance(device, terminated);
        device.stop_input();

        if let Ok(buf) = &result {
            log::debug!(
                "capture: {} samples ({:.2}s)",
                buf.len(),
                buf.duration_secs()
            );
        }
        result
    }

    fn read_utterance<D: AudioDevice + ?Sized>(
        &self,
        device: &mut D,
        terminated: &AtomicBool,
    ) -> Result<AudioBuffer, CaptureError> {
        let format = device.format();
        let mut detector = SilenceDetector::new(self.silence);
        let mut samples: Vec<i16> = Vec::new();

        loop {
            if terminated.load(Ordering::Acquire) {
                return Err(CaptureError::EngineTerminated);
            }

            let chunk = device
                .read_chunk(format.chunk_size)
                .map_err(CaptureError::Read)?;
            let finished = detector.observe(&chunk);
            samples.extend_from_slice(&chunk);

            if finished {
                break;
            }
            if let Some(max) = self.max_samples {
                if samples.len() >= max {
                    log::info!("capture: reached maximum utterance length ({max} samples)");
                    break;
                }
            }
        }

        Ok(AudioBuffer::new(samples, format.sample_rate))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
