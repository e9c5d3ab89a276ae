//! Device lifecycle: capture and playback against one owned device until
//! termination.
//!
//! After [`AudioEngine::terminate`] (or drop) the device is closed and every
//! later `record`/`play` fails with `EngineTerminated` instead of touching
//! the closed device.  The termination flag is shared so another thread can
//! interrupt a capture between chunks without taking the engine lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::audio::buffer::AudioBuffer;
use crate::audio::capture::{CaptureError, CaptureSession};
use crate::audio::device::{AudioDevice, AudioFormat};
use crate::audio::playback::{Completion, PlaybackError, PlaybackSession};

pub struct AudioEngine<D: AudioDevice> {
    device: D,
    capture: CaptureSession,
    playback: PlaybackSession,
    terminated: Arc<AtomicBool>,
    closed: bool,
}

impl<D: AudioDevice> AudioEngine<D> {
    pub fn new(device: D, capture: CaptureSession, playback: PlaybackSession) -> Self {
        Self {
            device,
            capture,
            playback,
            terminated: Arc::new(AtomicBool::new(false)),
            closed: false,
        }
    }

    pub fn format(&self) -> AudioFormat {
        self.device.format()
    }

    /// Capture one utterance.
    pub fn record(&mut self) -> Result<AudioBuffer, CaptureError> {
        if self.is_terminated() {
            return Err(CaptureError::EngineTerminated);
        }
        self.capture.capture_until(&mut self.device, &self.terminated)
    }

    /// Play `buffer` to completion.
    pub fn play(&mut self, buffer: &AudioBuffer) -> Completion {
        if self.is_terminated() {
            return Completion::failed(PlaybackError::EngineTerminated);
        }
        self.playback.play(&mut self.device, buffer)
    }

    /// Flag that, once set, makes the engine refuse further work.  Setting
    /// it also aborts an in-progress capture at the next chunk boundary.
    pub fn termination_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.terminated)
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    /// Stop any active streams, close the device and mark the engine
    /// unusable.  Idempotent.
    pub fn terminate(&mut self) {
        self.terminated.store(true, Ordering::Release);
        if !self.closed {
            self.device.stop_input();
            self.device.stop_output();
            self.device.close();
            self.closed = true;
            log::info!("audio engine terminated");
        }
    }
}

impl<D: AudioDevice> Drop for AudioEngine<D> {
    fn drop(&mut self) {
        self.terminate();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
