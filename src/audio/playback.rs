//! Blocking playback with an explicit completion value.
//!
//! [`PlaybackSession::play`] always follows the same order:
//!
//! ```text
//! open_output → write_all → poll is_idle until drained → stop_output → Completion
//! ```
//!
//! The returned [`Completion`] is produced exactly once per call, after the
//! device has drained, and also when the write fails, so the caller is never
//! left waiting.

use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::audio::buffer::AudioBuffer;
use crate::audio::device::{AudioDevice, DeviceError};

// ---------------------------------------------------------------------------
// PlaybackError
// ---------------------------------------------------------------------------

/// Errors carried by a failed [`Completion`].
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("failed to open output stream: {0}")]
    Open(#[source] DeviceError),

    #[error("error during playback: {0}")]
    Write(#[source] DeviceError),

    #[error("output did not drain within {0:?}")]
    DrainTimeout(Duration),

    #[error("audio engine terminated")]
    EngineTerminated,
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

/// Outcome of one playback.
#[derive(Debug)]
pub struct Completion {
    /// Samples handed to the device (0 when the write failed).
    pub samples_written: usize,
    pub result: Result<(), PlaybackError>,
}

impl Completion {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub(crate) fn failed(error: PlaybackError) -> Self {
        Self {
            samples_written: 0,
            result: Err(error),
        }
    }
}

// ---------------------------------------------------------------------------
// PlaybackSession
// ---------------------------------------------------------------------------

/// Plays whole buffers on an [`AudioDevice`].
#[derive(Debug, Clone)]
pub struct PlaybackSession {
    poll_interval: Duration,
    drain_timeout: Duration,
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), Duration::from_secs(10))
    }
}

impl PlaybackSession {
    /// * `poll_interval`: sleep between `is_idle` checks.
    /// * `drain_timeout`: give up waiting for the device after this long.
    pub fn new(poll_interval: Duration, drain_timeout: Duration) -> Self {
        Self {
            poll_interval,
            drain_timeout,
        }
    }

    /// Play `buffer` and block until the device reports idle.
    pub fn play<D: AudioDevice + ?Sized>(&self, device: &mut D, buffer: &AudioBuffer) -> Completion {
        if let Err(e) = device.open_output() {
            return Completion::failed(PlaybackError::Open(e));
        }

        let completion = match device.write_all(buffer.samples()) {
            Ok(()) => Completion {
                samples_written: buffer.len(),
                result: self.wait_idle(device),
            },
            Err(e) => Completion::failed(PlaybackError::Write(e)),
        };

        device.stop_output();
        log::debug!(
            "playback: {} samples, ok={}",
            completion.samples_written,
            completion.is_ok()
        );
        completion
    }

    fn wait_idle<D: AudioDevice + ?Sized>(&self, device: &D) -> Result<(), PlaybackError> {
        let started = Instant::now();
        while !device.is_idle() {
            if started.elapsed() >= self.drain_timeout {
                return Err(PlaybackError::DrainTimeout(self.drain_timeout));
            }
            thread::sleep(self.poll_interval);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::device::{AudioFormat, MockDevice};

    fn session() -> PlaybackSession {
        PlaybackSession::new(Duration::from_millis(1), Duration::from_millis(500))
    }

    fn buffer() -> AudioBuffer {
        AudioBuffer::new(vec![1, -2, 3, -4, 5], 8_000)
    }

    #[test]
    fn writes_whole_buffer_and_completes() {
        let mut device = MockDevice::new(AudioFormat::default());
        let state = device.state();

        let completion = session().play(&mut device, &buffer());

        assert!(completion.is_ok());
        assert_eq!(completion.samples_written, 5);
        let st = state.lock().unwrap();
        assert_eq!(st.written, vec![1, -2, 3, -4, 5]);
        assert_eq!(st.writes, 1);
        assert!(!st.output_armed);
    }

    #[test]
    fn completes_only_after_device_drains() {
        let mut device = MockDevice::new(AudioFormat::default());
        let state = device.state();
        state.lock().unwrap().busy_polls = 3;

        let completion = session().play(&mut device, &buffer());

        assert!(completion.is_ok());
        // Three "busy" answers, then the "idle" one.
        assert_eq!(state.lock().unwrap().idle_polls, 4);
    }

    #[test]
    fn write_failure_still_completes() {
        let mut device = MockDevice::new(AudioFormat::default());
        let state = device.state();
        state.lock().unwrap().fail_write = true;

        let completion = session().play(&mut device, &buffer());

        assert!(matches!(completion.result, Err(PlaybackError::Write(_))));
        assert_eq!(completion.samples_written, 0);
        assert!(!state.lock().unwrap().output_armed);
    }

    #[test]
    fn drain_timeout_is_reported() {
        let mut device = MockDevice::new(AudioFormat::default());
        let state = device.state();
        state.lock().unwrap().busy_polls = usize::MAX;

        let completion = PlaybackSession::new(Duration::from_millis(1), Duration::from_millis(5))
            .play(&mut device, &buffer());

        assert!(matches!(
            completion.result,
            Err(PlaybackError::DrainTimeout(_))
        ));
    }

    #[test]
    fn closed_device_fails_to_open() {
        let mut device = MockDevice::new(AudioFormat::default());
        device.close();

        let completion = session().play(&mut device, &buffer());

        assert!(matches!(
            completion.result,
            Err(PlaybackError::Open(DeviceError::Closed))
        ));
    }
}
