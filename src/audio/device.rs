//! Blocking audio device interface consumed by the capture and playback
//! sessions.
//!
//! [`AudioDevice`] is narrow: open/stop each direction, read a
//! fixed-size chunk, write a whole buffer, and report whether the output has
//! drained.  The production implementation is
//! [`CpalDevice`](crate::audio::CpalDevice); tests use `MockDevice`.

use thiserror::Error;

// ---------------------------------------------------------------------------
// AudioFormat
// ---------------------------------------------------------------------------

/// Fixed stream format: 16-bit signed PCM, mono.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    /// Sample rate in Hz (default 44 100).
    pub sample_rate: u32,
    /// Samples per `read_chunk` call (default 2048).
    pub chunk_size: usize,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            chunk_size: 2048,
        }
    }
}

// ---------------------------------------------------------------------------
// DeviceError
// ---------------------------------------------------------------------------

/// Failures reported by an [`AudioDevice`].
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no input device found on the default audio host")]
    NoInputDevice,

    #[error("no output device found on the default audio host")]
    NoOutputDevice,

    #[error("failed to query default stream config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("unsupported device sample format: {0:?}")]
    UnsupportedFormat(cpal::SampleFormat),

    #[error("failed to build audio stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("failed to pause audio stream: {0}")]
    PauseStream(#[from] cpal::PauseStreamError),

    #[error("input stream is not open")]
    InputNotOpen,

    #[error("output stream is not open")]
    OutputNotOpen,

    #[error("audio read failed: {0}")]
    Read(String),

    #[error("audio write failed: {0}")]
    Write(String),

    #[error("device is closed")]
    Closed,
}

// ---------------------------------------------------------------------------
// AudioDevice
// ---------------------------------------------------------------------------

/// Blocking, single-owner access to an input and an output stream.
///
/// Implementations must be `Send` so the controller can hand the device to
/// its worker thread.  All calls come from one thread at a time.
pub trait AudioDevice: Send {
    /// Format every chunk and buffer is exchanged in.
    fn format(&self) -> AudioFormat;

    /// Arm the input stream.  Calling it on an armed stream is a no-op.
    fn open_input(&mut self) -> Result<(), DeviceError>;

    /// Disarm the input stream.  Never fails; safe to call when not armed.
    fn stop_input(&mut self);

    /// Block until `frames` samples have been captured and return them.
    fn read_chunk(&mut self, frames: usize) -> Result<Vec<i16>, DeviceError>;

    /// Arm the output stream.
    fn open_output(&mut self) -> Result<(), DeviceError>;

    /// Disarm the output stream.
    fn stop_output(&mut self);

    /// Block until every sample has been handed to the output stream.
    fn write_all(&mut self, samples: &[i16]) -> Result<(), DeviceError>;

    /// `true` once the output stream has nothing left to play.
    fn is_idle(&self) -> bool;

    /// Stop both streams and release the device.  Idempotent.
    fn close(&mut self);
}

impl<D: AudioDevice + ?Sized> AudioDevice for Box<D> {
    fn format(&self) -> AudioFormat {
        (**self).format()
    }
    fn open_input(&mut self) -> Result<(), DeviceError> {
        (**self).open_input()
    }
    fn stop_input(&mut self) {
        (**self).stop_input()
    }
    fn read_chunk(&mut self, frames: usize) -> Result<Vec<i16>, DeviceError> {
        (**self).read_chunk(frames)
    }
    fn open_output(&mut self) -> Result<(), DeviceError> {
        (**self).open_output()
    }
    fn stop_output(&mut self) {
        (**self).stop_output()
    }
    fn write_all(&mut self, samples: &[i16]) -> Result<(), DeviceError> {
        (**self).write_all(samples)
    }
    fn is_idle(&self) -> bool {
        (**self).is_idle()
    }
    fn close(&mut self) {
        (**self).close()
    }
}

// ---------------------------------------------------------------------------
// MockDevice (test only)
// ---------------------------------------------------------------------------

#[cfg(test)]
pub use mock::{MockDevice, MockState, PlaybackGate};

#[cfg(test)]
mod mock {
    use std::collections::VecDeque;
    use std::sync::mpsc;
    use std::sync::{Arc, Mutex};

    use super::{AudioDevice, AudioFormat, DeviceError};

    /// Observable state of a [`MockDevice`], shared with the test via `Arc`.
    #[derive(Debug, Default)]
    pub struct MockState {
        /// Chunks returned by `read_chunk` in order; silence once exhausted.
        pub script: VecDeque<Result<Vec<i16>, String>>,
        pub input_armed: bool,
        pub output_armed: bool,
        pub input_opens: usize,
        pub reads: usize,
        pub written: Vec<i16>,
        pub writes: usize,
        pub fail_write: bool,
        /// `is_idle` answers `false` this many times after each write.
        pub busy_polls: usize,
        pub idle_polls: usize,
        pub closed: bool,
    }

    /// Handle used by a test to observe and release a held playback.
    pub struct PlaybackGate {
        pub entered: mpsc::Receiver<()>,
        pub release: mpsc::Sender<()>,
    }

    /// Scripted in-memory device.
    pub struct MockDevice {
        format: AudioFormat,
        state: Arc<Mutex<MockState>>,
        gate: Option<(mpsc::Sender<()>, mpsc::Receiver<()>)>,
        busy_remaining: usize,
    }

    impl MockDevice {
        pub fn new(format: AudioFormat) -> Self {
            Self {
                format,
                state: Arc::new(Mutex::new(MockState::default())),
                gate: None,
                busy_remaining: 0,
            }
        }

        /// Queue chunks for `read_chunk`.
        pub fn with_chunks(self, chunks: impl IntoIterator<Item = Vec<i16>>) -> Self {
            self.state.lock().unwrap().script.extend(chunks.into_iter().map(Ok));
            self
        }

        /// Queue a read failure after the chunks queued so far.
        pub fn with_read_error(self, message: &str) -> Self {
            self.state
                .lock()
                .unwrap()
                .script
                .push_back(Err(message.to_string()));
            self
        }

        /// Block every `write_all` until the returned gate is released.
        pub fn with_playback_gate(mut self) -> (Self, PlaybackGate) {
            let (entered_tx, entered_rx) = mpsc::channel();
            let (release_tx, release_rx) = mpsc::channel();
            self.gate = Some((entered_tx, release_rx));
            (
                self,
                PlaybackGate {
                    entered: entered_rx,
                    release: release_tx,
                },
            )
        }

        pub fn state(&self) -> Arc<Mutex<MockState>> {
            Arc::clone(&self.state)
        }
    }

    impl AudioDevice for MockDevice {
        fn format(&self) -> AudioFormat {
            self.format
        }

        fn open_input(&mut self) -> Result<(), DeviceError> {
            let mut st = self.state.lock().unwrap();
            if st.closed {
                return Err(DeviceError::Closed);
            }
            st.input_armed = true;
            st.input_opens += 1;
            Ok(())
        }

        fn stop_input(&mut self) {
            self.state.lock().unwrap().input_armed = false;
        }

        fn read_chunk(&mut self, frames: usize) -> Result<Vec<i16>, DeviceError> {
            let mut st = self.state.lock().unwrap();
            if !st.input_armed {
                return Err(DeviceError::InputNotOpen);
            }
            st.reads += 1;
            match st.script.pop_front() {
                Some(Ok(chunk)) => Ok(chunk),
                Some(Err(message)) => Err(DeviceError::Read(message)),
                None => Ok(vec![0; frames]),
            }
        }

        fn open_output(&mut self) -> Result<(), DeviceError> {
            let mut st = self.state.lock().unwrap();
            if st.closed {
                return Err(DeviceError::Closed);
            }
            st.output_armed = true;
            Ok(())
        }

        fn stop_output(&mut self) {
            self.state.lock().unwrap().output_armed = false;
        }

        fn write_all(&mut self, samples: &[i16]) -> Result<(), DeviceError> {
            if let Some((entered, release)) = &self.gate {
                let _ = entered.send(());
                let _ = release.recv();
            }
            let mut st = self.state.lock().unwrap();
            if !st.output_armed {
                return Err(DeviceError::OutputNotOpen);
            }
            st.writes += 1;
            if st.fail_write {
                return Err(DeviceError::Write("mock write failure".into()));
            }
            st.written.extend_from_slice(samples);
            st.idle_polls = 0;
            self.busy_remaining = st.busy_polls;
            Ok(())
        }

        fn is_idle(&self) -> bool {
            let mut st = self.state.lock().unwrap();
            st.idle_polls += 1;
            st.idle_polls > self.busy_remaining
        }

        fn close(&mut self) {
            let mut st = self.state.lock().unwrap();
            st.input_armed = false;
            st.output_armed = false;
            st.closed = true;
        }
    }
}
