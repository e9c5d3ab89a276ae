//! Voice cycle controller: runs capture → shift → playback on one worker
//! thread and reports progress through the event queue.
//!
//! # Cycle
//!
//! ```text
//! start()
//!   └─▶ spawn worker ─┐
//!                     ▼
//!        Recording ── AudioEngine::record ───────────── Err ─▶ Error ─▶ Idle
//!            │
//!        Validating ── len < min_samples ─▶ "no input" ─▶ Idle
//!            │
//!        Shifting ── PitchTransform::shift (never fails)
//!            │
//!        Playing ── AudioEngine::play ─── Completion Err ─▶ Error ─▶ Idle
//!            │
//!            ├─ auto_restart set ─▶ Event::Restart ─▶ Recording
//!            └─ cleared          ─▶ "Ready" ─▶ Idle
//! ```
//!
//! `stop()` only clears `auto_restart`; the cycle in flight runs to its end.
//! `terminate()` aborts a capture between chunks, joins the worker and closes
//! the device.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;

use crate::audio::{
    AudioBuffer, AudioDevice, AudioEngine, CaptureSession, PlaybackSession,
};
use crate::config::AppConfig;
use crate::pitch::{PitchTransform, ResampleShifter, VoiceProfile};

use super::events::{Event, EventSender};
use super::state::{AtomicState, ControllerState};

const RECORDING_TEXT: &str = "Recording...";
const PLAYING_TEXT: &str = "Playing...";
const READY_TEXT: &str = "Ready";
const NO_INPUT_TEXT: &str = "No input detected, press Start to try again";

// ---------------------------------------------------------------------------
// ControllerError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("controller has been terminated")]
    Terminated,
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("worker panicked: {0}")]
    WorkerPanic(String),
}

// ---------------------------------------------------------------------------
// CycleSettings
// ---------------------------------------------------------------------------

/// Per-cycle parameters that are not owned by the audio engine.
#[derive(Debug, Clone)]
pub struct CycleSettings {
    /// Profile each cycle draws its pitch factor from.
    pub profile: VoiceProfile,
    /// Captures shorter than this count as "no input".
    pub min_samples: usize,
    /// Button label while idle.
    pub start_label: String,
    /// Button label while a cycle runs.
    pub stop_label: String,
}

impl CycleSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            profile: config.active_profile(),
            min_samples: config.min_utterance_samples(),
            start_label: config.ui.start_label.clone(),
            stop_label: config.ui.stop_label.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// VoiceCycleController
// ---------------------------------------------------------------------------

/// Owns the audio engine and at most one worker thread.
///
/// ```rust,no_run
/// use voice_morph::audio::CpalDevice;
/// use voice_morph::config::AppConfig;
/// use voice_morph::pipeline::{event_bridge, VoiceCycleController};
///
/// let config = AppConfig::default();
/// let device = CpalDevice::new(config.format()).unwrap();
/// let (tx, mut rx) = event_bridge();
/// let controller = VoiceCycleController::from_config(device, &config, tx);
///
/// controller.start().unwrap();
/// for event in rx.drain() {
///     println!("{event:?}");
/// }
/// controller.terminate();
/// ```
pub struct VoiceCycleController<D: AudioDevice + 'static> {
    shared: Arc<Shared<D>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// State touched by both the control thread and the worker.
struct Shared<D: AudioDevice> {
    engine: Mutex<AudioEngine<D>>,
    terminated: Arc<AtomicBool>,
    transform: PitchTransform,
    settings: CycleSettings,
    state: AtomicState,
    processing: AtomicBool,
    auto_restart: AtomicBool,
    events: EventSender,
}

/// What the worker does after a cycle.
enum Next {
    Restart,
    Settle,
}

impl<D: AudioDevice + 'static> VoiceCycleController<D> {
    pub fn new(
        engine: AudioEngine<D>,
        transform: PitchTransform,
        settings: CycleSettings,
        events: EventSender,
    ) -> Self {
        let terminated = engine.termination_flag();
        Self {
            shared: Arc::new(Shared {
                engine: Mutex::new(engine),
                terminated,
                transform,
                settings,
                state: AtomicState::default(),
                processing: AtomicBool::new(false),
                auto_restart: AtomicBool::new(false),
                events,
            }),
            worker: Mutex::new(None),
        }
    }

    /// Wire a device into an engine, transform and controller using `config`.
    pub fn from_config(device: D, config: &AppConfig, events: EventSender) -> Self {
        let capture =
            CaptureSession::new(config.silence()).with_max_samples(config.max_utterance_samples());
        let playback = PlaybackSession::new(
            Duration::from_millis(config.playback.drain_poll_ms),
            Duration::from_secs(config.playback.drain_timeout_secs),
        );
        let engine = AudioEngine::new(device, capture, playback);
        let transform = PitchTransform::new(
            Box::new(ResampleShifter::new(
                config.pitch.effective_grain_size(config.audio.sample_rate),
            )),
            config.pitch.effective_gain(),
        );
        Self::new(engine, transform, CycleSettings::from_config(config), events)
    }

    // -----------------------------------------------------------------------
    // Control-thread API
    // -----------------------------------------------------------------------

    /// Begin cycling with auto-restart enabled.
    ///
    /// Returns `Ok(false)` without side effects when a worker is already
    /// running.
    pub fn start(&self) -> Result<bool, ControllerError> {
        if self.shared.terminated.load(Ordering::Acquire) {
            return Err(ControllerError::Terminated);
        }
        if self
            .shared
            .processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::warn!("controller: start ignored, a cycle is already running");
            return Ok(false);
        }

        self.shared.auto_restart.store(true, Ordering::Release);
        self.shared
            .events
            .send(Event::button(self.shared.settings.stop_label.clone()));

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("voice-cycle".into())
            .spawn(move || shared.run());

        match spawned {
            Ok(handle) => {
                // The previous worker, if any, has already cleared `processing`.
                if let Some(previous) = self.worker_slot().replace(handle) {
                    if previous.join().is_err() {
                        log::error!("controller: previous worker panicked");
                    }
                }
                log::debug!("controller: worker started");
                Ok(true)
            }
            Err(e) => {
                self.shared.auto_restart.store(false, Ordering::Release);
                self.shared.processing.store(false, Ordering::Release);
                self.shared
                    .events
                    .send(Event::button(self.shared.settings.start_label.clone()));
                Err(ControllerError::Spawn(e))
            }
        }
    }

    /// Let the current cycle finish and then settle in `Idle`.
    ///
    /// Returns `true` if a cycle was running.
    pub fn stop(&self) -> bool {
        self.shared.auto_restart.store(false, Ordering::Release);
        let running = self.is_processing();
        if running {
            log::info!("controller: stop requested, finishing current cycle");
        }
        running
    }

    /// Block until the current worker, if any, has exited.
    pub fn join(&self) {
        let handle = self.worker_slot().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!("controller: worker panicked");
            }
        }
    }

    /// Abort any capture, wait for the worker and close the device.
    /// Idempotent; `start` fails afterwards.
    pub fn terminate(&self) {
        self.shared.auto_restart.store(false, Ordering::Release);
        self.shared.terminated.store(true, Ordering::Release);
        self.join();
        self.shared.lock_engine().terminate();
    }

    pub fn state(&self) -> ControllerState {
        self.shared.state.load()
    }

    pub fn is_processing(&self) -> bool {
        self.shared.processing.load(Ordering::Acquire)
    }

    pub fn is_auto_restart(&self) -> bool {
        self.shared.auto_restart.load(Ordering::Acquire)
    }

    pub fn profile(&self) -> &VoiceProfile {
        &self.shared.settings.profile
    }

    fn worker_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<D: AudioDevice + 'static> Drop for VoiceCycleController<D> {
    fn drop(&mut self) {
        self.terminate();
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

impl<D: AudioDevice> Shared<D> {
    fn run(&self) {
        loop {
            // A panicking cycle still has to release `processing` and reach Idle.
            let next = panic::catch_unwind(AssertUnwindSafe(|| self.cycle()))
                .unwrap_or_else(|payload| {
                    self.fail(&ControllerError::WorkerPanic(panic_message(&*payload)))
                });
            match next {
                Next::Restart => {
                    self.events.send(Event::Restart);
                    log::debug!("controller: auto-restart");
                }
                Next::Settle => break,
            }
        }
        self.processing.store(false, Ordering::Release);
    }

    fn cycle(&self) -> Next {
        let mut engine = self.lock_engine();

        self.enter(ControllerState::Recording);
        self.events.send(Event::status(false, RECORDING_TEXT));
        let captured = match engine.record() {
            Ok(buffer) => buffer,
            Err(e) => return self.fail(&e),
        };

        self.enter(ControllerState::Validating);
        if captured.len() < self.settings.min_samples {
            log::info!(
                "controller: {} samples captured, below the {} sample minimum",
                captured.len(),
                self.settings.min_samples
            );
            self.events.send(Event::status(false, NO_INPUT_TEXT));
            return self.settle();
        }

        self.enter(ControllerState::Shifting);
        let shifted = self.shift(captured);

        self.enter(ControllerState::Playing);
        let completion = engine.play(&shifted);
        drop(engine);
        if let Err(e) = completion.result {
            return self.fail(&e);
        }
        log::debug!(
            "controller: playback complete ({} samples)",
            completion.samples_written
        );

        if self.auto_restart.load(Ordering::Acquire) {
            Next::Restart
        } else {
            self.events.send(Event::status(false, READY_TEXT));
            self.settle()
        }
    }

    fn shift(&self, captured: AudioBuffer) -> AudioBuffer {
        let factor = self.settings.profile.pick_factor(&mut rand::thread_rng());
        log::debug!(
            "controller: profile '{}' picked {factor:+.2} semitones",
            self.settings.profile.name
        );
        self.events.send(Event::status(true, PLAYING_TEXT));
        self.transform.shift(captured, factor)
    }

    /// Report a fatal cycle error and settle.
    fn fail(&self, error: &dyn std::error::Error) -> Next {
        log::error!("controller: cycle failed: {error}");
        self.enter(ControllerState::Error);
        self.events.send(Event::status(false, format!("Error: {error}")));
        self.settle()
    }

    fn settle(&self) -> Next {
        self.auto_restart.store(false, Ordering::Release);
        self.events
            .send(Event::button(self.settings.start_label.clone()));
        self.enter(ControllerState::Idle);
        Next::Settle
    }

    fn enter(&self, state: ControllerState) {
        log::debug!("controller: → {}", state.label());
        self.state.store(state);
        self.events.send(Event::StateChanged(state));
    }

    fn lock_engine(&self) -> MutexGuard<'_, AudioEngine<D>> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
