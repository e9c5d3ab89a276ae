//! Voice cycle orchestration.
//!
//! # Architecture
//!
//! ```text
//! control thread                         worker thread ("voice-cycle")
//! ──────────────                         ─────────────────────────────
//! VoiceCycleController::start() ──spawn──▶ record → validate → shift → play
//!                       ::stop()  ── clears auto_restart (atomic)
//!                                                  │
//! EventReceiver::drain() ◀── EventSender ◀─────────┘  (FIFO, unbounded)
//! ```
//!
//! The control thread never touches the audio device while a cycle runs; it
//! only flips atomics and reads events.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use voice_morph::audio::CpalDevice;
//! use voice_morph::config::AppConfig;
//! use voice_morph::pipeline::{event_bridge, Event, VoiceCycleController};
//!
//! let config = AppConfig::load().unwrap();
//! let (tx, mut rx) = event_bridge();
//! let controller =
//!     VoiceCycleController::from_config(CpalDevice::new(config.format()).unwrap(), &config, tx);
//!
//! controller.start().unwrap();
//! loop {
//!     for event in rx.drain() {
//!         if let Event::StatusUpdate { text, .. } = event {
//!             println!("{text}");
//!         }
//!     }
//!     std::thread::sleep(Duration::from_millis(config.ui.poll_interval_ms));
//! }
//! ```

pub mod controller;
pub mod events;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use controller::{ControllerError, CycleSettings, VoiceCycleController};
pub use events::{event_bridge, Event, EventReceiver, EventSender};
pub use state::{AtomicState, ControllerState};
