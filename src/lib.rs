//! voice-morph: record an utterance, pitch-shift it and play it back, in a
//! loop.
//!
//! * [`audio`]: device abstraction, silence-terminated capture, playback.
//! * [`pitch`]: duration-preserving pitch shifting and voice profiles.
//! * [`pipeline`]: the worker-thread cycle controller and its event queue.
//! * [`config`]: TOML settings.

pub mod audio;
pub mod config;
pub mod pipeline;
pub mod pitch;
