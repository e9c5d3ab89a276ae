//! Controller state machine values.
//!
//! [`ControllerState`] is written only by the worker thread and read from
//! anywhere through [`AtomicState`], a lock-free cell.

use std::sync::atomic::{AtomicU8, Ordering};

// ---------------------------------------------------------------------------
// ControllerState
// ---------------------------------------------------------------------------

/// States of the voice cycle.
///
/// The state machine transitions are:
///
/// ```text
/// Idle ──start()──▶ Recording ──capture done──▶ Validating
///                                  ├─ too short ──▶ Idle
///                                  └─▶ Shifting ──▶ Playing
///                                                    ├─ auto-restart ──▶ Recording
///                                                    └─▶ Idle
/// any active state ──device failure──▶ Error ──▶ Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControllerState {
    /// No worker running.
    #[default]
    Idle,
    /// Capturing an utterance.
    Recording,
    /// Checking the captured length.
    Validating,
    /// Running the pitch transform.
    Shifting,
    /// Playing the transformed audio.
    Playing,
    /// A device failure ended the cycle; always followed by `Idle`.
    Error,
}

impl ControllerState {
    /// Returns `true` while a cycle is in flight.
    ///
    /// ```
    /// use voice_morph::pipeline::ControllerState;
    ///
    /// assert!(!ControllerState::Idle.is_active());
    /// assert!(ControllerState::Recording.is_active());
    /// assert!(ControllerState::Playing.is_active());
    /// assert!(!ControllerState::Error.is_active());
    /// ```
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ControllerState::Recording
                | ControllerState::Validating
                | ControllerState::Shifting
                | ControllerState::Playing
        )
    }

    /// A short human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            ControllerState::Idle => "Idle",
            ControllerState::Recording => "Recording",
            ControllerState::Validating => "Validating",
            ControllerState::Shifting => "Shifting",
            ControllerState::Playing => "Playing",
            ControllerState::Error => "Error",
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            ControllerState::Idle => 0,
            ControllerState::Recording => 1,
            ControllerState::Validating => 2,
            ControllerState::Shifting => 3,
            ControllerState::Playing => 4,
            ControllerState::Error => 5,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => ControllerState::Recording,
            2 => ControllerState::Validating,
            3 => ControllerState::Shifting,
            4 => ControllerState::Playing,
            5 => ControllerState::Error,
            _ => ControllerState::Idle,
        }
    }
}

// ---------------------------------------------------------------------------
// AtomicState
// ---------------------------------------------------------------------------

/// Lock-free holder for a [`ControllerState`].
#[derive(Debug, Default)]
pub struct AtomicState(AtomicU8);

impl AtomicState {
    pub fn new(state: ControllerState) -> Self {
        Self(AtomicU8::new(state.to_u8()))
    }

    pub fn load(&self) -> ControllerState {
        ControllerState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, state: ControllerState) {
        self.0.store(state.to_u8(), Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ControllerState; 6] = [
        ControllerState::Idle,
        ControllerState::Recording,
        ControllerState::Validating,
        ControllerState::Shifting,
        ControllerState::Playing,
        ControllerState::Error,
    ];

    #[test]
    fn default_is_idle() {
        assert_eq!(ControllerState::default(), ControllerState::Idle);
        assert_eq!(AtomicState::default().load(), ControllerState::Idle);
    }

    #[test]
    fn atomic_state_stores_every_variant() {
        let cell = AtomicState::new(ControllerState::Idle);
        for s in ALL {
            cell.store(s);
            assert_eq!(cell.load(), s);
        }
    }

    #[test]
    fn only_pipeline_stages_are_active() {
        let active: Vec<_> = ALL.iter().filter(|s| s.is_active()).collect();
        assert_eq!(active.len(), 4);
        assert!(!ControllerState::Error.is_active());
    }

    #[test]
    fn labels() {
        assert_eq!(ControllerState::Idle.label(), "Idle");
        assert_eq!(ControllerState::Validating.label(), "Validating");
        assert_eq!(ControllerState::Error.label(), "Error");
    }

    #[test]
    fn atomic_state_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AtomicState>();
    }
}
