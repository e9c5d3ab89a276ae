//! Ordered worker → control-thread event queue.
//!
//! The worker pushes [`Event`]s in the order it produces them; the control
//! thread drains them on its own schedule with [`EventReceiver::drain`]
//! (non-blocking) or awaits them with [`EventReceiver::recv`].  Backed by an
//! unbounded `tokio::sync::mpsc` channel, whose sender is usable from plain
//! threads.

use tokio::sync::mpsc;

use super::state::ControllerState;

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// Status and UI updates delivered from the worker.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// New status line; `is_talking` selects the "talking" avatar.
    StatusUpdate { is_talking: bool, text: String },
    /// New label for the start/stop control.
    ButtonUpdate { label: String },
    /// Playback finished and a new capture is starting.
    Restart,
    /// The controller moved to a new state.
    StateChanged(ControllerState),
}

impl Event {
    pub fn status(is_talking: bool, text: impl Into<String>) -> Self {
        Event::StatusUpdate {
            is_talking,
            text: text.into(),
        }
    }

    pub fn button(label: impl Into<String>) -> Self {
        Event::ButtonUpdate {
            label: label.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Channel ends
// ---------------------------------------------------------------------------

/// Producer end.  Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventSender(mpsc::UnboundedSender<Event>);

/// Single consumer end.
#[derive(Debug)]
pub struct EventReceiver(mpsc::UnboundedReceiver<Event>);

/// Create a connected sender/receiver pair.
pub fn event_bridge() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender(tx), EventReceiver(rx))
}

impl EventSender {
    /// Push an event.  Events sent after the receiver is gone are dropped.
    pub fn send(&self, event: Event) {
        if self.0.send(event).is_err() {
            log::debug!("event receiver dropped; discarding event");
        }
    }
}

impl EventReceiver {
    /// Next pending event, if any.  Never blocks.
    pub fn try_next(&mut self) -> Option<Event> {
        self.0.try_recv().ok()
    }

    /// Every pending event, oldest first.  Never blocks.
    pub fn drain(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = self.0.try_recv() {
            events.push(event);
        }
        events
    }

    /// Wait for the next event; `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<Event> {
        self.0.recv().await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
