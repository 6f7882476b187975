//! The listening session: wake detection, command capture, interpretation
//! and dispatch, driven by one event loop.

pub mod controller;
pub mod state;
pub mod timer;

pub use controller::{SessionController, SessionParts};
pub use state::{Phase, PersistedState, SessionState};
pub use timer::{TimerKind, TimerSlot};

use rupert_common::messages::{ControlMessage, SpeechEvent};
use rupert_common::protocol::Intent;
use tokio::sync::mpsc;

/// Everything the controller reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Control(ControlMessage),
    Speech(SpeechEvent),
    Timer {
        generation: u64,
        kind: TimerKind,
    },
    /// An interpretation task finished.
    Interpreted {
        generation: u64,
        command: String,
        intent: Intent,
    },
    Shutdown,
}

/// Cloneable sender into a running controller.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionHandle {
    pub(crate) fn new(tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { tx }
    }

    /// Returns false once the controller has stopped.
    pub fn send(&self, event: SessionEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn control(&self, message: ControlMessage) -> bool {
        self.send(SessionEvent::Control(message))
    }

    pub fn speech(&self, event: SpeechEvent) -> bool {
        self.send(SessionEvent::Speech(event))
    }

    pub fn shutdown(&self) -> bool {
        self.send(SessionEvent::Shutdown)
    }
}
