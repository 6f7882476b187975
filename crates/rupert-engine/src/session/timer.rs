use super::SessionEvent;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// No command heard after activation.
    CommandTimeout,
    /// Result has been on screen long enough.
    HideStatus,
    /// Backoff before restarting wake capture after an error.
    RestartCapture,
}

/// The session's single pending timer. Arming replaces whatever was
/// pending; a fire whose generation no longer matches is stale.
#[derive(Debug, Default)]
pub struct TimerSlot {
    generation: u64,
    pending: Option<TimerKind>,
    handle: Option<JoinHandle<()>>,
}

impl TimerSlot {
    pub fn arm(
        &mut self,
        kind: TimerKind,
        delay: Duration,
        events: &UnboundedSender<SessionEvent>,
    ) -> u64 {
        self.cancel();
        let generation = self.generation;
        let events = events.clone();
        self.pending = Some(kind);
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(SessionEvent::Timer { generation, kind });
        }));
        trace!(?kind, generation, "timer armed");
        generation
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.pending = None;
        self.generation += 1;
    }

    pub fn pending(&self) -> Option<TimerKind> {
        self.pending
    }

    /// Accepts a fired timer if it is the one currently armed, clearing the
    /// slot.
    pub fn take_fired(&mut self, generation: u64, kind: TimerKind) -> bool {
        if generation != self.generation || self.pending != Some(kind) {
            return false;
        }
        self.pending = None;
        self.handle = None;
        true
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
