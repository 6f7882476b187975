use crate::resolver::context::now_millis;
use rupert_common::messages::Badge;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Disabled,
    /// Waiting for the activation phrase.
    Listening,
    /// Activated; capturing one command.
    Awake,
}

impl Phase {
    pub fn badge(&self) -> Badge {
        match self {
            Phase::Disabled => Badge::Off,
            Phase::Listening => Badge::Idle,
            Phase::Awake => Badge::Listening,
        }
    }
}

/// The controller's view of the session. The flags are derived from the
/// phase, so `awake` implies `listening` implies `enabled`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionState {
    phase: Phase,
    last_activity_at: u64,
}

impl SessionState {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn enabled(&self) -> bool {
        self.phase != Phase::Disabled
    }

    pub fn listening(&self) -> bool {
        matches!(self.phase, Phase::Listening | Phase::Awake)
    }

    pub fn awake(&self) -> bool {
        self.phase == Phase::Awake
    }

    pub fn last_activity_at(&self) -> u64 {
        self.last_activity_at
    }

    /// Moves to `phase` and stamps the activity time.
    pub fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
        self.last_activity_at = now_millis();
    }

    pub fn persisted(&self) -> PersistedState {
        PersistedState {
            enabled: self.enabled(),
            listening: self.listening(),
            awake: self.awake(),
            last_activity_at: self.last_activity_at,
        }
    }

    /// A restored session always starts disabled; the caller re-enables it
    /// when `enabled` was set.
    pub fn restore(saved: &PersistedState) -> Self {
        Self {
            phase: Phase::Disabled,
            last_activity_at: saved.last_activity_at,
        }
    }
}

/// Storage form of [`SessionState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub listening: bool,
    #[serde(default)]
    pub awake: bool,
    #[serde(default)]
    pub last_activity_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_follow_phase() {
        let mut state = SessionState::default();
        assert!(!state.enabled() && !state.listening() && !state.awake());

        state.set_phase(Phase::Awake);
        assert!(state.enabled() && state.listening() && state.awake());
        assert!(state.last_activity_at() > 0);

        state.set_phase(Phase::Listening);
        assert!(state.enabled() && state.listening() && !state.awake());
    }

    #[test]
    fn test_persisted_shape() {
        let mut state = SessionState::default();
        state.set_phase(Phase::Listening);
        let value = serde_json::to_value(state.persisted()).unwrap();
        assert_eq!(value["enabled"], true);
        assert_eq!(value["awake"], false);
        assert!(value["lastActivityAt"].as_u64().is_some());
    }

    #[test]
    fn test_restore_starts_disabled() {
        let saved = PersistedState {
            enabled: true,
            listening: true,
            awake: true,
            last_activity_at: 42,
        };
        let state = SessionState::restore(&saved);
        assert_eq!(state.phase(), Phase::Disabled);
        assert_eq!(state.last_activity_at(), 42);
    }
}
