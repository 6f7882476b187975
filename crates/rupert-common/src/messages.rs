//! Messages exchanged between the core and its collaborators: overlay and
//! badge updates, speech engine events and user control requests.

use crate::protocol::{ActionResult, Utterance};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorState {
    Listening,
    Processing,
    Success,
    Error,
}

/// Core to overlay messages. Closed set; the overlay renders each variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UiMessage {
    ShowIndicator {
        state: IndicatorState,
        message: String,
    },
    UpdateStatus {
        state: IndicatorState,
        message: String,
    },
    HideIndicator,
    WakeWordDetected {
        phrase: String,
        confidence: f32,
    },
    CommandProcessed {
        command: String,
        result: ActionResult,
    },
    CommandError {
        command: String,
        message: String,
    },
    Status(SessionStatus),
}

impl UiMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            UiMessage::ShowIndicator { .. } => "SHOW_INDICATOR",
            UiMessage::UpdateStatus { .. } => "UPDATE_STATUS",
            UiMessage::HideIndicator => "HIDE_INDICATOR",
            UiMessage::WakeWordDetected { .. } => "WAKE_WORD_DETECTED",
            UiMessage::CommandProcessed { .. } => "COMMAND_PROCESSED",
            UiMessage::CommandError { .. } => "COMMAND_ERROR",
            UiMessage::Status(_) => "STATUS",
        }
    }
}

/// Toolbar badge. Text and colour match the extension's action badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Badge {
    Off,
    Idle,
    Listening,
}

impl Badge {
    pub fn text(&self) -> &'static str {
        match self {
            Badge::Off => "",
            Badge::Idle => "●",
            Badge::Listening => "👂",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Badge::Off => "#EF4444",
            Badge::Idle => "#1B365D",
            Badge::Listening => "#22C55E",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub enabled: bool,
    pub listening: bool,
    pub awake: bool,
    pub has_api_key: bool,
    pub mode: String,
    pub last_activity_at: u64,
}

/// Which recognizer instance a speech event or control belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    /// Continuous capture watching for the activation phrase.
    Wake,
    /// Single-shot capture of one command after activation.
    Command,
}

/// Recognition error codes as reported by the Web Speech API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpeechErrorKind {
    NotAllowed,
    NoSpeech,
    AudioCapture,
    Network,
    ServiceNotAllowed,
    BadGrammar,
    Aborted,
    #[serde(other)]
    Other,
}

impl SpeechErrorKind {
    pub fn message(&self) -> &'static str {
        match self {
            SpeechErrorKind::NotAllowed => "Microphone access denied",
            SpeechErrorKind::NoSpeech => "No speech detected",
            SpeechErrorKind::AudioCapture => "Microphone not available",
            SpeechErrorKind::Network => "Network error occurred",
            SpeechErrorKind::ServiceNotAllowed => "Speech service not allowed",
            SpeechErrorKind::BadGrammar => "Grammar error in recognition",
            SpeechErrorKind::Aborted => "Speech recognition aborted",
            SpeechErrorKind::Other => "Speech recognition error",
        }
    }

    /// Errors that make continued capture pointless until the user acts.
    pub fn is_permission_error(&self) -> bool {
        matches!(
            self,
            SpeechErrorKind::NotAllowed | SpeechErrorKind::ServiceNotAllowed
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SpeechEvent {
    Started {
        mode: CaptureMode,
    },
    Result {
        mode: CaptureMode,
        utterance: Utterance,
    },
    Error {
        mode: CaptureMode,
        error: SpeechErrorKind,
    },
    Ended {
        mode: CaptureMode,
    },
}

/// User-facing control requests (popup, REPL, keyboard shortcut).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    Enable,
    Disable,
    Toggle,
    GetStatus,
    SetApiKey { api_key: String },
    ClearApiKey,
    PermissionGranted,
    PermissionDenied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SpeechControl {
    Start { mode: CaptureMode },
    Stop { mode: CaptureMode },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ui_message_tags() {
        let msg = UiMessage::ShowIndicator {
            state: IndicatorState::Listening,
            message: "Listening for command...".into(),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "SHOW_INDICATOR");
        assert_eq!(value["state"], "listening");
        assert_eq!(msg.kind(), "SHOW_INDICATOR");

        let hide = serde_json::to_value(UiMessage::HideIndicator).unwrap();
        assert_eq!(hide, json!({"type": "HIDE_INDICATOR"}));
    }

    #[test]
    fn test_speech_error_codes() {
        let event: SpeechEvent = serde_json::from_value(json!({
            "event": "error", "mode": "wake", "error": "not-allowed"
        }))
        .unwrap();
        match event {
            SpeechEvent::Error { error, .. } => {
                assert!(error.is_permission_error());
                assert_eq!(error.message(), "Microphone access denied");
            }
            _ => panic!("Expected Error"),
        }

        let unknown: SpeechErrorKind = serde_json::from_value(json!("language-not-supported")).unwrap();
        assert_eq!(unknown, SpeechErrorKind::Other);
    }

    #[test]
    fn test_badges() {
        assert_eq!(Badge::Off.text(), "");
        assert_eq!(Badge::Listening.color(), "#22C55E");
    }

    #[test]
    fn test_control_wire_format() {
        let msg: ControlMessage =
            serde_json::from_value(json!({"type": "set_api_key", "api_key": "k"})).unwrap();
        assert_eq!(msg, ControlMessage::SetApiKey { api_key: "k".into() });
    }
}
