//! Speech-to-text seam.
//!
//! Engines are started and stopped by the session controller; what they
//! hear comes back as [`SpeechEvent`]s on the session channel.

use async_trait::async_trait;
use rupert_common::messages::CaptureMode;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SpeechError {
    #[error("Microphone access denied")]
    PermissionDenied,
    #[error("Speech recognition unavailable: {0}")]
    Unavailable(String),
    #[error("Speech bridge error: {0}")]
    Bridge(String),
}

#[async_trait]
pub trait SpeechEngine: Send + Sync {
    async fn start(&mut self, mode: CaptureMode) -> Result<(), SpeechError>;
    async fn stop(&mut self, mode: CaptureMode) -> Result<(), SpeechError>;
}

/// Capture state shared between a [`ConsoleSpeech`] and whoever feeds it
/// typed lines.
#[derive(Debug, Clone, Default)]
pub struct CaptureState {
    inner: Arc<Mutex<(bool, bool)>>,
}

impl CaptureState {
    /// The capture that should receive the next line. Command capture wins
    /// while both are running.
    pub fn current(&self) -> Option<CaptureMode> {
        let Ok(guard) = self.inner.lock() else {
            return None;
        };
        match *guard {
            (_, true) => Some(CaptureMode::Command),
            (true, false) => Some(CaptureMode::Wake),
            _ => None,
        }
    }

    fn set(&self, mode: CaptureMode, running: bool) {
        if let Ok(mut guard) = self.inner.lock() {
            match mode {
                CaptureMode::Wake => guard.0 = running,
                CaptureMode::Command => guard.1 = running,
            }
        }
    }
}

/// Text "recognizer" for the REPL and transcript files: each typed line is a
/// final utterance for whichever capture is running.
#[derive(Debug, Clone, Default)]
pub struct ConsoleSpeech {
    state: CaptureState,
}

impl ConsoleSpeech {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CaptureState {
        self.state.clone()
    }
}

#[async_trait]
impl SpeechEngine for ConsoleSpeech {
    async fn start(&mut self, mode: CaptureMode) -> Result<(), SpeechError> {
        debug!(?mode, "Console capture started");
        self.state.set(mode, true);
        Ok(())
    }

    async fn stop(&mut self, mode: CaptureMode) -> Result<(), SpeechError> {
        debug!(?mode, "Console capture stopped");
        self.state.set(mode, false);
        Ok(())
    }
}
