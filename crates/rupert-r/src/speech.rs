use crate::server::BridgeHandle;
use async_trait::async_trait;
use rupert_common::messages::{CaptureMode, SpeechControl};
use rupert_common::protocol::BridgeOutbound;
use rupert_engine::speech::{SpeechEngine, SpeechError};
use tracing::debug;

/// Drives the extension's recognizers. Results come back as bridge events.
pub struct RemoteSpeech {
    handle: BridgeHandle,
}

impl RemoteSpeech {
    pub fn new(handle: BridgeHandle) -> Self {
        Self { handle }
    }

    fn control(&self, control: SpeechControl) -> Result<(), SpeechError> {
        debug!(?control, "speech control");
        self.handle
            .send(BridgeOutbound::Speech { control })
            .map_err(|e| SpeechError::Bridge(e.to_string()))
    }
}

#[async_trait]
impl SpeechEngine for RemoteSpeech {
    async fn start(&mut self, mode: CaptureMode) -> Result<(), SpeechError> {
        self.control(SpeechControl::Start { mode })
    }

    async fn stop(&mut self, mode: CaptureMode) -> Result<(), SpeechError> {
        self.control(SpeechControl::Stop { mode })
    }
}
