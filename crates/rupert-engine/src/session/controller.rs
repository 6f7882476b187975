use super::state::{Phase, PersistedState, SessionState};
use super::timer::{TimerKind, TimerSlot};
use super::{SessionEvent, SessionHandle};
use crate::backend::Browser;
use crate::config::loader::validate_api_key;
use crate::config::schema::SessionConfig;
use crate::dispatcher::{CommandDispatcher, DispatchConfig};
use crate::interpreter::Interpreter;
use crate::resolver::context::{BrowserContext, CommandHistory};
use crate::speech::{SpeechEngine, SpeechError};
use crate::storage::{API_KEY_KEY, KeyValueStore, SESSION_STATE_KEY};
use crate::ui::UiSink;
use crate::wake::{WakeConfig, WakeWordMatcher, command_after_wake};
use rupert_common::messages::{
    CaptureMode, ControlMessage, IndicatorState, SessionStatus, SpeechErrorKind, SpeechEvent,
    UiMessage,
};
use rupert_common::protocol::{Intent, Utterance, WakeDetection};
use rupert_common::sites::host_of;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Collaborators the controller drives.
pub struct SessionParts {
    pub browser: Box<dyn Browser>,
    pub speech: Box<dyn SpeechEngine>,
    pub ui: Arc<dyn UiSink>,
    pub store: Arc<dyn KeyValueStore>,
    pub interpreter: Arc<Interpreter>,
}

struct InFlight {
    generation: u64,
    task: JoinHandle<()>,
}

/// Owns the session state and every transition of it. All mutation happens
/// inside [`SessionController::run`] (or [`SessionController::step`]);
/// interpretation is the only work that leaves the loop, and it reports
/// back as [`SessionEvent::Interpreted`].
pub struct SessionController {
    config: SessionConfig,
    state: SessionState,
    browser: Box<dyn Browser>,
    speech: Box<dyn SpeechEngine>,
    ui: Arc<dyn UiSink>,
    store: Arc<dyn KeyValueStore>,
    interpreter: Arc<Interpreter>,
    dispatcher: CommandDispatcher,
    wake: WakeWordMatcher,
    history: CommandHistory,
    timer: TimerSlot,
    in_flight: Option<InFlight>,
    next_generation: u64,
    tx: mpsc::UnboundedSender<SessionEvent>,
    rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl SessionController {
    pub fn new(
        parts: SessionParts,
        config: SessionConfig,
        wake: WakeConfig,
        dispatch: DispatchConfig,
    ) -> (Self, SessionHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = SessionHandle::new(tx.clone());
        let controller = Self {
            config,
            state: SessionState::default(),
            browser: parts.browser,
            speech: parts.speech,
            ui: parts.ui,
            store: parts.store,
            interpreter: parts.interpreter,
            dispatcher: CommandDispatcher::new(dispatch),
            wake: WakeWordMatcher::new(wake),
            history: CommandHistory::default(),
            timer: TimerSlot::default(),
            in_flight: None,
            next_generation: 0,
            tx,
            rx,
        };
        (controller, handle)
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle::new(self.tx.clone())
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn history(&self) -> &CommandHistory {
        &self.history
    }

    pub fn pending_timer(&self) -> Option<TimerKind> {
        self.timer.pending()
    }

    pub fn interpreter(&self) -> &Arc<Interpreter> {
        &self.interpreter
    }

    pub fn is_interpreting(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            enabled: self.state.enabled(),
            listening: self.state.listening(),
            awake: self.state.awake(),
            has_api_key: self.interpreter.resolver().is_configured(),
            mode: self.interpreter.mode().to_string(),
            last_activity_at: self.state.last_activity_at(),
        }
    }

    /// Restores the stored API key and session, then processes events until
    /// a [`SessionEvent::Shutdown`]. Hands the browser back so the caller can
    /// close it.
    pub async fn run(mut self) -> Box<dyn Browser> {
        self.restore().await;
        while self.step().await {}
        self.finish().await
    }

    /// Stops both captures and returns the browser.
    pub async fn finish(mut self) -> Box<dyn Browser> {
        self.shutdown().await;
        self.browser
    }

    /// Handles one event. Returns false when the loop should stop.
    pub async fn step(&mut self) -> bool {
        match self.rx.recv().await {
            Some(event) => self.handle_event(event).await,
            None => false,
        }
    }

    /// Handles every event already queued without waiting for more.
    pub async fn drain(&mut self) -> bool {
        while let Ok(event) = self.rx.try_recv() {
            if !self.handle_event(event).await {
                return false;
            }
        }
        true
    }

    /// Processes events until no interpretation is in flight.
    pub async fn settle(&mut self) -> bool {
        while self.in_flight.is_some() {
            if !self.step().await {
                return false;
            }
        }
        true
    }

    pub async fn handle_event(&mut self, event: SessionEvent) -> bool {
        match event {
            SessionEvent::Control(message) => self.on_control(message).await,
            SessionEvent::Speech(event) => self.on_speech(event).await,
            SessionEvent::Timer { generation, kind } => self.on_timer(generation, kind).await,
            SessionEvent::Interpreted {
                generation,
                command,
                intent,
            } => self.on_interpreted(generation, command, intent).await,
            SessionEvent::Shutdown => return false,
        }
        true
    }

    pub async fn restore(&mut self) {
        let stored = match self.store.get(&[SESSION_STATE_KEY, API_KEY_KEY]).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Could not read stored session: {}", e);
                Map::new()
            }
        };

        let client = self.interpreter.resolver().client();
        if !client.is_configured() {
            if let Some(key) = stored.get(API_KEY_KEY).and_then(Value::as_str) {
                client.set_api_key(Some(key.to_string()));
                debug!("Restored stored API key");
            }
        }

        self.ui.set_badge(Phase::Disabled.badge()).await;
        let saved = stored
            .get(SESSION_STATE_KEY)
            .and_then(|v| serde_json::from_value::<PersistedState>(v.clone()).ok());
        if let Some(saved) = saved {
            self.state = SessionState::restore(&saved);
            if saved.enabled && self.config.restore_on_start {
                info!("Restoring enabled session");
                self.enable().await;
            }
        }
    }

    async fn shutdown(&mut self) {
        self.timer.cancel();
        self.abort_in_flight();
        self.stop_capture(CaptureMode::Command).await;
        self.stop_capture(CaptureMode::Wake).await;
        info!("Session stopped");
    }

    // ---------------------------------------------------------------------
    // Control
    // ---------------------------------------------------------------------

    async fn on_control(&mut self, message: ControlMessage) {
        if !matches!(message, ControlMessage::SetApiKey { .. }) {
            debug!(?message, "control");
        }
        match message {
            ControlMessage::Enable | ControlMessage::PermissionGranted => self.enable().await,
            ControlMessage::Disable => self.disable().await,
            ControlMessage::Toggle => {
                if self.state.enabled() {
                    self.disable().await
                } else {
                    self.enable().await
                }
            }
            ControlMessage::GetStatus => self.send_status().await,
            ControlMessage::SetApiKey { api_key } => {
                let api_key = api_key.trim().to_string();
                if !validate_api_key(&api_key) {
                    self.show(IndicatorState::Error, "Invalid API key format").await;
                    return;
                }
                let mut items = Map::new();
                items.insert(API_KEY_KEY.to_string(), Value::String(api_key.clone()));
                if let Err(e) = self.store.set(items).await {
                    warn!("Could not store API key: {}", e);
                }
                self.interpreter.resolver().client().set_api_key(Some(api_key));
                info!("API key updated");
                self.send_status().await;
            }
            ControlMessage::ClearApiKey => {
                if let Err(e) = self.store.remove(&[API_KEY_KEY]).await {
                    warn!("Could not remove API key: {}", e);
                }
                self.interpreter.resolver().client().set_api_key(None);
                info!("API key cleared");
                self.send_status().await;
            }
            ControlMessage::PermissionDenied => {
                self.disable().await;
                self.show(IndicatorState::Error, SpeechErrorKind::NotAllowed.message())
                    .await;
            }
        }
    }

    pub async fn enable(&mut self) {
        if self.state.enabled() {
            self.send_status().await;
            return;
        }
        info!(
            require_wake_word = self.config.require_wake_word,
            "Enabling voice control"
        );
        if self.config.require_wake_word {
            if self.start_wake_capture().await {
                self.set_phase(Phase::Listening).await;
            }
        } else if self.start_command_capture().await {
            self.set_phase(Phase::Awake).await;
            self.show(IndicatorState::Listening, "Listening for command...")
                .await;
            self.timer.arm(
                TimerKind::CommandTimeout,
                self.config.command_timeout(),
                &self.tx,
            );
        }
        self.send_status().await;
    }

    pub async fn disable(&mut self) {
        self.timer.cancel();
        self.abort_in_flight();
        self.stop_capture(CaptureMode::Command).await;
        self.stop_capture(CaptureMode::Wake).await;
        if self.state.enabled() {
            info!("Disabling voice control");
        }
        self.set_phase(Phase::Disabled).await;
        self.ui.send(UiMessage::HideIndicator).await;
        self.send_status().await;
    }

    // ---------------------------------------------------------------------
    // Speech
    // ---------------------------------------------------------------------

    async fn on_speech(&mut self, event: SpeechEvent) {
        match event {
            SpeechEvent::Started { mode } => debug!(?mode, "capture started"),
            SpeechEvent::Result { mode, utterance } => match mode {
                CaptureMode::Wake => self.on_wake_result(utterance).await,
                CaptureMode::Command => self.on_command_result(utterance).await,
            },
            SpeechEvent::Error { mode, error } => self.on_speech_error(mode, error).await,
            SpeechEvent::Ended { mode } => self.on_capture_ended(mode).await,
        }
    }

    async fn on_wake_result(&mut self, utterance: Utterance) {
        if self.state.phase() != Phase::Listening || !self.wake.should_consider(&utterance) {
            return;
        }
        let detection = self.wake.detect(&utterance);
        if detection.detected {
            self.on_wake(detection, &utterance.text).await;
        }
    }

    async fn on_wake(&mut self, detection: WakeDetection, text: &str) {
        let phrase = detection.matched_phrase.unwrap_or_default();
        info!(
            method = ?detection.method,
            phrase = %phrase,
            confidence = detection.confidence,
            "Wake word detected"
        );
        self.stop_capture(CaptureMode::Wake).await;
        self.set_phase(Phase::Awake).await;
        self.ui
            .send(UiMessage::WakeWordDetected {
                phrase: phrase.clone(),
                confidence: detection.confidence,
            })
            .await;
        self.show(IndicatorState::Listening, "Listening for command...")
            .await;

        let inline = if self.config.inline_commands {
            command_after_wake(text, &phrase)
        } else {
            None
        };
        match inline {
            Some(command) => self.begin_command(command).await,
            None => {
                if self.start_command_capture().await {
                    self.timer.arm(
                        TimerKind::CommandTimeout,
                        self.config.command_timeout(),
                        &self.tx,
                    );
                }
            }
        }
    }

    async fn on_command_result(&mut self, utterance: Utterance) {
        if !self.state.awake() || !utterance.is_final {
            return;
        }
        if self.in_flight.is_some() {
            debug!("Ignoring utterance while a command is being processed");
            return;
        }
        let command = utterance.text.trim().to_string();
        if command.is_empty() {
            return;
        }
        self.begin_command(command).await;
    }

    /// Starts interpreting `command` off the loop.
    async fn begin_command(&mut self, command: String) {
        self.timer.cancel();
        info!(command = %command, "Processing command");
        self.ui
            .send(UiMessage::UpdateStatus {
                state: IndicatorState::Processing,
                message: format!("Processing: {}", command),
            })
            .await;

        let context = BrowserContext::snapshot(self.browser.as_mut(), &self.history).await;
        self.next_generation += 1;
        let generation = self.next_generation;
        let interpreter = Arc::clone(&self.interpreter);
        let tx = self.tx.clone();
        let task = tokio::spawn(async move {
            let intent = interpreter.interpret(&command, &context).await;
            let _ = tx.send(SessionEvent::Interpreted {
                generation,
                command,
                intent,
            });
        });
        self.in_flight = Some(InFlight { generation, task });
    }

    async fn on_interpreted(&mut self, generation: u64, command: String, intent: Intent) {
        let current = self.in_flight.as_ref().map(|f| f.generation);
        if current != Some(generation) || !self.state.awake() {
            debug!(generation, "Discarding stale interpretation");
            // A request for a newer utterance stays pending.
            if current == Some(generation) {
                self.abort_in_flight();
            }
            return;
        }
        self.in_flight = None;

        let result = self.dispatcher.dispatch(self.browser.as_mut(), &intent).await;
        let host = result
            .data
            .get("url")
            .and_then(Value::as_str)
            .and_then(host_of);
        self.history
            .record(&command, result.success, &result.message, host);

        let state = if result.success {
            IndicatorState::Success
        } else {
            IndicatorState::Error
        };
        self.ui
            .send(UiMessage::UpdateStatus {
                state,
                message: result.message.clone(),
            })
            .await;
        if result.success {
            info!(command = %command, "{}", result.message);
            self.ui
                .send(UiMessage::CommandProcessed { command, result })
                .await;
        } else {
            info!(command = %command, "Command failed: {}", result.message);
            self.ui
                .send(UiMessage::CommandError {
                    command,
                    message: result.message,
                })
                .await;
        }
        self.finish_command().await;
    }

    /// Leaves command capture after a result or a timeout.
    async fn finish_command(&mut self) {
        self.stop_capture(CaptureMode::Command).await;
        if self.config.require_wake_word {
            if self.start_wake_capture().await {
                self.set_phase(Phase::Listening).await;
            }
        } else {
            self.set_phase(Phase::Disabled).await;
        }
        if self.timer.pending().is_none() {
            self.timer
                .arm(TimerKind::HideStatus, self.config.status_display(), &self.tx);
        }
    }

    async fn on_speech_error(&mut self, mode: CaptureMode, error: SpeechErrorKind) {
        if error == SpeechErrorKind::Aborted {
            debug!(?mode, "capture aborted");
            return;
        }
        if !self.state.enabled() {
            return;
        }
        if error.is_permission_error() {
            warn!(?mode, ?error, "Microphone permission lost");
            self.disable().await;
            self.show(IndicatorState::Error, error.message()).await;
            return;
        }
        let relevant = match mode {
            CaptureMode::Wake => self.state.phase() == Phase::Listening,
            CaptureMode::Command => self.state.awake(),
        };
        if !relevant {
            debug!(?mode, ?error, "Ignoring error from inactive capture");
            return;
        }

        match mode {
            CaptureMode::Wake => warn!(?error, "Wake capture error: {}", error.message()),
            CaptureMode::Command => {
                warn!(?error, "Command capture error: {}", error.message());
                self.ui
                    .send(UiMessage::UpdateStatus {
                        state: IndicatorState::Error,
                        message: error.message().to_string(),
                    })
                    .await;
            }
        }

        if self.in_flight.is_some() {
            return;
        }
        if self.state.awake() {
            self.stop_capture(CaptureMode::Command).await;
            if !self.config.require_wake_word {
                self.set_phase(Phase::Disabled).await;
                self.timer
                    .arm(TimerKind::HideStatus, self.config.status_display(), &self.tx);
                return;
            }
        }
        self.set_phase(Phase::Listening).await;
        self.timer.arm(
            TimerKind::RestartCapture,
            self.config.restart_delay(),
            &self.tx,
        );
    }

    async fn on_capture_ended(&mut self, mode: CaptureMode) {
        debug!(?mode, "capture ended");
        if mode == CaptureMode::Wake
            && self.state.phase() == Phase::Listening
            && self.timer.pending() != Some(TimerKind::RestartCapture)
        {
            debug!("Wake capture ended on its own, restarting");
            self.start_wake_capture().await;
        }
    }

    // ---------------------------------------------------------------------
    // Timers
    // ---------------------------------------------------------------------

    async fn on_timer(&mut self, generation: u64, kind: TimerKind) {
        if !self.timer.take_fired(generation, kind) {
            debug!(?kind, generation, "Ignoring stale timer");
            return;
        }
        match kind {
            TimerKind::CommandTimeout => {
                if self.state.awake() && self.in_flight.is_none() {
                    info!("No command heard, going back to listening");
                    self.stop_capture(CaptureMode::Command).await;
                    if self.config.require_wake_word {
                        if self.start_wake_capture().await {
                            self.set_phase(Phase::Listening).await;
                        }
                    } else {
                        self.set_phase(Phase::Disabled).await;
                    }
                    self.ui.send(UiMessage::HideIndicator).await;
                }
            }
            TimerKind::HideStatus => self.ui.send(UiMessage::HideIndicator).await,
            TimerKind::RestartCapture => {
                self.ui.send(UiMessage::HideIndicator).await;
                if self.state.phase() == Phase::Listening {
                    debug!("Restarting wake capture");
                    self.start_wake_capture().await;
                }
            }
        }
    }

    // ---------------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------------

    /// Starts wake capture. On failure the session is disabled (permission)
    /// or a restart is scheduled; returns whether capture is running.
    async fn start_wake_capture(&mut self) -> bool {
        match self.speech.start(CaptureMode::Wake).await {
            Ok(()) => true,
            Err(e) => {
                self.capture_failed(e).await;
                false
            }
        }
    }

    async fn start_command_capture(&mut self) -> bool {
        match self.speech.start(CaptureMode::Command).await {
            Ok(()) => true,
            Err(e) => {
                self.capture_failed(e).await;
                false
            }
        }
    }

    async fn capture_failed(&mut self, error: SpeechError) {
        warn!("Could not start speech capture: {}", error);
        match error {
            SpeechError::PermissionDenied => {
                self.timer.cancel();
                self.set_phase(Phase::Disabled).await;
                self.show(IndicatorState::Error, SpeechErrorKind::NotAllowed.message())
                    .await;
            }
            other => {
                self.show(IndicatorState::Error, &other.to_string()).await;
                if self.state.enabled() && self.config.require_wake_word {
                    self.set_phase(Phase::Listening).await;
                    self.timer.arm(
                        TimerKind::RestartCapture,
                        self.config.restart_delay(),
                        &self.tx,
                    );
                } else {
                    self.set_phase(Phase::Disabled).await;
                }
            }
        }
    }

    async fn stop_capture(&mut self, mode: CaptureMode) {
        if let Err(e) = self.speech.stop(mode).await {
            debug!(?mode, "Could not stop capture: {}", e);
        }
    }

    fn abort_in_flight(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            debug!(generation = in_flight.generation, "Abandoning interpretation");
            in_flight.task.abort();
        }
    }

    /// Moves to `phase`, updates the badge and persists the state.
    async fn set_phase(&mut self, phase: Phase) {
        let changed = self.state.phase() != phase;
        self.state.set_phase(phase);
        if changed {
            debug!(?phase, "session phase");
            self.ui.set_badge(phase.badge()).await;
        }
        self.persist().await;
    }

    async fn persist(&self) {
        let value = match serde_json::to_value(self.state.persisted()) {
            Ok(value) => value,
            Err(e) => {
                warn!("Could not encode session state: {}", e);
                return;
            }
        };
        let mut items = Map::new();
        items.insert(SESSION_STATE_KEY.to_string(), value);
        if let Err(e) = self.store.set(items).await {
            warn!("Could not persist session state: {}", e);
        }
    }

    async fn show(&self, state: IndicatorState, message: &str) {
        self.ui
            .send(UiMessage::ShowIndicator {
                state,
                message: message.to_string(),
            })
            .await;
    }

    async fn send_status(&self) {
        self.ui.send(UiMessage::Status(self.status())).await;
    }
}
