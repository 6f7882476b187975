use crate::session::{SessionController, SessionEvent};
use crate::speech::CaptureState;
use crate::ui::UiSink;
use async_trait::async_trait;
use rupert_common::messages::{Badge, ControlMessage, IndicatorState, SpeechEvent, UiMessage};
use rupert_common::protocol::Utterance;
use std::error::Error;
use std::io::{self, Write};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Clone, Copy)]
pub struct OutputHandlers {
    pub out: fn(&str),
    pub err: fn(&str),
}

pub enum FileErrorMode {
    Plain,
    WithLine,
}

pub struct FileOptions {
    pub stop_on_error: bool,
    pub error_mode: FileErrorMode,
}

pub struct ReplOptions<'a> {
    pub banner_lines: &'a [&'a str],
    pub prompt: &'a str,
    pub exit_commands: &'a [&'a str],
    pub handle_ctrl_c: bool,
    pub ctrl_c_message: Option<&'a str>,
}

/// Prints session feedback through the CLI's output handlers.
pub struct ConsoleUi {
    output: OutputHandlers,
}

impl ConsoleUi {
    pub fn new(output: OutputHandlers) -> Self {
        Self { output }
    }
}

#[async_trait]
impl UiSink for ConsoleUi {
    async fn send(&self, message: UiMessage) {
        match message {
            UiMessage::WakeWordDetected { phrase, confidence } => (self.output.out)(&format!(
                "[awake] heard \"{}\" ({:.0}%)",
                phrase,
                confidence * 100.0
            )),
            UiMessage::CommandProcessed { result, .. } => {
                (self.output.out)(&format!("✓ {}", result.message))
            }
            UiMessage::CommandError { message, .. } => (self.output.err)(&format!("✗ {}", message)),
            UiMessage::ShowIndicator {
                state: IndicatorState::Error,
                message,
            } => (self.output.err)(&format!("Error: {}", message)),
            UiMessage::Status(status) => (self.output.out)(&format!(
                "enabled: {}, listening: {}, awake: {}, api key: {}, mode: {}",
                status.enabled,
                status.listening,
                status.awake,
                if status.has_api_key { "set" } else { "not set" },
                status.mode
            )),
            _ => {}
        }
    }

    async fn set_badge(&self, _badge: Badge) {}
}

/// What a typed line turns into.
#[derive(Debug, Clone, PartialEq)]
pub enum LineInput {
    Event(SessionEvent),
    Help,
    /// The line can't be delivered; the message says why.
    Rejected(String),
}

/// Built-ins start with `:`; anything else is a final utterance for
/// whichever capture is running.
pub fn classify_input(line: &str, capture: &CaptureState) -> LineInput {
    let line = line.trim();
    if let Some(builtin) = line.strip_prefix(':') {
        let mut parts = builtin.splitn(2, char::is_whitespace);
        let name = parts.next().unwrap_or_default();
        let arg = parts.next().map(str::trim).unwrap_or_default();
        let control = match name {
            "enable" => ControlMessage::Enable,
            "disable" => ControlMessage::Disable,
            "toggle" => ControlMessage::Toggle,
            "status" => ControlMessage::GetStatus,
            "key" if !arg.is_empty() => ControlMessage::SetApiKey {
                api_key: arg.to_string(),
            },
            "key" => return LineInput::Rejected("Usage: :key <api key>".into()),
            "clear-key" => ControlMessage::ClearApiKey,
            "help" => return LineInput::Help,
            other => return LineInput::Rejected(format!("Unknown command ':{}'", other)),
        };
        return LineInput::Event(SessionEvent::Control(control));
    }

    match capture.current() {
        Some(mode) => LineInput::Event(SessionEvent::Speech(SpeechEvent::Result {
            mode,
            utterance: Utterance::new(line, 1.0),
        })),
        None => LineInput::Rejected("Voice control is disabled (type :enable)".into()),
    }
}

pub fn help_lines(controller: &SessionController) -> Vec<String> {
    let mut lines = vec![
        "Built-ins: :enable :disable :toggle :status :key <api key> :clear-key :help".to_string(),
        "Say the wake phrase, then a command. Commands:".to_string(),
    ];
    for command in controller.interpreter().grammar().available_commands() {
        let example = command.examples.first().cloned().unwrap_or_default();
        lines.push(format!("  {:<18} {} (\"{}\")", command.name, command.description, example));
    }
    lines
}

/// Delivers one line and waits for any command it started to finish.
async fn execute_line(
    controller: &mut SessionController,
    capture: &CaptureState,
    output: OutputHandlers,
    line: &str,
) -> Result<bool, String> {
    if !controller.drain().await {
        return Ok(false);
    }
    match classify_input(line, capture) {
        LineInput::Event(event) => {
            if !controller.handle_event(event).await {
                return Ok(false);
            }
            Ok(controller.settle().await)
        }
        LineInput::Help => {
            for line in help_lines(controller) {
                (output.out)(&line);
            }
            Ok(true)
        }
        LineInput::Rejected(reason) => Err(reason),
    }
}

/// Non-blank, non-comment lines of a transcript with their 1-based line
/// numbers.
pub fn transcript_lines(content: &str) -> impl Iterator<Item = (usize, &str)> {
    content
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
}

pub async fn run_file(
    controller: &mut SessionController,
    capture: &CaptureState,
    output: OutputHandlers,
    path: &str,
    options: FileOptions,
) -> Result<(), Box<dyn Error>> {
    let content = tokio::fs::read_to_string(path).await?;
    for (number, line) in transcript_lines(&content) {
        let reason = match execute_line(controller, capture, output, line).await {
            Ok(true) => continue,
            Ok(false) => break,
            Err(reason) => reason,
        };
        let report = match options.error_mode {
            FileErrorMode::Plain => format!("Error: {}", reason),
            FileErrorMode::WithLine => format!("{}:{}: '{}': {}", path, number, line, reason),
        };
        (output.err)(&report);
        if options.stop_on_error {
            return Err(io::Error::other(report).into());
        }
    }
    Ok(())
}

/// One read from the prompt.
#[derive(Debug)]
enum Prompted {
    Line(String),
    Blank,
    Quit,
    Failed(io::Error),
}

impl Prompted {
    fn from_read(read: io::Result<Option<String>>, exit_commands: &[&str]) -> Self {
        let Some(raw) = (match read {
            Ok(raw) => raw,
            Err(e) => return Prompted::Failed(e),
        }) else {
            return Prompted::Quit;
        };
        match raw.trim() {
            "" => Prompted::Blank,
            cmd if exit_commands.contains(&cmd) => Prompted::Quit,
            line => Prompted::Line(line.to_string()),
        }
    }
}

pub async fn run_repl(
    controller: &mut SessionController,
    capture: &CaptureState,
    output: OutputHandlers,
    options: ReplOptions<'_>,
) -> Result<(), Box<dyn Error>> {
    options.banner_lines.iter().for_each(|line| (output.out)(line));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{}", options.prompt);
        io::stdout().flush()?;

        let read = if options.handle_ctrl_c {
            tokio::select! {
                read = lines.next_line() => Prompted::from_read(read, options.exit_commands),
                _ = tokio::signal::ctrl_c() => {
                    if let Some(message) = options.ctrl_c_message {
                        (output.out)(message);
                    }
                    Prompted::Quit
                }
            }
        } else {
            Prompted::from_read(lines.next_line().await, options.exit_commands)
        };

        match read {
            Prompted::Blank => {}
            Prompted::Quit => break,
            Prompted::Failed(e) => return Err(e.into()),
            Prompted::Line(line) => match execute_line(controller, capture, output, &line).await {
                Ok(true) => {}
                Ok(false) => break,
                Err(reason) => (output.err)(&format!("Error: {}", reason)),
            },
        }
    }
    Ok(())
}
