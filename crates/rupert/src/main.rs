use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use rupert_engine::backend::Browser;
use rupert_engine::cli::{self, ConsoleUi, FileErrorMode, FileOptions, OutputHandlers, ReplOptions};
use rupert_engine::config::loader::validate;
use rupert_engine::config::schema::StorageConfig;
use rupert_engine::config::{ConfigLoader, RupertConfig};
use rupert_engine::interpreter::{Interpreter, InterpreterMode};
use rupert_engine::resolver::{GeminiClient, IntentResolver};
use rupert_engine::session::{SessionController, SessionParts};
use rupert_engine::speech::ConsoleSpeech;
use rupert_engine::storage::{FileStore, KeyValueStore, MemoryStore};
use rupert_h::HeadlessBrowser;
use rupert_parser::CommandGrammar;
use rupert_r::{BridgeServer, RemoteBrowser, RemoteSpeech, RemoteUi};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rupert", version, about = "Rupert voice navigation")]
struct Args {
    #[command(subcommand)]
    backend: Backend,

    /// Config file (default: ./rupert.yaml, then ~/.rupert/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Transcript to replay, one utterance or built-in per line
    #[arg(long, global = true)]
    file: Option<String>,

    /// Gemini API key
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Interpreter: grammar, llm or hybrid
    #[arg(long = "mode", global = true)]
    interpreter: Option<InterpreterMode>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Backend {
    /// Drive a local Chromium over CDP; speech is typed at the prompt
    Headless {
        /// Launch browser in visible mode (not headless)
        #[arg(long)]
        visible: bool,
    },
    /// Serve the browser extension over WebSocket
    Remote {
        /// WebSocket port
        #[arg(long, default_value_t = 9001)]
        port: u16,
    },
}

fn output() -> OutputHandlers {
    OutputHandlers {
        out: |msg| println!("{}", msg),
        err: |msg| eprintln!("{}", msg),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stderr keeps stdout free for the REPL.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args).await?;

    match args.backend {
        Backend::Headless { visible } => run_headless(config, visible, args.file).await,
        Backend::Remote { port } => {
            if args.file.is_some() {
                warn!("--file is ignored in remote mode; speech comes from the extension");
            }
            run_remote(config, port).await
        }
    }
}

async fn load_config(args: &Args) -> anyhow::Result<RupertConfig> {
    let mut config = ConfigLoader::load(args.config.as_deref())
        .await
        .context("Failed to load configuration")?;
    apply_args(&mut config, args);
    validate(&config).context("Invalid configuration")?;
    Ok(config)
}

/// Command-line flags win over file and environment.
fn apply_args(config: &mut RupertConfig, args: &Args) {
    if let Some(key) = &args.api_key {
        config.model.api_key = Some(key.clone());
    }
    if let Some(mode) = args.interpreter {
        config.interpreter.mode = mode;
    }
}

fn build_interpreter(config: &RupertConfig) -> anyhow::Result<Interpreter> {
    let client = GeminiClient::new(config.model.api_key.clone())
        .with_base_url(config.model.api_url.clone())
        .with_timeout(config.model.request_timeout())
        .with_generation(config.model.generation.clone());
    let resolver = IntentResolver::new(Arc::new(client))
        .with_endpoints(config.model.endpoints.clone())
        .with_rephrase_below(config.model.rephrase_below);
    let grammar = CommandGrammar::from_sites(&config.grammar.site_pairs())
        .context("Invalid site shortcut in grammar config")?;
    Ok(Interpreter::new(config.interpreter.mode, grammar, resolver))
}

fn build_store(config: &StorageConfig) -> Arc<dyn KeyValueStore> {
    if config.in_memory {
        return Arc::new(MemoryStore::new());
    }
    let path = config.path.clone().unwrap_or_else(FileStore::default_path);
    info!("Session state file: {}", path.display());
    Arc::new(FileStore::new(path))
}

async fn run_headless(
    config: RupertConfig,
    visible: bool,
    file: Option<String>,
) -> anyhow::Result<()> {
    let mut browser = HeadlessBrowser::new_with_visibility(visible);
    browser
        .launch()
        .await
        .context("Failed to launch browser")?;

    let speech = ConsoleSpeech::new();
    let capture = speech.state();
    let parts = SessionParts {
        browser: Box::new(browser),
        speech: Box::new(speech),
        ui: Arc::new(ConsoleUi::new(output())),
        store: build_store(&config.storage),
        interpreter: Arc::new(build_interpreter(&config)?),
    };
    let (mut controller, _session) = SessionController::new(
        parts,
        config.session.clone(),
        config.wake.clone(),
        config.dispatch.clone(),
    );
    controller.restore().await;

    let outcome = match file {
        Some(path) => {
            cli::run_file(
                &mut controller,
                &capture,
                output(),
                &path,
                FileOptions {
                    stop_on_error: true,
                    error_mode: FileErrorMode::WithLine,
                },
            )
            .await
        }
        None => {
            let repl_options = ReplOptions {
                banner_lines: &[
                    "Rupert is ready. Type :enable, then speak by typing (e.g. 'hey rupert open new tab').",
                    "Type :help for commands, 'exit' or 'quit' to close.",
                ],
                prompt: "> ",
                exit_commands: &["exit", "quit"],
                handle_ctrl_c: true,
                ctrl_c_message: Some("Interrupted."),
            };
            cli::run_repl(&mut controller, &capture, output(), repl_options).await
        }
    };

    let mut browser = controller.finish().await;
    browser.close().await.context("Failed to close browser")?;
    outcome.map_err(|e| anyhow!("{}", e))
}

async fn run_remote(config: RupertConfig, port: u16) -> anyhow::Result<()> {
    let bridge = BridgeServer::new(port)
        .start()
        .await
        .context("Failed to start extension bridge")?;
    println!("Waiting for the extension on ws://{}", bridge.local_addr());

    let mut browser = RemoteBrowser::new(bridge.clone());
    browser.launch().await?;

    let parts = SessionParts {
        browser: Box::new(browser),
        speech: Box::new(RemoteSpeech::new(bridge.clone())),
        ui: Arc::new(RemoteUi::new(bridge.clone())),
        store: build_store(&config.storage),
        interpreter: Arc::new(build_interpreter(&config)?),
    };
    let (controller, session) = SessionController::new(
        parts,
        config.session.clone(),
        config.wake.clone(),
        config.dispatch.clone(),
    );
    let forwarder = bridge.forward_to(session.clone());

    let interrupt = session.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted; stopping session");
            interrupt.shutdown();
        }
    });

    let mut browser = controller.run().await;
    forwarder.abort();
    browser.close().await?;
    Ok(())
}
