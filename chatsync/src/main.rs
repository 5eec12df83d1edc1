//! `chatsync`: line-oriented terminal client for a realtime channel chat.
//!
//! Resolves the user's identity and channels over HTTP, then keeps a
//! websocket session open and prints what the server pushes. Configuration
//! via CLI flags, environment variables, or config file
//! (`~/.config/chatsync/config.toml`).
//!
//! ```bash
//! # Identity from the server session
//! cargo run --bin chatsync -- --base-url http://chat.example.com/
//!
//! # Fixed identity, explicit websocket endpoint
//! CHATSYNC_USER_ID=42 CHATSYNC_WS_URL=ws://127.0.0.1:5001 cargo run
//! ```

use std::path::Path;
use std::process::ExitCode;

use chatsync_proto::channel::Channel;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_appender::non_blocking::WorkerGuard;

use chatsync::api::{ApiClient, ApiError};
use chatsync::config::{CliArgs, ClientConfig};
use chatsync::console::{self, LocalCommand};
use chatsync::engine::{Engine, EngineConfig, EngineError, EngineHandle};
use chatsync::render::RenderEvent;
use chatsync::session::Session;
use chatsync::transport::ws::WsConnector;

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("reading input: {0}")]
    Input(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();

    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("chatsync: {e}");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(base_url = %config.base_url, "chatsync starting");

    let result = run(config).await;

    tracing::info!("chatsync exiting");
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(StartupError::Api(ApiError::AccessDenied)) => {
            eprintln!("chatsync: no hay sesión iniciada en el servidor");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("chatsync: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize file-based logging.
///
/// Logs go to a file so they never interleave with chat output. Returns the
/// guard that must be held for the lifetime of the program.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("chatsync.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

/// Bootstrap the session over HTTP, start the engine and run the input loop.
async fn run(config: ClientConfig) -> Result<(), StartupError> {
    let api = ApiClient::new(config.base_url.clone(), config.request_timeout)?;

    let identity = match config.identity() {
        Some(identity) => identity,
        None => api.resolve_identity().await?,
    };

    let profile_name = match &config.identity.display_name {
        Some(name) => Some(name.clone()),
        None => match api.profile(&identity.id).await {
            Ok(profile) => Some(profile.display_name),
            Err(e) => {
                tracing::warn!(error = %e, "profile unavailable; own messages matched by id only");
                None
            }
        },
    };

    let mut session = Session::new(identity.clone(), config.history_limit);
    if let Some(name) = profile_name {
        session = session.with_profile_name(name);
    }
    match api.channels(&identity.id).await {
        Ok(channels) => {
            session.reconcile_roster(channels);
        }
        Err(e) => tracing::warn!(error = %e, "could not load channels; waiting for server push"),
    }

    let (render_tx, render_rx) = mpsc::unbounded_channel();
    let handle = Engine::start(
        EngineConfig::from(&config),
        session,
        WsConnector::new(config.connect_timeout),
        api,
        render_tx,
    )?;

    let printer = tokio::spawn(print_events(render_rx));
    let outcome = input_loop(&handle).await;

    if let Err(e) = handle.stop().await {
        tracing::debug!(error = %e, "engine already stopped");
    }
    drop(handle);
    if let Err(e) = printer.await {
        tracing::warn!(error = %e, "printer task failed");
    }
    outcome
}

/// Print render events until the engine drops its renderer.
async fn print_events(mut events: mpsc::UnboundedReceiver<RenderEvent>) {
    while let Some(event) = events.recv().await {
        for line in console::event_lines(&event) {
            println!("{line}");
        }
    }
}

/// Read stdin lines until EOF, `/cerrar` or Ctrl-C.
async fn input_loop(handle: &EngineHandle) -> Result<(), StartupError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            return Ok(());
        };
        match LocalCommand::parse(&line) {
            Ok(Some(LocalCommand::Quit)) => return Ok(()),
            Ok(Some(command)) => run_local(handle, command).await?,
            Ok(None) if line.trim().is_empty() => {}
            Ok(None) => {
                if let Err(e) = handle.submit(line).await {
                    if e.is_not_connected() {
                        println!("! sin conexión, el mensaje no se envió");
                    } else {
                        println!("! {e}");
                    }
                }
            }
            Err(usage) => println!("! {usage}"),
        }
    }
}

async fn run_local(handle: &EngineHandle, command: LocalCommand) -> Result<(), StartupError> {
    match command {
        LocalCommand::Help => {
            for line in console::help_lines() {
                println!("{line}");
            }
        }
        LocalCommand::ListChannels => {
            let snapshot = handle.snapshot().await?;
            let session = &snapshot.session;
            for line in console::roster_lines(session.roster(), session.active_channel()) {
                println!("{line}");
            }
        }
        LocalCommand::Join(position) => {
            let snapshot = handle.snapshot().await?;
            let target: Option<&Channel> = snapshot.session.roster().get(position - 1);
            match target {
                Some(channel) => {
                    if let Err(e) = handle.join(channel.id.clone()).await {
                        if e.is_not_connected() {
                            println!("! sin conexión, no se puede cambiar de canal");
                        } else {
                            println!("! {e}");
                        }
                    }
                }
                None => println!("! no hay canal {position} (ver /canales)"),
            }
        }
        LocalCommand::Quit => {}
    }
    Ok(())
}
