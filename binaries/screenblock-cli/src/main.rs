//! ScreenBlock CLI
//!
//! Registers and checks the unlock pattern, and hosts a headless overlay
//! session driven from stdin.

mod console;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use console::ConsoleCommand;
use screenblock_config::ScreenBlockConfig;
use screenblock_keys::KeyManager;
use screenblock_session::{
    spawn_session, HeadlessCompositor, OverlaySessionController, SessionHandle, SessionStatus,
};
use screenblock_store::{CredentialStore, FileCredentialStore, FileSessionStore};

#[derive(Parser)]
#[command(name = "screenblock")]
#[command(about = "ScreenBlock - a pattern-locked screen curtain")]
#[command(version)]
struct Cli {
    /// Config file (default: <config_dir>/screenblock/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new unlock pattern, replacing any existing one
    SetPattern {
        /// Grid node ids in order, e.g. 0,1,2,5
        pattern: String,
    },

    /// Check a pattern against the registered one
    Check {
        /// Grid node ids in order
        pattern: String,
    },

    /// Show credential and saved session state
    Status,

    /// Run a headless overlay session, reading commands from stdin
    Run,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("screenblock=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ScreenBlockConfig::load_from(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ScreenBlockConfig::load().context("loading configuration")?,
    };

    match cli.command {
        Commands::SetPattern { pattern } => cmd_set_pattern(&config, &pattern).await?,
        Commands::Check { pattern } => {
            let outcome = cmd_check(&config, &pattern).await?;
            println!("{}", outcome);
            return Ok(ExitCode::from(outcome.exit_code()));
        }
        Commands::Status => cmd_status(&config).await?,
        Commands::Run => cmd_run(&config).await?,
    }
    Ok(ExitCode::SUCCESS)
}

/// Result of `check`, reported through the exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CheckOutcome {
    Match,
    NoMatch,
    NoPattern,
}

impl CheckOutcome {
    fn exit_code(self) -> u8 {
        match self {
            CheckOutcome::Match => 0,
            CheckOutcome::NoMatch => 1,
            CheckOutcome::NoPattern => 2,
        }
    }
}

impl std::fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckOutcome::Match => write!(f, "Match"),
            CheckOutcome::NoMatch => write!(f, "No match"),
            CheckOutcome::NoPattern => write!(f, "No pattern registered"),
        }
    }
}

async fn open_keys(config: &ScreenBlockConfig) -> Result<(Arc<FileCredentialStore>, KeyManager)> {
    let store = Arc::new(FileCredentialStore::open(config.storage.credential_path()).await);
    let keys = KeyManager::new(store.clone(), config.keys.clone(), config.pattern)?;
    Ok((store, keys))
}

async fn cmd_set_pattern(config: &ScreenBlockConfig, text: &str) -> Result<()> {
    let pattern = config.pattern.parse(text).context("invalid pattern")?;
    let (store, keys) = open_keys(config).await?;

    keys.create_new_key(&pattern).await?;

    println!("Pattern registered ({} nodes)", pattern.len());
    if let Some(credential) = store.current() {
        println!("  Fingerprint: {}", hex::encode(credential.fingerprint()));
    }
    Ok(())
}

async fn cmd_check(config: &ScreenBlockConfig, text: &str) -> Result<CheckOutcome> {
    let candidates = screenblock_core::PatternPolicy {
        min_length: 1,
        ..config.pattern
    };
    let pattern = candidates.parse(text).context("invalid pattern")?;
    let (_, keys) = open_keys(config).await?;

    if !keys.is_key_present() {
        return Ok(CheckOutcome::NoPattern);
    }

    if keys.compare_key(&pattern).await {
        Ok(CheckOutcome::Match)
    } else {
        Ok(CheckOutcome::NoMatch)
    }
}

async fn cmd_status(config: &ScreenBlockConfig) -> Result<()> {
    let credential_path = config.storage.credential_path();
    let session_path = config.storage.session_path();
    let store = FileCredentialStore::open(&credential_path).await;

    println!("Credential: {}", credential_path.display());
    match store.current() {
        Some(credential) => {
            println!("  Fingerprint: {}", hex::encode(credential.fingerprint()));
            println!("  Iterations:  {}", credential.iterations());
        }
        None => println!("  (no pattern registered)"),
    }

    println!("Session:    {}", session_path.display());
    match FileSessionStore::at_path(&session_path).inspect() {
        Ok(Some((snapshot, saved_at))) => {
            println!("  Bubble:      ({}, {})", snapshot.position.x, snapshot.position.y);
            println!("  Blocking:    {}", snapshot.was_blocking);
            println!("  Saved:       {}", saved_at.to_rfc3339());
        }
        Ok(None) => println!("  (no saved session)"),
        Err(e) => println!("  (unreadable: {})", e),
    }

    println!("Policy:");
    println!("  Grid:        {} (min {} nodes)", config.pattern.grid, config.pattern.min_length);
    println!("  Unlock grace: {} ms", config.session.unlock_grace_ms);
    println!("  Prompt timeout: {} ms", config.session.prompt_timeout_ms);
    Ok(())
}

async fn cmd_run(config: &ScreenBlockConfig) -> Result<()> {
    let (_, keys) = open_keys(config).await?;
    if !keys.is_key_present() {
        warn!("no pattern registered, the curtain cannot be lifted once raised");
    }

    let compositor = HeadlessCompositor::new();
    let controller = OverlaySessionController::new(
        Box::new(compositor.clone()),
        Arc::new(keys),
        Arc::new(FileSessionStore::at_path(config.storage.session_path())),
        config.session.clone(),
    );
    let handle = spawn_session(controller)?;

    // Report changes that happen without a command (prompt timeout)
    let mut state_rx = handle.subscribe_state();
    tokio::spawn(async move {
        while state_rx.changed().await.is_ok() {
            let state = *state_rx.borrow_and_update();
            println!("-> {}", state);
        }
    });

    println!("Session started in state {}. Type 'help' for commands.", handle.state());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match console::parse(&line, &config.pattern) {
                    Ok(None) => {}
                    Ok(Some(ConsoleCommand::Stop)) => break,
                    Ok(Some(command)) => execute(&handle, &compositor, command).await,
                    Err(e) => eprintln!("{}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    handle.stop().await?;
    println!("Session stopped");
    Ok(())
}

async fn execute(handle: &SessionHandle, compositor: &HeadlessCompositor, command: ConsoleCommand) {
    let result = match command {
        ConsoleCommand::Tap => handle.tap_bubble().await,
        ConsoleCommand::Block => handle.request_block().await,
        ConsoleCommand::Unlock => handle.request_unlock().await,
        ConsoleCommand::Trace => handle.begin_trace().await,
        ConsoleCommand::Enter(pattern) => handle.pattern_entered(pattern).await,
        ConsoleCommand::Dismiss => handle.dismiss_prompt().await,
        ConsoleCommand::Drag { dx, dy } => match handle.drag_bubble(dx, dy).await {
            Ok(position) => {
                println!("bubble at ({}, {})", position.x, position.y);
                return;
            }
            Err(e) => Err(e),
        },
        ConsoleCommand::State => {
            print_state(handle, compositor);
            return;
        }
        ConsoleCommand::Help => {
            println!("{}", console::HELP);
            return;
        }
        ConsoleCommand::Stop => return,
    };

    match result {
        Ok(SessionStatus { state, .. }) => println!("{}", state),
        Err(e) => eprintln!("{}", e),
    }
}

fn print_state(handle: &SessionHandle, compositor: &HeadlessCompositor) {
    let flags = handle.flags();
    println!(
        "{} (overlay active: {}, pattern visible: {})",
        handle.state(),
        flags.is_overlay_active,
        flags.is_pattern_visible
    );
    for surface in compositor.surfaces() {
        println!(
            "  z{} {:<8} visible={:<5} touch={:?} at ({}, {})",
            surface.z_order,
            surface.kind.to_string(),
            surface.visible,
            surface.touch,
            surface.x,
            surface.y
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use screenblock_config::{KeyConfig, StorageConfig};

    fn config_in(dir: &std::path::Path) -> ScreenBlockConfig {
        ScreenBlockConfig {
            keys: KeyConfig { iterations: 1_000 },
            storage: StorageConfig {
                data_dir: Some(dir.to_path_buf()),
            },
            ..ScreenBlockConfig::default()
        }
    }

    #[tokio::test]
    async fn test_check_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        let outcome = cmd_check(&config, "0,1,2").await.unwrap();
        assert_eq!(outcome, CheckOutcome::NoPattern);
        assert_eq!(outcome.exit_code(), 2);

        cmd_set_pattern(&config, "0,1,2,5").await.unwrap();

        let outcome = cmd_check(&config, "0,1,2,5").await.unwrap();
        assert_eq!(outcome, CheckOutcome::Match);
        assert_eq!(outcome.exit_code(), 0);

        let outcome = cmd_check(&config, "0,1,2").await.unwrap();
        assert_eq!(outcome, CheckOutcome::NoMatch);
        assert_eq!(outcome.exit_code(), 1);
    }
}
