//! Elimwatch - a terminal dashboard for the Torn Elimination event.
//!
//! Keeps team standings and one watched roster fresh in the background
//! while the terminal stays responsive, and can dump the whole event to
//! JSON with `--dump-snapshot`.

mod app;
mod snapshot;
mod ui;

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use elimwatch_core::config::Config;

use app::{App, AppState};
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

/// Initialize the tracing subscriber for logging.
///
/// While the terminal UI owns the screen, log lines go to a file under the
/// cache directory instead of stderr. Use RUST_LOG to control the level
/// (e.g. RUST_LOG=debug). The returned guard must stay alive for the whole
/// run or buffered lines are lost.
fn init_tracing(to_file: bool) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    if to_file {
        if let Ok(dir) = Config::load().unwrap_or_default().cache_dir() {
            // The appender wants the directory to already exist
            if std::fs::create_dir_all(&dir).is_ok() {
                let appender = tracing_appender::rolling::never(&dir, "elimwatch.log");
                let (writer, guard) = tracing_appender::non_blocking(appender);
                tracing_subscriber::registry()
                    .with(fmt::layer().with_writer(writer).with_ansi(false))
                    .with(filter)
                    .init();
                return Some(guard);
            }
        }
    }

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
    None
}

fn print_usage() {
    println!("elimwatch {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: elimwatch [COMMAND]");
    println!();
    println!("Commands:");
    println!("  (none)                     Run the terminal dashboard");
    println!("  --dump-snapshot [--out F]  Dump all teams and rosters to a JSON file");
    println!("                             (default: elimination_snapshot.json)");
    println!("  -h, --help                 Show this help");
    println!("  -V, --version              Show the version");
    println!();
    println!("Environment:");
    println!("  ELIMWATCH_API_KEY          Torn API key (overrides the stored key)");
    println!("  ELIMWATCH_STATS_KEY        Optional battle-stats service key");
    println!("  RUST_LOG                   Log filter, e.g. RUST_LOG=debug");
}

/// `--out PATH` from the arguments after `--dump-snapshot`.
fn parse_out_arg(args: &[String]) -> PathBuf {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--out" {
            if let Some(path) = iter.next() {
                return PathBuf::from(path);
            }
        }
    }
    PathBuf::from("elimination_snapshot.json")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    // Check for CLI commands
    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("elimwatch {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    if args.len() > 1 && args[1] == "--dump-snapshot" {
        // Batch mode never owns the screen, so logs can stay on stderr
        let _guard = init_tracing(false);
        return snapshot::dump_snapshot(parse_out_arg(&args[2..])).await;
    }

    // Initialize logging
    let _guard = init_tracing(true);
    info!("Elimwatch starting");

    // Create the app before touching the terminal so a failure here
    // prints normally instead of into a raw-mode screen
    let mut app = App::new()?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Cached data shows immediately; the login form only opens when no
    // usable key came from the environment or the keychain
    if !app.coordinator.has_source() {
        app.start_login();
    }
    app.start_scheduler();

    // Main loop
    let result = run_app(&mut terminal, &mut app).await;

    app.shutdown().await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    info!("Elimwatch shutting down");
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        // Draw UI
        terminal.draw(|f| render(f, app))?;

        // Poll for events with timeout to allow background updates
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            if let Event::Key(key) = event::read()? {
                // Ctrl+C to quit
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    return Ok(());
                }

                // Handle input
                if handle_input(app, key).await? {
                    return Ok(());
                }
            }
        }

        // Drain settled refreshes from the scheduler and forced fetches
        app.check_background_tasks();

        // Check if we should quit
        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}
