//! Ember - Firestorm Run Dashboard
//!
//! A terminal-based dashboard for launching Firestorm load-test runs and
//! watching their query traffic live.
//!
//! ## Usage
//!
//! ```bash
//! # Start the dashboard
//! ember
//!
//! # With verbose logging
//! ember -v
//!
//! # Point at an existing results directory
//! ember --manifest results/firestorm_manifest.json \
//!       --event-log results/firestorm_mmap.log
//!
//! # Show version
//! ember --version
//! ```

use std::io::Write;
use std::panic;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use ember_core::{AppConfig, LogGuard, init_logging};
use ember_tui::App;
use tracing::{error, info};

/// Ember Firestorm Run Dashboard
///
/// A terminal-based interface for launching Firestorm runs, tailing the
/// event log, and visualizing query traffic between agents and the hub.
#[derive(Parser, Debug)]
#[command(name = "ember")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging (increases log level)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Directory for log files (defaults to ~/.ember/logs/)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Configuration file (defaults to ~/.ember/config.yaml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run manifest path, overriding the configuration
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Event log path, overriding the configuration
    #[arg(long)]
    event_log: Option<PathBuf>,

    /// Program used to launch the generator (e.g. python)
    #[arg(long)]
    generator: Option<String>,

    /// Working directory for generator runs
    #[arg(long)]
    working_dir: Option<PathBuf>,

    /// Default agent count offered in the run prompt
    #[arg(long)]
    agents: Option<u32>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let _guard = match setup_logging(&cli) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::from(1);
        }
    };

    // Install panic hook to ensure terminal cleanup
    install_panic_hook();

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            eprintln!("Configuration error: {}", e);
            if let Some(hint) = e.guidance() {
                eprintln!("  {}", hint);
            }
            return ExitCode::from(1);
        }
    };

    info!("Starting Ember dashboard");

    // Run the TUI application
    match run_app(config) {
        Ok(()) => {
            info!("Ember dashboard exited normally");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Ember dashboard error: {}", e);
            eprintln!("Error: {}", e);
            ExitCode::from(1)
        }
    }
}

/// Install a panic hook that restores the terminal before printing the panic message.
///
/// This ensures that even if the application panics while in raw mode with the
/// alternate screen enabled, the terminal will be properly restored so the user
/// can see the panic message and continue using their terminal.
fn install_panic_hook() {
    let original_hook = panic::take_hook();

    panic::set_hook(Box::new(move |panic_info| {
        // Attempt to restore terminal state
        let _ = restore_terminal();

        // Call the original panic hook to print the panic message
        original_hook(panic_info);
    }));
}

/// Restore terminal to its normal state.
fn restore_terminal() -> std::io::Result<()> {
    let mut stdout = std::io::stdout();

    // Disable raw mode first
    let _ = crossterm::terminal::disable_raw_mode();

    // Leave alternate screen and disable mouse capture
    crossterm::execute!(
        stdout,
        crossterm::terminal::LeaveAlternateScreen,
        crossterm::event::DisableMouseCapture
    )?;

    // Show cursor
    crossterm::execute!(stdout, crossterm::cursor::Show)?;

    // Flush to ensure all escape sequences are written
    stdout.flush()?;

    Ok(())
}

/// Set up logging based on CLI arguments.
fn setup_logging(cli: &Cli) -> ember_core::Result<LogGuard> {
    let debug = cli.verbose > 0;
    init_logging(cli.log_dir.clone(), debug)
}

/// Load the configuration file and fold in command line overrides.
fn build_config(cli: &Cli) -> ember_core::Result<AppConfig> {
    let mut config = AppConfig::load(cli.config.clone())?;

    if let Some(path) = &cli.manifest {
        config = config.with_manifest_path(path);
    }
    if let Some(path) = &cli.event_log {
        config = config.with_event_log_path(path);
    }
    if let Some(program) = &cli.generator {
        config = config.with_generator_program(program.clone());
    }
    if let Some(dir) = &cli.working_dir {
        config = config.with_working_dir(dir);
    }
    if let Some(count) = cli.agents {
        config = config.with_default_agent_count(count);
    }

    Ok(config)
}

/// Run the TUI application.
fn run_app(config: AppConfig) -> ember_tui::AppResult<()> {
    let mut app = App::new(config);
    app.run()
}
