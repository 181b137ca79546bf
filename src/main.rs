//! markwatch - Track geographic markers and watch them change
//!
//! A thin client for the change-observer marker API. Without a subcommand it
//! opens a terminal UI; with one it performs a single marker operation.

use std::io;
use std::panic;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::info;

use markwatch::app::App;
use markwatch::cli::{Cli, Command};
use markwatch::commands::{self, OutputOptions};
use markwatch::config::Config;
use markwatch::data::HttpTransport;
use markwatch::logging::{self, LogTarget};
use markwatch::notify::{ChannelNotifier, ConsoleNotifier};
use markwatch::sync::MarkerSync;
use markwatch::ui;

/// Sets up a panic hook that restores the terminal before printing the panic message.
/// This ensures the terminal is usable even if the application panics.
fn setup_panic_hook() {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        // Attempt to restore the terminal
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        // Call the original panic hook
        original_hook(panic_info);
    }));
}

/// Resolves configuration: file, then environment, then `--api-url`
fn load_config(cli: &Cli) -> Result<Config, Box<dyn std::error::Error>> {
    let config = Config::load(cli.config.as_deref())?;
    Ok(match cli.api_url.as_deref() {
        Some(url) => config.with_api_url(url)?,
        None => config,
    })
}

/// Runs one subcommand against the API and prints the result to stdout
async fn run_command(config: Config, command: Command, json: bool) -> ExitCode {
    logging::init(LogTarget::Stderr);

    let transport = match HttpTransport::from_config(&config) {
        Ok(transport) => transport,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let sync = MarkerSync::new(Arc::new(transport), Arc::new(ConsoleNotifier));
    let options = OutputOptions {
        json,
        maps_api_key: config.maps_api_key,
    };

    match commands::run(&sync, command, &options, &mut io::stdout().lock()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if !e.is_reported() {
                eprintln!("Error: {}", e);
            }
            ExitCode::FAILURE
        }
    }
}

/// Runs the terminal UI until the user quits
async fn run_tui(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    match logging::default_log_path() {
        Some(path) => logging::init(LogTarget::File(path)),
        None => logging::init(LogTarget::Stderr),
    }
    info!(api_url = %config.api_url, "starting markwatch");

    let transport = HttpTransport::from_config(&config)?;
    let (notifier, notifications) = ChannelNotifier::channel();
    let sync = MarkerSync::new(Arc::new(transport), Arc::new(notifier));

    // Set up panic hook to restore terminal on crash
    setup_panic_hook();

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(sync, notifications).with_maps_api_key(config.maps_api_key);
    app.load();

    // Main event loop
    loop {
        app.tick();
        terminal.draw(|f| ui::render(f, &app))?;

        // Poll for keyboard events with 100ms timeout. Polling blocks, so it
        // runs off the async workers that drive fetches.
        let key = tokio::task::block_in_place(|| -> io::Result<_> {
            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    return Ok(Some(key));
                }
            }
            Ok(None)
        })?;
        if let Some(key) = key.filter(|k| k.kind == KeyEventKind::Press) {
            app.handle_key(key);
        }

        // Check if we should quit
        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Some(command) => run_command(config, command, cli.json).await,
        None => match run_tui(config).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                let _ = disable_raw_mode();
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        },
    }
}
