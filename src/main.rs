use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::mpsc;

use clap::Parser;
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod controller;
mod domain;
mod inputter;
mod loader;
mod model;
mod ui;
mod view;

use controller::Controller;
use domain::{Message, XlvConfig, XlvError};
use model::{Model, Status};
use ui::TableUI;

/// A tui based Excel spreadsheet viewer.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Path of the .xlsx/.xls file to open
    file: String,

    /// Event poll interval in milliseconds
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,

    /// Maximum rendered column width in characters
    #[arg(long, default_value_t = 40)]
    max_column_width: usize,

    /// Raise log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Err(e) => {
            ratatui::restore();
            eprintln!("Error: {:?}", e);
            ExitCode::FAILURE
        }
        Ok(_) => {
            ratatui::restore();
            ExitCode::SUCCESS
        }
    }
}

// The terminal owns stdout, so logs go to a file next to the cwd.
fn init_tracing(verbose: u8) -> Result<(), XlvError> {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let logfile = std::fs::File::create("xlv.log")?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(Arc::new(logfile)).with_ansi(false))
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn run(cli: Cli) -> Result<(), XlvError> {
    init_tracing(cli.verbose)?;
    info!("Starting xlv!");

    let path = shellexpand::full(&cli.file).map_err(|e| XlvError::LoadingFailed(e.to_string()))?;
    let path = PathBuf::from(path.as_ref());
    let file_label = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("???")
        .to_string();

    let cfg = XlvConfig::default()
        .event_poll_time(cli.poll_ms)
        .max_column_width(cli.max_column_width);

    let (tx, rx) = mpsc::channel();
    let mut model = Model::init(&cfg, file_label);
    let controller = Controller::new(&cfg);
    let ui = TableUI::new(&cfg);

    loader::spawn_load(path, tx);

    let mut terminal = ratatui::init();
    let size = terminal.size()?;
    model.update(Message::Resize(size.width as usize, size.height as usize))?;

    while model.status != Status::Quitting {
        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Completed background loads arrive as regular messages
        while let Ok(message) = rx.try_recv() {
            model.update(message)?;
        }

        // Handle events and map to a Message
        if let Some(message) = controller.handle_event(&model)? {
            model.update(message)?;
        }
    }

    ratatui::restore();
    Ok(())
}
