use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod controller;
mod data;
mod domain;
mod engine;
mod inputter;
mod model;
mod record;
mod ui;

use controller::Controller;
use domain::{NexusError, ViewerConfig};
use engine::SortDirection;
use model::{Model, Status};
use ui::TableUI;

/// Page through ASH Nexus program exports in the terminal.
#[derive(Parser, Debug)]
#[command(name = "nexus-view", version)]
struct Cli {
    /// Export file to view (csv, parquet or arrow)
    path: String,

    /// Records per page
    #[arg(long, default_value_t = 25)]
    page_size: usize,

    /// Start with this search query applied
    #[arg(long)]
    search: Option<String>,

    /// Start sorted by this field
    #[arg(long)]
    sort_by: Option<String>,

    /// Sort descending instead of ascending
    #[arg(long, requires = "sort_by")]
    descending: bool,

    /// Append tracing output to this file (filtered by RUST_LOG)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Input poll interval in milliseconds
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_tracing(cli.log_file.as_deref()) {
        eprintln!("Error: {e:?}");
        return ExitCode::FAILURE;
    }
    match run(cli) {
        Err(e) => {
            ratatui::restore();
            eprintln!("Error: {e:?}");
            ExitCode::FAILURE
        }
        Ok(()) => {
            ratatui::restore();
            ExitCode::SUCCESS
        }
    }
}

// A tui owns the terminal, so tracing goes to a file when requested and
// nowhere otherwise.
fn init_tracing(log_file: Option<&Path>) -> Result<(), NexusError> {
    let Some(path) = log_file else {
        return Ok(());
    };
    let file = std::fs::File::create(path)?;
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(ErrorLayer::default())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Arc::new(file))
                .with_ansi(false),
        )
        .init();
    Ok(())
}

fn run(cli: Cli) -> Result<(), NexusError> {
    let expanded =
        shellexpand::full(&cli.path).map_err(|e| NexusError::LoadingFailed(e.to_string()))?;
    let path = PathBuf::from(expanded.as_ref());

    let mut config = ViewerConfig::default()
        .event_poll_time(cli.poll_ms)
        .page_size(cli.page_size);
    if let Some(query) = cli.search {
        config = config.initial_search(query);
    }
    if let Some(key) = cli.sort_by {
        let direction = if cli.descending {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        };
        config = config.initial_sort((key, direction));
    }

    let mut model = Model::new(&config);
    model.begin_loading(path.file_name().and_then(|s| s.to_str()).unwrap_or("???"));
    let dataset = data::load(&path)?;
    info!("Viewing {} with {} records", dataset.name, dataset.records.len());
    model.attach_dataset(dataset, &config);

    let controller = Controller::new(&config);
    let ui = TableUI::new();
    let mut terminal = ratatui::init();

    while model.status != Status::Quitting {
        terminal.draw(|frame| ui.draw(model.page_view(), frame))?;
        if let Some(message) = controller.handle_event(&model)? {
            model.update(message)?;
        }
    }

    Ok(())
}
