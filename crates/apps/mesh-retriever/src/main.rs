//! mesh-retriever - moves files from a MESH mailbox into blob storage
//!
//! Runs a transfer cycle on a fixed interval, or once with `--once`.

use clap::Parser;
use log::{error, info, warn};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use mesh::RetrieverConfig;

mod app;

use app::RetrieverApp;

#[derive(Parser, Debug)]
#[command(
    name = "mesh-retriever",
    version,
    about = "Move files from a MESH mailbox to blob storage"
)]
struct Args {
    /// Settings file (defaults to ~/.config/meshbridge/retriever.json, then environment variables)
    #[arg(short, long, env = "MESH_RETRIEVER_CONFIG")]
    config: Option<PathBuf>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Seconds between cycles (overrides the configured interval)
    #[arg(long)]
    interval_secs: Option<u64>,
}

fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();

    // Bootstrap config directory
    if let Err(e) = config::init() {
        warn!("Failed to initialize config directory: {}", e);
    }

    let mut settings = match RetrieverConfig::load(args.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load retriever settings: {:#}", e);
            if let Some(path) = RetrieverConfig::default_config_path() {
                error!(
                    "To configure the retriever, either:\n\
                     1. Place a settings file at: {}\n\
                     2. Or set MESH_API_BASE_URL, BSS_MAILBOX, MESH_PASSWORD, MESH_SHARED_KEY and BLOB_CONNECTION_STRING",
                    path.display()
                );
            }
            return ExitCode::FAILURE;
        }
    };
    if let Some(secs) = args.interval_secs.filter(|s| *s > 0) {
        settings.poll_interval_secs = secs;
    }
    info!("Loaded settings: {:?}", settings);

    let app = match RetrieverApp::new(settings) {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to start retriever: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = app.ensure_containers() {
        error!("{:#}", e);
        return ExitCode::FAILURE;
    }

    if args.once {
        let report = app.run_tick();
        return if report.is_success() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        };
    }

    let interval = app.poll_interval();
    info!("Polling every {}s", interval.as_secs());
    loop {
        info!("Transfer cycle started at {}", chrono::Utc::now().to_rfc3339());
        app.run_tick();

        let next = chrono::Utc::now()
            + chrono::Duration::from_std(interval).unwrap_or(chrono::Duration::zero());
        info!("Next cycle at {}", next.to_rfc3339());
        std::thread::sleep(interval.max(Duration::from_secs(1)));
    }
}
