//! telemetry-replay: drives a search telemetry recorder from a script.
//!
//! Reads JSON-lines host events (see [`script`]) from a file or stdin, feeds
//! them to a `Recorder` with file-backed session storage, and posts the
//! resulting payloads to the configured collector. `--dry-run` prints the
//! payloads to stdout instead.

mod logging;
mod output;
mod script;

use std::io::{self, BufReader};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use fs_err as fs;
use telemetry_core::{
    load_config, FileStorage, HttpTransport, NullTransport, Recorder, StoragePaths,
    TelemetryConfig, Transport,
};

use crate::output::PrintTransport;
use crate::script::Replayer;

#[derive(Parser)]
#[command(name = "telemetry-replay")]
#[command(about = "Replay host UI events through the search telemetry recorder")]
#[command(version)]
struct Cli {
    /// JSON-lines script; reads stdin when omitted
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Collector URL (overrides config and environment)
    #[arg(long)]
    endpoint: Option<String>,

    /// Config file (defaults to config.json under the storage root)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Storage root for config, per-tab sessions and logs
    #[arg(long)]
    storage_dir: Option<PathBuf>,

    /// Tab/window whose session storage is used
    #[arg(long, default_value = "default")]
    tab_id: String,

    /// Print payloads instead of sending them
    #[arg(long)]
    dry_run: bool,
}

fn main() {
    let cli = Cli::parse();
    let paths = cli
        .storage_dir
        .clone()
        .map(StoragePaths::with_root)
        .unwrap_or_default();
    let _logging_guard = logging::init(&paths.logs_dir());

    if let Err(e) = run(cli, &paths) {
        tracing::error!(error = %e, "telemetry-replay failed");
        std::process::exit(1);
    }
}

fn run(cli: Cli, paths: &StoragePaths) -> Result<(), String> {
    let config = resolve_config(&cli, paths);
    if !config.enabled {
        tracing::info!("Telemetry disabled; nothing to replay");
        return Ok(());
    }

    let transport = select_transport(&config, cli.dry_run);
    let storage = Arc::new(FileStorage::new(&paths.tab_dir(&cli.tab_id)));
    let recorder = Recorder::new(config, storage, transport);
    let replayer = Replayer::new(recorder);

    let summary = match &cli.input {
        Some(path) => {
            let file = fs::File::open(path).map_err(|e| e.to_string())?;
            replayer.run(BufReader::new(file))?
        }
        None => replayer.run(io::stdin().lock())?,
    };

    tracing::info!(
        tab_id = %cli.tab_id,
        applied = summary.applied,
        skipped = summary.skipped,
        sent = summary.sent,
        failed = summary.failed,
        "Replay finished"
    );
    Ok(())
}

fn resolve_config(cli: &Cli, paths: &StoragePaths) -> TelemetryConfig {
    let config_path = cli.config.clone().unwrap_or_else(|| paths.config_file());
    let mut config = load_config(&config_path).with_env_overrides();
    if let Some(endpoint) = &cli.endpoint {
        config.endpoint = Some(endpoint.clone());
    }
    config
}

fn select_transport(config: &TelemetryConfig, dry_run: bool) -> Arc<dyn Transport> {
    if dry_run {
        Arc::new(PrintTransport)
    } else if config.endpoint.is_some() {
        Arc::new(HttpTransport::new())
    } else {
        tracing::warn!("No collector endpoint configured; payloads will be dropped");
        Arc::new(NullTransport)
    }
}
