use anyhow::Context;
use chrono::NaiveDate;
use clap::Parser;
use nightjar_analysis::PipelineRegistry;
use nightjar_watcher::{DeletePolicy, Watcher, WatcherConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Watch a directory for new audio recordings and classify them.
#[derive(Parser, Debug)]
#[command(name = "nightjar", version, about)]
struct Cli {
    /// Directory to watch for incoming recordings
    #[arg(long, value_name = "DIR")]
    input_dir: PathBuf,

    /// Root directory for timestamped result directories
    #[arg(long, value_name = "DIR")]
    output_dir: PathBuf,

    /// Directory holding one subdirectory per pipeline
    #[arg(long, value_name = "DIR")]
    model_dir: PathBuf,

    /// Pipeline to run
    #[arg(long, default_value = "energy")]
    model: String,

    /// File suffix to watch for
    #[arg(long, default_value = ".wav")]
    pattern: String,

    /// Detections below this confidence are dropped
    #[arg(long, default_value_t = 0.25)]
    min_confidence: f32,

    /// Recording site latitude (requires --longitude and --date)
    #[arg(long)]
    latitude: Option<f64>,

    /// Recording site longitude (requires --latitude and --date)
    #[arg(long)]
    longitude: Option<f64>,

    /// Recording date, YYYY-MM-DD (requires --latitude and --longitude)
    #[arg(long, value_name = "DATE")]
    date: Option<NaiveDate>,

    /// Presence threshold for the species predictor
    #[arg(long, default_value_t = 0.03)]
    species_threshold: f32,

    /// What happens to inputs once they have a result: never, on_cleanup, always
    #[arg(long, default_value = "never")]
    delete_recordings: DeletePolicy,

    /// Poll interval for the filesystem watch, in milliseconds
    #[arg(long, default_value_t = 1_000)]
    poll_interval_ms: u64,

    /// Budget for graceful worker shutdown, in seconds
    #[arg(long, default_value_t = 30)]
    stop_timeout_secs: u64,

    /// Record gaps in the missing-files ledger instead of re-analyzing them
    #[arg(long)]
    no_reanalyze: bool,

    /// Run one reconciliation pass and exit
    #[arg(long)]
    cleanup: bool,
}

impl Cli {
    fn watcher_config(&self) -> WatcherConfig {
        let mut config = WatcherConfig {
            input_dir: self.input_dir.clone(),
            output_root: self.output_dir.clone(),
            model_dir: self.model_dir.clone(),
            model_name: self.model.clone(),
            pattern: self.pattern.clone(),
            poll_interval_ms: self.poll_interval_ms,
            stop_timeout_secs: self.stop_timeout_secs,
            delete_policy: self.delete_recordings,
            reanalyze_on_cleanup: !self.no_reanalyze,
            preprocessor: Default::default(),
            model: Default::default(),
            recording: Default::default(),
        };
        config.recording.min_confidence = self.min_confidence;
        config.recording.latitude = self.latitude;
        config.recording.longitude = self.longitude;
        config.recording.date = self.date;
        config.recording.species_threshold = self.species_threshold;
        config
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    let registry = PipelineRegistry::with_builtins(&cli.model_dir);
    let mut watcher =
        Watcher::new(cli.watcher_config(), registry).context("failed to build watcher")?;

    if cli.cleanup {
        let report = watcher.clean_up().context("reconciliation failed")?;
        tracing::info!(
            scanned = report.scanned,
            reanalyzed = report.reanalyzed.len(),
            missing = report.missing.len(),
            deleted = report.deleted.len(),
            "reconciliation complete"
        );
        return Ok(());
    }

    watcher.start().context("failed to start watcher")?;
    tracing::info!(
        input = %cli.input_dir.display(),
        model = %cli.model,
        "watching for recordings; Ctrl-C to stop"
    );

    let mut drain_interval = tokio::time::interval(Duration::from_secs(5));
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for Ctrl-C")?;
                tracing::info!("shutdown signal received");
                break;
            }
            _ = drain_interval.tick() => {
                for err in watcher.drain_errors() {
                    tracing::error!(error = %err, "worker error");
                }
            }
        }
    }

    watcher.stop().context("failed to stop watcher")?;
    for err in watcher.drain_errors() {
        tracing::error!(error = %err, "worker error");
    }
    watcher.metrics().log_summary();
    Ok(())
}
