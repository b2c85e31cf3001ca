//! blend-dems - per-frame neighbor blending CLI
//!
//! For every frame in `[--start-frame, --stop-frame)` the frame's surface is
//! blended with its neighbors, each blend is scored against lidar, and the
//! blend with the lowest mean error is kept as `out-blend-DEM.tif`.
//!
//! ```text
//! blend-dems --yyyymmdd 20111012 --site AN --num-processes 4
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::Parser;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};

use demblend_core::{
    default_output_folder, init_tracing, CancelToken, Frame, FrameIndex, FrameJobFactory,
    GlobFrameLocator, GroundTruthCatalog, RunConfig, RunReport, TaskScheduler, TracingReporter,
    VERSION,
};
use demblend_tools::{ProcessExecutor, ToolCommand, ToolExecutor, ToolRunner};

#[derive(Parser, Debug)]
#[command(name = "blend-dems")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Blend each frame's DEM with its neighbors and keep the best fit to lidar", long_about = None)]
struct Cli {
    /// Acquisition date, e.g. 20111012 (a trailing flight letter is allowed)
    #[arg(long)]
    yyyymmdd: String,

    /// Site name, e.g. AN or GR
    #[arg(long)]
    site: String,

    /// Output folder (default: <site>_<yyyymmdd>)
    #[arg(long)]
    output_folder: Option<PathBuf>,

    /// Number of frames per batch folder
    #[arg(long, default_value_t = 2)]
    bundle_length: u32,

    /// First frame to process
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    start_frame: i64,

    /// Frame to stop at (not processed)
    #[arg(long, default_value_t = 999_999, allow_negative_numbers = true)]
    stop_frame: i64,

    /// Process under processed/<subfolder>
    #[arg(long)]
    processing_subfolder: Option<String>,

    /// Number of frames to blend at once
    #[arg(long, default_value_t = 1, env = "DEMBLEND_NUM_PROCESSES")]
    num_processes: usize,

    /// Threads per blend process (0 lets the tool decide)
    #[arg(long, default_value_t = 8)]
    num_threads: usize,

    /// Recompute outputs that already exist
    #[arg(long)]
    redo: bool,

    /// Stream tool output instead of capturing it
    #[arg(long)]
    show_tool_output: bool,

    /// Seconds between progress messages while waiting on frames
    #[arg(long, default_value_t = 20)]
    poll_secs: u64,

    /// Write the per-frame status report to this JSON file
    #[arg(long)]
    report: Option<PathBuf>,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn run_config(&self) -> RunConfig {
        RunConfig {
            yyyymmdd: self.yyyymmdd.clone(),
            site: self.site.clone(),
            output_folder: self
                .output_folder
                .clone()
                .unwrap_or_else(|| default_output_folder(&self.site, &self.yyyymmdd)),
            processing_subfolder: self.processing_subfolder.clone(),
            bundle_length: self.bundle_length,
            start_frame: Frame(self.start_frame),
            stop_frame: Frame(self.stop_frame),
            num_processes: self.num_processes,
            num_threads: self.num_threads,
            redo: self.redo,
            suppress_output: !self.show_tool_output,
            poll_interval: Duration::from_secs(self.poll_secs),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = cli.run_config();
    config.validate().context("Invalid arguments")?;

    std::fs::create_dir_all(&config.output_folder).with_context(|| {
        format!(
            "Failed to create output folder {}",
            config.output_folder.display()
        )
    })?;

    // Setup logging
    let log_path = log_file_path(&config.output_folder, Local::now());
    let log_file = File::create(&log_path)
        .with_context(|| format!("Failed to create log file {}", log_path.display()))?;
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level, Some(log_file));
    info!(version = VERSION, log = %log_path.display(), "blend-dems starting");

    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, no longer waiting for frame jobs");
            trigger.cancel();
        }
    });

    let report = run(&config, Arc::new(ProcessExecutor), &cancel).await?;

    info!(
        committed = report.committed(),
        already_done = report.already_done(),
        skipped = report.skipped(),
        failed = report.failed(),
        cancelled = report.cancelled(),
        "finished blending"
    );

    if let Some(path) = &cli.report {
        write_report(&report, path)?;
        info!(path = %path.display(), "wrote run report");
    }

    Ok(())
}

/// Blend every frame of the run described by `config`.
async fn run(
    config: &RunConfig,
    executor: Arc<dyn ToolExecutor>,
    cancel: &CancelToken,
) -> Result<RunReport> {
    log_machine_info(executor.as_ref()).await;

    let layout = config.layout();
    let index = FrameIndex::read(&layout.ortho_index_path())
        .context("Cannot blend without the ortho index")?;
    let ground_truth = GroundTruthCatalog::scan(&layout.lidar_folder)
        .context("Failed to list ground truth files")?;
    info!(
        frames = index.len(),
        lidar_files = ground_truth.len(),
        process_folder = %layout.process_folder.display(),
        "loaded run inputs"
    );

    let locator = GlobFrameLocator::new(&layout.process_folder, config.bundle_length);
    let jobs = FrameJobFactory::new(
        Arc::new(locator),
        ToolRunner::new(executor, config.run_policy()),
        config.num_threads,
        Arc::new(TracingReporter),
    );
    let scheduler = TaskScheduler::new(config.scheduler_config(), jobs);

    Ok(scheduler.run(&index, &ground_truth, cancel).await)
}

async fn log_machine_info(executor: &dyn ToolExecutor) {
    let uname = ToolCommand::new("uname", vec!["-a".to_string()]);
    match executor.spawn(&uname, true).await {
        Ok(output) if output.succeeded() => info!(machine = %output.stdout.trim(), "host"),
        Ok(output) => warn!(exit_code = output.exit_code, "uname failed"),
        Err(e) => warn!(error = %e, "could not query machine info"),
    }
}

fn log_file_path(output_folder: &Path, now: DateTime<Local>) -> PathBuf {
    output_folder.join(format!(
        "blend_dems_log_{}.txt",
        now.format("%Y%m%d_%H%M%S")
    ))
}

fn write_report(report: &RunReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize run report")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write run report {}", path.display()))
}
