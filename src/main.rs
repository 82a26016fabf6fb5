use std::hash::Hash;
use std::io;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use serde::de::DeserializeOwned;

use gadget_report::config::DEFAULT_MAX_ROWS;
use gadget_report::gadgets::top_file::Stats;
use gadget_report::gadgets::trace_signal::Event;
use gadget_report::replay::{self, ReplayStats};
use gadget_report::{BatchSource, CancelToken, OutputFormat, Record, ReportConfig, StreamDriver};

#[derive(Parser)]
#[command(name = "gadget-report")]
#[command(about = "Sort, filter and render recorded gadget events")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Periodically show the files with the most read/write activity
    TopFile {
        #[command(flatten)]
        report: ReportArgs,

        /// Refresh interval in seconds
        #[arg(long, default_value_t = 1.0)]
        interval: f64,

        /// Rows shown per interval (0 = all)
        #[arg(short, long, default_value_t = DEFAULT_MAX_ROWS)]
        max_rows: usize,

        /// Number of intervals to show (0 = until input ends or Ctrl-C)
        #[arg(long, default_value_t = 0)]
        count: u64,

        /// Show all files (by default only regular files are shown)
        #[arg(short, long)]
        all_files: bool,
    },
    /// Show signals sent between processes once the input ends
    TraceSignal {
        #[command(flatten)]
        report: ReportArgs,

        /// Rows shown (0 = all)
        #[arg(short, long, default_value_t = 0)]
        max_rows: usize,
    },
}

#[derive(Args)]
struct ReportArgs {
    /// JSON lines file with recorded events ('-' or absent for stdin)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Sort by these columns, '-' prefix for descending (e.g. -reads,comm)
    #[arg(short, long, value_delimiter = ',', allow_hyphen_values = true)]
    sort: Vec<String>,

    /// Columns to show in the table
    #[arg(short, long, value_delimiter = ',')]
    columns: Vec<String>,

    /// Row filter column:[!|>|>=|<|<=|~]value, may be repeated
    #[arg(short = 'F', long)]
    filter: Vec<String>,

    /// Output format: columns, json, json-pretty
    #[arg(short, long, default_value = "columns")]
    output: String,

    /// Stop after this many seconds (0 = until input ends or Ctrl-C)
    #[arg(short, long, default_value_t = 0)]
    duration: u64,
}

impl ReportArgs {
    fn config(&self) -> Result<ReportConfig> {
        let format: OutputFormat = self.output.parse().map_err(|e: String| anyhow!(e))?;
        Ok(ReportConfig {
            sort: self.sort.clone(),
            columns: self.columns.clone(),
            filters: self.filter.clone(),
            format,
            duration: Duration::from_secs(self.duration),
            ..ReportConfig::default()
        })
    }
}

fn init_logging(verbose: u8) {
    let log_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    // RUST_LOG wins over the command line.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
}

fn run_trace<T>(config: &ReportConfig, input: Option<&Path>, cancel: &CancelToken) -> Result<()>
where
    T: Record + DeserializeOwned + Send,
{
    let mut driver = StreamDriver::<T, _>::from_config(config, io::stdout().lock())?;
    let (events, collector) = replay::spawn_trace::<T, _>(replay::open_input(input)?);
    driver.run_trace(events, cancel)?;

    // Without a cancel or deadline the driver only returns once the input
    // is exhausted.
    let exhausted = !cancel.is_cancelled() && config.duration().is_none();
    finish_collector(collector, exhausted)
}

fn run_top<T, K>(
    config: &ReportConfig,
    input: Option<&Path>,
    key: fn(&T) -> K,
    merge: fn(&mut T, T),
    accept: fn(&T) -> bool,
    cancel: &CancelToken,
) -> Result<()>
where
    T: Record + DeserializeOwned + Send,
    K: Eq + Hash + Send + 'static,
{
    let mut driver = StreamDriver::<T, _>::from_config(config, io::stdout().lock())?;
    let (accumulator, collector) =
        replay::spawn_top(replay::open_input(input)?, key, merge, accept);
    driver.run_top(&*accumulator, cancel)?;

    let exhausted = accumulator.is_finished();
    finish_collector(collector, exhausted)
}

/// Join the replay thread unless it may still be blocked on input.
fn finish_collector(collector: JoinHandle<Result<ReplayStats>>, exhausted: bool) -> Result<()> {
    if !exhausted && !collector.is_finished() {
        return Ok(());
    }
    let stats = collector
        .join()
        .map_err(|_| anyhow!("replay thread panicked"))??;
    info!(
        "Replayed {} records ({} lines skipped)",
        stats.records, stats.skipped
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel())
        .context("failed to install Ctrl-C handler")?;

    match cli.command {
        Commands::TopFile {
            report,
            interval,
            max_rows,
            count,
            all_files,
        } => {
            if !(interval.is_finite() && interval > 0.0) {
                bail!("--interval must be a positive number of seconds, got {interval}");
            }
            let config = ReportConfig {
                max_rows,
                interval: Duration::from_secs_f64(interval),
                count,
                ..report.config()?
            };
            let accept: fn(&Stats) -> bool = if all_files {
                |_| true
            } else {
                Stats::is_regular_file
            };
            run_top::<Stats, _>(
                &config,
                report.input.as_deref(),
                Stats::key,
                Stats::merge,
                accept,
                &cancel,
            )
        }
        Commands::TraceSignal { report, max_rows } => {
            let config = ReportConfig {
                max_rows,
                ..report.config()?
            };
            run_trace::<Event>(&config, report.input.as_deref(), &cancel)
        }
    }
}
