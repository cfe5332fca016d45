//! `mapscale` command-line driver.
//!
//! Runs a scalability sweep for one map and prints the report to stdout.
//! Logs go to stderr (and optionally an NDJSON file), never to stdout.
//!
//! Run with:
//! ```bash
//! # Default sweep: dashmap, 1..=physical cores, 200 chunks of 10 000 iterations
//! mapscale
//!
//! # Write-heavy, 4:1 inserts, skip list, 8 workers
//! mapscale -r 1 -w 4 -n 4 -d 1 --map skipmap --threads 8
//!
//! # Latency columns as JSON, chunk-level logs to a file
//! RUST_LOG=mapscale=trace mapscale --report latency --format json --log-file logs/run.jsonl
//!
//! # Every preset ratio pair for every map
//! mapscale -c 20 matrix --out-dir results
//! ```

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};

use mapscale::config::{
    DEFAULT_CHUNKS, DEFAULT_INSERTS_PER_REMOVE, DEFAULT_ITERS_PER_CHUNK,
    DEFAULT_KEEP_CHUNK_FRACTION, DEFAULT_READS_PER_WRITE, DEFAULT_REMOVES_PER_INSERT,
    DEFAULT_WRITES_PER_READ, NUM_KEYS_PER_THREAD,
};
use mapscale::{
    AdapterVisitor, BarrierKind, HarnessError, MapAdapter, MapKind, MatrixRunner, Report,
    ReportMode, RunConfig, Sweep,
};

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

// =============================================================================
// CLI Definitions
// =============================================================================

#[derive(Parser, Debug)]
#[command(name = "mapscale", version)]
#[command(about = "Measure how concurrent map throughput scales with worker count")]
struct Cli {
    #[command(flatten)]
    run: RunArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every preset read:write x insert:remove pair and write one report per pair
    Matrix(MatrixArgs),
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    /// Lookups per read phase
    #[arg(short = 'r', long, default_value_t = DEFAULT_READS_PER_WRITE)]
    reads_per_write: usize,

    /// Driver iterations per chunk
    #[arg(short = 'i', long, default_value_t = DEFAULT_ITERS_PER_CHUNK)]
    iters_per_chunk: usize,

    /// Measured chunks per worker count
    #[arg(short = 'c', long, default_value_t = DEFAULT_CHUNKS)]
    chunks: usize,

    /// Fraction of fastest chunks kept (0.0 to 1.0)
    #[arg(short = 'k', long, default_value_t = DEFAULT_KEEP_CHUNK_FRACTION)]
    keep_chunk_fraction: f64,

    /// Baseline writes per iteration
    #[arg(short = 'w', long, default_value_t = DEFAULT_WRITES_PER_READ)]
    writes_per_read: usize,

    /// Insert weight of the insert:remove ratio
    #[arg(short = 'n', long, default_value_t = DEFAULT_INSERTS_PER_REMOVE)]
    inserts_per_remove: usize,

    /// Remove weight of the insert:remove ratio
    #[arg(short = 'd', long, default_value_t = DEFAULT_REMOVES_PER_INSERT)]
    removes_per_insert: usize,

    /// Map under test
    #[arg(long, default_value_t = MapKind::DashMap)]
    map: MapKind,

    /// Worker capacity (default: physical cores)
    #[arg(long)]
    threads: Option<usize>,

    /// Start barrier used to release followers
    #[arg(long, value_enum, default_value = "spin")]
    barrier: Barrier,

    /// Point columns
    #[arg(long, default_value_t = ReportMode::Throughput)]
    report: ReportMode,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: Format,

    /// Also write NDJSON logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct MatrixArgs {
    /// Directory receiving `<map>/results_<rw>_<ir>.txt`
    #[arg(long)]
    out_dir: PathBuf,

    /// Maps to run (default: all)
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    maps: Vec<MapKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Barrier {
    /// Busy-wait on a pending-kick counter
    Spin,
    /// Mutex + condition variable
    Condvar,
}

impl From<Barrier> for BarrierKind {
    fn from(barrier: Barrier) -> Self {
        match barrier {
            Barrier::Spin => Self::Spin,
            Barrier::Condvar => Self::Condvar,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Python dict literal, points streamed as measured
    Text,
    /// JSON document, written at the end
    Json,
}

impl RunArgs {
    const fn config(&self) -> RunConfig {
        RunConfig {
            num_keys_per_thread: NUM_KEYS_PER_THREAD,
            reads_per_write: self.reads_per_write,
            writes_per_read: self.writes_per_read,
            iters_per_chunk: self.iters_per_chunk,
            inserts_per_remove: self.inserts_per_remove,
            removes_per_insert: self.removes_per_insert,
            chunks: self.chunks,
            keep_chunk_fraction: self.keep_chunk_fraction,
        }
    }

    /// Configuration checked up front, so nothing reaches stdout for a run
    /// that cannot start.
    fn checked_config(&self) -> Result<RunConfig> {
        let config = self.config();
        config.validate().context("invalid configuration")?;
        if self.threads == Some(0) {
            return Err(HarnessError::NoWorkers).context("invalid --threads");
        }
        Ok(config)
    }
}

// =============================================================================
// Tracing
// =============================================================================

#[cfg(feature = "tracing")]
type LogGuard = Option<tracing_appender::non_blocking::WorkerGuard>;

#[cfg(not(feature = "tracing"))]
type LogGuard = ();

const DEFAULT_FILTER: &str = "mapscale=info";

#[cfg(feature = "tracing")]
fn init_tracing(log_file: Option<&Path>) -> Result<LogGuard> {
    use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

    let filter =
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_thread_names(true)
        .with_target(true)
        .compact()
        .with_filter(filter());

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .with_context(|| format!("log file {} has no file name", path.display()))?;
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating log directory {}", dir.display()))?;

            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false)
                .json()
                .with_filter(filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("installing tracing subscriber")?;

    Ok(guard)
}

#[cfg(not(feature = "tracing"))]
fn init_tracing(log_file: Option<&Path>) -> Result<LogGuard> {
    if log_file.is_some() {
        eprintln!("--log-file ignored: built without the `tracing` feature");
    }
    Ok(())
}

// =============================================================================
// Commands
// =============================================================================

/// One sweep for the selected map, report on stdout.
struct SweepCommand<'a> {
    args: &'a RunArgs,
    config: RunConfig,
}

impl AdapterVisitor for SweepCommand<'_> {
    type Output = Result<()>;

    fn visit<A: MapAdapter + Clone>(self, adapter: A) -> Result<()> {
        let mut sweep = Sweep::new(adapter, self.config).barrier(self.args.barrier.into());
        if let Some(threads) = self.args.threads {
            sweep = sweep.max_workers(threads);
        }

        sweep.validate()?;

        let mode = self.args.report;
        let mut out = io::stdout().lock();

        match self.args.format {
            Format::Text => {
                sweep
                    .blank_report()
                    .write_text_header(mode, &mut out)
                    .and_then(|()| out.flush())
                    .context("writing report header")?;

                let mut write_error = None;
                sweep.run_with(|point| {
                    if write_error.is_none() {
                        let written = Report::write_text_point(mode, point, &mut out)
                            .and_then(|()| out.flush());
                        write_error = written.err();
                    }
                })?;
                if let Some(err) = write_error {
                    return Err(err).context("writing report point");
                }

                Report::write_text_footer(&mut out).context("writing report footer")?;
            }
            Format::Json => {
                let report = sweep.run()?;
                report
                    .write_json(mode, &mut out)
                    .context("writing JSON report")?;
            }
        }
        Ok(())
    }
}

fn run_matrix(args: &RunArgs, config: RunConfig, matrix: &MatrixArgs) -> Result<()> {
    let mut runner = MatrixRunner::new(config, &matrix.out_dir)
        .barrier(args.barrier.into())
        .mode(args.report);
    if let Some(threads) = args.threads {
        runner = runner.max_workers(threads);
    }

    let maps = if matrix.maps.is_empty() {
        MapKind::ALL.to_vec()
    } else {
        matrix.maps.clone()
    };

    for kind in maps {
        let written = runner
            .run_kind(kind)
            .with_context(|| format!("matrix run for {kind}"))?;
        for path in written {
            eprintln!("wrote {}", path.display());
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.run.log_file.as_deref())?;

    let config = cli.run.checked_config()?;

    match &cli.command {
        Some(Command::Matrix(matrix)) => run_matrix(&cli.run, config, matrix),
        None => cli.run.map.visit(SweepCommand {
            args: &cli.run,
            config,
        }),
    }
}
