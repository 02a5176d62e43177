//! Command-line front end.
//!
//! ```bash
//! # list allocators and benchmarks
//! allocbench --list
//!
//! # one cell, printed in detail
//! allocbench -a system -b sequential_alloc -i 100000
//!
//! # the whole matrix, JSON (and CSV) under ./results
//! allocbench --csv
//!
//! # iteration sweep for one benchmark
//! allocbench --graph -b larson
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use allocbench::{BenchError, Harness, ResultsLog, Settings, report};

#[derive(Parser, Debug)]
#[command(
    name = "allocbench",
    version,
    about = "Benchmark pluggable memory allocators"
)]
struct Args {
    /// List available allocators and benchmarks, then exit
    #[arg(short = 'l', long)]
    list: bool,

    /// Only run this allocator
    #[arg(short = 'a', long = "allocator", value_name = "NAME")]
    allocator: Option<String>,

    /// Only run this benchmark
    #[arg(short = 'b', long = "benchmark", value_name = "NAME")]
    benchmark: Option<String>,

    /// Output directory for result files
    #[arg(short = 'o', long = "output", value_name = "DIR")]
    output: Option<PathBuf>,

    /// Iterations per benchmark
    #[arg(short = 'i', long)]
    iterations: Option<usize>,

    /// Smallest allocation size in bytes
    #[arg(long)]
    min_size: Option<usize>,

    /// Largest allocation size in bytes
    #[arg(long)]
    max_size: Option<usize>,

    /// Seed for the decision stream
    #[arg(long)]
    seed: Option<u32>,

    /// TOML settings file; flags override it
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Sweep iteration counts and write graph_<benchmark>.json
    #[arg(long)]
    graph: bool,

    /// Also write a CSV next to the JSON log
    #[arg(long)]
    csv: bool,

    /// Debug logging
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("allocbench=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("allocbench=info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// File settings with command-line overrides applied.
fn settings(args: &Args) -> Result<Settings, BenchError> {
    let mut settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(dir) = &args.output {
        settings.output_dir = dir.clone();
    }
    if let Some(name) = &args.allocator {
        settings.allocators = vec![name.clone()];
    }
    if let Some(name) = &args.benchmark {
        settings.benchmarks = vec![name.clone()];
    }
    if let Some(n) = args.iterations {
        settings.run.iterations = n;
    }
    if let Some(n) = args.min_size {
        settings.run.min_size = n;
    }
    if let Some(n) = args.max_size {
        settings.run.max_size = n;
    }
    if let Some(seed) = args.seed {
        settings.run.seed = seed;
    }
    settings.csv |= args.csv;
    settings.run.validate()?;
    Ok(settings)
}

fn run(args: Args) -> Result<(), BenchError> {
    let settings = settings(&args)?;
    let mut harness = Harness::with_builtin();

    if args.list {
        println!("Available allocators:");
        for name in harness.allocators().names() {
            println!("  {name}");
        }
        println!("\nAvailable benchmarks:");
        for bench in harness.benchmarks().iter() {
            println!("  {:<25} - {}", bench.name, bench.description);
        }
        return Ok(());
    }

    if args.graph {
        return run_sweeps(&mut harness, &settings, args.allocator.as_deref());
    }

    if let (Some(allocator), Some(benchmark)) = (&args.allocator, &args.benchmark) {
        let result = harness.run_single(allocator, benchmark, Some(&settings.run))?;
        print!("{}", report::render_detail(benchmark, allocator, &result));
        return Ok(());
    }

    info!(
        allocators = harness.allocators().len(),
        benchmarks = harness.benchmarks().len(),
        iterations = settings.run.iterations,
        "running matrix"
    );
    let cells = harness.run_matrix(&settings.allocators, &settings.benchmarks, Some(&settings.run))?;
    let mut log = ResultsLog::new();
    for cell in cells {
        log.push(cell);
    }
    println!("{}", log.summary());

    let path = log.write_json(&settings.output_dir)?;
    info!(path = %path.display(), "results saved");
    if settings.csv {
        let csv = path.with_extension("csv");
        log.write_csv(&csv)?;
        info!(path = %csv.display(), "csv saved");
    }
    Ok(())
}

fn run_sweeps(
    harness: &mut Harness,
    settings: &Settings,
    allocator: Option<&str>,
) -> Result<(), BenchError> {
    let names: Vec<String> = if settings.benchmarks.is_empty() {
        harness.benchmarks().iter().map(|b| b.name.clone()).collect()
    } else {
        settings.benchmarks.clone()
    };
    for name in &names {
        println!("\n[Benchmark: {name}]");
        let sweep = harness.sweep(name, &settings.sweep_iterations, &settings.run, allocator)?;
        print!("{}", sweep.table());
        let path = sweep.write_json(&settings.output_dir)?;
        info!(path = %path.display(), "sweep saved");
    }
    Ok(())
}
