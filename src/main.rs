use relaysweep::prelude::*;
use relaysweep::export;
use relaysweep::plot;

use clap::{Parser, Subcommand};
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};

use tracing_subscriber;

const CHART_SIZE: (u32, u32) = (1500, 1200);

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sweep relay forwarding probability and aggregate the simulator reports
    Sweep {
        /// JSON sweep configuration; flags below override it
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        name: Option<String>,
        /// File the simulator's stdout is captured to for every trial
        #[arg(long)]
        capture: Option<PathBuf>,
        #[arg(long)]
        recode: bool,
        #[arg(long)]
        program: Option<String>,
        #[arg(long)]
        scenario: Option<String>,
        #[arg(long)]
        workdir: Option<PathBuf>,
        #[arg(long)]
        first_config: Option<u32>,
        #[arg(long)]
        last_config: Option<u32>,
        #[arg(long)]
        first_relay: Option<u32>,
        #[arg(long)]
        last_relay: Option<u32>,
        #[arg(short, long)]
        seeds: Option<u32>,
        #[arg(long)]
        packets: Option<u32>,
        #[arg(long)]
        symbols: Option<u32>,
        /// Per-trial limit in seconds
        #[arg(short, long)]
        timeout: Option<u64>,
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        #[arg(short, long, default_value = "svg")]
        format: String,
        #[arg(long)]
        no_plot: bool,
    },

    /// Render the chart of a saved sweep
    Plot {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(short, long, default_value = "svg")]
        format: String,
        #[arg(long, default_value_t = CHART_SIZE.0)]
        width: u32,
        #[arg(long, default_value_t = CHART_SIZE.1)]
        height: u32,
    },

    /// Summarize saved sweeps
    Analyze {
        #[arg(default_value = "results")]
        path: PathBuf,
    },

    /// Write pgfplots data tables for a saved sweep
    Export {
        input: PathBuf,
        #[arg(short, long, default_value = "results/sweep.dat")]
        output: PathBuf,
    },

    /// Configure, build or test the simulator distribution
    Build {
        /// configure, build, run_tests or install
        command: String,
        /// JSON properties
        properties: String,
        #[arg(long)]
        project_dir: Option<PathBuf>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let program_start = Instant::now(); // Global timer for end time.

    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Sweep {
            config,
            name,
            capture,
            recode,
            program,
            scenario,
            workdir,
            first_config,
            last_config,
            first_relay,
            last_relay,
            seeds,
            packets,
            symbols,
            timeout,
            output_dir,
            format,
            no_plot,
        } => {
            let mut cfg = match config {
                Some(path) => SweepConfig::load(&path)?,
                None => SweepConfig::default(),
            };
            if let Some(v) = name { cfg.name = v; }
            if let Some(v) = capture { cfg.capture_file = v; }
            if recode { cfg.enable_recode = true; }
            if let Some(v) = program { cfg.simulator.program = v; }
            if let Some(v) = scenario { cfg.simulator.scenario = v; }
            if let Some(v) = workdir { cfg.simulator.working_dir = Some(v); }
            if let Some(v) = first_config { cfg.first_configuration = v; }
            if let Some(v) = last_config { cfg.last_configuration = v; }
            if let Some(v) = first_relay { cfg.first_relay_index = v; }
            if let Some(v) = last_relay { cfg.last_relay_index = v; }
            if let Some(v) = seeds { cfg.last_seed = v; }
            if let Some(v) = packets { cfg.num_packets = v; }
            if let Some(v) = symbols { cfg.symbols = v; }
            if timeout.is_some() { cfg.trial_timeout_secs = timeout; }
            if let Some(v) = output_dir { cfg.output_dir = v; }

            let format: ChartFormat = format.parse()?;
            run_sweep(cfg, format, !no_plot).await?;
        }

        Commands::Plot { input, output, format, width, height } => {
            let format: ChartFormat = format.parse()?;
            let run = export::load_run(&input)?;
            let output = output.unwrap_or_else(|| input.with_extension(""));
            let path = plot::render_run(&run, &output, format, (width, height))?;
            info!("Chart saved to: {}", path.display());
        }

        Commands::Analyze { path } => {
            analyze_results(&path)?;
        }

        Commands::Export { input, output } => {
            let run = export::load_run(&input)?;
            for path in export::export_pgf_data(&run, &output)? {
                info!("Plot data saved to: {}", path.display());
            }
        }

        Commands::Build { command, properties, project_dir } => {
            let command: BuildCommand = command.parse()?;
            let properties = BuildProperties::from_json(&properties)?;
            let mut builder = Builder::new(properties, ProcessRunner::inherit());
            if let Some(dir) = project_dir {
                builder = builder.with_project_dir(dir);
            }
            builder.execute(command).await?;
        }
    }

    let total_time = program_start.elapsed();
    info!("Total runtime: {} ({:.2}s)", format_time(total_time), total_time.as_secs_f64());

    Ok(())
}

async fn run_sweep(config: SweepConfig, format: ChartFormat, render: bool) -> Result<()> {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current trial");
            on_interrupt.cancel();
        }
    });

    let output_dir = config.output_dir.clone();
    let runner = ProcessRunner::capture_to(&config.capture_file);
    let sweep = Sweep::new(config, runner)
        .with_cancellation(cancel)
        .with_progress(true);

    let run = sweep.run().await?;

    let saved = export::save_run(&run, &output_dir)?;
    info!("Results saved to: {}", saved.json.display());
    for csv in &saved.csv {
        info!("Points saved to: {}", csv.display());
    }

    if render {
        let chart = output_dir.join(export::run_stem(&run));
        match plot::render_run(&run, &chart, format, CHART_SIZE) {
            Ok(path) => info!("Chart saved to: {}", path.display()),
            Err(e) => warn!("Chart rendering failed: {:#}", e),
        }
    }

    summary_table(&[run]);
    Ok(())
}

fn format_time(duration: Duration) -> String {
    let secs = duration.as_secs();
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

fn analyze_results(path: &Path) -> Result<()> {
    info!("Analyzing results in: {}", path.display());

    let runs = export::load_runs(path)?;
    if runs.is_empty() {
        info!("No sweep files found.");
        return Ok(());
    }

    summary_table(&runs);
    Ok(())
}

fn mean_over_points(result: &SweepResult, quantity: Quantity) -> Option<f64> {
    let values: Vec<f64> = result.series(quantity).into_iter().map(|(_, v)| v).collect();
    relaysweep::stats::mean(&values)
}

fn cell(value: Option<f64>, scale: f64) -> String {
    match value {
        Some(v) => format!("{:>9.3}", v * scale),
        None => format!("{:>9}", "-"),
    }
}

fn summary_table(runs: &[SweepRun]) {
    println!("\n╔══════════════════════╦══════════╦════════╦═══════════╦═══════════╦═══════════╦═══════════╦═══════════╗");
    println!("║ Sweep                ║ Distance ║ Points ║ Thruput   ║ Best p    ║ Delay (s) ║ S→D loss% ║ R→D loss% ║");
    println!("╠══════════════════════╬══════════╬════════╬═══════════╬═══════════╬═══════════╬═══════════╬═══════════╣");

    for run in runs {
        for result in &run.results {
            let best = result
                .series(Quantity::Throughput)
                .into_iter()
                .max_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(p, _)| p);

            println!(
                "║ {:<20} ║ {:>8} ║ {:>6} ║ {} ║ {} ║ {} ║ {} ║ {} ║",
                truncate(&run.name, 20),
                result.distance,
                result.len(),
                cell(mean_over_points(result, Quantity::Throughput), 1.0),
                cell(best, 1.0),
                cell(mean_over_points(result, Quantity::Delay), 1.0),
                cell(mean_over_points(result, Quantity::SourceDestinationLoss), 100.0),
                cell(mean_over_points(result, Quantity::RelayDestinationLoss), 100.0),
            );
        }
    }

    println!("╚══════════════════════╩══════════╩════════╩═══════════╩═══════════╩═══════════╩═══════════╩═══════════╝\n");

    for run in runs {
        println!(
            "{}: {} trials, {} completed, {} skipped{}",
            run.name,
            run.counters.attempted,
            run.counters.completed,
            run.counters.skipped,
            if run.interrupted { " (interrupted)" } else { "" }
        );
    }
    println!();
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        s.chars().take(width - 1).chain(std::iter::once('…')).collect()
    }
}
