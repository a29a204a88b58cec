use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use luckycard_bench::config::{ExperimentConfig, ResolvedOutputs};
use luckycard_bench::experiment::ExperimentRunner;
use luckycard_bench::logging::init_logging;

/// Simulation and fitting harness for the Lucky Card suspicion model.
#[derive(Debug, Parser)]
#[command(
    name = "luckycard-bench",
    author,
    version,
    about = "Deterministic Lucky Card simulation and fitting harness"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "bench/experiment.yaml")]
    config: PathBuf,

    /// Override the run identifier (substitutes {run_id} templates).
    #[arg(long, value_name = "RUN_ID")]
    run_id: Option<String>,

    /// Override the master RNG seed.
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Override the number of Monte-Carlo runs.
    #[arg(long, value_name = "RUNS")]
    runs: Option<usize>,

    /// Skip the fitting stage even when the config defines one.
    #[arg(long)]
    skip_fit: bool,

    /// Exit after validating the configuration (nothing is played).
    #[arg(long)]
    validate_only: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = ExperimentConfig::from_path(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    if let Some(run_id) = cli.run_id {
        config.run_id = run_id;
    }

    if let Some(seed) = cli.seed {
        config.seed = seed;
    }

    if let Some(runs) = cli.runs {
        config.session.runs = runs;
    }

    if cli.skip_fit {
        config.fit = None;
    }

    config.validate()?;

    let outputs: ResolvedOutputs = config.resolved_outputs();
    let run_id = config.run_id.clone();
    let runs = config.session.runs;
    let fitting = config.fit.is_some();

    println!(
        "Loaded configuration '{run_id}' ({runs} run{}, seed {}, fitting {})",
        if runs == 1 { "" } else { "s" },
        config.seed,
        if fitting { "on" } else { "off" }
    );

    let logging_guard = init_logging(&config.logging, &outputs)?;
    let runner = ExperimentRunner::new(config, outputs)?;

    if cli.validate_only {
        println!(
            "Validation-only mode: {} trials resolved, nothing played.",
            runner.trials().len()
        );
        return Ok(());
    }

    let mut summary = runner.run()?;
    // Flushes the non-blocking writer before the telemetry log is read back.
    drop(logging_guard);
    summary.summarise_telemetry()?;

    println!("Experiment complete for '{run_id}': {}", summary.describe());
    println!(
        "Trial log: {} rows at {}",
        summary.rows_written,
        summary.jsonl_path.display()
    );
    if let Some(fits_path) = summary.fits_path.as_ref() {
        println!(
            "Fits: {} subject{} at {}",
            summary.subjects_fitted,
            if summary.subjects_fitted == 1 { "" } else { "s" },
            fits_path.display()
        );
    }
    println!("Summary table: {}", summary.summary_path.display());
    for plot_path in &summary.plot_paths {
        println!("Plot: {}", plot_path.display());
    }
    if let Some(telemetry_path) = summary.telemetry_path.as_ref() {
        println!("Telemetry log: {}", telemetry_path.display());
    }
    if let Some(outputs) = summary.telemetry_outputs.as_ref() {
        println!("Telemetry summary (JSON): {}", outputs.json_path.display());
        println!(
            "Telemetry summary (Markdown): {}",
            outputs.markdown_path.display()
        );
        println!(
            "  Trial events: {}, fit events: {}",
            outputs.summary.trials.count, outputs.summary.fits.count
        );
    }

    Ok(())
}
