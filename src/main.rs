use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use mcrisk::analysis::{self, DistStats, ResultSummary, RunDistribution};
use mcrisk::config::SimulationParameters;
use mcrisk::simulation::{self, Simulator, TrialOutcome};

/// Monte Carlo estimate of an insurance portfolio's net outcome distribution.
#[derive(Debug, Parser)]
#[command(name = "mcrisk", version)]
struct Cli {
    /// TOML parameter file; missing keys take the canonical values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the RNG seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Override the number of trials.
    #[arg(long)]
    trials: Option<u64>,

    /// Evaluate trials on the rayon thread pool.
    #[arg(long, conflicts_with = "runs")]
    parallel: bool,

    /// Repeat the simulation for N consecutive seeds and report the spread.
    #[arg(long)]
    runs: Option<u64>,

    /// Write one CSV row per trial to this file (single-run mode).
    #[arg(long, conflicts_with = "runs")]
    csv: Option<PathBuf>,

    /// Print the summary as JSON instead of a table.
    #[arg(long)]
    json: bool,

    /// Suppress the stdout report.
    #[arg(long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let mut params = match &cli.config {
        Some(path) => SimulationParameters::load(path)?,
        None => SimulationParameters::canonical(),
    };
    if let Some(seed) = cli.seed {
        params.seed = seed;
    }
    if let Some(trials) = cli.trials {
        params.trials = trials;
    }

    match cli.runs {
        Some(n) => run_many(&cli, params, n),
        None => run_once(&cli, params),
    }
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mcrisk=info"));

    if std::env::var("MCRISK_LOG_JSON").is_ok() {
        fmt().json().with_env_filter(env_filter).with_writer(std::io::stderr).init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).with_writer(std::io::stderr).init();
    }
}

fn run_once(cli: &Cli, params: SimulationParameters) -> Result<()> {
    let sim = Simulator::new(params).context("failed to set up simulation")?;
    let outcomes = (if cli.parallel { sim.outcomes_parallel() } else { sim.outcomes() })
        .context("simulation failed")?;
    let summary = sim.summarise(&outcomes).context("failed to summarise outcomes")?;

    if let Some(path) = &cli.csv {
        write_outcomes_csv(&outcomes, path)?;
        info!(path = %path.display(), rows = outcomes.len(), "wrote trial outcomes");
    }

    if cli.quiet {
        return Ok(());
    }
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(sim.params(), &summary);
    }
    Ok(())
}

fn run_many(cli: &Cli, params: SimulationParameters, n: u64) -> Result<()> {
    let start_seed = params.seed;
    let runs = simulation::run_seeds(&params, n).context("multi-run simulation failed")?;
    let summaries: Vec<ResultSummary> = runs.iter().map(|(_, s)| s.clone()).collect();

    if cli.quiet {
        return Ok(());
    }

    let dist = analysis::analyse_runs(&summaries);
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&serde_json::json!({
            "start_seed": start_seed,
            "runs": summaries,
            "distribution": dist,
        }))?);
        return Ok(());
    }

    println!("\n=== Per-run summary ===");
    println!(
        "{:>8} | {:>12} | {:>12} | {:>8} | {:>12}",
        "Seed", "Mean", "StdDev", "LossP%", "VaR"
    );
    println!("{}", "-".repeat(64));
    for (seed, s) in &runs {
        println!(
            "{:>8} | {:>12.2} | {:>12.2} | {:>7.2}% | {:>12.2}",
            seed,
            s.mean,
            s.std_dev,
            s.loss_probability * 100.0,
            s.value_at_risk,
        );
    }

    match dist {
        Some(d) => print_distribution(&d),
        None => eprintln!("Warning: Distribution requires >= 2 runs"),
    }
    Ok(())
}

fn print_summary(params: &SimulationParameters, s: &ResultSummary) {
    println!("\n=== Monte Carlo result (seed {}, {} trials) ===", params.seed, s.trials);
    println!("  Mean net outcome:        {:>14.2}", s.mean);
    println!("  Standard deviation:      {:>14.2}", s.std_dev);
    println!("  Probability of loss:     {:>13.2}%", s.loss_probability * 100.0);
    println!();
    println!("  Min / max:               {:>14.2} / {:.2}", s.min, s.max);
    println!("  p1 / p5 / p50:           {:>14.2} / {:.2} / {:.2}", s.p1, s.p5, s.p50);
    println!("  p95 / p99:               {:>14.2} / {:.2}", s.p95, s.p99);
    let cl = s.confidence_level * 100.0;
    println!("  VaR  ({cl:.1}%):            {:>14.2}", s.value_at_risk);
    println!("  TVaR ({cl:.1}%):            {:>14.2}", s.tail_value_at_risk);
}

fn print_dist_row(name: &str, ds: &DistStats, scale: f64) {
    println!(
        "{:>8} | {:>10.2} | {:>10.2} | {:>10.2} | {:>10.2} | {:>10.2} | {:>10.2} | {:>10.2} | {:>10.2} | {:>10.2}",
        name,
        ds.min * scale,
        ds.p5 * scale,
        ds.p25 * scale,
        ds.p50 * scale,
        ds.p75 * scale,
        ds.p95 * scale,
        ds.max * scale,
        ds.mean * scale,
        ds.std_dev * scale,
    );
}

fn print_distribution(d: &RunDistribution) {
    println!("\n=== Multi-Run Distribution (N={} runs) ===", d.runs);
    println!(
        "{:>8} | {:>10} | {:>10} | {:>10} | {:>10} | {:>10} | {:>10} | {:>10} | {:>10} | {:>10}",
        "Metric", "min", "p5", "p25", "p50", "p75", "p95", "max", "mean", "stddev"
    );
    print_dist_row("Mean", &d.mean, 1.0);
    print_dist_row("StdDev", &d.std_dev, 1.0);
    print_dist_row("LossP%", &d.loss_probability, 100.0);
    print_dist_row("VaR", &d.value_at_risk, 1.0);
}

fn write_outcomes_csv(outcomes: &[TrialOutcome], path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut w = BufWriter::new(file);
    writeln!(w, "trial,claim_count,total_claims,investment_income,expenses,net")?;
    for o in outcomes {
        writeln!(
            w,
            "{},{},{:.6},{:.6},{:.6},{:.6}",
            o.trial.0, o.claim_count, o.total_claims, o.investment_income, o.expenses, o.net,
        )?;
    }
    w.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use clap::error::ErrorKind;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn runs_accepts_max_seed() {
        let cli = Cli::try_parse_from(["mcrisk", "--seed", "18446744073709551615", "--runs", "2"]).unwrap();
        assert_eq!(cli.seed, Some(u64::MAX));
        assert_eq!(cli.runs, Some(2));
    }

    #[test]
    fn multi_run_from_max_seed_completes() {
        let cli = Cli::try_parse_from([
            "mcrisk", "--seed", "18446744073709551615", "--runs", "2", "--trials", "10", "--quiet",
        ])
        .unwrap();
        let params = SimulationParameters { seed: u64::MAX, trials: 10, ..SimulationParameters::canonical() };
        run_many(&cli, params, 2).unwrap();
    }

    #[test]
    fn csv_conflicts_with_runs() {
        let err = Cli::try_parse_from(["mcrisk", "--runs", "3", "--csv", "out.csv"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn parallel_conflicts_with_runs() {
        let err = Cli::try_parse_from(["mcrisk", "--runs", "3", "--parallel"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn csv_and_parallel_allowed_in_single_run() {
        let cli = Cli::try_parse_from(["mcrisk", "--parallel", "--csv", "out.csv"]).unwrap();
        assert!(cli.parallel);
        assert_eq!(cli.csv, Some(PathBuf::from("out.csv")));
    }
}
