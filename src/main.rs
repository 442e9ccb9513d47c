mod cli;

use chrono::Local;
use clap::Parser;
use hwefreq::UpdateRule;
use hwefreq::error::{CustomError, Result};
use miette::IntoDiagnostic;
use std::path::PathBuf;

/// Estimate the population reference-allele frequency at a site from per-individual read counts.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Args {
    /// Comma-separated reference read counts, one per individual (e.g. "8,8,9,7,8").
    #[arg(
        short,
        long,
        requires = "depth",
        conflicts_with = "input",
        required_unless_present = "input"
    )]
    reads: Option<String>,

    /// CSV of observations: `ref_reads,depth` per row, or `ref_reads` alone together with --depth.
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    input: Option<PathBuf>,

    /// Sequencing depth shared by every individual. With --input it fills in single-column rows,
    /// and two-column rows must carry this same depth.
    #[arg(short, long)]
    depth: Option<u64>,

    /// Per-read error rate, strictly between 0 and 1.
    #[arg(short, long, default_value_t = 0.01)]
    error_rate: f64,

    /// Initial guess for the reference-allele frequency.
    #[arg(long, default_value_t = 0.5)]
    psi0: f64,

    /// Number of EM iterations.
    #[arg(short = 'n', long, default_value_t = 20)]
    iterations: usize,

    /// Frequency update rule.
    #[arg(long, value_enum, default_value_t = UpdateRule::Soft)]
    rule: UpdateRule,

    /// Stop early once successive estimates differ by less than this.
    #[arg(long)]
    tolerance: Option<f64>,

    /// Number of threads for the per-individual update.
    #[arg(short, long)]
    threads: Option<usize>,

    /// Output directory.
    #[arg(
        short,
        long,
        value_hint = clap::ValueHint::DirPath,
        default_value_t = format!("hwefreq_output_{}", Local::now().format("%Y%m%d_%H%M%S"))
    )]
    output_directory: String,

    /// Also write genotype posteriors as an .npz archive.
    #[arg(long)]
    npz: bool,
}

fn try_main() -> Result<()> {
    let args = Args::parse();
    std::fs::create_dir_all(&args.output_directory)
        .map_err(|e| CustomError::OutputDir { source: e })?;

    let run_spec = cli::build_run_spec(&args);
    run_spec.print_inputs();
    cli::run(&run_spec)?;
    Ok(())
}

fn main() -> miette::Result<()> {
    try_main().into_diagnostic()
}
