use crate::Args;
use hwefreq::em::{EmConfig, Estimator};
use hwefreq::error::Result;
use hwefreq::model::Dataset;
use hwefreq::output::{write_genotype_calls, write_posteriors_npz, write_summary, write_trace};
use hwefreq::reader::{parse_reads, read_observations_csv};
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub enum InputSpec {
    Inline { depth: u64, reads: String },
    Csv { path: PathBuf, depth: Option<u64> },
}

impl InputSpec {
    pub fn load_dataset(&self) -> Result<Dataset> {
        match self {
            InputSpec::Inline { depth, reads } => {
                Dataset::with_depth(*depth, &parse_reads(reads)?)
            }
            InputSpec::Csv { path, depth } => read_observations_csv(path, *depth),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunSpec {
    pub input: InputSpec,
    pub config: EmConfig,
    pub output_dir: PathBuf,
    pub npz: bool,
}

impl RunSpec {
    pub fn print_inputs(&self) {
        match &self.input {
            InputSpec::Inline { depth, reads } => {
                println!("READS: {reads}");
                println!("DEPTH: {depth}");
            }
            InputSpec::Csv { path, .. } => println!("INPUT: {}", path.display()),
        }
        println!("ERROR RATE: {}", self.config.error_rate);
        println!("PSI0: {}", self.config.psi0);
        println!();
    }

    pub fn output_dir(&self) -> &Path {
        self.output_dir.as_path()
    }
}

pub fn build_run_spec(args: &Args) -> RunSpec {
    let input = match (&args.reads, &args.input) {
        (Some(reads), _) => InputSpec::Inline {
            // clap enforces --depth alongside --reads
            depth: args.depth.unwrap_or_default(),
            reads: reads.clone(),
        },
        (None, Some(path)) => InputSpec::Csv {
            path: path.clone(),
            depth: args.depth,
        },
        (None, None) => unreachable!("clap requires --reads or --input"),
    };
    let config = EmConfig::new(args.error_rate, args.psi0, args.iterations)
        .with_rule(args.rule)
        .with_tolerance(args.tolerance)
        .with_threads(args.threads);
    RunSpec {
        input,
        config,
        output_dir: PathBuf::from(&args.output_directory),
        npz: args.npz,
    }
}

pub fn run(run_spec: &RunSpec) -> Result<()> {
    let dataset = run_spec.input.load_dataset()?;
    let estimator = Estimator::new(run_spec.config.clone())?;
    println!("Running EM over {} individuals...", dataset.len());

    let pb = ProgressBar::new(run_spec.config.iterations as u64);
    pb.set_style(
        ProgressStyle::with_template("[{elapsed_precise}] {bar:30} {pos}/{len} iterations").unwrap(),
    );
    let trace = estimator.run_with(&dataset, |step| {
        // pb.println is silent when the bar is hidden, so suspend it instead
        pb.suspend(|| {
            println!(
                "iteration {}: psi = {:.6}, log-likelihood = {:.4}",
                step.iteration, step.psi, step.log_likelihood
            )
        });
        pb.inc(1);
    })?;
    pb.abandon();
    println!();

    if trace.converged() {
        println!(
            "Converged after {} of {} iterations.",
            trace.iterations_run(),
            run_spec.config.iterations
        );
    }
    println!("Estimated reference-allele frequency: {}", trace.final_psi());

    let calls = estimator.call_genotypes(&dataset, trace.final_psi())?;
    let counts = calls.iter().counts_by(|c| c.call);
    println!(
        "Genotype calls: {}",
        hwefreq::model::Genotype::ALL
            .iter()
            .map(|g| format!("{}={}", g.ref_copies(), counts.get(g).copied().unwrap_or(0)))
            .join(", ")
    );

    let output_dir = run_spec.output_dir();
    let trace_path = output_dir.join("em_trace.csv");
    println!("Writing EM trace to {}...", trace_path.display());
    write_trace(&trace, &trace_path)?;

    let calls_path = output_dir.join("genotype_calls.csv");
    println!("Writing genotype calls to {}...", calls_path.display());
    write_genotype_calls(&calls, &calls_path)?;

    if run_spec.npz {
        let npz_path = output_dir.join("posteriors.npz");
        println!("Writing genotype posteriors to {}...", npz_path.display());
        write_posteriors_npz(&calls, &npz_path)?;
    }

    let summary_path = output_dir.join("summary.json");
    println!("Writing run summary to {}...", summary_path.display());
    write_summary(&run_spec.config, dataset.len(), &trace, &summary_path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use hwefreq::UpdateRule;

    #[test]
    fn inline_reads_build_fixed_depth_dataset() {
        let args = Args::parse_from([
            "hwefreq", "--reads", "8,8,9,7,8", "--depth", "10", "-e", "0.2", "-o", "out",
        ]);
        let spec = build_run_spec(&args);
        let dataset = spec.input.load_dataset().expect("inline reads should load");
        assert_eq!(dataset.len(), 5);
        assert!(dataset.observations().iter().all(|o| o.depth() == 10));
        assert_eq!(spec.config.error_rate, 0.2);
        assert_eq!(spec.config.rule, UpdateRule::Soft);
        assert_eq!(spec.output_dir(), Path::new("out"));
    }

    #[test]
    fn rule_and_tolerance_reach_config() {
        let args = Args::parse_from([
            "hwefreq",
            "--input",
            "obs.csv",
            "--rule",
            "hard",
            "--tolerance",
            "1e-6",
            "--threads",
            "2",
        ]);
        let spec = build_run_spec(&args);
        assert_eq!(spec.config.rule, UpdateRule::Hard);
        assert_eq!(spec.config.tolerance, Some(1e-6));
        assert_eq!(spec.config.threads, Some(2));
        match spec.input {
            InputSpec::Csv { path, depth } => {
                assert_eq!(path, PathBuf::from("obs.csv"));
                assert_eq!(depth, None);
            }
            other => panic!("unexpected input: {other:?}"),
        }
    }

    #[test]
    fn reads_without_depth_is_rejected() {
        assert!(Args::try_parse_from(["hwefreq", "--reads", "1,2"]).is_err());
    }

    #[test]
    fn reads_and_input_conflict() {
        assert!(
            Args::try_parse_from([
                "hwefreq", "--reads", "1,2", "--depth", "5", "--input", "a.csv"
            ])
            .is_err()
        );
    }

    #[test]
    fn missing_input_is_rejected() {
        assert!(Args::try_parse_from(["hwefreq"]).is_err());
    }
}
