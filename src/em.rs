use crate::error::{InvalidArgument, Result};
use crate::likelihood::{log_sum_exp, log_weights, normalize_log_weights};
use crate::model::{Dataset, Genotype, Observation, check_error_rate, check_frequency};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

/// Below this many observations the E-step stays on the calling thread unless threads are requested.
pub const PARALLEL_THRESHOLD: usize = 500;

/// How each iteration turns genotype weights into a new frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum UpdateRule {
    /// Posterior mean genotype per individual (the EM update).
    #[default]
    Soft,
    /// Maximum-a-posteriori genotype call per individual.
    Hard,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmConfig {
    pub error_rate: f64,
    pub psi0: f64,
    pub iterations: usize,
    pub rule: UpdateRule,
    /// Stop once successive estimates differ by less than this. `None` always runs `iterations` rounds.
    pub tolerance: Option<f64>,
    pub threads: Option<usize>,
}

impl EmConfig {
    pub fn new(error_rate: f64, psi0: f64, iterations: usize) -> Self {
        Self {
            error_rate,
            psi0,
            iterations,
            rule: UpdateRule::default(),
            tolerance: None,
            threads: None,
        }
    }

    pub fn with_rule(mut self, rule: UpdateRule) -> Self {
        self.rule = rule;
        self
    }

    pub fn with_tolerance(mut self, tolerance: Option<f64>) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads;
        self
    }

    fn validate(&self) -> Result<()> {
        check_error_rate(self.error_rate)?;
        check_frequency(self.psi0)?;
        if let Some(tolerance) = self.tolerance {
            if !(tolerance > 0.0 && tolerance.is_finite()) {
                return Err(InvalidArgument::Tolerance { tolerance }.into());
            }
        }
        Ok(())
    }
}

/// State after one round. Iteration 0 is the starting guess.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmStep {
    pub iteration: usize,
    pub psi: f64,
    pub log_likelihood: f64,
}

/// Every state of one run, starting state first. Only built by [`Estimator`], so it is never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct EmTrace {
    steps: Vec<EmStep>,
    converged: bool,
}

impl EmTrace {
    pub fn steps(&self) -> &[EmStep] {
        &self.steps
    }

    /// Whether the tolerance ended the run before the iteration limit.
    pub fn converged(&self) -> bool {
        self.converged
    }

    pub fn final_step(&self) -> &EmStep {
        &self.steps[self.steps.len() - 1]
    }

    pub fn final_psi(&self) -> f64 {
        self.final_step().psi
    }

    pub fn iterations_run(&self) -> usize {
        self.steps.len() - 1
    }

    pub fn psi_sequence(&self) -> Vec<f64> {
        self.steps.iter().map(|s| s.psi).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenotypeCall {
    pub observation: Observation,
    pub posterior: [f64; 3],
    pub expected_genotype: f64,
    pub call: Genotype,
}

// First maximum wins, so ties resolve to the fewest reference copies.
fn stable_argmax(values: &[f64; 3]) -> Genotype {
    let mut best = Genotype::HomAlt;
    for g in &Genotype::ALL[1..] {
        if values[g.index()] > values[best.index()] {
            best = *g;
        }
    }
    best
}

fn expected_from_posterior(posterior: &[f64; 3]) -> f64 {
    Genotype::ALL
        .iter()
        .map(|g| g.ref_copies() as f64 * posterior[g.index()])
        .sum()
}

/// One individual's share of the next frequency, and its marginal log-likelihood at `psi`.
fn contribution(rule: UpdateRule, obs: &Observation, e: f64, psi: f64) -> (f64, f64) {
    let log_w = log_weights(obs, e, psi);
    match rule {
        UpdateRule::Hard => (
            stable_argmax(&log_w).ref_copies() as f64,
            log_sum_exp(&log_w),
        ),
        UpdateRule::Soft => {
            let (marginal, posterior) = normalize_log_weights(&log_w);
            (expected_from_posterior(&posterior) / 2.0, marginal)
        }
    }
}

/// Next frequency and the log-likelihood at the current one.
fn combine(rule: UpdateRule, contributions: &[(f64, f64)]) -> (f64, f64) {
    let n = contributions.len() as f64;
    let total: f64 = contributions.iter().map(|c| c.0).sum();
    let log_likelihood: f64 = contributions.iter().map(|c| c.1).sum();
    let next = match rule {
        UpdateRule::Hard => total / 2.0 / n,
        UpdateRule::Soft => total / n,
    };
    (next, log_likelihood)
}

/// Maximum-a-posteriori genotype of one individual at frequency `psi`.
pub fn call_genotype(obs: &Observation, e: f64, psi: f64) -> Result<Genotype> {
    check_error_rate(e)?;
    check_frequency(psi)?;
    Ok(stable_argmax(&log_weights(obs, e, psi)))
}

/// Posterior mean number of reference copies, `E[g | r, N, e, psi]`.
pub fn expected_genotype(obs: &Observation, e: f64, psi: f64) -> Result<f64> {
    check_error_rate(e)?;
    check_frequency(psi)?;
    Ok(expected_from_posterior(
        &normalize_log_weights(&log_weights(obs, e, psi)).1,
    ))
}

/// `sum(g*) / (2 |D|)` over the MAP genotype calls.
pub fn hard_update(dataset: &Dataset, e: f64, psi: f64) -> Result<f64> {
    update(UpdateRule::Hard, dataset, e, psi)
}

/// Mean over individuals of `E[g] / 2`.
pub fn soft_update(dataset: &Dataset, e: f64, psi: f64) -> Result<f64> {
    update(UpdateRule::Soft, dataset, e, psi)
}

fn update(rule: UpdateRule, dataset: &Dataset, e: f64, psi: f64) -> Result<f64> {
    dataset.ensure_not_empty()?;
    check_error_rate(e)?;
    check_frequency(psi)?;
    let contributions: Vec<(f64, f64)> = dataset
        .observations()
        .iter()
        .map(|obs| contribution(rule, obs, e, psi))
        .collect();
    Ok(combine(rule, &contributions).0)
}

/// Runs the soft EM update for exactly `iterations` rounds with every individual sequenced at
/// `depth`, printing each new estimate, and returns the final frequency.
pub fn run_em(depth: u64, e: f64, psi0: f64, ref_reads: &[u64], iterations: usize) -> Result<f64> {
    let dataset = Dataset::with_depth(depth, ref_reads)?;
    let estimator = Estimator::new(EmConfig::new(e, psi0, iterations))?;
    let trace = estimator.run_with(&dataset, |step| {
        println!("iteration {}: psi = {}", step.iteration, step.psi);
    })?;
    Ok(trace.final_psi())
}

fn settle_last<F: FnMut(&EmStep)>(steps: &mut [EmStep], log_likelihood: f64, observer: &mut F) {
    if let Some(last) = steps.last_mut() {
        last.log_likelihood = log_likelihood;
        if last.iteration > 0 {
            observer(last);
        }
    }
}

enum Executor {
    Serial,
    Global,
    Pool(ThreadPool),
}

pub struct Estimator {
    config: EmConfig,
}

impl Estimator {
    pub fn new(config: EmConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EmConfig {
        &self.config
    }

    fn executor(&self, n_observations: usize) -> Result<Executor> {
        let threads = self.config.threads;
        if (threads.is_none() && n_observations < PARALLEL_THRESHOLD) || threads == Some(1) {
            Ok(Executor::Serial)
        } else if let Some(n) = threads {
            let pool = ThreadPoolBuilder::new().num_threads(n).build()?;
            Ok(Executor::Pool(pool))
        } else {
            Ok(Executor::Global)
        }
    }

    /// Returns the next frequency and the log-likelihood at `psi`, from one pass over the data.
    fn step(&self, executor: &Executor, dataset: &Dataset, psi: f64) -> (f64, f64) {
        let (rule, e) = (self.config.rule, self.config.error_rate);
        let observations = dataset.observations();
        // Collected in input order and summed serially so every executor gives the same bits.
        let contributions: Vec<(f64, f64)> = match executor {
            Executor::Serial => observations
                .iter()
                .map(|obs| contribution(rule, obs, e, psi))
                .collect(),
            Executor::Global => observations
                .par_iter()
                .map(|obs| contribution(rule, obs, e, psi))
                .collect(),
            Executor::Pool(pool) => pool.install(|| {
                observations
                    .par_iter()
                    .map(|obs| contribution(rule, obs, e, psi))
                    .collect()
            }),
        };
        combine(rule, &contributions)
    }

    pub fn run(&self, dataset: &Dataset) -> Result<EmTrace> {
        self.run_with(dataset, |_| {})
    }

    /// Runs the configured rounds, handing every new step (not the starting state) to `observer`.
    ///
    /// A step's log-likelihood falls out of the pass that computes the following step, so each
    /// step reaches `observer` one pass after its frequency is known. The last step costs one
    /// extra pass.
    pub fn run_with<F>(&self, dataset: &Dataset, mut observer: F) -> Result<EmTrace>
    where
        F: FnMut(&EmStep),
    {
        dataset.ensure_not_empty()?;
        let executor = self.executor(dataset.len())?;

        let mut psi = self.config.psi0;
        let mut steps = Vec::with_capacity(self.config.iterations + 1);
        steps.push(EmStep {
            iteration: 0,
            psi,
            log_likelihood: f64::NAN,
        });

        let mut converged = false;
        for iteration in 1..=self.config.iterations {
            let (next, log_likelihood) = self.step(&executor, dataset, psi);
            settle_last(&mut steps, log_likelihood, &mut observer);
            steps.push(EmStep {
                iteration,
                psi: next,
                log_likelihood: f64::NAN,
            });

            let delta = (next - psi).abs();
            psi = next;
            if self.config.tolerance.is_some_and(|tol| delta < tol) {
                converged = true;
                break;
            }
        }
        let (_, log_likelihood) = self.step(&executor, dataset, psi);
        settle_last(&mut steps, log_likelihood, &mut observer);
        Ok(EmTrace { steps, converged })
    }

    /// Posterior and MAP call for every individual at frequency `psi`, in dataset order.
    pub fn call_genotypes(&self, dataset: &Dataset, psi: f64) -> Result<Vec<GenotypeCall>> {
        check_frequency(psi)?;
        let e = self.config.error_rate;
        Ok(dataset
            .observations()
            .iter()
            .map(|obs| {
                let log_w = log_weights(obs, e, psi);
                let posterior = normalize_log_weights(&log_w).1;
                GenotypeCall {
                    observation: *obs,
                    posterior,
                    expected_genotype: expected_from_posterior(&posterior),
                    call: stable_argmax(&log_w),
                }
            })
            .collect())
    }
}
