use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::analysis::{self, ResultSummary};
use crate::config::SimulationParameters;
use crate::error::RiskError;
use crate::models::{FrequencyModel, ReturnModel, SeverityModel};
use crate::types::TrialId;

/// Default ceiling on the claim count of a single trial.
pub const MAX_CLAIMS_PER_TRIAL: u64 = 100_000_000;

/// Result of one trial. `net` is the quantity the summary statistics are
/// computed over; the other fields are its components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrialOutcome {
    pub trial: TrialId,
    pub claim_count: u64,
    pub total_claims: f64,
    pub investment_income: f64,
    pub expenses: f64,
    /// premium + investment_income − total_claims − expenses.
    pub net: f64,
}

/// Runs independent trials of one period of the portfolio.
///
/// Trial `i` draws from ChaCha20 stream `i` of the run seed, so its outcome
/// is fixed by `(seed, i)` alone and the sequential and parallel loops agree
/// exactly.
pub struct Simulator {
    params: SimulationParameters,
    frequency: FrequencyModel,
    severity: SeverityModel,
    returns: ReturnModel,
    max_claims: u64,
}

impl Simulator {
    /// Validate the parameters and fit the distributions. Nothing is sampled.
    pub fn new(params: SimulationParameters) -> Result<Self, RiskError> {
        params.validate()?;
        let frequency = FrequencyModel::from_params(&params.frequency)?;
        let severity = SeverityModel::from_params(&params.severity)?;
        let returns = ReturnModel::from_params(&params.investment)?;
        debug!(?frequency, ?severity, ?returns, "fitted trial distributions");
        Ok(Simulator { params, frequency, severity, returns, max_claims: MAX_CLAIMS_PER_TRIAL })
    }

    /// Override the per-trial claim count ceiling.
    pub fn with_max_claims(mut self, n: u64) -> Self {
        self.max_claims = n;
        self
    }

    pub fn params(&self) -> &SimulationParameters {
        &self.params
    }

    fn trial_rng(&self, trial: TrialId) -> ChaCha20Rng {
        let mut rng = ChaCha20Rng::seed_from_u64(self.params.seed);
        rng.set_stream(trial.0);
        rng
    }

    /// Simulate a single trial. Fails with NumericOverflow when the sampled
    /// claim count exceeds the ceiling or the net outcome is not finite.
    pub fn trial(&self, trial: TrialId) -> Result<TrialOutcome, RiskError> {
        let mut rng = self.trial_rng(trial);
        let premium = self.params.premium;

        let claim_count = self.frequency.sample(&mut rng);
        if claim_count > self.max_claims {
            return Err(RiskError::NumericOverflow(format!(
                "trial {} sampled {claim_count} claims, above the limit of {}",
                trial.0, self.max_claims
            )));
        }
        let total_claims = self.severity.aggregate(claim_count, &mut rng);
        let investment_income = premium * self.returns.sample(&mut rng);
        let expenses = self.params.expense_rate * premium;
        let net = premium + investment_income - total_claims - expenses;

        checked(TrialOutcome { trial, claim_count, total_claims, investment_income, expenses, net })
    }

    /// All trials in order, on the current thread.
    pub fn outcomes(&self) -> Result<Vec<TrialOutcome>, RiskError> {
        (0..self.params.trials).map(|i| self.trial(TrialId(i))).collect()
    }

    /// All trials in order, spread over the rayon pool.
    pub fn outcomes_parallel(&self) -> Result<Vec<TrialOutcome>, RiskError> {
        (0..self.params.trials)
            .into_par_iter()
            .map(|i| self.trial(TrialId(i)))
            .collect()
    }

    pub fn run(&self) -> Result<ResultSummary, RiskError> {
        self.log_start(false);
        let outcomes = self.outcomes()?;
        self.summarise(&outcomes)
    }

    pub fn run_parallel(&self) -> Result<ResultSummary, RiskError> {
        self.log_start(true);
        let outcomes = self.outcomes_parallel()?;
        self.summarise(&outcomes)
    }

    /// Summary statistics over outcomes produced by this simulator.
    pub fn summarise(&self, outcomes: &[TrialOutcome]) -> Result<ResultSummary, RiskError> {
        let nets: Vec<f64> = outcomes.iter().map(|o| o.net).collect();
        let summary = analysis::summarise(&nets, self.params.confidence_level)?;
        if summary.trials == 1 {
            warn!("single trial: standard deviation reported as 0");
        }
        info!(
            trials = summary.trials,
            mean = summary.mean,
            std_dev = summary.std_dev,
            loss_probability = summary.loss_probability,
            "simulation finished"
        );
        Ok(summary)
    }

    fn log_start(&self, parallel: bool) {
        info!(
            seed = self.params.seed,
            trials = self.params.trials,
            premium = self.params.premium,
            parallel,
            "starting Monte Carlo simulation"
        );
    }
}

fn checked(outcome: TrialOutcome) -> Result<TrialOutcome, RiskError> {
    if outcome.net.is_finite() {
        Ok(outcome)
    } else {
        Err(RiskError::NumericOverflow(format!(
            "trial {} produced net outcome {} (claims {}, investment income {})",
            outcome.trial.0, outcome.net, outcome.total_claims, outcome.investment_income
        )))
    }
}

/// Validate, simulate and summarise in one call.
pub fn simulate(params: SimulationParameters) -> Result<ResultSummary, RiskError> {
    Simulator::new(params)?.run()
}

/// Repeat a run for `runs` consecutive seeds starting at `params.seed`,
/// wrapping past `u64::MAX`. Seeds run in parallel; trials within a seed
/// stay sequential. Results are in seed order.
pub fn run_seeds(
    params: &SimulationParameters,
    runs: u64,
) -> Result<Vec<(u64, ResultSummary)>, RiskError> {
    (0..runs)
        .into_par_iter()
        .map(|i| -> Result<(u64, ResultSummary), RiskError> {
            let mut p = params.clone();
            p.seed = params.seed.wrapping_add(i);
            let seed = p.seed;
            Ok((seed, Simulator::new(p)?.run()?))
        })
        .collect()
}
