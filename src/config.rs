use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RiskError;

/// Largest accepted claim-frequency mean. Every claim is drawn individually,
/// so the cost of a trial grows linearly with the count.
pub const MAX_FREQUENCY_MEAN: f64 = 1e7;

/// Claim count per period. `variance = None` means Poisson (variance = mean).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FrequencyParams {
    pub mean: f64,
    #[serde(default)]
    pub variance: Option<f64>,
}

impl FrequencyParams {
    pub fn variance(&self) -> f64 {
        self.variance.unwrap_or(self.mean)
    }
}

/// Size of an individual claim.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case", deny_unknown_fields)]
pub enum SeverityParams {
    /// Log-normal fitted to the given mean and variance of the claim amount.
    LogNormal { mean: f64, variance: f64 },
    /// Log-normal given by its median and coefficient of variation.
    /// μ = ln(median), σ = sqrt(ln(1 + cv²)).
    LogNormalMedian { median: f64, coef_var: f64 },
    /// Pareto: `scale` = minimum claim, `shape` = tail index α.
    Pareto { scale: f64, shape: f64 },
}

/// Investment return *rate* earned on the premium.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InvestmentParams {
    pub mean: f64,
    #[serde(default)]
    pub variance: f64,
}

/// Full configuration of one run. Immutable once the simulator is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationParameters {
    pub seed: u64,
    pub trials: u64,
    /// Premium income per period.
    pub premium: f64,
    /// Expenses as a fraction of premium.
    pub expense_rate: f64,
    pub frequency: FrequencyParams,
    pub severity: SeverityParams,
    pub investment: InvestmentParams,
    /// Confidence level for VaR / TVaR, e.g. 0.99.
    pub confidence_level: f64,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self::canonical()
    }
}

impl SimulationParameters {
    /// Reference portfolio: ~2 claims a year, median claim 5_000 with CV 1.0,
    /// 50_000 of annual premium, 5 % investment return, 10 % expenses.
    pub fn canonical() -> Self {
        SimulationParameters {
            seed: 42,
            trials: 10_000,
            premium: 50_000.0,
            expense_rate: 0.10,
            frequency: FrequencyParams { mean: 2.0, variance: None },
            severity: SeverityParams::LogNormalMedian { median: 5_000.0, coef_var: 1.0 },
            investment: InvestmentParams { mean: 0.05, variance: 0.0 },
            confidence_level: 0.99,
        }
    }

    /// Read parameters from a TOML file. Keys absent from the file keep
    /// their canonical values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RiskError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|source| RiskError::ConfigRead { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&contents)
            .map_err(|source| RiskError::ConfigParse { path: path.to_path_buf(), source })
    }

    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Reject parameters no trial could be run with.
    pub fn validate(&self) -> Result<(), RiskError> {
        if self.trials == 0 {
            return Err(RiskError::invalid("trial count must be at least 1"));
        }
        if !(self.premium.is_finite() && self.premium > 0.0) {
            return Err(RiskError::invalid(format!("premium must be positive, got {}", self.premium)));
        }
        check_unit_interval("expense rate", self.expense_rate)?;
        check_unit_interval("investment return rate", self.investment.mean)?;
        check_non_negative("investment return variance", self.investment.variance)?;
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(RiskError::invalid(format!(
                "confidence level must lie in (0, 1), got {}",
                self.confidence_level
            )));
        }

        check_non_negative("claim frequency mean", self.frequency.mean)?;
        if self.frequency.mean > MAX_FREQUENCY_MEAN {
            return Err(RiskError::invalid(format!(
                "claim frequency mean {} exceeds the maximum of {MAX_FREQUENCY_MEAN}",
                self.frequency.mean
            )));
        }
        check_non_negative("claim frequency variance", self.frequency.variance())?;

        match self.severity {
            SeverityParams::LogNormal { mean, variance } => {
                check_non_negative("claim severity mean", mean)?;
                check_non_negative("claim severity variance", variance)?;
            }
            SeverityParams::LogNormalMedian { median, coef_var } => {
                check_positive("claim severity median", median)?;
                check_non_negative("claim severity coefficient of variation", coef_var)?;
            }
            SeverityParams::Pareto { scale, shape } => {
                check_positive("Pareto scale", scale)?;
                check_positive("Pareto shape", shape)?;
            }
        }
        Ok(())
    }
}

fn check_non_negative(name: &str, value: f64) -> Result<(), RiskError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(RiskError::invalid(format!("{name} must be finite and non-negative, got {value}")))
    }
}

fn check_positive(name: &str, value: f64) -> Result<(), RiskError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(RiskError::invalid(format!("{name} must be finite and positive, got {value}")))
    }
}

fn check_unit_interval(name: &str, value: f64) -> Result<(), RiskError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(RiskError::invalid(format!("{name} must lie in [0, 1], got {value}")))
    }
}
