use rand::Rng;
use rand_distr::{Binomial, Distribution, Gamma, LogNormal, Normal, Pareto, Poisson};

use crate::config::{FrequencyParams, InvestmentParams, SeverityParams};
use crate::error::RiskError;

/// Claim count distribution, chosen from the dispersion of the inputs.
#[derive(Debug, Clone)]
pub enum FrequencyModel {
    /// Mean zero: no claims ever occur.
    Zero,
    /// variance = mean.
    Poisson(Poisson<f64>),
    /// variance > mean. Poisson–Gamma mixture, i.e. negative binomial.
    /// λ ~ Gamma(shape = mean²/(var − mean), scale = (var − mean)/mean).
    NegativeBinomial(Gamma<f64>),
    /// variance < mean. p = 1 − var/mean, n = round(mean/p).
    Binomial(Binomial),
}

impl FrequencyModel {
    pub fn from_moments(mean: f64, variance: f64) -> Result<Self, RiskError> {
        if mean == 0.0 {
            return if variance == 0.0 {
                Ok(FrequencyModel::Zero)
            } else {
                Err(RiskError::invalid("claim frequency with mean 0 must have variance 0"))
            };
        }

        let tolerance = f64::EPSILON * mean.max(1.0);
        if (variance - mean).abs() <= tolerance {
            let dist = Poisson::new(mean)
                .map_err(|e| RiskError::invalid(format!("Poisson λ={mean}: {e}")))?;
            Ok(FrequencyModel::Poisson(dist))
        } else if variance > mean {
            let excess = variance - mean;
            let dist = Gamma::new(mean * mean / excess, excess / mean)
                .map_err(|e| RiskError::invalid(format!("negative binomial mixing Gamma: {e}")))?;
            Ok(FrequencyModel::NegativeBinomial(dist))
        } else {
            let p = 1.0 - variance / mean;
            let n = (mean / p).round().max(1.0) as u64;
            let p = (mean / n as f64).min(1.0);
            let dist = Binomial::new(n, p)
                .map_err(|e| RiskError::invalid(format!("Binomial n={n} p={p}: {e}")))?;
            Ok(FrequencyModel::Binomial(dist))
        }
    }

    pub fn from_params(params: &FrequencyParams) -> Result<Self, RiskError> {
        Self::from_moments(params.mean, params.variance())
    }

    pub fn sample(&self, rng: &mut impl Rng) -> u64 {
        match self {
            FrequencyModel::Zero => 0,
            FrequencyModel::Poisson(dist) => dist.sample(rng) as u64,
            FrequencyModel::NegativeBinomial(mixing) => {
                let lambda = mixing.sample(rng);
                // A vanishingly small λ underflows to 0, which Poisson rejects.
                match Poisson::new(lambda) {
                    Ok(dist) => dist.sample(rng) as u64,
                    Err(_) => 0,
                }
            }
            FrequencyModel::Binomial(dist) => dist.sample(rng),
        }
    }
}

/// Individual claim amount distribution.
#[derive(Debug, Clone)]
pub enum SeverityModel {
    /// Zero variance: every claim costs exactly this amount.
    Fixed(f64),
    /// E[X] = exp(μ + σ²/2).
    LogNormal(LogNormal<f64>),
    /// E[X] = scale · shape / (shape − 1), shape > 1.
    Pareto(Pareto<f64>),
}

impl SeverityModel {
    /// Fit a log-normal to the first two moments of the claim amount:
    /// σ² = ln(1 + var/mean²), μ = ln(mean) − σ²/2.
    pub fn from_moments(mean: f64, variance: f64) -> Result<Self, RiskError> {
        if mean == 0.0 || variance == 0.0 {
            return Ok(SeverityModel::Fixed(mean));
        }
        let sigma2 = (1.0 + variance / (mean * mean)).ln();
        Self::log_normal(mean.ln() - sigma2 / 2.0, sigma2.sqrt())
    }

    pub fn from_median_cv(median: f64, coef_var: f64) -> Result<Self, RiskError> {
        if coef_var == 0.0 {
            return Ok(SeverityModel::Fixed(median));
        }
        Self::log_normal(median.ln(), (coef_var * coef_var + 1.0).ln().sqrt())
    }

    pub fn from_params(params: &SeverityParams) -> Result<Self, RiskError> {
        match *params {
            SeverityParams::LogNormal { mean, variance } => Self::from_moments(mean, variance),
            SeverityParams::LogNormalMedian { median, coef_var } => {
                Self::from_median_cv(median, coef_var)
            }
            SeverityParams::Pareto { scale, shape } => {
                let dist = Pareto::new(scale, shape)
                    .map_err(|e| RiskError::invalid(format!("Pareto scale={scale} shape={shape}: {e}")))?;
                Ok(SeverityModel::Pareto(dist))
            }
        }
    }

    fn log_normal(mu: f64, sigma: f64) -> Result<Self, RiskError> {
        let dist = LogNormal::new(mu, sigma)
            .map_err(|e| RiskError::invalid(format!("LogNormal mu={mu} sigma={sigma}: {e}")))?;
        Ok(SeverityModel::LogNormal(dist))
    }

    /// Claims cannot be negative; any negative draw is clamped to zero.
    pub fn sample(&self, rng: &mut impl Rng) -> f64 {
        let x = match self {
            SeverityModel::Fixed(amount) => *amount,
            SeverityModel::LogNormal(dist) => dist.sample(rng),
            SeverityModel::Pareto(dist) => dist.sample(rng),
        };
        x.max(0.0)
    }

    /// Sum of `count` independent claim amounts.
    pub fn aggregate(&self, count: u64, rng: &mut impl Rng) -> f64 {
        (0..count).map(|_| self.sample(rng)).sum()
    }
}

/// Investment return rate: Normal(mean, sqrt(variance)).
#[derive(Debug, Clone)]
pub enum ReturnModel {
    Fixed(f64),
    Normal(Normal<f64>),
}

impl ReturnModel {
    pub fn from_params(params: &InvestmentParams) -> Result<Self, RiskError> {
        if params.variance == 0.0 {
            return Ok(ReturnModel::Fixed(params.mean));
        }
        let dist = Normal::new(params.mean, params.variance.sqrt()).map_err(|e| {
            RiskError::invalid(format!("investment return Normal({}, {}): {e}", params.mean, params.variance))
        })?;
        Ok(ReturnModel::Normal(dist))
    }

    pub fn sample(&self, rng: &mut impl Rng) -> f64 {
        match self {
            ReturnModel::Fixed(rate) => *rate,
            ReturnModel::Normal(dist) => dist.sample(rng),
        }
    }
}
