use serde::Serialize;

use crate::error::RiskError;

/// Aggregate statistics over the net outcomes of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSummary {
    pub trials: u64,
    pub mean: f64,
    /// Sample standard deviation (n − 1 divisor); 0 for a single trial.
    pub std_dev: f64,
    /// Fraction of trials with a negative net outcome.
    pub loss_probability: f64,
    pub min: f64,
    pub p1: f64,
    pub p5: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub max: f64,
    pub confidence_level: f64,
    /// Loss (positive = money lost) at the `1 − confidence_level` quantile.
    pub value_at_risk: f64,
    /// Mean loss over trials at or below that quantile.
    pub tail_value_at_risk: f64,
}

/// Linear interpolation between order statistics. `sorted` must be non-empty.
fn quantile(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    let h = p * (n - 1) as f64;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = h - lo as f64;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}

fn mean_and_std_dev(values: &[f64]) -> (f64, f64) {
    let n = values.len();
    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = if n > 1 {
        values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
    } else {
        0.0
    };
    (mean, variance.sqrt())
}

/// Summarise net trial outcomes.
pub fn summarise(outcomes: &[f64], confidence_level: f64) -> Result<ResultSummary, RiskError> {
    if outcomes.is_empty() {
        return Err(RiskError::invalid("cannot summarise an empty outcome set"));
    }
    if let Some(bad) = outcomes.iter().position(|x| !x.is_finite()) {
        return Err(RiskError::NumericOverflow(format!(
            "outcome {bad} is {}",
            outcomes[bad]
        )));
    }

    let n = outcomes.len();
    let (mean, std_dev) = mean_and_std_dev(outcomes);
    if !mean.is_finite() || !std_dev.is_finite() {
        return Err(RiskError::NumericOverflow(format!(
            "summary statistics not finite (mean {mean}, std dev {std_dev})"
        )));
    }

    let losses = outcomes.iter().filter(|&&x| x < 0.0).count();

    let mut sorted = outcomes.to_vec();
    sorted.sort_by(f64::total_cmp);

    let cutoff = quantile(&sorted, 1.0 - confidence_level);
    // Rounding in the interpolation can put the cutoff a hair below the minimum.
    let tail_len = sorted.partition_point(|&x| x <= cutoff).max(1);
    let tail_mean = sorted[..tail_len].iter().sum::<f64>() / tail_len as f64;

    Ok(ResultSummary {
        trials: n as u64,
        mean,
        std_dev,
        loss_probability: losses as f64 / n as f64,
        min: sorted[0],
        p1: quantile(&sorted, 0.01),
        p5: quantile(&sorted, 0.05),
        p50: quantile(&sorted, 0.50),
        p95: quantile(&sorted, 0.95),
        p99: quantile(&sorted, 0.99),
        max: sorted[n - 1],
        confidence_level,
        value_at_risk: -cutoff,
        tail_value_at_risk: -tail_mean,
    })
}

/// Distribution statistics for a metric across N simulation runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistStats {
    pub n: usize,
    pub min: f64,
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

/// Cross-seed distribution of the headline statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunDistribution {
    pub runs: usize,
    pub mean: DistStats,
    pub std_dev: DistStats,
    pub loss_probability: DistStats,
    pub value_at_risk: DistStats,
}

fn percentile_stats(values: &mut [f64]) -> Option<DistStats> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let n = values.len();
    let (mean, std_dev) = mean_and_std_dev(values);

    Some(DistStats {
        n,
        min: values[0],
        p5: quantile(values, 0.05),
        p25: quantile(values, 0.25),
        p50: quantile(values, 0.50),
        p75: quantile(values, 0.75),
        p95: quantile(values, 0.95),
        max: values[n - 1],
        mean,
        std_dev,
    })
}

/// Distribution of run-level statistics across independent seeds.
///
/// Returns `None` for fewer than 2 runs (insufficient data for a distribution).
pub fn analyse_runs(runs: &[ResultSummary]) -> Option<RunDistribution> {
    if runs.len() < 2 {
        return None;
    }
    let extract = |f: fn(&ResultSummary) -> f64| {
        let mut values: Vec<f64> = runs.iter().map(f).collect();
        percentile_stats(&mut values)
    };
    Some(RunDistribution {
        runs: runs.len(),
        mean: extract(|s| s.mean)?,
        std_dev: extract(|s| s.std_dev)?,
        loss_probability: extract(|s| s.loss_probability)?,
        value_at_risk: extract(|s| s.value_at_risk)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_values() {
        let s = summarise(&[-2.0, 1.0, 2.0, 3.0, 6.0], 0.8).unwrap();
        assert_eq!(s.trials, 5);
        assert!((s.mean - 2.0).abs() < 1e-12);
        // Σ(x − 2)² = 16 + 1 + 0 + 1 + 16 = 34; 34 / 4 = 8.5
        assert!((s.std_dev - 8.5_f64.sqrt()).abs() < 1e-12);
        assert!((s.loss_probability - 0.2).abs() < 1e-12);
        assert_eq!(s.min, -2.0);
        assert_eq!(s.max, 6.0);
        assert_eq!(s.p50, 2.0);
    }

    /// 0.2 quantile of [-2, 1, 2, 3, 6]: h = 0.8, between -2 and 1 → -2 + 0.8·3 = 0.4.
    /// Only -2 lies at or below it.
    #[test]
    fn value_at_risk_and_tail() {
        let s = summarise(&[6.0, 3.0, 2.0, 1.0, -2.0], 0.8).unwrap();
        assert!((s.value_at_risk - -0.4).abs() < 1e-12, "VaR {}", s.value_at_risk);
        assert!((s.tail_value_at_risk - 2.0).abs() < 1e-12, "TVaR {}", s.tail_value_at_risk);
    }

    #[test]
    fn tail_value_at_risk_dominates_value_at_risk() {
        let outcomes: Vec<f64> = (0..1_000).map(|i| (i as f64 - 100.0) * 1.5).collect();
        let s = summarise(&outcomes, 0.99).unwrap();
        assert!(s.tail_value_at_risk >= s.value_at_risk);
        assert!(s.p1 <= s.p5 && s.p5 <= s.p50 && s.p50 <= s.p95 && s.p95 <= s.p99);
    }

    #[test]
    fn single_outcome_has_zero_std_dev() {
        let s = summarise(&[-5.0], 0.99).unwrap();
        assert_eq!(s.std_dev, 0.0);
        assert_eq!(s.mean, -5.0);
        assert_eq!(s.loss_probability, 1.0);
        assert_eq!(s.value_at_risk, 5.0);
        assert_eq!(s.tail_value_at_risk, 5.0);
    }

    #[test]
    fn zero_is_not_a_loss() {
        let s = summarise(&[0.0, 0.0, 1.0, -1.0], 0.99).unwrap();
        assert_eq!(s.loss_probability, 0.25);
    }

    #[test]
    fn empty_outcomes_rejected() {
        assert!(matches!(summarise(&[], 0.99), Err(RiskError::InvalidConfiguration(_))));
    }

    #[test]
    fn non_finite_outcome_rejected() {
        assert!(matches!(
            summarise(&[1.0, f64::NEG_INFINITY], 0.99),
            Err(RiskError::NumericOverflow(_))
        ));
        assert!(matches!(summarise(&[f64::NAN], 0.99), Err(RiskError::NumericOverflow(_))));
    }

    #[test]
    fn overflowing_sum_rejected() {
        assert!(matches!(
            summarise(&[f64::MAX, f64::MAX], 0.99),
            Err(RiskError::NumericOverflow(_))
        ));
    }

    #[test]
    fn percentile_stats_known_values() {
        let mut values = vec![5.0, 1.0, 4.0, 2.0, 3.0];
        let ds = percentile_stats(&mut values).unwrap();
        assert_eq!(ds.n, 5);
        assert!((ds.min - 1.0).abs() < 1e-10, "min");
        assert!((ds.max - 5.0).abs() < 1e-10, "max");
        assert!((ds.p25 - 2.0).abs() < 1e-10, "p25");
        assert!((ds.p50 - 3.0).abs() < 1e-10, "p50");
        assert!((ds.mean - 3.0).abs() < 1e-10, "mean");
    }

    #[test]
    fn percentile_stats_empty_returns_none() {
        let mut values: Vec<f64> = vec![];
        assert!(percentile_stats(&mut values).is_none());
    }

    #[test]
    fn analyse_runs_two_runs() {
        let a = summarise(&[1.0, 2.0, 3.0], 0.9).unwrap();
        let b = summarise(&[-1.0, 2.0, 5.0], 0.9).unwrap();
        let dist = analyse_runs(&[a, b]).unwrap();
        assert_eq!(dist.runs, 2);
        assert_eq!(dist.mean.n, 2);
        // means 2 and 2; loss probabilities 0 and 1/3
        assert!((dist.mean.p50 - 2.0).abs() < 1e-12);
        assert!((dist.loss_probability.max - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(dist.loss_probability.min, 0.0);
    }

    #[test]
    fn analyse_runs_needs_two_runs() {
        let a = summarise(&[1.0, 2.0], 0.9).unwrap();
        assert!(analyse_runs(&[a]).is_none());
        assert!(analyse_runs(&[]).is_none());
    }
}
