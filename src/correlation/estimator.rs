//! Correlation matrix estimation from historical return series.
//!
//! Supports equal-weight sample correlation, EWMA-weighted correlation, and
//! fixed-intensity shrinkage toward the mean off-diagonal value. Every
//! estimate passes through PSD repair before it is returned.

use std::collections::HashMap;

use tracing::debug;

use crate::core::error::{PortsimError, Result};
use crate::core::returns::ReturnSeries;
use crate::core::types::{CorrelationMethod, HistoryWindow, SimulationConfig, MIN_CORRELATION_OBS};

use super::matrix::CorrelationMatrix;

/// A validated correlation matrix plus non-fatal estimation warnings.
#[derive(Debug, Clone)]
pub struct CorrelationEstimate {
    /// The repaired correlation matrix.
    pub matrix: CorrelationMatrix,
    /// Warnings for pairs that fell back to zero correlation.
    pub warnings: Vec<String>,
}

/// Correlation estimator over per-ticker return histories.
#[derive(Debug, Clone)]
pub struct CorrelationEstimator {
    method: CorrelationMethod,
    window_days: usize,
    half_life_days: f64,
    shrinkage_intensity: f64,
    cash_tickers: Vec<String>,
}

impl CorrelationEstimator {
    /// Create an estimator for the given method and history window.
    pub fn new(method: CorrelationMethod, window: HistoryWindow) -> Self {
        Self {
            method,
            window_days: window.days(),
            half_life_days: window.half_life_days(),
            shrinkage_intensity: 0.2,
            cash_tickers: Vec::new(),
        }
    }

    /// Build an estimator from a validated simulation config.
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new(config.correlation_method, config.history_window)
            .with_shrinkage_intensity(config.shrinkage_intensity)
    }

    /// Override the fixed shrinkage intensity (LedoitWolf method only).
    pub fn with_shrinkage_intensity(mut self, intensity: f64) -> Self {
        self.shrinkage_intensity = intensity.clamp(0.0, 1.0);
        self
    }

    /// Treat a ticker as uncorrelated cash: its cross-correlations are
    /// zeroed after estimation.
    pub fn with_cash_ticker(mut self, ticker: impl Into<String>) -> Self {
        self.cash_tickers.push(ticker.into());
        self
    }

    /// Estimate a validated correlation matrix for `tickers`.
    ///
    /// Pairs with fewer than 20 overlapping observations in the trailing
    /// window default to zero correlation and produce a warning. Fails if
    /// fewer than two tickers have usable series.
    pub fn estimate(
        &self,
        series: &HashMap<String, ReturnSeries>,
        tickers: &[String],
    ) -> Result<CorrelationEstimate> {
        if tickers.is_empty() {
            return Err(PortsimError::empty_data("correlation estimation"));
        }

        let windows: Vec<Option<ReturnSeries>> = tickers
            .iter()
            .map(|t| series.get(t).map(|s| s.trailing(self.window_days)))
            .collect();

        let usable = windows
            .iter()
            .filter(|w| w.as_ref().is_some_and(|s| s.len() >= MIN_CORRELATION_OBS))
            .count();
        if usable < 2 {
            return Err(PortsimError::insufficient_data(2, usable));
        }

        let n = tickers.len();
        let mut matrix = CorrelationMatrix::identity(tickers.to_vec());
        let mut warnings = Vec::new();

        for i in 0..n {
            for j in (i + 1)..n {
                let (Some(a), Some(b)) = (&windows[i], &windows[j]) else {
                    warnings.push(format!(
                        "{} / {}: missing series, correlation defaulted to 0",
                        tickers[i], tickers[j]
                    ));
                    continue;
                };

                let (xa, xb) = a.overlap(b);
                if xa.len() < MIN_CORRELATION_OBS {
                    warnings.push(format!(
                        "{} / {}: only {} overlapping days (need {}), correlation defaulted to 0",
                        tickers[i],
                        tickers[j],
                        xa.len(),
                        MIN_CORRELATION_OBS
                    ));
                    continue;
                }

                let weights = match self.method {
                    CorrelationMethod::Ewma => ewma_weights(xa.len(), self.half_life_days),
                    _ => equal_weights(xa.len()),
                };
                let corr = weighted_pearson(&xa, &xb, &weights);
                matrix.set_pair(i, j, corr.clamp(-1.0, 1.0));
            }
        }

        if self.method == CorrelationMethod::LedoitWolf {
            shrink_toward_mean(&mut matrix, self.shrinkage_intensity);
        }

        for cash in &self.cash_tickers {
            matrix.zero_cross_correlations(cash);
        }

        matrix.make_valid();

        if !warnings.is_empty() {
            debug!(
                pairs = warnings.len(),
                "correlation estimation fell back to zero for some pairs"
            );
        }

        Ok(CorrelationEstimate { matrix, warnings })
    }
}

/// Equal observation weights summing to 1.
pub fn equal_weights(n: usize) -> Vec<f64> {
    vec![1.0 / n as f64; n]
}

/// EWMA observation weights: obs t of T weighted by lambda^(T-1-t),
/// normalized to sum to 1, with lambda = exp(-ln2 / half_life_days).
///
/// As lambda approaches 1 the weights approach equal weighting, so EWMA
/// correlation reduces to sample correlation.
pub fn ewma_weights(n: usize, half_life_days: f64) -> Vec<f64> {
    let lambda = (-(2.0f64.ln()) / half_life_days).exp();
    lambda_weights(n, lambda)
}

/// Observation weights from a raw decay factor lambda in (0, 1].
pub fn lambda_weights(n: usize, lambda: f64) -> Vec<f64> {
    let mut weights: Vec<f64> = (0..n).map(|t| lambda.powi((n - 1 - t) as i32)).collect();
    let total: f64 = weights.iter().sum();
    if total > 0.0 {
        for w in &mut weights {
            *w /= total;
        }
    }
    weights
}

/// Weighted Pearson correlation of two equally long samples.
///
/// Returns 0 when either weighted variance vanishes.
pub fn weighted_pearson(a: &[f64], b: &[f64], weights: &[f64]) -> f64 {
    let n = a.len().min(b.len()).min(weights.len());
    if n < 2 {
        return 0.0;
    }

    let mean_a: f64 = (0..n).map(|t| weights[t] * a[t]).sum();
    let mean_b: f64 = (0..n).map(|t| weights[t] * b[t]).sum();

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for t in 0..n {
        let da = a[t] - mean_a;
        let db = b[t] - mean_b;
        cov += weights[t] * da * db;
        var_a += weights[t] * da * da;
        var_b += weights[t] * db * db;
    }

    if var_a <= 1e-12 || var_b <= 1e-12 {
        return 0.0;
    }
    (cov / (var_a * var_b).sqrt()).clamp(-1.0, 1.0)
}

/// Shrink every off-diagonal entry toward the mean off-diagonal correlation
/// by fixed intensity: C'[i][j] = (1-theta)*C[i][j] + theta*r_bar.
fn shrink_toward_mean(matrix: &mut CorrelationMatrix, intensity: f64) {
    let n = matrix.len();
    if n < 2 {
        return;
    }

    let mut sum = 0.0;
    let mut count = 0usize;
    for i in 0..n {
        for j in (i + 1)..n {
            sum += matrix.get(i, j);
            count += 1;
        }
    }
    let r_bar = sum / count as f64;

    for i in 0..n {
        for j in (i + 1)..n {
            let shrunk = (1.0 - intensity) * matrix.get(i, j) + intensity * r_bar;
            matrix.set_pair(i, j, shrunk);
        }
    }
}
