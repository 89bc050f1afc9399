//! Risk analytics over simulated terminal outcomes.
//!
//! Percentile summaries, Value-at-Risk and conditional VaR, drawdown
//! statistics, loss probabilities, and per-position contributions, all
//! computed from a completed simulation result.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::simulation::SimulationResult;

/// Reported outcome percentiles.
pub const REPORT_PERCENTILES: [f64; 5] = [0.05, 0.25, 0.50, 0.75, 0.95];

/// Loss thresholds for exceedance probabilities (terminal return below).
pub const LOSS_THRESHOLDS: [f64; 4] = [0.0, -0.10, -0.20, -0.30];

/// One percentile of the terminal outcome distribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PercentileSummary {
    /// Percentile in (0, 1).
    pub percentile: f64,
    /// Terminal return at this percentile.
    pub terminal_return: f64,
    /// Terminal dollar value at this percentile.
    pub terminal_value: f64,
}

/// Probability of ending below a loss threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LossProbability {
    /// Terminal return threshold (0 means "any loss").
    pub threshold: f64,
    /// Fraction of paths ending below the threshold.
    pub probability: f64,
}

/// One position's contribution to portfolio outcomes.
///
/// Contribution is weight times the position's own compounded return, so
/// across positions the values sum to roughly the portfolio return of the
/// same path (exactly, up to cross-compounding terms).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionContribution {
    /// Ticker symbol.
    pub ticker: String,
    /// Mean contribution across all paths.
    pub mean: f64,
    /// Contribution on the paths realizing each of [`REPORT_PERCENTILES`].
    pub by_percentile: Vec<f64>,
}

impl PositionContribution {
    /// Contribution on the path realizing the 5th-percentile outcome.
    pub fn at_p5(&self) -> f64 {
        self.by_percentile[0]
    }

    /// Contribution on the path realizing the 95th-percentile outcome.
    pub fn at_p95(&self) -> f64 {
        self.by_percentile[REPORT_PERCENTILES.len() - 1]
    }
}

/// Full risk report for one simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskReport {
    /// Mean terminal return.
    pub mean_return: f64,
    /// Median terminal return.
    pub median_return: f64,
    /// Standard deviation of terminal returns.
    pub std_return: f64,
    /// Outcome percentiles at [`REPORT_PERCENTILES`].
    pub percentiles: Vec<PercentileSummary>,
    /// Value-at-Risk at the configured confidence, in return space (signed;
    /// a 12% loss reports as -0.12).
    pub var: f64,
    /// Conditional VaR (mean of the tail at and below VaR). Never exceeds
    /// VaR.
    pub cvar: f64,
    /// Probability that the terminal return is negative.
    pub probability_of_loss: f64,
    /// Exceedance probabilities at [`LOSS_THRESHOLDS`].
    pub loss_probabilities: Vec<LossProbability>,
    /// Mean of per-path maximum drawdowns.
    pub expected_max_drawdown: f64,
    /// Worst maximum drawdown over all paths.
    pub worst_max_drawdown: f64,
    /// Max drawdown at [`REPORT_PERCENTILES`] of the drawdown distribution.
    pub drawdown_percentiles: Vec<f64>,
    /// Per-position contributions, in position order.
    pub contributions: Vec<PositionContribution>,
    /// Non-fatal warnings (propagated from the simulation plus any raised
    /// here).
    pub warnings: Vec<String>,
}

impl RiskReport {
    /// Empty report carrying only warnings.
    fn empty(warnings: Vec<String>) -> Self {
        Self {
            mean_return: 0.0,
            median_return: 0.0,
            std_return: 0.0,
            percentiles: Vec::new(),
            var: 0.0,
            cvar: 0.0,
            probability_of_loss: 0.0,
            loss_probabilities: Vec::new(),
            expected_max_drawdown: 0.0,
            worst_max_drawdown: 0.0,
            drawdown_percentiles: Vec::new(),
            contributions: Vec::new(),
            warnings,
        }
    }
}

/// Nearest-rank percentile of a sorted slice: element at floor(p * n),
/// clamped to the last index.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((p * sorted.len() as f64).floor() as usize).min(sorted.len() - 1);
    sorted[idx]
}

/// Risk analytics over a [`SimulationResult`].
#[derive(Debug, Clone)]
pub struct RiskAnalytics {
    /// VaR tail probability (0.05 for 95% VaR).
    alpha: f64,
}

impl Default for RiskAnalytics {
    fn default() -> Self {
        Self { alpha: 0.05 }
    }
}

impl RiskAnalytics {
    /// Analytics at 95% confidence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Analytics at an explicit tail probability in (0, 0.5].
    pub fn with_alpha(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(1e-6, 0.5),
        }
    }

    /// Compute the full risk report.
    pub fn analyze(&self, result: &SimulationResult) -> RiskReport {
        let n = result.num_paths();
        let mut warnings = result.warnings.clone();
        if n == 0 {
            warnings.push("no simulated paths; risk report is empty".into());
            return RiskReport::empty(warnings);
        }

        // Path indices ordered by terminal return, so percentile paths can
        // be traced back to their per-position contributions.
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            result.terminal_returns[a]
                .partial_cmp(&result.terminal_returns[b])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let sorted: Vec<f64> = order.iter().map(|&i| result.terminal_returns[i]).collect();

        let mean_return = sorted.iter().sum::<f64>() / n as f64;
        let std_return = if n > 1 {
            (sorted
                .iter()
                .map(|r| (r - mean_return).powi(2))
                .sum::<f64>()
                / (n - 1) as f64)
                .sqrt()
        } else {
            0.0
        };

        let percentiles = REPORT_PERCENTILES
            .iter()
            .map(|&p| {
                let terminal_return = percentile_sorted(&sorted, p);
                PercentileSummary {
                    percentile: p,
                    terminal_return,
                    terminal_value: result.initial_value * (1.0 + terminal_return),
                }
            })
            .collect();

        let var_idx = ((self.alpha * n as f64).floor() as usize).min(n - 1);
        let var = sorted[var_idx];
        let cvar = sorted[..=var_idx].iter().sum::<f64>() / (var_idx + 1) as f64;

        let loss_probabilities = LOSS_THRESHOLDS
            .iter()
            .map(|&threshold| LossProbability {
                threshold,
                probability: sorted.iter().filter(|&&r| r < threshold).count() as f64 / n as f64,
            })
            .collect();
        let probability_of_loss =
            sorted.iter().filter(|&&r| r < 0.0).count() as f64 / n as f64;

        let expected_max_drawdown = result.max_drawdowns.iter().sum::<f64>() / n as f64;
        let worst_max_drawdown = result
            .max_drawdowns
            .iter()
            .fold(0.0f64, |acc, &dd| acc.max(dd));
        let mut sorted_drawdowns = result.max_drawdowns.clone();
        sorted_drawdowns.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let drawdown_percentiles = REPORT_PERCENTILES
            .iter()
            .map(|&p| percentile_sorted(&sorted_drawdowns, p))
            .collect();

        let contributions = self.contributions(result, &order);

        debug!(
            paths = n,
            var = var,
            cvar = cvar,
            "risk report computed"
        );

        RiskReport {
            mean_return,
            median_return: percentile_sorted(&sorted, 0.5),
            std_return,
            percentiles,
            var,
            cvar,
            probability_of_loss,
            loss_probabilities,
            expected_max_drawdown,
            worst_max_drawdown,
            drawdown_percentiles,
            contributions,
            warnings,
        }
    }

    fn contributions(
        &self,
        result: &SimulationResult,
        order: &[usize],
    ) -> Vec<PositionContribution> {
        let n = order.len();
        let percentile_paths: Vec<usize> = REPORT_PERCENTILES
            .iter()
            .map(|&p| order[((p * n as f64).floor() as usize).min(n - 1)])
            .collect();

        result
            .tickers
            .iter()
            .enumerate()
            .map(|(i, ticker)| {
                let mean = result
                    .position_contributions
                    .iter()
                    .map(|row| row[i])
                    .sum::<f64>()
                    / n as f64;
                PositionContribution {
                    ticker: ticker.clone(),
                    mean,
                    by_percentile: percentile_paths
                        .iter()
                        .map(|&path| result.position_contributions[path][i])
                        .collect(),
                }
            })
            .collect()
    }
}
