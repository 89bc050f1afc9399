//! Lag analysis for cross-timezone return series.
//!
//! Assets trading in non-overlapping hours (e.g. Asian ADRs vs. the US
//! close) show understated same-day correlation. Shifting one series by a
//! single trading day often recovers the true co-movement; this module
//! measures that effect and proposes an adjusted correlation matrix.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::error::{PortsimError, Result};
use crate::core::returns::{pair_at_lag, ReturnSeries};
use crate::core::types::MIN_LAG_OBS;

use super::estimator::{lambda_weights, weighted_pearson};
use super::matrix::CorrelationMatrix;

/// Lags examined, in trading days.
pub const LAGS: [i32; 3] = [-1, 0, 1];

/// Minimum |best| - |lag0| gain for a pair to count as significant.
pub const SIGNIFICANCE_THRESHOLD: f64 = 0.05;

/// Minimum |best| - |current| gain required to overwrite a matrix entry.
pub const ADJUSTMENT_MARGIN: f64 = 0.01;

/// Lag statistics for a single ticker pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PairLag {
    /// Weighted correlation at lags -1, 0, +1; None where the overlap was
    /// too short.
    pub corr_by_lag: [Option<f64>; 3],
    /// Lag with the largest absolute correlation.
    pub best_lag: i32,
    /// Correlation at the best lag.
    pub best_corr: f64,
    /// |best_corr| - |corr at lag 0|.
    pub improvement: f64,
    /// Whether the improvement exceeds the significance threshold.
    pub significant: bool,
}

impl PairLag {
    /// Correlation at a specific lag, if it was computable.
    pub fn corr_at(&self, lag: i32) -> Option<f64> {
        LAGS.iter()
            .position(|&l| l == lag)
            .and_then(|idx| self.corr_by_lag[idx])
    }
}

/// Full pairwise lag analysis over a ticker universe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LagAnalysisResult {
    /// Tickers in matrix order.
    pub tickers: Vec<String>,
    /// Pair statistics, dense N×N with trivial diagonal entries.
    pub pairs: Vec<Vec<PairLag>>,
    /// Warnings for pairs that could not be analyzed.
    pub warnings: Vec<String>,
}

impl LagAnalysisResult {
    /// Pair statistics for (i, j).
    pub fn pair(&self, i: usize, j: usize) -> &PairLag {
        &self.pairs[i][j]
    }

    /// Index pairs (i < j) with a significant lag effect.
    pub fn significant_pairs(&self) -> Vec<(usize, usize)> {
        let n = self.tickers.len();
        let mut out = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                if self.pairs[i][j].significant {
                    out.push((i, j));
                }
            }
        }
        out
    }

    /// Produce a lag-adjusted copy of `matrix`.
    ///
    /// Replaces C[i][j] with the best-lag correlation wherever the best lag
    /// is nonzero and |best| exceeds |current| by the adjustment margin,
    /// then re-runs PSD repair. By construction the adjustment never
    /// decreases |correlation| for an adjusted pair.
    pub fn apply_adjustment(&self, matrix: &CorrelationMatrix) -> CorrelationMatrix {
        let mut adjusted = matrix.clone();
        let mut applied = 0usize;

        let n = self.tickers.len();
        for i in 0..n {
            for j in (i + 1)..n {
                let pair = &self.pairs[i][j];
                if pair.best_lag == 0 {
                    continue;
                }
                let (Some(mi), Some(mj)) = (
                    matrix.index_of(&self.tickers[i]),
                    matrix.index_of(&self.tickers[j]),
                ) else {
                    continue;
                };
                if pair.best_corr.abs() > matrix.get(mi, mj).abs() + ADJUSTMENT_MARGIN {
                    adjusted.set_pair(mi, mj, pair.best_corr);
                    applied += 1;
                }
            }
        }

        if applied > 0 {
            debug!(pairs = applied, "applied lag-adjusted correlations");
        }
        adjusted.make_valid();
        adjusted
    }
}

/// Pairwise lag analyzer using an exponential observation weighting.
#[derive(Debug, Clone)]
pub struct LagAnalyzer {
    lambda: f64,
}

impl LagAnalyzer {
    /// Create an analyzer with decay factor `lambda` in (0, 1].
    pub fn new(lambda: f64) -> Result<Self> {
        if !(lambda > 0.0 && lambda <= 1.0) {
            return Err(PortsimError::invalid_parameter(
                "lag analyzer lambda must be in (0, 1]",
            ));
        }
        Ok(Self { lambda })
    }

    /// Analyze all ticker pairs at lags {-1, 0, +1}.
    ///
    /// Lags with fewer than 30 overlapping observations are skipped. Pairs
    /// whose lag-0 correlation is unavailable get a zeroed entry plus a
    /// warning.
    pub fn analyze(
        &self,
        series: &HashMap<String, ReturnSeries>,
        tickers: &[String],
    ) -> Result<LagAnalysisResult> {
        if tickers.len() < 2 {
            return Err(PortsimError::insufficient_data(2, tickers.len()));
        }

        let n = tickers.len();
        let mut pairs = vec![vec![PairLag::default(); n]; n];
        let mut warnings = Vec::new();

        for i in 0..n {
            pairs[i][i] = PairLag {
                corr_by_lag: [None, Some(1.0), None],
                best_lag: 0,
                best_corr: 1.0,
                improvement: 0.0,
                significant: false,
            };
        }

        for i in 0..n {
            for j in (i + 1)..n {
                let pair = match (series.get(&tickers[i]), series.get(&tickers[j])) {
                    (Some(a), Some(b)) => self.analyze_pair(a, b),
                    _ => None,
                };

                let pair = match pair {
                    Some(p) => p,
                    None => {
                        warnings.push(format!(
                            "{} / {}: insufficient overlap for lag analysis",
                            tickers[i], tickers[j]
                        ));
                        PairLag::default()
                    }
                };

                pairs[i][j] = pair.clone();
                // Mirrored pair sees the opposite shift direction.
                pairs[j][i] = PairLag {
                    corr_by_lag: [pair.corr_by_lag[2], pair.corr_by_lag[1], pair.corr_by_lag[0]],
                    best_lag: -pair.best_lag,
                    ..pair
                };
            }
        }

        Ok(LagAnalysisResult {
            tickers: tickers.to_vec(),
            pairs,
            warnings,
        })
    }

    /// Analyze one pair; None when lag 0 itself lacks the minimum overlap.
    fn analyze_pair(&self, a: &ReturnSeries, b: &ReturnSeries) -> Option<PairLag> {
        let (xa, xb) = a.overlap(b);

        let mut corr_by_lag = [None; 3];
        for (idx, &lag) in LAGS.iter().enumerate() {
            let (la, lb) = pair_at_lag(&xa, &xb, lag);
            if la.len() < MIN_LAG_OBS {
                continue;
            }
            let weights = lambda_weights(la.len(), self.lambda);
            corr_by_lag[idx] = Some(weighted_pearson(&la, &lb, &weights));
        }

        let corr0 = corr_by_lag[1]?;

        let (mut best_lag, mut best_corr) = (0, corr0);
        for (idx, &lag) in LAGS.iter().enumerate() {
            if let Some(c) = corr_by_lag[idx] {
                if c.abs() > best_corr.abs() {
                    best_lag = lag;
                    best_corr = c;
                }
            }
        }

        let improvement = best_corr.abs() - corr0.abs();
        Some(PairLag {
            corr_by_lag,
            best_lag,
            best_corr,
            improvement,
            significant: improvement > SIGNIFICANCE_THRESHOLD,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noise(i: usize, phase: f64) -> f64 {
        ((i as f64) * 0.731 + phase).sin() * 0.01
    }

    /// Build a pair where `b` echoes `a` one trading day later.
    fn lagged_pair(n: usize) -> (ReturnSeries, ReturnSeries) {
        let base: Vec<f64> = (0..n + 1).map(|i| noise(i, 0.0)).collect();
        let a = base[1..].to_vec();
        let b: Vec<f64> = base[..n]
            .iter()
            .enumerate()
            .map(|(i, r)| 0.9 * r + 0.1 * noise(i, 3.0))
            .collect();
        (
            ReturnSeries::from_returns(a),
            ReturnSeries::from_returns(b),
        )
    }

    fn series_map(entries: Vec<(&str, ReturnSeries)>) -> HashMap<String, ReturnSeries> {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn test_detects_one_day_lag() {
        let (a, b) = lagged_pair(252);
        let map = series_map(vec![("US", a), ("ADR", b)]);
        let tickers = vec!["US".to_string(), "ADR".to_string()];

        let result = LagAnalyzer::new(0.999).unwrap().analyze(&map, &tickers).unwrap();
        let pair = result.pair(0, 1);

        // ADR[t] echoes US[t], so US[t] pairs with ADR[t+1]: lag -1 from
        // the US side, +1 from the mirrored ADR side.
        assert_eq!(pair.best_lag, -1);
        assert_eq!(result.pair(1, 0).best_lag, 1);
        assert!(pair.best_corr.abs() > pair.corr_at(0).unwrap().abs());
        assert!(pair.significant);
        assert_eq!(result.significant_pairs(), vec![(0, 1)]);
    }

    #[test]
    fn test_synchronous_pair_keeps_lag_zero() {
        let base: Vec<f64> = (0..252).map(|i| noise(i, 0.0)).collect();
        let a = ReturnSeries::from_returns(base.clone());
        let b = ReturnSeries::from_returns(
            base.iter()
                .enumerate()
                .map(|(i, r)| 0.9 * r + 0.1 * noise(i, 7.0))
                .collect(),
        );
        let map = series_map(vec![("A", a), ("B", b)]);
        let tickers = vec!["A".to_string(), "B".to_string()];

        let result = LagAnalyzer::new(0.999).unwrap().analyze(&map, &tickers).unwrap();
        let pair = result.pair(0, 1);

        assert_eq!(pair.best_lag, 0);
        assert!(!pair.significant);
    }

    #[test]
    fn test_short_series_produces_warning() {
        let (a, _) = lagged_pair(252);
        let short = ReturnSeries::from_returns(vec![0.01; 20]);
        let map = series_map(vec![("A", a), ("B", short)]);
        let tickers = vec!["A".to_string(), "B".to_string()];

        let result = LagAnalyzer::new(0.99).unwrap().analyze(&map, &tickers).unwrap();
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.pair(0, 1).best_corr, 0.0);
    }

    #[test]
    fn test_adjustment_never_decreases_abs_correlation() {
        let (a, b) = lagged_pair(252);
        let map = series_map(vec![("US", a.clone()), ("ADR", b.clone())]);
        let tickers = vec!["US".to_string(), "ADR".to_string()];

        let analysis = LagAnalyzer::new(0.999).unwrap().analyze(&map, &tickers).unwrap();

        // Unadjusted lag-0 estimate.
        let (xa, xb) = a.overlap(&b);
        let lag0 = weighted_pearson(&xa, &xb, &lambda_weights(xa.len(), 0.999));
        let mut matrix = CorrelationMatrix::identity(tickers);
        matrix.set_pair(0, 1, lag0);

        let adjusted = analysis.apply_adjustment(&matrix);
        assert!(adjusted.is_valid());
        assert!(adjusted.get(0, 1).abs() >= lag0.abs() - 1e-6);
    }

    #[test]
    fn test_invalid_lambda_rejected() {
        assert!(LagAnalyzer::new(0.0).is_err());
        assert!(LagAnalyzer::new(1.5).is_err());
        assert!(LagAnalyzer::new(1.0).is_ok());
    }
}
