//! Analytic ranking of single-position swap candidates.
//!
//! Each candidate sells one ticker and buys another at the same dollar
//! notional. Portfolio expected return and volatility are recomputed
//! analytically from the existing covariance structure rather than by full
//! re-simulation, which keeps ranking fast enough to run on every candidate
//! list change.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::error::{PortsimError, Result};
use crate::core::types::{DistributionParams, Position};
use crate::correlation::matrix::CorrelationMatrix;

/// A candidate swap: sell the full stake in one ticker, buy the other with
/// the proceeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapCandidate {
    /// Ticker to sell.
    pub sell: String,
    /// Ticker to buy.
    pub buy: String,
}

impl SwapCandidate {
    /// Create a candidate swap.
    pub fn new(sell: impl Into<String>, buy: impl Into<String>) -> Self {
        Self {
            sell: sell.into(),
            buy: buy.into(),
        }
    }
}

/// Ranking objective for candidate swaps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SwapObjective {
    /// Rank by Sharpe-ratio improvement.
    MaximizeSharpe,
    /// Rank by closeness of expected return to a target level.
    TargetReturn { target: f64 },
    /// Rank by volatility reduction among swaps keeping expected return at
    /// or above a floor.
    MinimizeRisk { min_return: f64 },
}

/// Position-level constraints. Violating swaps are rejected, never clamped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapConstraints {
    /// Maximum number of nonzero positions after the swap.
    pub max_positions: usize,
    /// Minimum absolute weight of any nonzero position after the swap.
    pub min_allocation: f64,
    /// Maximum absolute weight of any position after the swap.
    pub max_allocation: f64,
}

impl Default for SwapConstraints {
    fn default() -> Self {
        Self {
            max_positions: 50,
            min_allocation: 0.0,
            max_allocation: 1.0,
        }
    }
}

/// Evaluated and scored swap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapEvaluation {
    /// The candidate that was evaluated.
    pub candidate: SwapCandidate,
    /// Objective score; higher ranks first.
    pub score: f64,
    /// Annualized portfolio expected return before the swap.
    pub expected_return_before: f64,
    /// Annualized portfolio expected return after the swap.
    pub expected_return_after: f64,
    /// Annualized portfolio volatility before the swap.
    pub volatility_before: f64,
    /// Annualized portfolio volatility after the swap.
    pub volatility_after: f64,
    /// Sharpe ratio change from the swap.
    pub sharpe_delta: f64,
}

/// Ranks single-position swaps against an analytic portfolio model.
#[derive(Debug, Clone)]
pub struct SwapOptimizer {
    objective: SwapObjective,
    constraints: SwapConstraints,
    risk_free_rate: f64,
}

impl SwapOptimizer {
    /// Create an optimizer with default constraints and zero risk-free rate.
    pub fn new(objective: SwapObjective) -> Self {
        Self {
            objective,
            constraints: SwapConstraints::default(),
            risk_free_rate: 0.0,
        }
    }

    /// Override the position constraints.
    pub fn with_constraints(mut self, constraints: SwapConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    /// Set the annualized risk-free rate used for Sharpe ratios.
    pub fn with_risk_free_rate(mut self, rate: f64) -> Self {
        self.risk_free_rate = rate;
        self
    }

    /// Evaluate and rank candidate swaps, best first.
    ///
    /// The matrix and params supply the covariance structure; both must
    /// cover every ticker appearing in positions or candidates. Candidates
    /// that violate constraints or reference unknown tickers are dropped
    /// from the ranking rather than failing the whole call.
    pub fn rank_swaps(
        &self,
        positions: &[Position],
        matrix: &CorrelationMatrix,
        params: &HashMap<String, DistributionParams>,
        candidates: &[SwapCandidate],
    ) -> Result<Vec<SwapEvaluation>> {
        if positions.is_empty() {
            return Err(PortsimError::empty_data("optimizer positions"));
        }
        let portfolio_value: f64 = positions.iter().map(Position::market_value).sum();
        if !(portfolio_value > 0.0) || !portfolio_value.is_finite() {
            return Err(PortsimError::invalid_config(
                "portfolio value must be positive for swap ranking",
            ));
        }

        // Weights in matrix ticker order; tickers absent from the portfolio
        // carry weight 0 and become reachable only through a buy.
        let mut weights = vec![0.0; matrix.len()];
        for p in positions {
            let idx = matrix.index_of(&p.ticker).ok_or_else(|| {
                PortsimError::invalid_matrix(format!("no correlation row for {}", p.ticker))
            })?;
            weights[idx] += p.market_value() / portfolio_value;
        }
        let (mus, sigmas) = self.marginal_vectors(matrix, params)?;

        let return_before = portfolio_return(&weights, &mus);
        let vol_before = portfolio_volatility(&weights, &sigmas, matrix);
        let sharpe_before = self.sharpe(return_before, vol_before);

        let mut evaluations: Vec<SwapEvaluation> = candidates
            .iter()
            .filter_map(|candidate| {
                let sell = matrix.index_of(&candidate.sell)?;
                let buy = matrix.index_of(&candidate.buy)?;
                if sell == buy || weights[sell] == 0.0 {
                    return None;
                }

                let mut after = weights.clone();
                after[buy] += after[sell];
                after[sell] = 0.0;
                if !self.satisfies_constraints(&after) {
                    return None;
                }

                let return_after = portfolio_return(&after, &mus);
                let vol_after = portfolio_volatility(&after, &sigmas, matrix);
                let sharpe_after = self.sharpe(return_after, vol_after);
                let sharpe_delta = sharpe_after - sharpe_before;

                let score = match self.objective {
                    SwapObjective::MaximizeSharpe => sharpe_delta,
                    SwapObjective::TargetReturn { target } => -(return_after - target).abs(),
                    SwapObjective::MinimizeRisk { min_return } => {
                        if return_after < min_return {
                            return None;
                        }
                        vol_before - vol_after
                    }
                };

                Some(SwapEvaluation {
                    candidate: candidate.clone(),
                    score,
                    expected_return_before: return_before,
                    expected_return_after: return_after,
                    volatility_before: vol_before,
                    volatility_after: vol_after,
                    sharpe_delta,
                })
            })
            .collect();

        evaluations.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        debug!(
            candidates = candidates.len(),
            ranked = evaluations.len(),
            "swap ranking complete"
        );
        Ok(evaluations)
    }

    fn marginal_vectors(
        &self,
        matrix: &CorrelationMatrix,
        params: &HashMap<String, DistributionParams>,
    ) -> Result<(Vec<f64>, Vec<f64>)> {
        let mut mus = Vec::with_capacity(matrix.len());
        let mut sigmas = Vec::with_capacity(matrix.len());
        for ticker in &matrix.tickers {
            let p = params.get(ticker).ok_or_else(|| {
                PortsimError::invalid_config(format!("missing distribution params for {ticker}"))
            })?;
            mus.push(p.mu);
            sigmas.push(p.sigma);
        }
        Ok((mus, sigmas))
    }

    fn satisfies_constraints(&self, weights: &[f64]) -> bool {
        let nonzero: Vec<f64> = weights.iter().copied().filter(|w| *w != 0.0).collect();
        if nonzero.len() > self.constraints.max_positions {
            return false;
        }
        nonzero.iter().all(|w| {
            let abs = w.abs();
            abs >= self.constraints.min_allocation && abs <= self.constraints.max_allocation
        })
    }

    fn sharpe(&self, expected_return: f64, volatility: f64) -> f64 {
        if volatility > 0.0 {
            (expected_return - self.risk_free_rate) / volatility
        } else {
            0.0
        }
    }
}

/// Weighted expected return.
fn portfolio_return(weights: &[f64], mus: &[f64]) -> f64 {
    weights.iter().zip(mus).map(|(w, mu)| w * mu).sum()
}

/// Annualized portfolio volatility from marginal volatilities and the
/// correlation matrix.
fn portfolio_volatility(weights: &[f64], sigmas: &[f64], matrix: &CorrelationMatrix) -> f64 {
    let n = weights.len();
    let mut variance = 0.0;
    for i in 0..n {
        if weights[i] == 0.0 {
            continue;
        }
        for j in 0..n {
            if weights[j] == 0.0 {
                continue;
            }
            variance += weights[i] * weights[j] * sigmas[i] * sigmas[j] * matrix.values[i][j];
        }
    }
    variance.max(0.0).sqrt()
}
