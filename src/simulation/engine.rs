//! Correlated Monte Carlo simulation of forward portfolio outcomes.
//!
//! Draws correlated daily shocks through the Cholesky factor of a validated
//! correlation matrix, applies per-asset skew and scaling, and compounds
//! daily returns into terminal outcomes. Parallelized over fixed-size path
//! batches via Rayon; batch boundaries are where progress is reported and
//! cancellation is honored.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::analytics::drawdown::DrawdownTracker;
use crate::core::error::{PortsimError, Result};
use crate::core::types::{
    DistributionParams, FatTailMethod, Position, SimulationConfig, TRADING_DAYS_PER_YEAR,
};
use crate::correlation::matrix::CorrelationMatrix;

use super::progress::{CancelToken, ProgressCallback, ProgressPhase};
use super::sampler::{HaltonSampler, Xoshiro256};

/// Paths per batch. Fixed (rather than derived from the thread count) so a
/// given seed produces identical results on any machine.
const BATCH_SIZE: usize = 2048;

/// Below this path count tail percentiles become unstable; callers are
/// warned but not blocked.
const STABLE_PATH_COUNT: usize = 1000;

/// Immutable result of one simulation run.
///
/// A rerun produces a fresh result; callers keep the previous value for
/// comparison rather than mutating this one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Tickers in position order.
    pub tickers: Vec<String>,
    /// Starting portfolio value.
    pub initial_value: f64,
    /// Simulated horizon in trading days.
    pub horizon_days: usize,
    /// Terminal cumulative return per path.
    pub terminal_returns: Vec<f64>,
    /// Terminal dollar value per path.
    pub terminal_values: Vec<f64>,
    /// Maximum peak-to-trough decline along each path, as a fraction.
    pub max_drawdowns: Vec<f64>,
    /// Per-path, per-position contribution to portfolio return
    /// (weight × position's own compounded return), paths × N.
    pub position_contributions: Vec<Vec<f64>>,
    /// Non-fatal warnings raised during the run.
    pub warnings: Vec<String>,
}

impl SimulationResult {
    /// Number of simulated paths.
    #[inline]
    pub fn num_paths(&self) -> usize {
        self.terminal_returns.len()
    }
}

/// One simulated path's outcome, internal to the engine.
struct PathOutcome {
    terminal_return: f64,
    max_drawdown: f64,
    position_contributions: Vec<f64>,
}

/// Monte Carlo engine. Holds no state beyond its configuration; every
/// simulation is a pure function of its explicit inputs.
pub struct MonteCarloEngine {
    config: SimulationConfig,
    progress: Option<Arc<ProgressCallback>>,
    cancel: Option<CancelToken>,
}

impl MonteCarloEngine {
    /// Create an engine with the given configuration.
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            progress: None,
            cancel: None,
        }
    }

    /// Attach a progress callback, invoked once per path batch.
    pub fn with_progress(
        mut self,
        callback: impl Fn(ProgressPhase, usize, usize) + Send + Sync + 'static,
    ) -> Self {
        self.progress = Some(Arc::new(callback));
        self
    }

    /// Attach a cancellation token checked at batch boundaries.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn report(&self, phase: ProgressPhase, current: usize, total: usize) {
        if let Some(cb) = &self.progress {
            cb(phase, current, total);
        }
    }

    /// Run the simulation.
    ///
    /// The correlation matrix must already have passed PSD repair; an
    /// invalid matrix is a fatal precondition violation, as is a Cholesky
    /// failure afterwards.
    pub fn simulate(
        &self,
        positions: &[Position],
        matrix: &CorrelationMatrix,
        params: &HashMap<String, DistributionParams>,
    ) -> Result<SimulationResult> {
        let start = Instant::now();
        self.config.validate()?;
        let (tickers, asset_params) = self.validate_inputs(positions, matrix, params)?;
        self.report(ProgressPhase::Setup, 0, 1);

        let mut warnings = Vec::new();
        if self.config.num_paths < STABLE_PATH_COUNT {
            let msg = format!(
                "num_paths = {} is below {STABLE_PATH_COUNT}; tail percentiles (P5, VaR) may be unstable",
                self.config.num_paths
            );
            warn!("{msg}");
            warnings.push(msg);
        }

        let portfolio_value: f64 = positions.iter().map(Position::market_value).sum();
        if portfolio_value.is_finite() && portfolio_value < 0.0 {
            // Weights against a negative base invert every position's sign,
            // so a net-short book cannot be simulated as fractions of value.
            return Err(PortsimError::invalid_config(
                "net portfolio value is negative; position weights are undefined for a net-short book",
            ));
        }
        if portfolio_value == 0.0 || !portfolio_value.is_finite() {
            warnings.push("portfolio value is zero or undefined; terminal values set to 0".into());
            return Ok(self.degenerate_result(tickers, warnings));
        }

        let chol = matrix.cholesky()?;
        self.report(ProgressPhase::Setup, 1, 1);

        let n_assets = tickers.len();
        let weights: Vec<f64> = positions
            .iter()
            .map(|p| p.market_value() / portfolio_value)
            .collect();
        let mu_daily: Vec<f64> = asset_params
            .iter()
            .map(|p| p.mu / TRADING_DAYS_PER_YEAR)
            .collect();
        let sigma_daily: Vec<f64> = asset_params
            .iter()
            .map(|p| p.sigma / TRADING_DAYS_PER_YEAR.sqrt())
            .collect();
        let skews: Vec<f64> = asset_params.iter().map(|p| p.skew).collect();

        info!(
            paths = self.config.num_paths,
            horizon = self.config.horizon_days,
            assets = n_assets,
            quasi = self.config.use_quasi_random,
            "starting Monte Carlo simulation"
        );

        // Per-batch RNG streams separated by 2^128 jumps so results do not
        // depend on the number of worker threads.
        let num_paths = self.config.num_paths;
        let n_batches = num_paths.div_ceil(BATCH_SIZE);
        let mut base_rng = Xoshiro256::new(self.config.seed);
        let batch_rngs: Vec<Xoshiro256> = (0..n_batches)
            .map(|_| {
                let rng = base_rng.clone();
                base_rng.jump();
                rng
            })
            .collect();

        let done = AtomicUsize::new(0);
        let outcomes: Vec<Vec<PathOutcome>> = batch_rngs
            .into_par_iter()
            .enumerate()
            .map(|(batch_idx, mut rng)| -> Result<Vec<PathOutcome>> {
                if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                    return Err(PortsimError::Cancelled);
                }

                let start_path = batch_idx * BATCH_SIZE;
                let end_path = (start_path + BATCH_SIZE).min(num_paths);
                let horizon = self.config.horizon_days;

                let mut halton = self.config.use_quasi_random.then(|| {
                    let mut h = HaltonSampler::new(n_assets);
                    h.skip((start_path * horizon) as u64);
                    h
                });

                let mut batch = Vec::with_capacity(end_path - start_path);
                let mut z_corr = vec![0.0; n_assets];

                for _ in start_path..end_path {
                    let mut cum = vec![1.0f64; n_assets];
                    let mut value = 1.0f64;
                    let mut tracker = DrawdownTracker::with_initial(1.0);

                    for _ in 0..horizon {
                        let z_indep: Vec<f64> = match &mut halton {
                            Some(h) => h.next_normals(),
                            None => (0..n_assets).map(|_| rng.next_normal()).collect(),
                        };
                        let t_scale = match self.config.fat_tail {
                            FatTailMethod::Gaussian => 1.0,
                            FatTailMethod::StudentT { df } => rng.next_t_scale(df),
                        };

                        // Correlate via Cholesky: z_corr = L * z_indep.
                        for i in 0..n_assets {
                            let mut acc = 0.0;
                            for j in 0..=i {
                                acc += chol[i][j] * z_indep[j];
                            }
                            z_corr[i] = acc * t_scale;
                        }

                        let mut port_ret = 0.0;
                        for i in 0..n_assets {
                            let mut z = z_corr[i];
                            let skew = skews[i];
                            if skew != 0.0 {
                                // Cornish-Fisher-style cubic tilt.
                                z += skew / 6.0 * (z * z - 1.0);
                            }
                            let r = mu_daily[i] + sigma_daily[i] * z;
                            cum[i] *= 1.0 + r;
                            port_ret += weights[i] * r;
                        }

                        value *= 1.0 + port_ret;
                        tracker.update(value);
                    }

                    batch.push(PathOutcome {
                        terminal_return: value - 1.0,
                        max_drawdown: tracker.max_drawdown(),
                        position_contributions: (0..n_assets)
                            .map(|i| weights[i] * (cum[i] - 1.0))
                            .collect(),
                    });
                }

                let completed = done.fetch_add(batch.len(), Ordering::Relaxed) + batch.len();
                self.report(ProgressPhase::Sampling, completed, num_paths);
                Ok(batch)
            })
            .collect::<Result<Vec<_>>>()?;

        self.report(ProgressPhase::Reduction, 0, 1);
        let mut terminal_returns = Vec::with_capacity(num_paths);
        let mut terminal_values = Vec::with_capacity(num_paths);
        let mut max_drawdowns = Vec::with_capacity(num_paths);
        let mut position_contributions = Vec::with_capacity(num_paths);
        for outcome in outcomes.into_iter().flatten() {
            terminal_returns.push(outcome.terminal_return);
            terminal_values.push(portfolio_value * (1.0 + outcome.terminal_return));
            max_drawdowns.push(outcome.max_drawdown);
            position_contributions.push(outcome.position_contributions);
        }

        let finite = terminal_returns.iter().all(|r| r.is_finite())
            && position_contributions
                .iter()
                .all(|row| row.iter().all(|c| c.is_finite()));
        if !finite {
            return Err(PortsimError::numeric_instability(
                "simulated paths contain NaN or infinite values",
            ));
        }
        self.report(ProgressPhase::Reduction, 1, 1);

        debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "simulation complete"
        );

        Ok(SimulationResult {
            tickers,
            initial_value: portfolio_value,
            horizon_days: self.config.horizon_days,
            terminal_returns,
            terminal_values,
            max_drawdowns,
            position_contributions,
            warnings,
        })
    }

    /// Check positions, matrix, and parameters against each other.
    fn validate_inputs(
        &self,
        positions: &[Position],
        matrix: &CorrelationMatrix,
        params: &HashMap<String, DistributionParams>,
    ) -> Result<(Vec<String>, Vec<DistributionParams>)> {
        if positions.is_empty() {
            return Err(PortsimError::empty_data("simulation positions"));
        }

        let tickers: Vec<String> = positions.iter().map(|p| p.ticker.clone()).collect();
        if matrix.tickers != tickers {
            return Err(PortsimError::invalid_matrix(
                "correlation matrix tickers do not match position order",
            ));
        }
        if !matrix.is_valid() {
            return Err(PortsimError::invalid_matrix(
                "matrix must pass PSD repair before simulation",
            ));
        }

        let mut asset_params = Vec::with_capacity(tickers.len());
        for ticker in &tickers {
            let p = params.get(ticker).ok_or_else(|| {
                PortsimError::invalid_config(format!("missing distribution params for {ticker}"))
            })?;
            p.validate()?;
            asset_params.push(*p);
        }

        Ok((tickers, asset_params))
    }

    /// All-zero result for a portfolio with no usable value.
    fn degenerate_result(&self, tickers: Vec<String>, warnings: Vec<String>) -> SimulationResult {
        let n_assets = tickers.len();
        let num_paths = self.config.num_paths;
        SimulationResult {
            tickers,
            initial_value: 0.0,
            horizon_days: self.config.horizon_days,
            terminal_returns: vec![0.0; num_paths],
            terminal_values: vec![0.0; num_paths],
            max_drawdowns: vec![0.0; num_paths],
            position_contributions: vec![vec![0.0; n_assets]; num_paths],
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::progress::ProgressPhase;
    use std::sync::Mutex;

    fn single_asset_setup(
        mu: f64,
        sigma: f64,
    ) -> (
        Vec<Position>,
        CorrelationMatrix,
        HashMap<String, DistributionParams>,
    ) {
        let positions = vec![Position::new("A", 100.0, 50.0)];
        let matrix = CorrelationMatrix::identity(vec!["A".to_string()]);
        let mut params = HashMap::new();
        params.insert("A".to_string(), DistributionParams::new(mu, sigma, 0.0));
        (positions, matrix, params)
    }

    fn small_config(num_paths: usize, horizon_days: usize) -> SimulationConfig {
        SimulationConfig {
            num_paths,
            horizon_days,
            ..Default::default()
        }
    }

    #[test]
    fn test_degenerate_sigma_zero_all_mass_at_zero() {
        let (positions, matrix, params) = single_asset_setup(0.0, 0.0);
        let engine = MonteCarloEngine::new(small_config(500, 50));

        let result = engine.simulate(&positions, &matrix, &params).unwrap();
        assert_eq!(result.num_paths(), 500);
        for r in &result.terminal_returns {
            assert!(r.abs() < 1e-12);
        }
        for dd in &result.max_drawdowns {
            assert!(dd.abs() < 1e-12);
        }
    }

    #[test]
    fn test_deterministic_under_fixed_seed() {
        let (positions, matrix, params) = single_asset_setup(0.05, 0.20);
        let engine = MonteCarloEngine::new(small_config(2000, 30));

        let a = engine.simulate(&positions, &matrix, &params).unwrap();
        let b = engine.simulate(&positions, &matrix, &params).unwrap();
        assert_eq!(a.terminal_returns, b.terminal_returns);
        assert_eq!(a.max_drawdowns, b.max_drawdowns);
    }

    #[test]
    fn test_seed_changes_results() {
        let (positions, matrix, params) = single_asset_setup(0.05, 0.20);
        let a = MonteCarloEngine::new(small_config(500, 30))
            .simulate(&positions, &matrix, &params)
            .unwrap();
        let b = MonteCarloEngine::new(SimulationConfig {
            seed: 7,
            ..small_config(500, 30)
        })
        .simulate(&positions, &matrix, &params)
        .unwrap();
        assert_ne!(a.terminal_returns, b.terminal_returns);
    }

    #[test]
    fn test_zero_portfolio_value_yields_zero_terminals() {
        let positions = vec![Position::new("A", 0.0, 50.0)];
        let matrix = CorrelationMatrix::identity(vec!["A".to_string()]);
        let mut params = HashMap::new();
        params.insert("A".to_string(), DistributionParams::new(0.05, 0.2, 0.0));

        let result = MonteCarloEngine::new(small_config(100, 10))
            .simulate(&positions, &matrix, &params)
            .unwrap();
        assert!(result.terminal_values.iter().all(|v| *v == 0.0));
        assert!(!result.warnings.is_empty());
    }

    #[test]
    fn test_net_short_portfolio_rejected() {
        let positions = vec![
            Position::new("A", 100.0, 50.0),
            Position::new("B", -200.0, 50.0),
        ];
        let matrix =
            CorrelationMatrix::identity(vec!["A".to_string(), "B".to_string()]);
        let mut params = HashMap::new();
        params.insert("A".to_string(), DistributionParams::new(0.05, 0.2, 0.0));
        params.insert("B".to_string(), DistributionParams::new(0.05, 0.2, 0.0));

        let err = MonteCarloEngine::new(small_config(100, 10))
            .simulate(&positions, &matrix, &params)
            .unwrap_err();
        assert!(matches!(err, PortsimError::InvalidConfig { .. }));
    }

    #[test]
    fn test_low_path_count_warns() {
        let (positions, matrix, params) = single_asset_setup(0.05, 0.20);
        let result = MonteCarloEngine::new(small_config(100, 10))
            .simulate(&positions, &matrix, &params)
            .unwrap();
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("tail percentiles")));
    }

    #[test]
    fn test_mismatched_matrix_rejected() {
        let (positions, _, params) = single_asset_setup(0.05, 0.20);
        let wrong = CorrelationMatrix::identity(vec!["B".to_string()]);
        let err = MonteCarloEngine::new(small_config(100, 10))
            .simulate(&positions, &wrong, &params)
            .unwrap_err();
        assert!(matches!(err, PortsimError::InvalidMatrix { .. }));
    }

    #[test]
    fn test_missing_params_rejected() {
        let positions = vec![Position::new("A", 100.0, 50.0)];
        let matrix = CorrelationMatrix::identity(vec!["A".to_string()]);
        let params = HashMap::new();
        let err = MonteCarloEngine::new(small_config(100, 10))
            .simulate(&positions, &matrix, &params)
            .unwrap_err();
        assert!(matches!(err, PortsimError::InvalidConfig { .. }));
    }

    #[test]
    fn test_cancelled_run_returns_cancelled() {
        let (positions, matrix, params) = single_asset_setup(0.05, 0.20);
        let token = CancelToken::new();
        token.cancel();

        let err = MonteCarloEngine::new(small_config(5000, 50))
            .with_cancel_token(token)
            .simulate(&positions, &matrix, &params)
            .unwrap_err();
        assert!(matches!(err, PortsimError::Cancelled));
    }

    #[test]
    fn test_progress_reported_per_batch() {
        let (positions, matrix, params) = single_asset_setup(0.05, 0.20);
        let events: Arc<Mutex<Vec<(ProgressPhase, usize, usize)>>> =
            Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);

        MonteCarloEngine::new(small_config(5000, 10))
            .with_progress(move |phase, current, total| {
                sink.lock().unwrap().push((phase, current, total));
            })
            .simulate(&positions, &matrix, &params)
            .unwrap();

        let events = events.lock().unwrap();
        let sampling: Vec<_> = events
            .iter()
            .filter(|(p, _, _)| *p == ProgressPhase::Sampling)
            .collect();
        // 5000 paths at 2048 per batch = 3 batches, not one event per path.
        assert_eq!(sampling.len(), 3);
        assert!(sampling.iter().any(|(_, c, t)| c == t));
    }

    #[test]
    fn test_student_t_fatter_tails_than_gaussian() {
        let (positions, matrix, params) = single_asset_setup(0.0, 0.30);

        let gauss = MonteCarloEngine::new(small_config(8000, 21))
            .simulate(&positions, &matrix, &params)
            .unwrap();
        let student = MonteCarloEngine::new(SimulationConfig {
            fat_tail: FatTailMethod::StudentT { df: 4.0 },
            ..small_config(8000, 21)
        })
        .simulate(&positions, &matrix, &params)
        .unwrap();

        let tail = |rets: &[f64]| {
            let mut sorted = rets.to_vec();
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            sorted[sorted.len() / 200] // 0.5th percentile
        };
        // The extreme left tail should be worse under Student-t.
        assert!(tail(&student.terminal_returns) < tail(&gauss.terminal_returns));
    }

    #[test]
    fn test_quasi_random_deterministic() {
        let (positions, matrix, params) = single_asset_setup(0.05, 0.20);
        let config = SimulationConfig {
            use_quasi_random: true,
            ..small_config(1000, 20)
        };
        let a = MonteCarloEngine::new(config.clone())
            .simulate(&positions, &matrix, &params)
            .unwrap();
        let b = MonteCarloEngine::new(config)
            .simulate(&positions, &matrix, &params)
            .unwrap();
        assert_eq!(a.terminal_returns, b.terminal_returns);
    }

    #[test]
    fn test_short_position_gains_when_asset_falls() {
        // Strongly negative drift, tiny vol, held short.
        let positions = vec![Position::new("A", -100.0, 50.0)];
        let matrix = CorrelationMatrix::identity(vec!["A".to_string()]);
        let mut params = HashMap::new();
        params.insert("A".to_string(), DistributionParams::new(-0.50, 0.01, 0.0));

        let result = MonteCarloEngine::new(small_config(500, 126))
            .simulate(&positions, &matrix, &params)
            .unwrap();

        // Portfolio value of a pure short book is negative, which the
        // degenerate-value guard treats as no usable value.
        // A short hedged with a long cash-like leg gains instead:
        let positions = vec![
            Position::new("CASH", 10_000.0, 1.0),
            Position::new("A", -100.0, 50.0),
        ];
        let mut matrix = CorrelationMatrix::identity(vec!["CASH".to_string(), "A".to_string()]);
        matrix.make_valid();
        let mut params2 = HashMap::new();
        params2.insert("CASH".to_string(), DistributionParams::new(0.0, 0.0, 0.0));
        params2.insert("A".to_string(), DistributionParams::new(-0.50, 0.01, 0.0));

        let hedged = MonteCarloEngine::new(small_config(500, 126))
            .simulate(&positions, &matrix, &params2)
            .unwrap();
        let mean: f64 =
            hedged.terminal_returns.iter().sum::<f64>() / hedged.num_paths() as f64;
        assert!(mean > 0.0, "short position should profit from decline");

        // Degenerate pure-short book produced the zeroed result.
        assert!(result.terminal_values.iter().all(|v| *v == 0.0));
    }
}
