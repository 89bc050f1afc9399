//! PyO3 function bindings for PortSim.

use std::collections::HashMap;

use numpy::{PyArray1, PyArray2, PyReadonlyArray1, PyReadonlyArray2};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::analytics::{RiskAnalytics, RiskReport};
use crate::core::returns::ReturnSeries;
use crate::core::types::{
    CorrelationMethod, DistributionParams, FatTailMethod, HistoryWindow, Position,
    SimulationConfig,
};
use crate::correlation::{CorrelationEstimator, CorrelationMatrix, LagAnalyzer};
use crate::distribution::DistributionEstimator;
use crate::optimizer::{SwapCandidate, SwapConstraints, SwapObjective, SwapOptimizer};
use crate::simulation::{MonteCarloEngine, SimulationResult};

use super::numpy_bridge::*;

fn parse_method(method: &str) -> PyResult<CorrelationMethod> {
    match method {
        "sample" => Ok(CorrelationMethod::Sample),
        "ewma" => Ok(CorrelationMethod::Ewma),
        "ledoit_wolf" => Ok(CorrelationMethod::LedoitWolf),
        other => Err(PyValueError::new_err(format!(
            "unknown correlation method '{other}' (expected sample/ewma/ledoit_wolf)"
        ))),
    }
}

fn parse_window(days: usize) -> PyResult<HistoryWindow> {
    match days {
        126 => Ok(HistoryWindow::SixMonths),
        252 => Ok(HistoryWindow::OneYear),
        504 => Ok(HistoryWindow::TwoYears),
        756 => Ok(HistoryWindow::ThreeYears),
        other => Err(PyValueError::new_err(format!(
            "unsupported history window {other} (expected 126/252/504/756)"
        ))),
    }
}

// ============================================================================
// Configuration Classes
// ============================================================================

/// Python-exposed simulation configuration.
#[pyclass]
#[derive(Debug, Clone)]
pub struct PySimulationConfig {
    #[pyo3(get, set)]
    pub num_paths: usize,
    #[pyo3(get, set)]
    pub horizon_days: usize,
    #[pyo3(get, set)]
    pub correlation_method: String,
    #[pyo3(get, set)]
    pub fat_tail: String,
    #[pyo3(get, set)]
    pub t_df: f64,
    #[pyo3(get, set)]
    pub use_quasi_random: bool,
    #[pyo3(get, set)]
    pub history_window_days: usize,
    #[pyo3(get, set)]
    pub shrinkage_intensity: f64,
    #[pyo3(get, set)]
    pub seed: u64,
}

#[pymethods]
impl PySimulationConfig {
    #[new]
    #[pyo3(signature = (
        num_paths=10_000, horizon_days=252, correlation_method="sample",
        fat_tail="gaussian", t_df=5.0, use_quasi_random=false,
        history_window_days=252, shrinkage_intensity=0.2, seed=42
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        num_paths: usize,
        horizon_days: usize,
        correlation_method: &str,
        fat_tail: &str,
        t_df: f64,
        use_quasi_random: bool,
        history_window_days: usize,
        shrinkage_intensity: f64,
        seed: u64,
    ) -> Self {
        Self {
            num_paths,
            horizon_days,
            correlation_method: correlation_method.to_string(),
            fat_tail: fat_tail.to_string(),
            t_df,
            use_quasi_random,
            history_window_days,
            shrinkage_intensity,
            seed,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "SimulationConfig(num_paths={}, horizon_days={}, method={}, fat_tail={})",
            self.num_paths, self.horizon_days, self.correlation_method, self.fat_tail
        )
    }
}

impl PySimulationConfig {
    fn to_config(&self) -> PyResult<SimulationConfig> {
        let fat_tail = match self.fat_tail.as_str() {
            "gaussian" => FatTailMethod::Gaussian,
            "student_t" => FatTailMethod::StudentT { df: self.t_df },
            other => {
                return Err(PyValueError::new_err(format!(
                    "unknown fat tail method '{other}' (expected gaussian/student_t)"
                )))
            }
        };
        let config = SimulationConfig {
            num_paths: self.num_paths,
            horizon_days: self.horizon_days,
            correlation_method: parse_method(&self.correlation_method)?,
            fat_tail,
            use_quasi_random: self.use_quasi_random,
            history_window: parse_window(self.history_window_days)?,
            shrinkage_intensity: self.shrinkage_intensity,
            seed: self.seed,
        };
        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// Result Classes
// ============================================================================

/// Python-exposed risk report.
#[pyclass]
#[derive(Debug, Clone)]
pub struct PyRiskReport {
    #[pyo3(get)]
    pub mean_return: f64,
    #[pyo3(get)]
    pub median_return: f64,
    #[pyo3(get)]
    pub std_return: f64,
    #[pyo3(get)]
    pub var: f64,
    #[pyo3(get)]
    pub cvar: f64,
    #[pyo3(get)]
    pub probability_of_loss: f64,
    #[pyo3(get)]
    pub expected_max_drawdown: f64,
    #[pyo3(get)]
    pub worst_max_drawdown: f64,
    #[pyo3(get)]
    pub drawdown_percentiles: Vec<f64>,
    #[pyo3(get)]
    pub percentile_levels: Vec<f64>,
    #[pyo3(get)]
    pub percentile_returns: Vec<f64>,
    #[pyo3(get)]
    pub percentile_values: Vec<f64>,
    #[pyo3(get)]
    pub loss_thresholds: Vec<f64>,
    #[pyo3(get)]
    pub loss_probabilities: Vec<f64>,
    /// (ticker, mean, contributions at P5/P25/P50/P75/P95) per position.
    #[pyo3(get)]
    pub contributions: Vec<(String, f64, Vec<f64>)>,
    #[pyo3(get)]
    pub warnings: Vec<String>,
}

#[pymethods]
impl PyRiskReport {
    fn __repr__(&self) -> String {
        format!(
            "RiskReport(mean={:.4}, var={:.4}, cvar={:.4}, p_loss={:.3})",
            self.mean_return, self.var, self.cvar, self.probability_of_loss
        )
    }
}

impl From<RiskReport> for PyRiskReport {
    fn from(report: RiskReport) -> Self {
        Self {
            mean_return: report.mean_return,
            median_return: report.median_return,
            std_return: report.std_return,
            var: report.var,
            cvar: report.cvar,
            probability_of_loss: report.probability_of_loss,
            expected_max_drawdown: report.expected_max_drawdown,
            worst_max_drawdown: report.worst_max_drawdown,
            drawdown_percentiles: report.drawdown_percentiles,
            percentile_levels: report.percentiles.iter().map(|p| p.percentile).collect(),
            percentile_returns: report
                .percentiles
                .iter()
                .map(|p| p.terminal_return)
                .collect(),
            percentile_values: report.percentiles.iter().map(|p| p.terminal_value).collect(),
            loss_thresholds: report
                .loss_probabilities
                .iter()
                .map(|lp| lp.threshold)
                .collect(),
            loss_probabilities: report
                .loss_probabilities
                .iter()
                .map(|lp| lp.probability)
                .collect(),
            contributions: report
                .contributions
                .iter()
                .map(|c| (c.ticker.clone(), c.mean, c.by_percentile.clone()))
                .collect(),
            warnings: report.warnings,
        }
    }
}

/// Python-exposed simulation result.
#[pyclass]
#[derive(Debug, Clone)]
pub struct PySimulationResult {
    inner: SimulationResult,
}

#[pymethods]
impl PySimulationResult {
    #[getter]
    fn tickers(&self) -> Vec<String> {
        self.inner.tickers.clone()
    }

    #[getter]
    fn initial_value(&self) -> f64 {
        self.inner.initial_value
    }

    #[getter]
    fn num_paths(&self) -> usize {
        self.inner.num_paths()
    }

    #[getter]
    fn warnings(&self) -> Vec<String> {
        self.inner.warnings.clone()
    }

    /// Terminal cumulative return per path.
    fn terminal_returns<'py>(&self, py: Python<'py>) -> &'py PyArray1<f64> {
        vec_to_numpy_f64(py, self.inner.terminal_returns.clone())
    }

    /// Terminal dollar value per path.
    fn terminal_values<'py>(&self, py: Python<'py>) -> &'py PyArray1<f64> {
        vec_to_numpy_f64(py, self.inner.terminal_values.clone())
    }

    /// Maximum drawdown per path.
    fn max_drawdowns<'py>(&self, py: Python<'py>) -> &'py PyArray1<f64> {
        vec_to_numpy_f64(py, self.inner.max_drawdowns.clone())
    }

    /// Per-path, per-position contributions (paths x positions).
    fn position_contributions<'py>(&self, py: Python<'py>) -> PyResult<&'py PyArray2<f64>> {
        rows_to_numpy_f64(py, &self.inner.position_contributions)
    }

    /// Compute the risk report at 95% confidence.
    fn risk_report(&self) -> PyRiskReport {
        RiskAnalytics::new().analyze(&self.inner).into()
    }

    fn __repr__(&self) -> String {
        format!(
            "SimulationResult(paths={}, horizon={}, initial_value={:.2})",
            self.inner.num_paths(),
            self.inner.horizon_days,
            self.inner.initial_value
        )
    }
}

/// Python-exposed swap evaluation.
#[pyclass]
#[derive(Debug, Clone)]
pub struct PySwapEvaluation {
    #[pyo3(get)]
    pub sell: String,
    #[pyo3(get)]
    pub buy: String,
    #[pyo3(get)]
    pub score: f64,
    #[pyo3(get)]
    pub expected_return_before: f64,
    #[pyo3(get)]
    pub expected_return_after: f64,
    #[pyo3(get)]
    pub volatility_before: f64,
    #[pyo3(get)]
    pub volatility_after: f64,
    #[pyo3(get)]
    pub sharpe_delta: f64,
}

#[pymethods]
impl PySwapEvaluation {
    fn __repr__(&self) -> String {
        format!(
            "SwapEvaluation(sell={}, buy={}, score={:.4}, sharpe_delta={:.4})",
            self.sell, self.buy, self.score, self.sharpe_delta
        )
    }
}

// ============================================================================
// Functions
// ============================================================================

fn build_series_map(
    series: Vec<(String, PyReadonlyArray1<i64>, PyReadonlyArray1<f64>)>,
) -> PyResult<(HashMap<String, ReturnSeries>, Vec<String>)> {
    let mut map = HashMap::with_capacity(series.len());
    let mut tickers = Vec::with_capacity(series.len());
    for (ticker, timestamps, returns) in series {
        let rs = ReturnSeries::new(numpy_to_vec_i64(timestamps)?, numpy_to_vec_f64(returns)?)?;
        tickers.push(ticker.clone());
        map.insert(ticker, rs);
    }
    Ok((map, tickers))
}

/// Estimate (and repair) a correlation matrix from per-ticker return series.
///
/// `series` is a list of (ticker, timestamps, daily_returns) tuples. Returns
/// the N x N matrix in input ticker order plus a warning list.
#[pyfunction]
#[pyo3(signature = (
    series, method="sample", window_days=252, shrinkage_intensity=0.2,
    cash_tickers=None, lag_adjust=false, lag_lambda=0.97
))]
pub fn estimate_correlation<'py>(
    py: Python<'py>,
    series: Vec<(String, PyReadonlyArray1<i64>, PyReadonlyArray1<f64>)>,
    method: &str,
    window_days: usize,
    shrinkage_intensity: f64,
    cash_tickers: Option<Vec<String>>,
    lag_adjust: bool,
    lag_lambda: f64,
) -> PyResult<(&'py PyArray2<f64>, Vec<String>)> {
    let (map, tickers) = build_series_map(series)?;

    let mut estimator = CorrelationEstimator::new(parse_method(method)?, parse_window(window_days)?)
        .with_shrinkage_intensity(shrinkage_intensity);
    for ticker in cash_tickers.unwrap_or_default() {
        estimator = estimator.with_cash_ticker(ticker);
    }
    let estimate = estimator.estimate(&map, &tickers)?;
    let mut matrix = estimate.matrix;
    let mut warnings = estimate.warnings;

    if lag_adjust {
        let lag_result = LagAnalyzer::new(lag_lambda)?.analyze(&map, &tickers)?;
        warnings.extend(lag_result.warnings.iter().cloned());
        matrix = lag_result.apply_adjustment(&matrix);
    }

    Ok((rows_to_numpy_f64(py, &matrix.values)?, warnings))
}

/// Analyze pairwise lead/lag structure at lags {-1, 0, +1}.
///
/// Returns one tuple per unordered pair (i < j in input order):
/// (ticker_i, ticker_j, corr_at_minus1, corr_at_0, corr_at_plus1,
/// best_lag, best_corr, improvement, significant). Unavailable lags are
/// reported as NaN.
#[pyfunction]
#[pyo3(signature = (series, lag_lambda=0.97))]
#[allow(clippy::type_complexity)]
pub fn analyze_lags(
    series: Vec<(String, PyReadonlyArray1<i64>, PyReadonlyArray1<f64>)>,
    lag_lambda: f64,
) -> PyResult<(
    Vec<(String, String, f64, f64, f64, i32, f64, f64, bool)>,
    Vec<String>,
)> {
    let (map, tickers) = build_series_map(series)?;
    let result = LagAnalyzer::new(lag_lambda)?.analyze(&map, &tickers)?;

    let mut rows = Vec::new();
    for i in 0..tickers.len() {
        for j in (i + 1)..tickers.len() {
            let pair = result.pair(i, j);
            rows.push((
                tickers[i].clone(),
                tickers[j].clone(),
                pair.corr_at(-1).unwrap_or(f64::NAN),
                pair.corr_at(0).unwrap_or(f64::NAN),
                pair.corr_at(1).unwrap_or(f64::NAN),
                pair.best_lag,
                pair.best_corr,
                pair.improvement,
                pair.significant,
            ));
        }
    }
    Ok((rows, result.warnings))
}

/// Estimate annualized (mu, sigma, skew) from one daily return series.
#[pyfunction]
pub fn estimate_distribution(
    timestamps: PyReadonlyArray1<i64>,
    returns: PyReadonlyArray1<f64>,
) -> PyResult<(f64, f64, f64)> {
    let series = ReturnSeries::new(numpy_to_vec_i64(timestamps)?, numpy_to_vec_f64(returns)?)?;
    let params = DistributionEstimator::from_history(&series)?;
    Ok((params.mu, params.sigma, params.skew))
}

#[allow(clippy::too_many_arguments)]
fn build_inputs(
    tickers: Vec<String>,
    quantities: PyReadonlyArray1<f64>,
    prices: PyReadonlyArray1<f64>,
    correlation: PyReadonlyArray2<f64>,
    mus: PyReadonlyArray1<f64>,
    sigmas: PyReadonlyArray1<f64>,
    skews: PyReadonlyArray1<f64>,
) -> PyResult<(
    Vec<Position>,
    CorrelationMatrix,
    HashMap<String, DistributionParams>,
)> {
    let quantities = numpy_to_vec_f64(quantities)?;
    let prices = numpy_to_vec_f64(prices)?;
    let mus = numpy_to_vec_f64(mus)?;
    let sigmas = numpy_to_vec_f64(sigmas)?;
    let skews = numpy_to_vec_f64(skews)?;
    let n = tickers.len();
    if quantities.len() != n || prices.len() != n || mus.len() != n || sigmas.len() != n
        || skews.len() != n
    {
        return Err(PyValueError::new_err(
            "tickers, quantities, prices, mus, sigmas, and skews must have equal length",
        ));
    }

    let positions: Vec<Position> = tickers
        .iter()
        .zip(quantities.iter().zip(prices.iter()))
        .map(|(t, (&q, &p))| Position::new(t.clone(), q, p))
        .collect();

    // Caller-supplied matrices may be hand-edited; re-run PSD repair before
    // handing the matrix to the engine.
    let mut matrix = CorrelationMatrix::from_rows(tickers.clone(), numpy_to_rows_f64(correlation)?)?;
    matrix.make_valid();

    let params: HashMap<String, DistributionParams> = tickers
        .iter()
        .enumerate()
        .map(|(i, t)| (t.clone(), DistributionParams::new(mus[i], sigmas[i], skews[i])))
        .collect();

    Ok((positions, matrix, params))
}

/// Run a correlated Monte Carlo simulation of the given portfolio.
#[pyfunction]
#[pyo3(signature = (tickers, quantities, prices, correlation, mus, sigmas, skews, config=None))]
#[allow(clippy::too_many_arguments)]
pub fn run_portfolio_simulation(
    py: Python<'_>,
    tickers: Vec<String>,
    quantities: PyReadonlyArray1<f64>,
    prices: PyReadonlyArray1<f64>,
    correlation: PyReadonlyArray2<f64>,
    mus: PyReadonlyArray1<f64>,
    sigmas: PyReadonlyArray1<f64>,
    skews: PyReadonlyArray1<f64>,
    config: Option<&PySimulationConfig>,
) -> PyResult<PySimulationResult> {
    let (positions, matrix, params) =
        build_inputs(tickers, quantities, prices, correlation, mus, sigmas, skews)?;
    let config = match config {
        Some(c) => c.to_config()?,
        None => SimulationConfig::default(),
    };

    let engine = MonteCarloEngine::new(config);
    let inner = py.allow_threads(|| engine.simulate(&positions, &matrix, &params))?;
    Ok(PySimulationResult { inner })
}

/// Rank single-position swap candidates analytically.
#[pyfunction]
#[pyo3(signature = (
    tickers, quantities, prices, correlation, mus, sigmas, skews,
    sells, buys, objective="maximize_sharpe", target_return=0.0,
    min_return=0.0, max_positions=50, min_allocation=0.0,
    max_allocation=1.0, risk_free_rate=0.0
))]
#[allow(clippy::too_many_arguments)]
pub fn rank_swaps(
    _py: Python<'_>,
    tickers: Vec<String>,
    quantities: PyReadonlyArray1<f64>,
    prices: PyReadonlyArray1<f64>,
    correlation: PyReadonlyArray2<f64>,
    mus: PyReadonlyArray1<f64>,
    sigmas: PyReadonlyArray1<f64>,
    skews: PyReadonlyArray1<f64>,
    sells: Vec<String>,
    buys: Vec<String>,
    objective: &str,
    target_return: f64,
    min_return: f64,
    max_positions: usize,
    min_allocation: f64,
    max_allocation: f64,
    risk_free_rate: f64,
) -> PyResult<Vec<PySwapEvaluation>> {
    if sells.len() != buys.len() {
        return Err(PyValueError::new_err("sells and buys must have equal length"));
    }
    let (positions, matrix, params) =
        build_inputs(tickers, quantities, prices, correlation, mus, sigmas, skews)?;

    // Zero-quantity entries only extend the correlation universe so buy
    // legs can be scored; they are not held positions.
    let positions: Vec<Position> = positions.into_iter().filter(|p| p.quantity != 0.0).collect();

    let objective = match objective {
        "maximize_sharpe" => SwapObjective::MaximizeSharpe,
        "target_return" => SwapObjective::TargetReturn {
            target: target_return,
        },
        "minimize_risk" => SwapObjective::MinimizeRisk { min_return },
        other => {
            return Err(PyValueError::new_err(format!(
                "unknown objective '{other}' (expected maximize_sharpe/target_return/minimize_risk)"
            )))
        }
    };
    let candidates: Vec<SwapCandidate> = sells
        .into_iter()
        .zip(buys)
        .map(|(sell, buy)| SwapCandidate::new(sell, buy))
        .collect();

    let ranked = SwapOptimizer::new(objective)
        .with_constraints(SwapConstraints {
            max_positions,
            min_allocation,
            max_allocation,
        })
        .with_risk_free_rate(risk_free_rate)
        .rank_swaps(&positions, &matrix, &params, &candidates)?;

    Ok(ranked
        .into_iter()
        .map(|e| PySwapEvaluation {
            sell: e.candidate.sell,
            buy: e.candidate.buy,
            score: e.score,
            expected_return_before: e.expected_return_before,
            expected_return_after: e.expected_return_after,
            volatility_before: e.volatility_before,
            volatility_after: e.volatility_after,
            sharpe_delta: e.sharpe_delta,
        })
        .collect())
}
