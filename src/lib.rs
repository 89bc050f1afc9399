// Suppress warning from PyO3 macro expansion (fixed in newer PyO3 versions)
#![cfg_attr(feature = "python", allow(non_local_definitions))]

//! PortSim - correlated Monte Carlo engine for portfolio risk analysis.
//!
//! This crate provides the quantitative core of a portfolio risk tool:
//! - Correlation estimation (sample, EWMA, fixed-intensity shrinkage) with
//!   PSD repair and optional lead/lag adjustment
//! - Per-asset return distribution estimation (annualized mu, sigma, skew)
//! - Cholesky-based correlated Monte Carlo with fat tails and an optional
//!   low-discrepancy sampling mode
//! - Risk analytics: percentiles, VaR/CVaR, drawdowns, loss probabilities,
//!   per-position contributions
//! - Analytic ranking of single-position swap candidates

#[cfg(feature = "python")]
use pyo3::prelude::*;

pub mod analytics;
pub mod core;
pub mod correlation;
pub mod distribution;
pub mod optimizer;
pub mod simulation;
#[cfg(feature = "python")]
pub mod python;

/// Python module entry point
#[cfg(feature = "python")]
#[pymodule]
fn _portsim(_py: Python<'_>, m: &PyModule) -> PyResult<()> {
    // Register config classes
    m.add_class::<python::bindings::PySimulationConfig>()?;

    // Register result classes
    m.add_class::<python::bindings::PySimulationResult>()?;
    m.add_class::<python::bindings::PyRiskReport>()?;
    m.add_class::<python::bindings::PySwapEvaluation>()?;

    // Register estimation and simulation functions
    m.add_function(wrap_pyfunction!(python::bindings::estimate_correlation, m)?)?;
    m.add_function(wrap_pyfunction!(python::bindings::analyze_lags, m)?)?;
    m.add_function(wrap_pyfunction!(python::bindings::estimate_distribution, m)?)?;
    m.add_function(wrap_pyfunction!(
        python::bindings::run_portfolio_simulation,
        m
    )?)?;
    m.add_function(wrap_pyfunction!(python::bindings::rank_swaps, m)?)?;

    Ok(())
}
