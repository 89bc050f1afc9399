//! Core data types for PortSim.

use serde::{Deserialize, Serialize};

use super::error::{PortsimError, Result};

/// Type alias for timestamp values (trading-day index or epoch days).
pub type Timestamp = i64;

/// Trading days per year used for annualization.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Minimum overlapping observations for a correlation estimate.
pub const MIN_CORRELATION_OBS: usize = 20;

/// Minimum overlapping observations for a lag estimate.
pub const MIN_LAG_OBS: usize = 30;

/// A portfolio position snapshot. Negative quantity means short.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    /// Ticker symbol.
    pub ticker: String,
    /// Signed quantity (negative = short).
    pub quantity: f64,
    /// Current price per unit.
    pub price: f64,
}

impl Position {
    /// Create a new position.
    pub fn new(ticker: impl Into<String>, quantity: f64, price: f64) -> Self {
        Self {
            ticker: ticker.into(),
            quantity,
            price,
        }
    }

    /// Signed market value of the position.
    #[inline]
    pub fn market_value(&self) -> f64 {
        self.quantity * self.price
    }

    /// Whether this is a short position.
    #[inline]
    pub fn is_short(&self) -> bool {
        self.quantity < 0.0
    }
}

/// Annualized marginal return distribution parameters for one asset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DistributionParams {
    /// Annualized expected return.
    pub mu: f64,
    /// Annualized volatility.
    pub sigma: f64,
    /// Skew of daily returns (third standardized moment).
    pub skew: f64,
}

impl DistributionParams {
    /// Create new distribution parameters.
    pub fn new(mu: f64, sigma: f64, skew: f64) -> Self {
        Self { mu, sigma, skew }
    }

    /// Validate for use inside the simulation engine.
    ///
    /// A zero sigma is accepted here (degenerate deterministic asset); the
    /// distribution estimator rejects non-positive sigma at its own boundary.
    pub fn validate(&self) -> Result<()> {
        if !self.mu.is_finite() || !self.sigma.is_finite() || !self.skew.is_finite() {
            return Err(PortsimError::invalid_config(
                "distribution parameters must be finite",
            ));
        }
        if self.sigma < 0.0 {
            return Err(PortsimError::invalid_config("sigma must be non-negative"));
        }
        Ok(())
    }
}

/// Correlation estimation method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CorrelationMethod {
    /// Equal-weight sample Pearson correlation.
    #[default]
    Sample,
    /// Exponentially weighted correlation (recent observations weighted up).
    Ewma,
    /// Sample correlation shrunk toward the mean off-diagonal value.
    ///
    /// Named after Ledoit-Wolf but uses a fixed shrinkage intensity rather
    /// than the data-driven optimal intensity from the literature.
    LedoitWolf,
}

/// Marginal shock distribution for simulated daily returns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FatTailMethod {
    /// Standard normal shocks.
    Gaussian,
    /// Student-t shocks with the given degrees of freedom.
    StudentT { df: f64 },
}

impl FatTailMethod {
    /// Default Student-t degrees of freedom.
    pub const DEFAULT_DF: f64 = 5.0;

    /// Student-t with the default degrees of freedom.
    pub fn student_t() -> Self {
        Self::StudentT {
            df: Self::DEFAULT_DF,
        }
    }
}

impl Default for FatTailMethod {
    fn default() -> Self {
        FatTailMethod::Gaussian
    }
}

/// History window for correlation and distribution estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum HistoryWindow {
    /// Trailing six months (126 trading days).
    SixMonths,
    /// Trailing one year (252 trading days).
    #[default]
    OneYear,
    /// Trailing two years (504 trading days).
    TwoYears,
    /// Trailing three years (756 trading days).
    ThreeYears,
}

impl HistoryWindow {
    /// Window length in trading days.
    #[inline]
    pub fn days(self) -> usize {
        match self {
            HistoryWindow::SixMonths => 126,
            HistoryWindow::OneYear => 252,
            HistoryWindow::TwoYears => 504,
            HistoryWindow::ThreeYears => 756,
        }
    }

    /// EWMA half-life paired with this window (half the window length).
    #[inline]
    pub fn half_life_days(self) -> f64 {
        self.days() as f64 / 2.0
    }
}

/// Simulation configuration with all defaults resolved at the boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of simulated paths.
    pub num_paths: usize,
    /// Forward horizon in trading days.
    pub horizon_days: usize,
    /// Correlation estimation method.
    pub correlation_method: CorrelationMethod,
    /// Marginal shock distribution.
    pub fat_tail: FatTailMethod,
    /// Use a low-discrepancy sequence instead of pseudo-random draws.
    pub use_quasi_random: bool,
    /// History window for estimation.
    pub history_window: HistoryWindow,
    /// Fixed shrinkage intensity for the LedoitWolf method.
    pub shrinkage_intensity: f64,
    /// RNG seed for deterministic runs.
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            num_paths: 10_000,
            horizon_days: 252,
            correlation_method: CorrelationMethod::Sample,
            fat_tail: FatTailMethod::Gaussian,
            use_quasi_random: false,
            history_window: HistoryWindow::OneYear,
            shrinkage_intensity: 0.2,
            seed: 42,
        }
    }
}

impl SimulationConfig {
    /// Validate the configuration before any computation starts.
    pub fn validate(&self) -> Result<()> {
        if self.num_paths == 0 {
            return Err(PortsimError::invalid_config("num_paths must be > 0"));
        }
        if self.horizon_days == 0 {
            return Err(PortsimError::invalid_config("horizon_days must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.shrinkage_intensity) {
            return Err(PortsimError::invalid_config(
                "shrinkage_intensity must be in [0, 1]",
            ));
        }
        if let FatTailMethod::StudentT { df } = self.fat_tail {
            // df > 2 keeps the shock variance finite so sigma stays calibrated.
            if !(df > 2.0) || !df.is_finite() {
                return Err(PortsimError::invalid_config(
                    "Student-t degrees of freedom must be finite and > 2",
                ));
            }
        }
        Ok(())
    }
}
