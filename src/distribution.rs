//! Per-asset marginal return distribution estimation.
//!
//! Annualizes mean and volatility from daily return history and computes
//! skew from the third standardized moment. Manual overrides bypass the
//! historical computation entirely.

use std::collections::HashMap;

use crate::core::error::{PortsimError, Result};
use crate::core::returns::ReturnSeries;
use crate::core::types::{DistributionParams, MIN_CORRELATION_OBS, TRADING_DAYS_PER_YEAR};

/// Estimator for per-asset distribution parameters.
#[derive(Debug, Clone, Default)]
pub struct DistributionEstimator;

impl DistributionEstimator {
    /// Estimate annualized (mu, sigma, skew) from daily return history.
    ///
    /// Requires at least 20 observations and a strictly positive daily
    /// standard deviation.
    pub fn from_history(series: &ReturnSeries) -> Result<DistributionParams> {
        if series.len() < MIN_CORRELATION_OBS {
            return Err(PortsimError::insufficient_data(
                MIN_CORRELATION_OBS,
                series.len(),
            ));
        }

        let n = series.len() as f64;
        let mean = series.mean();
        let std = series.std();
        if !(std > 0.0) {
            return Err(PortsimError::invalid_config(
                "historical volatility is zero or undefined",
            ));
        }

        let skew = series
            .returns
            .iter()
            .map(|r| ((r - mean) / std).powi(3))
            .sum::<f64>()
            / n;

        Ok(DistributionParams {
            mu: mean * TRADING_DAYS_PER_YEAR,
            sigma: std * TRADING_DAYS_PER_YEAR.sqrt(),
            skew,
        })
    }

    /// Accept caller-supplied parameters, validating sigma > 0.
    pub fn from_override(mu: f64, sigma: f64, skew: f64) -> Result<DistributionParams> {
        if !(sigma > 0.0) || !sigma.is_finite() {
            return Err(PortsimError::invalid_config(
                "sigma override must be positive and finite",
            ));
        }
        if !mu.is_finite() || !skew.is_finite() {
            return Err(PortsimError::invalid_config(
                "mu and skew overrides must be finite",
            ));
        }
        Ok(DistributionParams { mu, sigma, skew })
    }

    /// Estimate parameters for each ticker, preferring overrides.
    ///
    /// Fails on the first ticker with neither an override nor usable
    /// history.
    pub fn estimate_all(
        series: &HashMap<String, ReturnSeries>,
        tickers: &[String],
        overrides: &HashMap<String, DistributionParams>,
    ) -> Result<HashMap<String, DistributionParams>> {
        let mut out = HashMap::with_capacity(tickers.len());
        for ticker in tickers {
            let params = match overrides.get(ticker) {
                Some(p) => Self::from_override(p.mu, p.sigma, p.skew)?,
                None => {
                    let s = series.get(ticker).ok_or_else(|| {
                        PortsimError::empty_data(format!("return history for {ticker}"))
                    })?;
                    Self::from_history(s)?
                }
            };
            out.insert(ticker.clone(), params);
        }
        Ok(out)
    }
}
