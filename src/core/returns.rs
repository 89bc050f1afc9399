//! Per-ticker daily return series with timestamp alignment.

use serde::{Deserialize, Serialize};

use super::error::{PortsimError, Result};
use super::types::Timestamp;

/// An ordered series of daily returns with strictly increasing timestamps.
///
/// Timestamps are opaque ordinals supplied by the market-data collaborator;
/// the engine only relies on their ordering for alignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnSeries {
    /// Timestamps for each observation, strictly increasing.
    pub timestamps: Vec<Timestamp>,
    /// Daily returns.
    pub returns: Vec<f64>,
}

impl ReturnSeries {
    /// Create a new return series. Fails on length mismatch or
    /// non-increasing timestamps.
    pub fn new(timestamps: Vec<Timestamp>, returns: Vec<f64>) -> Result<Self> {
        if timestamps.len() != returns.len() {
            return Err(PortsimError::invalid_parameter(format!(
                "timestamp/return length mismatch: {} vs {}",
                timestamps.len(),
                returns.len()
            )));
        }
        if timestamps.windows(2).any(|w| w[0] >= w[1]) {
            return Err(PortsimError::invalid_parameter(
                "timestamps must be strictly increasing",
            ));
        }
        Ok(Self {
            timestamps,
            returns,
        })
    }

    /// Create from returns only, with synthetic consecutive timestamps.
    pub fn from_returns(returns: Vec<f64>) -> Self {
        let timestamps = (0..returns.len() as Timestamp).collect();
        Self {
            timestamps,
            returns,
        }
    }

    /// Number of observations.
    #[inline]
    pub fn len(&self) -> usize {
        self.returns.len()
    }

    /// Check if empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.returns.is_empty()
    }

    /// Truncate to the trailing `window` observations.
    pub fn trailing(&self, window: usize) -> Self {
        let start = self.len().saturating_sub(window);
        Self {
            timestamps: self.timestamps[start..].to_vec(),
            returns: self.returns[start..].to_vec(),
        }
    }

    /// Mean of the returns.
    pub fn mean(&self) -> f64 {
        if self.is_empty() {
            return f64::NAN;
        }
        self.returns.iter().sum::<f64>() / self.len() as f64
    }

    /// Sample standard deviation of the returns.
    pub fn std(&self) -> f64 {
        if self.len() < 2 {
            return f64::NAN;
        }
        let mean = self.mean();
        let variance = self
            .returns
            .iter()
            .map(|r| (r - mean).powi(2))
            .sum::<f64>()
            / (self.len() - 1) as f64;
        variance.sqrt()
    }

    /// Align this series with another by timestamp intersection.
    ///
    /// Returns the paired return values on the overlapping dates.
    pub fn overlap(&self, other: &ReturnSeries) -> (Vec<f64>, Vec<f64>) {
        let mut a = Vec::new();
        let mut b = Vec::new();
        let (mut i, mut j) = (0usize, 0usize);

        while i < self.len() && j < other.len() {
            match self.timestamps[i].cmp(&other.timestamps[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    a.push(self.returns[i]);
                    b.push(other.returns[j]);
                    i += 1;
                    j += 1;
                }
            }
        }

        (a, b)
    }
}

/// Re-pair two aligned series at a relative lag of trading days.
///
/// `lag = +1` pairs `a[t]` with `b[t-1]` (b leads a by one day);
/// `lag = -1` pairs `a[t]` with `b[t+1]`. The overlap shrinks by |lag|.
pub fn pair_at_lag(a: &[f64], b: &[f64], lag: i32) -> (Vec<f64>, Vec<f64>) {
    let n = a.len().min(b.len());
    match lag {
        0 => (a[..n].to_vec(), b[..n].to_vec()),
        l if l > 0 => {
            let k = l as usize;
            if k >= n {
                return (Vec::new(), Vec::new());
            }
            (a[k..n].to_vec(), b[..n - k].to_vec())
        }
        l => {
            let k = (-l) as usize;
            if k >= n {
                return (Vec::new(), Vec::new());
            }
            (a[..n - k].to_vec(), b[k..n].to_vec())
        }
    }
}
