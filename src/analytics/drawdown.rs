//! Streaming maximum drawdown.

/// Tracks peak value and worst peak-to-trough decline as values arrive.
///
/// O(1) per update; used inside the path loop where storing the full value
/// series would be wasteful.
#[derive(Debug, Clone)]
pub struct DrawdownTracker {
    peak: f64,
    max_drawdown: f64,
}

impl DrawdownTracker {
    /// Start tracking from an initial value.
    pub fn with_initial(value: f64) -> Self {
        Self {
            peak: value,
            max_drawdown: 0.0,
        }
    }

    /// Feed the next value in the series.
    #[inline]
    pub fn update(&mut self, value: f64) {
        if value > self.peak {
            self.peak = value;
        } else if self.peak > 0.0 {
            let dd = (self.peak - value) / self.peak;
            if dd > self.max_drawdown {
                self.max_drawdown = dd;
            }
        }
    }

    /// Worst drawdown observed so far, as a positive fraction.
    #[inline]
    pub fn max_drawdown(&self) -> f64 {
        self.max_drawdown
    }
}

/// Maximum drawdown of a completed value series.
pub fn max_drawdown(values: &[f64]) -> f64 {
    let mut iter = values.iter();
    let Some(first) = iter.next() else {
        return 0.0;
    };
    let mut tracker = DrawdownTracker::with_initial(*first);
    for v in iter {
        tracker.update(*v);
    }
    tracker.max_drawdown()
}
