//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|)
//! ATR uses Wilder smoothing (EMA with alpha = 1/period).
//! The first bar has no previous close, so the seed is the mean of
//! TR[1..=period] and the first value lands at index `period`.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
}

impl Atr {
    /// `period` must be at least 1; callers validate configuration first.
    pub fn new(period: usize) -> Self {
        debug_assert!(period >= 1, "ATR period must be >= 1");
        Self {
            period: period.max(1),
            name: format!("atr_{period}"),
        }
    }
}

/// TR for one bar given the previous close.
fn bar_true_range(bar: &Bar, prev_close: f64) -> f64 {
    (bar.high - bar.low)
        .max((bar.high - prev_close).abs())
        .max((bar.low - prev_close).abs())
}

/// Compute the True Range series from bars.
/// TR[0] = high[0] - low[0] (no previous close).
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    let mut tr = Vec::with_capacity(bars.len());
    if let Some(first) = bars.first() {
        tr.push(first.high - first.low);
    }
    tr.extend(
        bars.windows(2)
            .map(|pair| bar_true_range(&pair[1], pair[0].close)),
    );
    tr
}

/// Apply Wilder smoothing to a series. Alpha = 1/period.
///
/// Leading NaNs are skipped; the seed is the mean of the first `period`
/// values after them. A NaN after the seed poisons the rest of the output.
pub fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 {
        return result;
    }

    let seed_start = match values.iter().position(|v| !v.is_nan()) {
        Some(s) => s,
        None => return result,
    };
    let seed_end = seed_start + period;
    if seed_end > n || values[seed_start..seed_end].iter().any(|v| v.is_nan()) {
        return result;
    }

    let seed = values[seed_start..seed_end].iter().sum::<f64>() / period as f64;
    result[seed_end - 1] = seed;

    let alpha = 1.0 / period as f64;
    let mut prev = seed;
    for i in seed_end..n {
        if values[i].is_nan() {
            return result;
        }
        prev = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = prev;
    }
    result
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let mut tr = true_range(bars);
        // TR[0] is only high-low; keep it out of the seed.
        if let Some(first) = tr.first_mut() {
            *first = f64::NAN;
        }
        wilder_smooth(&tr, self.period)
    }
}

/// Bar-at-a-time ATR. Produces exactly the values of [`Atr::compute`].
#[derive(Debug, Clone)]
pub struct RollingAtr {
    period: usize,
    prev_close: Option<f64>,
    seed_sum: f64,
    seed_count: usize,
    value: Option<f64>,
}

impl RollingAtr {
    pub fn new(period: usize) -> Self {
        debug_assert!(period >= 1, "ATR period must be >= 1");
        Self {
            period: period.max(1),
            prev_close: None,
            seed_sum: 0.0,
            seed_count: 0,
            value: None,
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Feed the next bar; returns the ATR at this bar once warm.
    pub fn update(&mut self, bar: &Bar) -> Option<f64> {
        let prev_close = self.prev_close.replace(bar.close);
        let tr = bar_true_range(bar, prev_close?);

        self.value = match self.value {
            Some(prev) => {
                let alpha = 1.0 / self.period as f64;
                Some(alpha * tr + (1.0 - alpha) * prev)
            }
            None => {
                self.seed_sum += tr;
                self.seed_count += 1;
                (self.seed_count == self.period).then(|| self.seed_sum / self.period as f64)
            }
        };
        self.value
    }

    /// Latest ATR, `None` during warmup.
    pub fn value(&self) -> Option<f64> {
        self.value
    }
}
