//! Directional-change (zigzag) detector.
//!
//! Tracks a running candidate top and candidate bottom. While seeking a top,
//! a higher high extends the candidate and a high more than `sigma` below it
//! confirms the candidate as a Top; the search then flips to a bottom seeded
//! from the confirming bar's low. Seeking a bottom is the mirror image.
//!
//! Both comparisons are strict, so a pullback of exactly `sigma` confirms
//! nothing. `sigma` is an absolute distance in whatever price space the bars
//! are in; the detector has no idea of the series' scale.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::log::ExtremeLog;
use crate::domain::{Bar, BarError, Extreme, ExtremeKind};
use crate::error::CoreError;

/// Which extreme the detector is currently hunting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Seeking {
    Top,
    Bottom,
}

/// A tentative extreme. Never appended to the log until confirmed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub index: usize,
    pub timestamp: NaiveDateTime,
    pub price: f64,
    pub kind: ExtremeKind,
}

impl Candidate {
    fn confirm(self, confirm_index: usize) -> Extreme {
        Extreme {
            index: self.index,
            confirm_index,
            timestamp: self.timestamp,
            price: self.price,
            kind: self.kind,
        }
    }
}

/// Streaming extrema detector.
///
/// Reuse across series goes through [`reset`](Self::reset); a reset detector
/// is indistinguishable from a new one with the same sigma.
#[derive(Debug, Clone)]
pub struct ExtremaDetector {
    sigma: f64,
    seeking: Seeking,
    top: Option<Candidate>,
    bottom: Option<Candidate>,
    last: Option<(usize, NaiveDateTime)>,
    previous_bar: Option<Bar>,
    bars_seen: usize,
    log: ExtremeLog,
}

impl ExtremaDetector {
    pub fn new(sigma: f64) -> Result<Self, CoreError> {
        if !sigma.is_finite() || sigma <= 0.0 {
            return Err(CoreError::config(format!(
                "sigma must be finite and > 0 (got {sigma})"
            )));
        }
        Ok(Self {
            sigma,
            seeking: Seeking::Top,
            top: None,
            bottom: None,
            last: None,
            previous_bar: None,
            bars_seen: 0,
            log: ExtremeLog::new(),
        })
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    pub fn seeking(&self) -> Seeking {
        self.seeking
    }

    /// Number of bars fed through [`update`](Self::update).
    pub fn bars_seen(&self) -> usize {
        self.bars_seen
    }

    /// Feed the next bar of the series. Its index is the number of bars seen
    /// so far.
    ///
    /// The bar is validated, including timestamp order, before any state is
    /// touched; a rejected bar leaves the detector unchanged.
    pub fn update(&mut self, bar: &Bar) -> Result<Option<Extreme>, CoreError> {
        let index = self.bars_seen;
        bar.validate().map_err(|e| CoreError::bar(index, e))?;
        if let Some(previous) = &self.previous_bar {
            bar.validate_after(previous)
                .map_err(|e| CoreError::bar(index, e))?;
        }
        let confirmed = self.process_point(index, bar.timestamp, bar.high, bar.low)?;
        self.previous_bar = Some(*bar);
        self.bars_seen += 1;
        Ok(confirmed)
    }

    /// Lower-level step over a raw `(index, high, low)` sample.
    ///
    /// Timestamps are carried into the extremes but not checked. Indices must
    /// increase from call to call. Non-finite prices and `high < low` are
    /// rejected before the state machine sees them.
    pub fn process_point(
        &mut self,
        index: usize,
        timestamp: NaiveDateTime,
        high: f64,
        low: f64,
    ) -> Result<Option<Extreme>, CoreError> {
        if !high.is_finite() {
            return Err(CoreError::bar(index, BarError::NonFinite { field: "high" }));
        }
        if !low.is_finite() {
            return Err(CoreError::bar(index, BarError::NonFinite { field: "low" }));
        }
        if high < low {
            return Err(CoreError::bar(index, BarError::HighBelowLow { high, low }));
        }
        debug_assert!(self.last.map_or(true, |(prev, _)| index > prev));
        self.last = Some((index, timestamp));

        let top = *self.top.get_or_insert(Candidate {
            index,
            timestamp,
            price: high,
            kind: ExtremeKind::Top,
        });
        let bottom = *self.bottom.get_or_insert(Candidate {
            index,
            timestamp,
            price: low,
            kind: ExtremeKind::Bottom,
        });

        let confirmed = match self.seeking {
            Seeking::Top => {
                if high > top.price {
                    self.top = Some(Candidate {
                        index,
                        timestamp,
                        price: high,
                        kind: ExtremeKind::Top,
                    });
                    None
                } else if high < top.price - self.sigma {
                    self.seeking = Seeking::Bottom;
                    self.bottom = Some(Candidate {
                        index,
                        timestamp,
                        price: low,
                        kind: ExtremeKind::Bottom,
                    });
                    Some(top.confirm(index))
                } else {
                    None
                }
            }
            Seeking::Bottom => {
                if low < bottom.price {
                    self.bottom = Some(Candidate {
                        index,
                        timestamp,
                        price: low,
                        kind: ExtremeKind::Bottom,
                    });
                    None
                } else if low > bottom.price + self.sigma {
                    self.seeking = Seeking::Top;
                    self.top = Some(Candidate {
                        index,
                        timestamp,
                        price: high,
                        kind: ExtremeKind::Top,
                    });
                    Some(bottom.confirm(index))
                } else {
                    None
                }
            }
        };

        if let Some(extreme) = confirmed {
            self.log.push(extreme)?;
        }
        Ok(confirmed)
    }

    /// The extreme currently being tracked, if any bar has been seen.
    pub fn candidate(&self) -> Option<Candidate> {
        match self.seeking {
            Seeking::Top => self.top,
            Seeking::Bottom => self.bottom,
        }
    }

    pub fn log(&self) -> &ExtremeLog {
        &self.log
    }

    pub fn into_log(self) -> ExtremeLog {
        self.log
    }

    /// Forget every bar seen. Sigma is kept.
    pub fn reset(&mut self) {
        self.seeking = Seeking::Top;
        self.top = None;
        self.bottom = None;
        self.last = None;
        self.previous_bar = None;
        self.bars_seen = 0;
        self.log = ExtremeLog::new();
    }
}

/// Run a fresh detector over `bars` and return everything it confirmed.
pub fn detect_extremes(bars: &[Bar], sigma: f64) -> Result<ExtremeLog, CoreError> {
    let mut detector = ExtremaDetector::new(sigma)?;
    for bar in bars {
        detector.update(bar)?;
    }
    Ok(detector.into_log())
}
