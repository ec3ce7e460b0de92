//! ExtremeLog: ordered record of confirmed extremes, and causal views over it.
//!
//! Insertion order is confirmation order. Both `index` and `confirm_index`
//! are strictly increasing along the log (each new candidate is seeded at or
//! after the previous confirmation bar), so every lookup is a binary search
//! or a walk from the back.

use serde::{Deserialize, Serialize};

use crate::domain::{Extreme, ExtremeKind};
use crate::error::CoreError;

/// Append-only sequence of confirmed extremes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtremeLog {
    extremes: Vec<Extreme>,
}

impl ExtremeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a log from extremes in confirmation order, checking every
    /// append invariant.
    pub fn try_from_extremes(
        extremes: impl IntoIterator<Item = Extreme>,
    ) -> Result<Self, CoreError> {
        let mut log = Self::new();
        for extreme in extremes {
            log.push(extreme)?;
        }
        Ok(log)
    }

    /// Append a newly confirmed extreme.
    ///
    /// Rejects an extreme that is not confirmed strictly after it printed,
    /// that is confirmed at or before the previous one, or that repeats the
    /// previous kind.
    pub fn push(&mut self, extreme: Extreme) -> Result<(), CoreError> {
        let reject = |reason| CoreError::MalformedExtreme {
            confirm_index: extreme.confirm_index,
            reason,
        };
        if extreme.confirm_index <= extreme.index {
            return Err(reject("confirmation must come after the extreme"));
        }
        if let Some(prev) = self.extremes.last() {
            if extreme.confirm_index <= prev.confirm_index {
                return Err(reject("confirmation indices must strictly increase"));
            }
            if extreme.index <= prev.index {
                return Err(reject("extreme indices must strictly increase"));
            }
            if extreme.kind == prev.kind {
                return Err(reject("tops and bottoms must alternate"));
            }
        }
        self.extremes.push(extreme);
        Ok(())
    }

    /// Extremes with `confirm_index <= at`: everything knowable at bar `at`.
    pub fn snapshot(&self, at: usize) -> ExtremeView<'_> {
        let end = self.extremes.partition_point(|e| e.confirm_index <= at);
        ExtremeView {
            extremes: &self.extremes[..end],
        }
    }

    /// View over the whole log.
    pub fn view(&self) -> ExtremeView<'_> {
        ExtremeView {
            extremes: &self.extremes,
        }
    }

    pub fn len(&self) -> usize {
        self.extremes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extremes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Extreme> {
        self.extremes.iter()
    }

    pub fn as_slice(&self) -> &[Extreme] {
        &self.extremes
    }

    pub fn last(&self) -> Option<&Extreme> {
        self.extremes.last()
    }

    pub fn into_vec(self) -> Vec<Extreme> {
        self.extremes
    }
}

impl<'a> IntoIterator for &'a ExtremeLog {
    type Item = &'a Extreme;
    type IntoIter = std::slice::Iter<'a, Extreme>;

    fn into_iter(self) -> Self::IntoIter {
        self.extremes.iter()
    }
}

/// Read-only prefix of an [`ExtremeLog`].
///
/// Every helper that needs more history than the view holds returns `None`.
/// Running short of extremes means "no signal", never an error.
#[derive(Debug, Clone, Copy)]
pub struct ExtremeView<'a> {
    extremes: &'a [Extreme],
}

impl<'a> ExtremeView<'a> {
    pub fn len(&self) -> usize {
        self.extremes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extremes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'a, Extreme> {
        self.extremes.iter()
    }

    pub fn as_slice(&self) -> &'a [Extreme] {
        self.extremes
    }

    pub fn last(&self) -> Option<&'a Extreme> {
        self.extremes.last()
    }

    /// The `n`-th most recent extreme; `nth_back(0)` is the last one.
    pub fn nth_back(&self, n: usize) -> Option<&'a Extreme> {
        self.extremes.iter().rev().nth(n)
    }

    /// The last `n` extremes in chronological order.
    pub fn last_n(&self, n: usize) -> Option<&'a [Extreme]> {
        let len = self.extremes.len();
        (n <= len).then(|| &self.extremes[len - n..])
    }

    /// The `n`-th most recent extreme of `kind`.
    pub fn nth_back_of_kind(&self, kind: ExtremeKind, n: usize) -> Option<&'a Extreme> {
        self.extremes.iter().rev().filter(|e| e.kind == kind).nth(n)
    }

    /// The last `n` extremes of `kind` in chronological order.
    pub fn last_n_of_kind(&self, kind: ExtremeKind, n: usize) -> Option<Vec<Extreme>> {
        let mut picked: Vec<Extreme> = self
            .extremes
            .iter()
            .rev()
            .filter(|e| e.kind == kind)
            .take(n)
            .copied()
            .collect();
        if picked.len() < n {
            return None;
        }
        picked.reverse();
        Some(picked)
    }

    /// Extremes whose own `index` is at or after `from`.
    pub fn recent_since(&self, from: usize) -> ExtremeView<'a> {
        let start = self.extremes.partition_point(|e| e.index < from);
        ExtremeView {
            extremes: &self.extremes[start..],
        }
    }

    /// Number of extremes priced in `[lo, hi)`.
    pub fn count_in_band(&self, lo: f64, hi: f64) -> usize {
        self.extremes
            .iter()
            .filter(|e| e.price >= lo && e.price < hi)
            .count()
    }

    /// Whether the last `n` extremes of `kind` are non-decreasing in price.
    pub fn is_rising(&self, kind: ExtremeKind, n: usize) -> Option<bool> {
        let run = self.last_n_of_kind(kind, n)?;
        Some(run.windows(2).all(|w| w[0].price <= w[1].price))
    }

    /// Whether the last `n` extremes of `kind` are non-increasing in price.
    pub fn is_falling(&self, kind: ExtremeKind, n: usize) -> Option<bool> {
        let run = self.last_n_of_kind(kind, n)?;
        Some(run.windows(2).all(|w| w[0].price >= w[1].price))
    }

    /// The two most recent extremes as `(previous, last)`.
    pub fn swing(&self) -> Option<(&'a Extreme, &'a Extreme)> {
        match self.last_n(2)? {
            [previous, last] => Some((previous, last)),
            _ => None,
        }
    }

    /// Lowest and highest extreme price in the view.
    pub fn price_range(&self) -> Option<(f64, f64)> {
        let first = self.extremes.first()?.price;
        Some(self.extremes.iter().fold((first, first), |(lo, hi), e| {
            (lo.min(e.price), hi.max(e.price))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn ext(index: usize, confirm_index: usize, price: f64, kind: ExtremeKind) -> Extreme {
        Extreme {
            index,
            confirm_index,
            timestamp: ts(),
            price,
            kind,
        }
    }

    /// Bottom 1, Top 5, Bottom 2, Top 6, Bottom 3, Top 7: a clean uptrend.
    fn uptrend_log() -> ExtremeLog {
        use ExtremeKind::*;
        ExtremeLog::try_from_extremes([
            ext(1, 3, 1.0, Bottom),
            ext(4, 6, 5.0, Top),
            ext(7, 9, 2.0, Bottom),
            ext(10, 12, 6.0, Top),
            ext(13, 15, 3.0, Bottom),
            ext(16, 18, 7.0, Top),
        ])
        .unwrap()
    }

    #[test]
    fn push_rejects_repeated_kind() {
        let mut log = ExtremeLog::new();
        log.push(ext(1, 3, 1.0, ExtremeKind::Top)).unwrap();
        let err = log.push(ext(4, 6, 2.0, ExtremeKind::Top)).unwrap_err();
        assert!(matches!(err, CoreError::MalformedExtreme { confirm_index: 6, .. }));
    }

    #[test]
    fn push_rejects_unordered_confirmation() {
        let mut log = ExtremeLog::new();
        log.push(ext(1, 5, 1.0, ExtremeKind::Top)).unwrap();
        assert!(log.push(ext(4, 5, 0.5, ExtremeKind::Bottom)).is_err());
        assert!(log.push(ext(6, 6, 0.5, ExtremeKind::Bottom)).is_err());
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn snapshot_excludes_later_confirmations() {
        let log = uptrend_log();
        assert!(log.snapshot(2).is_empty());
        assert_eq!(log.snapshot(3).len(), 1);
        assert_eq!(log.snapshot(11).len(), 3);
        assert_eq!(log.snapshot(12).len(), 4);
        assert_eq!(log.snapshot(1000).len(), 6);
        for at in 0..20 {
            assert!(log.snapshot(at).iter().all(|e| e.confirm_index <= at));
        }
    }

    #[test]
    fn back_indexing() {
        let log = uptrend_log();
        let view = log.snapshot(12);
        let view_full = log.view();
        assert_eq!(view.nth_back(0).map(|e| e.price), Some(6.0));
        assert_eq!(view.nth_back(3).map(|e| e.price), Some(1.0));
        assert_eq!(view.nth_back(4), None);
        assert_eq!(view_full.last_n(2).map(|s| s.len()), Some(2));
        assert_eq!(view_full.last_n(7), None);
        assert_eq!(view_full.last_n(0).map(|s| s.len()), Some(0));
    }

    #[test]
    fn kind_filtered_queries() {
        let log = uptrend_log();
        let view = log.view();
        assert_eq!(
            view.nth_back_of_kind(ExtremeKind::Bottom, 1).map(|e| e.price),
            Some(2.0)
        );
        let tops = view.last_n_of_kind(ExtremeKind::Top, 3).unwrap();
        let prices: Vec<f64> = tops.iter().map(|e| e.price).collect();
        assert_eq!(prices, vec![5.0, 6.0, 7.0]);
        assert!(view.last_n_of_kind(ExtremeKind::Top, 4).is_none());
    }

    #[test]
    fn trend_predicates() {
        let log = uptrend_log();
        let view = log.view();
        assert_eq!(view.is_rising(ExtremeKind::Top, 3), Some(true));
        assert_eq!(view.is_rising(ExtremeKind::Bottom, 3), Some(true));
        assert_eq!(view.is_falling(ExtremeKind::Top, 3), Some(false));
        // Only two tops confirmed by bar 12.
        assert_eq!(log.snapshot(12).is_rising(ExtremeKind::Top, 3), None);
    }

    #[test]
    fn swing_and_recent() {
        let log = uptrend_log();
        let view = log.view();
        let (prev, last) = view.swing().unwrap();
        assert_eq!((prev.price, last.price), (3.0, 7.0));
        assert!(log.snapshot(3).swing().is_none());

        let recent = view.recent_since(10);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent.as_slice()[0].index, 10);
        assert_eq!(recent.price_range(), Some((3.0, 7.0)));
        assert!(view.recent_since(100).is_empty());
    }

    #[test]
    fn bands_and_range() {
        let log = uptrend_log();
        let view = log.view();
        assert_eq!(view.count_in_band(1.0, 3.0), 2);
        assert_eq!(view.count_in_band(5.0, 7.0), 2);
        assert_eq!(view.price_range(), Some((1.0, 7.0)));
        assert_eq!(log.snapshot(0).price_range(), None);
    }

    #[test]
    fn log_serializes_as_plain_array() {
        let log = uptrend_log();
        let json = serde_json::to_string(&log).unwrap();
        assert!(json.starts_with('['));
        let back: ExtremeLog = serde_json::from_str(&json).unwrap();
        assert_eq!(back, log);
    }
}
