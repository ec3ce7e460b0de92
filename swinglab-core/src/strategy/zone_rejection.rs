//! Zone rejection: trade the bounce off a price level that keeps holding.
//!
//! Extremes printed within the last `lookback` bars are bucketed into zones
//! of width `zone_size`, anchored at the lowest of them. When the close sits
//! in a zone holding at least `min_touches` extremes, the trade goes in the
//! direction price arrived from: coming down into the zone means support
//! (long), coming up into it means resistance (short).

use super::{EntrySignal, LevelSpec, MarketWindow, Strategy};

#[derive(Debug, Clone)]
pub struct ZoneRejection {
    lookback: usize,
    zone_size: f64,
    min_touches: usize,
    tp_mult: f64,
    sl_mult: f64,
}

impl ZoneRejection {
    pub fn new(
        lookback: usize,
        zone_size: f64,
        min_touches: usize,
        tp_mult: f64,
        sl_mult: f64,
    ) -> Self {
        Self {
            lookback,
            zone_size,
            min_touches,
            tp_mult,
            sl_mult,
        }
    }

    /// `[lo, hi)` bounds of the zone holding `price`, given the zone grid
    /// anchored at `floor`.
    fn zone_of(&self, price: f64, floor: f64) -> (f64, f64) {
        let k = ((price - floor) / self.zone_size).floor();
        let lo = floor + k * self.zone_size;
        (lo, lo + self.zone_size)
    }
}

impl Strategy for ZoneRejection {
    fn name(&self) -> &str {
        "zone_rejection"
    }

    fn warmup_bars(&self) -> usize {
        self.lookback
    }

    fn evaluate_entry(&self, window: &MarketWindow<'_>) -> Option<EntrySignal> {
        let recent = window
            .extremes
            .recent_since(window.index.saturating_sub(self.lookback));
        let (floor, ceiling) = recent.price_range()?;

        let close = window.close();
        if close < floor || close >= ceiling + self.zone_size {
            return None;
        }
        let (lo, hi) = self.zone_of(close, floor);
        if recent.count_in_band(lo, hi) < self.min_touches {
            return None;
        }

        let arrived_from = window
            .history_back(self.lookback)
            .find(|bar| bar.close < lo || bar.close >= hi)?;

        let levels = LevelSpec::AtrMultiple {
            tp_mult: self.tp_mult,
            sl_mult: self.sl_mult,
        };
        Some(if arrived_from.close >= hi {
            EntrySignal::long(levels)
        } else {
            EntrySignal::short(levels)
        })
    }
}
