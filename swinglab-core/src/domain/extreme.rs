//! Extreme: a confirmed swing high or swing low.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether an extreme is a local peak or a local trough.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtremeKind {
    Top,
    Bottom,
}

impl ExtremeKind {
    pub fn opposite(self) -> Self {
        match self {
            Self::Top => Self::Bottom,
            Self::Bottom => Self::Top,
        }
    }
}

impl fmt::Display for ExtremeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Top => write!(f, "top"),
            Self::Bottom => write!(f, "bottom"),
        }
    }
}

/// A confirmed extreme.
///
/// `index` is the bar where the extreme price printed; `confirm_index` is the
/// bar where the reversal exceeded sigma and the extreme became knowable.
/// `confirm_index > index` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extreme {
    pub index: usize,
    pub confirm_index: usize,
    /// Timestamp of the bar at `index`.
    pub timestamp: NaiveDateTime,
    pub price: f64,
    pub kind: ExtremeKind,
}

impl Extreme {
    pub fn is_top(&self) -> bool {
        self.kind == ExtremeKind::Top
    }

    pub fn is_bottom(&self) -> bool {
        self.kind == ExtremeKind::Bottom
    }

    /// Bars between the extreme printing and its confirmation.
    pub fn confirmation_lag(&self) -> usize {
        self.confirm_index - self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn opposite_flips_kind() {
        assert_eq!(ExtremeKind::Top.opposite(), ExtremeKind::Bottom);
        assert_eq!(ExtremeKind::Bottom.opposite(), ExtremeKind::Top);
    }

    #[test]
    fn kind_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&ExtremeKind::Top).unwrap(), "\"top\"");
        assert_eq!(ExtremeKind::Bottom.to_string(), "bottom");
    }

    #[test]
    fn confirmation_lag() {
        let e = Extreme {
            index: 2,
            confirm_index: 4,
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            price: 12.0,
            kind: ExtremeKind::Top,
        };
        assert!(e.is_top());
        assert!(!e.is_bottom());
        assert_eq!(e.confirmation_lag(), 2);
    }
}
