//! Directional-change extrema detection and the append-only extreme log.
//!
//! The detector turns a bar stream into a sparse, alternating sequence of
//! confirmed swing highs and lows. Consumers never read the log directly
//! during a backtest; they get an [`ExtremeView`] truncated at the current
//! bar, which is what keeps entry predicates causal.

pub mod detector;
pub mod log;

pub use detector::{detect_extremes, Candidate, ExtremaDetector, Seeking};
pub use log::{ExtremeLog, ExtremeView};
