//! Domain types for SwingLab

pub mod bar;
pub mod extreme;
pub mod ids;
pub mod trade;

pub use bar::{Bar, BarError};
pub use extreme::{Extreme, ExtremeKind};
pub use ids::{IdGen, TradeId};
pub use trade::{Direction, ExitReason, Levels, Trade, TradeStatus};
