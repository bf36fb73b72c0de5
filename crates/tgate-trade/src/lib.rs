//! Paper and live trade bookkeeping.
//!
//! The trade engine observes FSM snapshot changes and keeps two books
//! per symbol: a paper book opened and closed on FSM edges, and a live
//! book gated by the paper book's P&L (the "permission oracle") plus
//! wall-clock-minute rate limits. Live opens and closes emit order
//! intents consumed by the broker sink.

pub mod engine;
pub mod error;
pub mod types;

pub use engine::TradeEngine;
pub use error::{TradeError, TradeResult};
pub use types::{OpenTrade, OrderIntent, OrderKind, TradeBook, TradeRow, TradeState};
