//! Per-mode webhook signal tracking.
//!
//! The same webhook fans out to five named filter modes, each keeping an
//! independently-tracked signal table: pattern counters, sticky flags,
//! and a capped newest-first row list per symbol. Broker-6 additionally
//! drives two control effects (FSM rearm and cumulative-P&L reset) that
//! the application routes to the owning components.

pub mod error;
pub mod mode;
pub mod state;
pub mod tracker;

pub use error::{SignalError, SignalResult};
pub use mode::{AllowSet, FilterMode};
pub use state::{ModeState, SignalRow, SignalTracking};
pub use tracker::{ModeTracker, SignalTrackerSet, TrackerEffect};
