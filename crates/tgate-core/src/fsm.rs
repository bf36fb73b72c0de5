//! Per-symbol position state machine surface.
//!
//! `FsmState` is the closed variant set for the price/signal machine;
//! `FsmSnapshot` is the published view consumed by the trade engine and
//! the observability surfaces.

use crate::price::Price;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position state of a single instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FsmState {
    /// No signal has been received yet.
    #[default]
    #[serde(rename = "NOSIGNAL")]
    NoSignal,
    /// A signal armed a threshold; waiting for the first tick evaluation.
    #[serde(rename = "NOPOSITION_SIGNAL")]
    NoPositionSignal,
    /// Long position: price holds at or above the threshold.
    #[serde(rename = "BUYPOSITION")]
    BuyPosition,
    /// Short position: price holds at or below the threshold.
    #[serde(rename = "SELLPOSITION")]
    SellPosition,
    /// Evaluation failed; re-checked at the start of a later minute.
    #[serde(rename = "NOPOSITION_BLOCKED")]
    NoPositionBlocked,
}

impl FsmState {
    /// Whether this state counts as holding a position.
    pub fn is_in_position(&self) -> bool {
        matches!(self, Self::BuyPosition | Self::SellPosition)
    }
}

impl fmt::Display for FsmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NoSignal => "NOSIGNAL",
            Self::NoPositionSignal => "NOPOSITION_SIGNAL",
            Self::BuyPosition => "BUYPOSITION",
            Self::SellPosition => "SELLPOSITION",
            Self::NoPositionBlocked => "NOPOSITION_BLOCKED",
        };
        write!(f, "{s}")
    }
}

/// Published per-symbol snapshot of the state machine.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FsmSnapshot {
    /// Current state.
    pub state: FsmState,
    /// Last traded price seen by the owning runner.
    pub ltp: Option<Price>,
    /// Current arming price.
    pub threshold: Option<Price>,
    /// Threshold set by the most recent BUY signal.
    pub last_buy_threshold: Option<Price>,
    /// Threshold set by the most recent SELL signal.
    pub last_sell_threshold: Option<Price>,
    /// When the machine last entered `NOPOSITION_BLOCKED` (Unix ms).
    pub last_blocked_at_ms: Option<i64>,
}
