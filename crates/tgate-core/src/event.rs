//! Inbound event types.
//!
//! The socket clients that receive these from the network are external
//! collaborators; the engine consumes them as already-parsed values
//! tagged with a receive timestamp.

use crate::price::Price;
use crate::side::Side;
use crate::{Symbol, Token};
use serde::{Deserialize, Serialize};

/// An event tagged with the bus receive timestamp (Unix ms).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stamped<T> {
    pub event: T,
    pub received_at_ms: i64,
}

impl<T> Stamped<T> {
    pub fn new(event: T, received_at_ms: i64) -> Self {
        Self {
            event,
            received_at_ms,
        }
    }
}

/// A TradingView-style webhook signal.
///
/// Direction resolution is `intent`-first, then `side`; rows without a
/// resolvable direction are kept only for relay/audit purposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Raw symbol as sent by the webhook source.
    pub symbol: Symbol,
    /// Optional stop price used as the BUY arming threshold.
    pub stop_px: Option<Price>,
    /// Raw intent token (BUY/SELL/ENTRY/EXIT/PING/...).
    pub intent: Option<String>,
    /// Raw side token (BUY/SELL).
    pub side: Option<String>,
}

impl WebhookEvent {
    /// Resolve the signal direction: `intent` first, then `side`.
    pub fn direction(&self) -> Option<Side> {
        if let Some(intent) = &self.intent {
            if let Some(side) = Side::from_token(intent) {
                return Some(side);
            }
        }
        self.side.as_deref().and_then(Side::from_token)
    }
}

/// A brokerage feed tick, keyed by instrument token.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BrokerTick {
    pub token: Token,
    pub last_price: Price,
}

/// A crypto exchange price update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangePrice {
    pub symbol: Symbol,
    pub price: Price,
    /// Exchange-side timestamp when provided (Unix ms).
    pub timestamp_ms: Option<i64>,
}
