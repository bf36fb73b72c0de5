//! Trade book data model.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tgate_core::{Price, Side, Symbol};

/// Row cap for the newest-first trade row lists.
pub const ROW_CAP: usize = 50;

/// An open trade. Paper and live trades are disjoint per symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenTrade {
    pub id: String,
    pub symbol: Symbol,
    pub side: Side,
    pub entry_price: Price,
    pub quantity: u64,
    pub lot: u32,
    pub time_ist: String,
}

/// A displayed trade row. Exit rows reuse the open trade's id suffixed
/// `-exit` and sit newest-first ahead of any surviving open row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRow {
    pub id: String,
    pub time_ist: String,
    pub symbol: Symbol,
    pub entry_price: Price,
    pub current_price: Price,
    pub unrealized_pnl: Decimal,
    pub cumulative_pnl: Decimal,
    pub quantity: u64,
}

/// One book (paper or live).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeBook {
    /// Open trade per symbol.
    pub open: HashMap<Symbol, OpenTrade>,
    /// Rows across symbols, newest first, capped at [`ROW_CAP`].
    pub rows: Vec<TradeRow>,
    /// Realized P&L accrued per symbol since boot or last reset.
    pub cumulative: HashMap<Symbol, Decimal>,
}

impl TradeBook {
    /// Prepend a row, keeping the list capped.
    pub fn push_row(&mut self, row: TradeRow) {
        self.rows.insert(0, row);
        self.rows.truncate(ROW_CAP);
    }

    /// Mutable access to the row belonging to an open trade.
    pub fn row_mut(&mut self, id: &str) -> Option<&mut TradeRow> {
        self.rows.iter_mut().find(|r| r.id == id)
    }

    pub fn cumulative_of(&self, symbol: &str) -> Decimal {
        self.cumulative.get(symbol).copied().unwrap_or_default()
    }

    /// Drop every per-symbol entry whose key starts with `prefix`.
    pub fn clear_prefix(&mut self, prefix: &str) {
        self.open.retain(|k, _| !k.starts_with(prefix));
        self.cumulative.retain(|k, _| !k.starts_with(prefix));
        self.rows.retain(|r| !r.symbol.starts_with(prefix));
    }
}

/// Full persisted engine state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeState {
    pub paper: TradeBook,
    pub live: TradeBook,
    /// Live entries blocked until this time after a forced close.
    pub blocked_until_ms: HashMap<Symbol, i64>,
    /// Minute index of the last live entry per symbol.
    pub last_live_minute: HashMap<Symbol, i64>,
    /// Per-symbol trade id sequence.
    pub last_ids: HashMap<Symbol, u64>,
}

impl TradeState {
    /// Drop every per-symbol entry whose key starts with `prefix`.
    pub fn clear_prefix(&mut self, prefix: &str) {
        self.paper.clear_prefix(prefix);
        self.live.clear_prefix(prefix);
        self.blocked_until_ms.retain(|k, _| !k.starts_with(prefix));
        self.last_live_minute.retain(|k, _| !k.starts_with(prefix));
        self.last_ids.retain(|k, _| !k.starts_with(prefix));
    }
}

/// Whether an order opens or closes a live position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderKind {
    Open,
    Close,
}

/// An outbound order request for the broker sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub symbol: Symbol,
    /// Side of the live position. The sink sends it as-is for OPEN and
    /// inverted for CLOSE.
    pub side: Side,
    pub quantity: u64,
    pub kind: OrderKind,
}
