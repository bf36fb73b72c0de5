//! Persisted signal-tracking state.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tgate_core::{Price, Side, Symbol};

/// Newest-first row cap per symbol.
pub const ROW_CAP: usize = 50;

/// Per-symbol pattern counters and flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalTracking {
    /// Direction of the previous recorded signal.
    pub last_signal: Option<Side>,
    /// Consecutive SELLs since the last BUY.
    pub sell_after_buy_count: u32,
    /// Consecutive BUYs since the last SELL.
    pub buy_after_sell_count: u32,
    /// Signal direction alternated (sticky in general modes,
    /// per-signal in broker-6).
    pub alternate_signal: bool,
    /// BUY followed by two SELLs pattern.
    pub buy_sell_sell: bool,
    /// SELL followed by two BUYs pattern.
    pub sell_buy_buy: bool,
}

/// One recorded signal, newest first in the per-symbol list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalRow {
    pub time_ist: String,
    pub intent: String,
    pub stop_px: Option<Price>,
    pub alternate_signal: bool,
    pub buy_sell_sell: bool,
    pub sell_buy_buy: bool,
}

/// Full table for one filter mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModeState {
    /// Per-symbol counters and flags.
    pub tracking: HashMap<Symbol, SignalTracking>,
    /// Per-symbol rows, newest first, capped at [`ROW_CAP`].
    pub rows: HashMap<Symbol, Vec<SignalRow>>,
    /// Symbols in first-seen order.
    pub symbols: Vec<Symbol>,
    /// Broker-6 auxiliary counters: (sell_after_buy, buy_after_sell).
    #[serde(default)]
    pub aux_counts: HashMap<Symbol, (u32, u32)>,
}

impl ModeState {
    /// Prepend a row for `symbol`, capping the list and registering the
    /// symbol on first sight.
    pub fn push_row(&mut self, symbol: &str, row: SignalRow) {
        let rows = self.rows.entry(symbol.to_string()).or_default();
        rows.insert(0, row);
        rows.truncate(ROW_CAP);

        if !self.symbols.iter().any(|s| s == symbol) {
            self.symbols.push(symbol.to_string());
        }
    }

    /// Drop every per-symbol entry whose key starts with `prefix`.
    pub fn clear_prefix(&mut self, prefix: &str) {
        self.tracking.retain(|k, _| !k.starts_with(prefix));
        self.rows.retain(|k, _| !k.starts_with(prefix));
        self.aux_counts.retain(|k, _| !k.starts_with(prefix));
        self.symbols.retain(|k| !k.starts_with(prefix));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(intent: &str) -> SignalRow {
        SignalRow {
            time_ist: "2024-01-01 10:00:00".to_string(),
            intent: intent.to_string(),
            stop_px: None,
            alternate_signal: false,
            buy_sell_sell: false,
            sell_buy_buy: false,
        }
    }

    #[test]
    fn test_rows_newest_first_and_capped() {
        let mut state = ModeState::default();
        for i in 0..(ROW_CAP + 10) {
            state.push_row("SBIN-EQ", row(&format!("BUY{i}")));
        }
        let rows = &state.rows["SBIN-EQ"];
        assert_eq!(rows.len(), ROW_CAP);
        assert_eq!(rows[0].intent, format!("BUY{}", ROW_CAP + 9));
        assert_eq!(state.symbols, vec!["SBIN-EQ"]);
    }

    #[test]
    fn test_symbols_first_seen_order() {
        let mut state = ModeState::default();
        state.push_row("B", row("BUY"));
        state.push_row("A", row("SELL"));
        state.push_row("B", row("SELL"));
        assert_eq!(state.symbols, vec!["B", "A"]);
    }

    #[test]
    fn test_clear_prefix() {
        let mut state = ModeState::default();
        state.push_row("BTCUSDT_LONG", row("BUY"));
        state.push_row("SBIN-EQ", row("BUY"));
        state.tracking.insert("BTCUSDT_LONG".to_string(), SignalTracking::default());
        state.clear_prefix("BTC");
        assert!(!state.rows.contains_key("BTCUSDT_LONG"));
        assert!(!state.tracking.contains_key("BTCUSDT_LONG"));
        assert_eq!(state.symbols, vec!["SBIN-EQ"]);
    }
}
