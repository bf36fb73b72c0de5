//! Process-wide FSM snapshot store.
//!
//! The single store read by multiple components. Writes serialize
//! through this type (each symbol has exactly one runner); readers get
//! the whole mapping through a watch channel that re-emits on every
//! effective change. The store also remembers the last non-null price
//! and threshold per symbol, which outlive the snapshots themselves.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use tgate_core::{FsmSnapshot, Price, Symbol};
use tgate_telemetry::LogThrottle;
use tokio::sync::watch;
use tracing::{debug, info};

/// The published mapping.
pub type FsmMap = HashMap<Symbol, FsmSnapshot>;

/// Interval for non-state field-change logging, per symbol.
const FIELD_LOG_INTERVAL_MS: i64 = 1_500;

/// Shared FSM snapshot store.
pub struct FsmStore {
    entries: Mutex<FsmMap>,
    /// Last non-null price per symbol; survives snapshot clears until
    /// the symbol itself is cleared.
    price_memo: DashMap<Symbol, Price>,
    /// Last non-null threshold per symbol.
    threshold_memo: DashMap<Symbol, Price>,
    tx: watch::Sender<FsmMap>,
    field_log: LogThrottle,
    /// Set on every effective change; drained by the persistence tick.
    dirty: Mutex<bool>,
}

impl FsmStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(FsmMap::new());
        Self {
            entries: Mutex::new(FsmMap::new()),
            price_memo: DashMap::new(),
            threshold_memo: DashMap::new(),
            tx,
            field_log: LogThrottle::new(FIELD_LOG_INTERVAL_MS),
            dirty: Mutex::new(false),
        }
    }

    /// Subscribe to the full mapping. The current value is visible
    /// immediately; every effective change re-emits the whole map.
    pub fn subscribe(&self) -> watch::Receiver<FsmMap> {
        self.tx.subscribe()
    }

    /// Merge partial snapshots in. Updates the price/threshold memos for
    /// non-null fields and emits iff any entry changed.
    pub fn update(&self, partial: impl IntoIterator<Item = (Symbol, FsmSnapshot)>, now_ms: i64) {
        let mut entries = self.entries.lock();
        let mut changed = false;

        for (symbol, snap) in partial {
            if let Some(price) = snap.ltp {
                self.price_memo.insert(symbol.clone(), price);
            }
            if let Some(threshold) = snap.threshold {
                self.threshold_memo.insert(symbol.clone(), threshold);
            }

            let prev = entries.get(&symbol);
            if prev == Some(&snap) {
                continue;
            }

            let state_changed = prev.map(|p| p.state) != Some(snap.state);
            let threshold_changed = prev.map(|p| p.threshold) != Some(snap.threshold);
            if state_changed || threshold_changed {
                info!(
                    symbol = %symbol,
                    state = %snap.state,
                    threshold = ?snap.threshold.map(|p| p.to_string()),
                    "FSM snapshot changed"
                );
                self.field_log.reset(&symbol);
            } else if self.field_log.should_log(&symbol, now_ms) {
                debug!(
                    symbol = %symbol,
                    ltp = ?snap.ltp.map(|p| p.to_string()),
                    "FSM snapshot fields updated"
                );
            }

            entries.insert(symbol, snap);
            changed = true;
        }

        if changed {
            *self.dirty.lock() = true;
            self.tx.send_replace(entries.clone());
        }
    }

    /// Current full mapping.
    pub fn snapshot(&self) -> FsmMap {
        self.entries.lock().clone()
    }

    /// Snapshot of a single symbol.
    pub fn get(&self, symbol: &str) -> Option<FsmSnapshot> {
        self.entries.lock().get(symbol).cloned()
    }

    /// Last non-null price seen for a symbol.
    pub fn last_price(&self, symbol: &str) -> Option<Price> {
        self.price_memo.get(symbol).map(|p| *p)
    }

    /// Last non-null threshold seen for a symbol.
    pub fn last_threshold(&self, symbol: &str) -> Option<Price> {
        self.threshold_memo.get(symbol).map(|p| *p)
    }

    /// Remove the given symbols from the mapping and the memos.
    pub fn clear(&self, symbols: &[Symbol]) {
        let mut entries = self.entries.lock();
        let mut changed = false;
        for symbol in symbols {
            changed |= entries.remove(symbol).is_some();
            self.price_memo.remove(symbol);
            self.threshold_memo.remove(symbol);
        }
        if changed {
            *self.dirty.lock() = true;
            self.tx.send_replace(entries.clone());
        }
    }

    /// Remove every symbol starting with `prefix` and return the keys
    /// removed from the mapping.
    pub fn clear_prefix(&self, prefix: &str) -> Vec<Symbol> {
        let keys: Vec<Symbol> = {
            let entries = self.entries.lock();
            entries
                .keys()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect()
        };
        self.clear(&keys);
        self.price_memo.retain(|k, _| !k.starts_with(prefix));
        self.threshold_memo.retain(|k, _| !k.starts_with(prefix));
        keys
    }

    /// Reset the whole store.
    pub fn clear_all(&self) {
        let mut entries = self.entries.lock();
        if entries.is_empty() {
            return;
        }
        entries.clear();
        self.price_memo.clear();
        self.threshold_memo.clear();
        *self.dirty.lock() = true;
        self.tx.send_replace(entries.clone());
    }

    /// Drain the dirty flag. Returns true when something changed since
    /// the last drain.
    pub fn take_dirty(&self) -> bool {
        std::mem::take(&mut *self.dirty.lock())
    }
}

impl Default for FsmStore {
    fn default() -> Self {
        Self::new()
    }
}
