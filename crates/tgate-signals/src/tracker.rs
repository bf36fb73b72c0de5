//! Per-mode signal reducers and the five-mode fan-out.

use crate::mode::{AllowSet, FilterMode};
use crate::state::{ModeState, SignalRow, SignalTracking};
use std::collections::HashMap;
use std::sync::Arc;
use tgate_catalog::InstrumentCatalog;
use tgate_core::{ist_time_string, FsmState, Price, Side, Symbol, WebhookEvent};
use tgate_fsm::FsmStore;
use tokio::sync::watch;
use tracing::{debug, info};

/// Control effect raised by a tracker; routed by the application to the
/// owning component instead of written across component boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerEffect {
    /// Zero the symbol's cumulative paper P&L.
    ResetCumulative { symbol: Symbol },
    /// Re-arm the broker FSM at the given threshold.
    RearmFsm { symbol: Symbol, threshold: Price },
}

/// One filter mode's reducer and table.
pub struct ModeTracker {
    mode: FilterMode,
    allow: AllowSet,
    state: ModeState,
    tx: watch::Sender<ModeState>,
}

impl ModeTracker {
    pub fn new(mode: FilterMode, catalog: &InstrumentCatalog) -> Self {
        let (tx, _rx) = watch::channel(ModeState::default());
        Self {
            mode,
            allow: mode.allow_set(catalog),
            state: ModeState::default(),
            tx,
        }
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    /// Subscribe to this mode's table.
    pub fn subscribe(&self) -> watch::Receiver<ModeState> {
        self.tx.subscribe()
    }

    pub fn state(&self) -> &ModeState {
        &self.state
    }

    /// Replace the table (persistence restore).
    pub fn restore(&mut self, state: ModeState) {
        self.state = state;
        self.tx.send_replace(self.state.clone());
    }

    /// Drop the whole table.
    pub fn clear(&mut self) {
        self.state = ModeState::default();
        self.tx.send_replace(self.state.clone());
        info!(mode = %self.mode, "Signal table cleared");
    }

    /// Drop crypto entries only.
    pub fn clear_prefix(&mut self, prefix: &str) {
        self.state.clear_prefix(prefix);
        self.tx.send_replace(self.state.clone());
    }

    /// Apply one webhook to this mode's table.
    ///
    /// Returns control effects (broker-6 only). The FSM context for the
    /// flag rules is read from the shared store under the mode-mapped
    /// symbol, after the runners have applied the same webhook.
    pub fn apply_webhook(
        &mut self,
        event: &WebhookEvent,
        catalog: &InstrumentCatalog,
        store: &FsmStore,
        now_ms: i64,
    ) -> Vec<TrackerEffect> {
        let Some(direction) = event.direction() else {
            return Vec::new();
        };

        let mapped = self.mode.map_symbol(&event.symbol, catalog);
        if !self.allow.allows(&event.symbol, &mapped) {
            return Vec::new();
        }
        if !self.mode.accepts(direction) {
            return Vec::new();
        }

        let fsm = store.get(&mapped).unwrap_or_default();
        let ltp = fsm.ltp.or_else(|| store.last_price(&mapped));

        let mut effects = Vec::new();
        let broker6 = self.mode == FilterMode::Broker6;

        let tracking = self.state.tracking.entry(mapped.clone()).or_default();
        let prev = tracking.last_signal;

        // Counters. The broker-6 mode keeps them in the auxiliary map;
        // general modes keep them on the tracking entry itself.
        let (mut sell_after_buy, mut buy_after_sell) = if broker6 {
            self.state
                .aux_counts
                .get(&mapped)
                .copied()
                .unwrap_or_default()
        } else {
            (tracking.sell_after_buy_count, tracking.buy_after_sell_count)
        };

        match direction {
            Side::Buy => {
                sell_after_buy = 0;
                if prev == Some(Side::Sell) || buy_after_sell > 0 {
                    buy_after_sell += 1;
                }
            }
            Side::Sell => {
                buy_after_sell = 0;
                if prev == Some(Side::Buy) || sell_after_buy > 0 {
                    sell_after_buy += 1;
                }
            }
        }

        // Alternation: sticky in general modes; broker-6 recomputes per
        // signal and resets the symbol's cumulative P&L on alternation.
        let alternated = prev.is_some() && prev != Some(direction);
        if broker6 {
            tracking.alternate_signal = alternated;
            if alternated {
                debug!(symbol = %mapped, "Signal alternated; resetting cumulative P&L");
                effects.push(TrackerEffect::ResetCumulative {
                    symbol: mapped.clone(),
                });
            }
        } else if alternated {
            tracking.alternate_signal = true;
        }

        // Buy-sell-sell: two SELLs after a BUY.
        let idle = fsm.state == FsmState::NoPositionSignal;
        let below_buy_threshold = match (ltp, fsm.last_buy_threshold) {
            (Some(ltp), Some(lbt)) => ltp < lbt,
            _ => false,
        };
        if broker6 {
            if sell_after_buy >= 2 {
                tracking.buy_sell_sell = true;
                if idle && below_buy_threshold {
                    let threshold = fsm.last_buy_threshold.expect("checked above");
                    info!(
                        symbol = %mapped,
                        threshold = %threshold,
                        "Buy-sell-sell: re-arming at last buy threshold"
                    );
                    effects.push(TrackerEffect::RearmFsm {
                        symbol: mapped.clone(),
                        threshold,
                    });
                    effects.push(TrackerEffect::ResetCumulative {
                        symbol: mapped.clone(),
                    });
                    tracking.buy_sell_sell = false;
                }
            }
        } else if direction == Side::Sell && sell_after_buy >= 2 && idle && below_buy_threshold {
            tracking.buy_sell_sell = true;
        }

        // Sell-buy-buy: two BUYs after a SELL. General modes only.
        if !broker6 && direction == Side::Buy && buy_after_sell >= 2 && idle {
            let below_sell_threshold = match (ltp, fsm.last_sell_threshold) {
                (Some(ltp), Some(lst)) => ltp < lst,
                _ => false,
            };
            if below_sell_threshold {
                tracking.sell_buy_buy = true;
            }
        }

        tracking.last_signal = Some(direction);
        if broker6 {
            self.state
                .aux_counts
                .insert(mapped.clone(), (sell_after_buy, buy_after_sell));
        } else {
            tracking.sell_after_buy_count = sell_after_buy;
            tracking.buy_after_sell_count = buy_after_sell;
        }

        let row = SignalRow {
            time_ist: ist_time_string(now_ms),
            intent: direction.to_string(),
            stop_px: event.stop_px,
            alternate_signal: tracking.alternate_signal,
            buy_sell_sell: tracking.buy_sell_sell,
            sell_buy_buy: tracking.sell_buy_buy,
        };
        self.state.push_row(&mapped, row);

        self.tx.send_replace(self.state.clone());
        effects
    }
}

/// All five mode trackers, fanned out in a fixed order.
pub struct SignalTrackerSet {
    catalog: Arc<InstrumentCatalog>,
    trackers: Vec<ModeTracker>,
}

impl SignalTrackerSet {
    pub fn new(catalog: Arc<InstrumentCatalog>) -> Self {
        let trackers = FilterMode::ALL
            .iter()
            .map(|&mode| ModeTracker::new(mode, &catalog))
            .collect();
        Self { catalog, trackers }
    }

    /// Apply one webhook to every mode, collecting control effects.
    /// All five tables are updated before this returns, so downstream
    /// consumers never observe a partial fan-out.
    pub fn apply_webhook(
        &mut self,
        event: &WebhookEvent,
        store: &FsmStore,
        now_ms: i64,
    ) -> Vec<TrackerEffect> {
        let mut effects = Vec::new();
        for tracker in &mut self.trackers {
            effects.extend(tracker.apply_webhook(event, &self.catalog, store, now_ms));
        }
        effects
    }

    pub fn tracker(&self, mode: FilterMode) -> &ModeTracker {
        self.trackers
            .iter()
            .find(|t| t.mode() == mode)
            .expect("all modes constructed")
    }

    fn tracker_mut(&mut self, mode: FilterMode) -> &mut ModeTracker {
        self.trackers
            .iter_mut()
            .find(|t| t.mode() == mode)
            .expect("all modes constructed")
    }

    /// Reset one mode's table (`clear_signals`).
    pub fn clear(&mut self, mode: FilterMode) {
        self.tracker_mut(mode).clear();
    }

    /// Drop crypto entries in every mode (part of the crypto reset).
    pub fn clear_prefix(&mut self, prefix: &str) {
        for tracker in &mut self.trackers {
            tracker.clear_prefix(prefix);
        }
    }

    /// Full tables keyed by mode name, for persistence.
    pub fn snapshot(&self) -> HashMap<String, ModeState> {
        self.trackers
            .iter()
            .map(|t| (t.mode().name().to_string(), t.state().clone()))
            .collect()
    }

    /// Restore tables from a persisted snapshot. Unknown modes are
    /// ignored; missing modes stay empty.
    pub fn restore(&mut self, snapshot: HashMap<String, ModeState>) {
        for (name, state) in snapshot {
            if let Ok(mode) = FilterMode::from_name(&name) {
                self.tracker_mut(mode).restore(state);
            }
        }
    }
}
