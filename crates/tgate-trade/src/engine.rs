//! The trade engine reducer.
//!
//! Driven by FSM snapshot diffs. Paper trades open and close on the
//! position edges; live trades additionally pass the permission oracle
//! (paper unrealized + cumulative >= 0) and the per-minute rate limits,
//! and emit order intents on open and forced close.

use crate::error::TradeError;
use crate::types::{OpenTrade, OrderIntent, OrderKind, TradeRow, TradeState};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tgate_catalog::InstrumentCatalog;
use tgate_core::{
    ist_time_string, minute_index, next_minute_start_ms, second_of_minute, FsmSnapshot, FsmState,
    Price, Side, Symbol, SHORT_SUFFIX,
};
use tgate_fsm::FsmMap;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

/// P&L delta per unit: `_SHORT` symbols profit when the price falls.
fn unit_delta(symbol: &str, entry: Price, ltp: Price) -> Decimal {
    if symbol.ends_with(SHORT_SUFFIX) {
        entry.inner() - ltp.inner()
    } else {
        ltp.inner() - entry.inner()
    }
}

/// Per-symbol trade engine.
pub struct TradeEngine {
    catalog: Arc<InstrumentCatalog>,
    /// Notional capital per paper entry.
    capital: u64,
    /// Fixed cost charged once on every live exit.
    exit_cost: Decimal,
    state: TradeState,
    /// FSM snapshots as of the previous update, for edge detection.
    prev: FsmMap,
    /// Minute P&L log dedup per symbol.
    last_minute_logged: HashMap<Symbol, i64>,
    orders_tx: mpsc::Sender<OrderIntent>,
    tx: watch::Sender<TradeState>,
    dirty: bool,
}

impl TradeEngine {
    pub fn new(
        catalog: Arc<InstrumentCatalog>,
        capital: u64,
        exit_cost: Decimal,
        orders_tx: mpsc::Sender<OrderIntent>,
    ) -> Self {
        let (tx, _rx) = watch::channel(TradeState::default());
        Self {
            catalog,
            capital,
            exit_cost,
            state: TradeState::default(),
            prev: FsmMap::new(),
            last_minute_logged: HashMap::new(),
            orders_tx,
            tx,
            dirty: false,
        }
    }

    /// Subscribe to trade-state snapshots.
    pub fn subscribe(&self) -> watch::Receiver<TradeState> {
        self.tx.subscribe()
    }

    pub fn state(&self) -> &TradeState {
        &self.state
    }

    /// Replace the books (persistence restore).
    pub fn restore(&mut self, state: TradeState) {
        self.state = state;
        self.tx.send_replace(self.state.clone());
    }

    /// Seed the edge-detection baseline from restored FSM snapshots so
    /// the first post-restart transition is still seen as an edge.
    pub fn seed_prev(&mut self, map: &FsmMap) {
        self.prev = map.clone();
    }

    /// Drain the dirty flag for the persistence tick.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Observe a new FSM snapshot map. Processes every symbol whose
    /// snapshot changed since the last call.
    pub fn on_snapshot(&mut self, map: &FsmMap, now_ms: i64) {
        let mut changed = false;
        for (symbol, snap) in map {
            if self.prev.get(symbol) == Some(snap) {
                continue;
            }
            changed |= self.process_symbol(symbol, snap, now_ms);
        }
        self.prev = map.clone();

        if changed {
            self.dirty = true;
            self.tx.send_replace(self.state.clone());
        }
    }

    /// Zero a symbol's cumulative paper P&L (tracker control message).
    pub fn reset_cumulative(&mut self, symbol: &str) {
        self.state
            .paper
            .cumulative
            .insert(symbol.to_string(), Decimal::ZERO);
        self.dirty = true;
        self.tx.send_replace(self.state.clone());
    }

    /// Drop every per-symbol entry whose key starts with `BTC`.
    pub fn reset_crypto(&mut self) {
        self.state.clear_prefix("BTC");
        self.prev.retain(|k, _| !k.starts_with("BTC"));
        self.last_minute_logged.retain(|k, _| !k.starts_with("BTC"));
        self.dirty = true;
        self.tx.send_replace(self.state.clone());
        info!("Crypto trade state reset");
    }

    fn process_symbol(&mut self, symbol: &str, snap: &FsmSnapshot, now_ms: i64) -> bool {
        let was = self
            .prev
            .get(symbol)
            .map(|p| p.state.is_in_position())
            .unwrap_or(false);
        let is = snap.state.is_in_position();
        let entering = !was && is;
        let exiting = was && !is;

        let Some(ltp) = snap.ltp else {
            return false;
        };
        if !ltp.is_positive() {
            return false;
        }

        let mut changed = false;

        if entering {
            self.open_paper(symbol, snap.state, ltp, now_ms);
            changed = true;
        }

        if is && self.state.paper.open.contains_key(symbol) {
            self.mark_open_position(symbol, ltp, now_ms, entering);
            changed = true;
        }

        if exiting {
            self.close_paper(symbol, ltp, now_ms);
            if self.state.live.open.contains_key(symbol) {
                self.force_close_live(symbol, ltp, now_ms, false);
            }
            changed = true;
        }

        changed
    }

    /// Quantity at entry: `ceil(capital / (lot * ltp))`.
    fn quantity_for(&self, lot: u32, ltp: Price) -> u64 {
        let denominator = Decimal::from(lot) * ltp.inner();
        let qty = (Decimal::from(self.capital) / denominator).ceil();
        qty.to_u64().unwrap_or(1).max(1)
    }

    fn next_id(&mut self, symbol: &str) -> String {
        let seq = self.state.last_ids.entry(symbol.to_string()).or_insert(0);
        *seq += 1;
        format!("{symbol}-{seq}")
    }

    fn open_paper(&mut self, symbol: &str, state: FsmState, ltp: Price, now_ms: i64) {
        let lot = self.catalog.lot_of(symbol).unwrap_or(1);
        let quantity = self.quantity_for(lot, ltp);
        let side = if state == FsmState::SellPosition {
            Side::Sell
        } else {
            Side::Buy
        };
        let id = self.next_id(symbol);
        let cumulative = self.state.paper.cumulative_of(symbol);
        let time_ist = ist_time_string(now_ms);

        info!(
            symbol = %symbol,
            side = %side,
            entry = %ltp,
            quantity,
            lot,
            "Paper trade opened"
        );

        self.state.paper.open.insert(
            symbol.to_string(),
            OpenTrade {
                id: id.clone(),
                symbol: symbol.to_string(),
                side,
                entry_price: ltp,
                quantity,
                lot,
                time_ist: time_ist.clone(),
            },
        );
        self.state.paper.push_row(TradeRow {
            id,
            time_ist,
            symbol: symbol.to_string(),
            entry_price: ltp,
            current_price: ltp,
            unrealized_pnl: Decimal::ZERO,
            cumulative_pnl: cumulative,
            quantity,
        });
    }

    /// Tick bookkeeping while the position holds: paper mark-to-market,
    /// live force-close check, live entry gate, minute P&L log.
    fn mark_open_position(&mut self, symbol: &str, ltp: Price, now_ms: i64, entering: bool) {
        let paper = self.state.paper.open.get(symbol).cloned().expect("caller checked");
        let paper_unrealized = unit_delta(symbol, paper.entry_price, ltp)
            * Decimal::from(paper.quantity)
            * Decimal::from(paper.lot);

        if let Some(row) = self.state.paper.row_mut(&paper.id) {
            row.current_price = ltp;
            row.unrealized_pnl = paper_unrealized;
        }

        let paper_cumulative = self.state.paper.cumulative_of(symbol);
        let combined = paper_unrealized + paper_cumulative;

        if let Some(live) = self.state.live.open.get(symbol).cloned() {
            let live_raw = unit_delta(symbol, live.entry_price, ltp)
                * Decimal::from(live.quantity)
                * Decimal::from(live.lot);
            // Consumers see the exit cost up front.
            if let Some(row) = self.state.live.row_mut(&live.id) {
                row.current_price = ltp;
                row.unrealized_pnl = live_raw - self.exit_cost;
            }

            if combined < Decimal::ZERO {
                self.force_close_live(symbol, ltp, now_ms, true);
            }
        } else {
            let blocked_until = self
                .state
                .blocked_until_ms
                .get(symbol)
                .copied()
                .unwrap_or(0);
            let allowed = blocked_until <= now_ms && combined >= Decimal::ZERO;
            let minute = minute_index(now_ms);
            let already_this_minute = self.state.last_live_minute.get(symbol) == Some(&minute);

            if allowed && (entering || second_of_minute(now_ms) == 0) && !already_this_minute {
                self.open_live(symbol, &paper, ltp, now_ms);
                self.state.last_live_minute.insert(symbol.to_string(), minute);
            }
        }

        self.minute_pnl_log(symbol, &paper, paper_unrealized, ltp, now_ms);
    }

    fn open_live(&mut self, symbol: &str, paper: &OpenTrade, ltp: Price, now_ms: i64) {
        let id = self.next_id(symbol);
        let cumulative = self.state.live.cumulative_of(symbol);
        let time_ist = ist_time_string(now_ms);

        info!(
            symbol = %symbol,
            side = %paper.side,
            entry = %ltp,
            quantity = paper.quantity,
            "Live trade opened"
        );

        self.state.live.open.insert(
            symbol.to_string(),
            OpenTrade {
                id: id.clone(),
                symbol: symbol.to_string(),
                side: paper.side,
                entry_price: ltp,
                quantity: paper.quantity,
                lot: paper.lot,
                time_ist: time_ist.clone(),
            },
        );
        self.state.live.push_row(TradeRow {
            id,
            time_ist,
            symbol: symbol.to_string(),
            entry_price: ltp,
            current_price: ltp,
            unrealized_pnl: -self.exit_cost,
            cumulative_pnl: cumulative,
            quantity: paper.quantity,
        });

        self.emit_order(OrderIntent {
            symbol: symbol.to_string(),
            side: paper.side,
            quantity: paper.quantity,
            kind: OrderKind::Open,
        });
    }

    /// Close the live trade, charging the exit cost exactly once into
    /// the stored cumulative. `block` additionally suspends live entries
    /// until the start of the next minute.
    fn force_close_live(&mut self, symbol: &str, ltp: Price, now_ms: i64, block: bool) {
        let Some(live) = self.state.live.open.remove(symbol) else {
            return;
        };
        let raw = unit_delta(symbol, live.entry_price, ltp)
            * Decimal::from(live.quantity)
            * Decimal::from(live.lot);
        let realized = raw - self.exit_cost;
        let cumulative = self.state.live.cumulative_of(symbol) + realized;
        self.state
            .live
            .cumulative
            .insert(symbol.to_string(), cumulative);

        info!(
            symbol = %symbol,
            exit = %ltp,
            realized = %realized,
            cumulative = %cumulative,
            "Live trade closed"
        );

        self.state.live.push_row(TradeRow {
            id: format!("{}-exit", live.id),
            time_ist: ist_time_string(now_ms),
            symbol: symbol.to_string(),
            entry_price: live.entry_price,
            current_price: ltp,
            unrealized_pnl: realized,
            cumulative_pnl: cumulative,
            quantity: live.quantity,
        });

        if block {
            self.state
                .blocked_until_ms
                .insert(symbol.to_string(), next_minute_start_ms(now_ms));
        }

        self.emit_order(OrderIntent {
            symbol: symbol.to_string(),
            side: live.side,
            quantity: live.quantity,
            kind: OrderKind::Close,
        });
    }

    fn close_paper(&mut self, symbol: &str, ltp: Price, now_ms: i64) {
        let Some(paper) = self.state.paper.open.remove(symbol) else {
            return;
        };
        let realized = unit_delta(symbol, paper.entry_price, ltp)
            * Decimal::from(paper.quantity)
            * Decimal::from(paper.lot);
        let cumulative = self.state.paper.cumulative_of(symbol) + realized;
        self.state
            .paper
            .cumulative
            .insert(symbol.to_string(), cumulative);

        info!(
            symbol = %symbol,
            exit = %ltp,
            realized = %realized,
            cumulative = %cumulative,
            "Paper trade closed"
        );

        self.state.paper.push_row(TradeRow {
            id: format!("{}-exit", paper.id),
            time_ist: ist_time_string(now_ms),
            symbol: symbol.to_string(),
            entry_price: paper.entry_price,
            current_price: ltp,
            unrealized_pnl: realized,
            cumulative_pnl: cumulative,
            quantity: paper.quantity,
        });
    }

    /// End-of-minute paper P&L line, once per symbol per minute.
    fn minute_pnl_log(
        &mut self,
        symbol: &str,
        paper: &OpenTrade,
        unrealized: Decimal,
        ltp: Price,
        now_ms: i64,
    ) {
        if second_of_minute(now_ms) < 59 {
            return;
        }
        let minute = minute_index(now_ms);
        if self.last_minute_logged.get(symbol) == Some(&minute) {
            return;
        }
        self.last_minute_logged.insert(symbol.to_string(), minute);
        info!(
            symbol = %symbol,
            pnl = %unrealized,
            ltp = %ltp,
            entry = %paper.entry_price,
            quantity = paper.quantity,
            lot = paper.lot,
            "Minute P&L"
        );
    }

    fn emit_order(&self, intent: OrderIntent) {
        if let Err(e) = self.orders_tx.try_send(intent.clone()) {
            warn!(
                error = %TradeError::OrderChannelFull(e.to_string()),
                symbol = %intent.symbol,
                "Dropping order intent"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tgate_core::{FsmSnapshot, FsmState};

    /// Minute-aligned base timestamp.
    const T0: i64 = 1_700_000_040_000;

    fn catalog() -> Arc<InstrumentCatalog> {
        Arc::new(
            InstrumentCatalog::from_json(
                r#"[
                    {"tradingview": "BTCUSDT", "broker_symbol": "BTCUSD", "exchange": "CRYPTO"},
                    {"tradingview": "NIFTYBANK", "broker_symbol": "BANKNIFTY24FUT", "token": 1, "exchange": "NFO", "lot": 15}
                ]"#,
            )
            .unwrap(),
        )
    }

    fn engine() -> (TradeEngine, mpsc::Receiver<OrderIntent>) {
        let (tx, rx) = mpsc::channel(64);
        (TradeEngine::new(catalog(), 100_000, dec!(50), tx), rx)
    }

    fn snap(state: FsmState, ltp: rust_decimal::Decimal) -> FsmSnapshot {
        FsmSnapshot {
            state,
            ltp: Some(Price::new(ltp)),
            threshold: Some(Price::new(dec!(100))),
            ..Default::default()
        }
    }

    fn map_of(symbol: &str, snapshot: FsmSnapshot) -> FsmMap {
        FsmMap::from([(symbol.to_string(), snapshot)])
    }

    // Scenario: long entry then exit with P&L accrual.
    #[test]
    fn test_paper_entry_mark_exit() {
        let (mut eng, _rx) = engine();
        let sym = "BTCUSDT";

        // Armed, no position yet: nothing opens.
        eng.on_snapshot(&map_of(sym, snap(FsmState::NoPositionSignal, dec!(100))), T0);
        assert!(eng.state().paper.open.is_empty());

        // Entry at 101: qty = ceil(100000 / (1 * 101)) = 991.
        eng.on_snapshot(&map_of(sym, snap(FsmState::BuyPosition, dec!(101))), T0 + 1_000);
        let open = &eng.state().paper.open[sym];
        assert_eq!(open.quantity, 991);
        assert_eq!(open.side, Side::Buy);
        let row = &eng.state().paper.rows[0];
        assert_eq!(row.unrealized_pnl, dec!(0));
        assert_eq!(row.cumulative_pnl, dec!(0));

        // Mark to 102: unrealized = (102-101)*991*1.
        eng.on_snapshot(&map_of(sym, snap(FsmState::BuyPosition, dec!(102))), T0 + 2_000);
        assert_eq!(eng.state().paper.rows[0].unrealized_pnl, dec!(991));

        // Exit at 99: realized = (99-101)*991 = -1982.
        eng.on_snapshot(
            &map_of(sym, snap(FsmState::NoPositionBlocked, dec!(99))),
            T0 + 3_000,
        );
        assert!(eng.state().paper.open.is_empty());
        assert_eq!(eng.state().paper.cumulative_of(sym), dec!(-1982));
        let exit_row = &eng.state().paper.rows[0];
        assert!(exit_row.id.ends_with("-exit"));
        assert_eq!(exit_row.unrealized_pnl, dec!(-1982));
        assert_eq!(exit_row.cumulative_pnl, dec!(-1982));
    }

    #[test]
    fn test_lot_scales_quantity_and_pnl() {
        let (mut eng, _rx) = engine();
        let sym = "BANKNIFTY24FUT";

        // qty = ceil(100000 / (15 * 100)) = ceil(66.67) = 67.
        eng.on_snapshot(&map_of(sym, snap(FsmState::BuyPosition, dec!(100))), T0);
        let open = &eng.state().paper.open[sym];
        assert_eq!(open.lot, 15);
        assert_eq!(open.quantity, 67);

        eng.on_snapshot(&map_of(sym, snap(FsmState::BuyPosition, dec!(101))), T0 + 1_000);
        // unrealized = 1 * 67 * 15.
        assert_eq!(eng.state().paper.rows[0].unrealized_pnl, dec!(1005));
    }

    #[test]
    fn test_short_suffix_inverts_delta() {
        let (mut eng, _rx) = engine();
        let sym = "BTCUSDT_SHORT";

        eng.on_snapshot(&map_of(sym, snap(FsmState::SellPosition, dec!(100))), T0);
        assert_eq!(eng.state().paper.open[sym].side, Side::Sell);

        eng.on_snapshot(&map_of(sym, snap(FsmState::SellPosition, dec!(98))), T0 + 1_000);
        // Short profits when the price falls: (100-98)*1000.
        assert_eq!(eng.state().paper.rows[0].unrealized_pnl, dec!(2000));
    }

    // Scenario: live gate with zero cumulative.
    #[test]
    fn test_live_gate_one_open_per_minute() {
        let (mut eng, mut rx) = engine();
        let sym = "BTCUSDT";

        // Enter paper on an entering edge: live opens immediately.
        eng.on_snapshot(&map_of(sym, snap(FsmState::BuyPosition, dec!(100))), T0 + 1_000);
        assert!(eng.state().live.open.contains_key(sym));
        let order = rx.try_recv().unwrap();
        assert_eq!(order.kind, OrderKind::Open);
        assert_eq!(order.side, Side::Buy);
        assert_eq!(order.quantity, 1000);

        // Live row shows the exit cost up front.
        assert_eq!(eng.state().live.rows[0].unrealized_pnl, dec!(-50));

        // Same minute, no new open (live already open anyway).
        eng.on_snapshot(&map_of(sym, snap(FsmState::BuyPosition, dec!(100.5))), T0 + 2_000);
        assert!(rx.try_recv().is_err());
        assert_eq!(eng.state().live.open.len(), 1);
    }

    #[test]
    fn test_live_entry_waits_for_minute_start() {
        let (mut eng, mut rx) = engine();
        let sym = "BTCUSDT";

        // Open paper mid-minute while a live block from a previous close
        // is in force, so the entering edge cannot open live.
        eng.state
            .blocked_until_ms
            .insert(sym.to_string(), T0 + 60_000);
        eng.on_snapshot(&map_of(sym, snap(FsmState::BuyPosition, dec!(100))), T0 + 1_000);
        assert!(eng.state().live.open.is_empty());
        assert!(rx.try_recv().is_err());

        // Mid-minute ticks after the block expires still don't open
        // (not second 0, not an entering edge).
        eng.on_snapshot(&map_of(sym, snap(FsmState::BuyPosition, dec!(100.5))), T0 + 61_000);
        assert!(eng.state().live.open.is_empty());

        // Second 0 of the next minute: live opens.
        eng.on_snapshot(&map_of(sym, snap(FsmState::BuyPosition, dec!(100.6))), T0 + 120_000);
        assert!(eng.state().live.open.contains_key(sym));
        assert_eq!(rx.try_recv().unwrap().kind, OrderKind::Open);
    }

    // Scenario: forced live close on negative combined P&L.
    #[test]
    fn test_live_force_close_applies_exit_cost_once() {
        let (mut eng, mut rx) = engine();
        let sym = "BTCUSDT";

        // Cumulative +10 from history.
        eng.state.paper.cumulative.insert(sym.to_string(), dec!(10));

        eng.on_snapshot(&map_of(sym, snap(FsmState::BuyPosition, dec!(100))), T0 + 1_000);
        assert_eq!(rx.try_recv().unwrap().kind, OrderKind::Open);

        // Price drops so paper unrealized = (99.989-100)*1000 = -11,
        // combined = -11 + 10 = -1 < 0: live force-closes.
        eng.on_snapshot(
            &map_of(sym, snap(FsmState::BuyPosition, dec!(99.989))),
            T0 + 20_000,
        );
        assert!(eng.state().live.open.is_empty());
        let close = rx.try_recv().unwrap();
        assert_eq!(close.kind, OrderKind::Close);

        // Live cumulative = raw(-11) - 50 = -61, charged exactly once.
        assert_eq!(eng.state().live.cumulative_of(sym), dec!(-61));
        let exit_row = &eng.state().live.rows[0];
        assert!(exit_row.id.ends_with("-exit"));
        assert_eq!(exit_row.cumulative_pnl, dec!(-61));

        // Blocked until the start of the next minute.
        assert_eq!(
            eng.state().blocked_until_ms[sym],
            next_minute_start_ms(T0 + 20_000)
        );

        // Still in the same minute at second 0 + paper still negative:
        // no reopen.
        eng.on_snapshot(&map_of(sym, snap(FsmState::BuyPosition, dec!(99.989))), T0 + 21_000);
        assert!(eng.state().live.open.is_empty());
    }

    #[test]
    fn test_paper_exit_closes_live_without_block() {
        let (mut eng, mut rx) = engine();
        let sym = "BTCUSDT";

        eng.on_snapshot(&map_of(sym, snap(FsmState::BuyPosition, dec!(100))), T0 + 1_000);
        rx.try_recv().unwrap();

        eng.on_snapshot(
            &map_of(sym, snap(FsmState::NoPositionBlocked, dec!(101))),
            T0 + 2_000,
        );
        // Paper and live both closed.
        assert!(eng.state().paper.open.is_empty());
        assert!(eng.state().live.open.is_empty());
        assert_eq!(rx.try_recv().unwrap().kind, OrderKind::Close);
        // FSM-exit close records no extra live-entry block.
        assert!(!eng.state().blocked_until_ms.contains_key(sym));
        // Paper realized (101-100)*1000 = 1000; live realized 1000-50.
        assert_eq!(eng.state().paper.cumulative_of(sym), dec!(1000));
        assert_eq!(eng.state().live.cumulative_of(sym), dec!(950));
    }

    #[test]
    fn test_live_requires_open_paper() {
        let (mut eng, _rx) = engine();
        // At all points: live open implies paper open.
        let sym = "BTCUSDT";
        eng.on_snapshot(&map_of(sym, snap(FsmState::BuyPosition, dec!(100))), T0 + 1_000);
        eng.on_snapshot(&map_of(sym, snap(FsmState::BuyPosition, dec!(101))), T0 + 2_000);
        eng.on_snapshot(&map_of(sym, snap(FsmState::NoPositionBlocked, dec!(99))), T0 + 3_000);

        assert!(eng.state().live.open.is_empty());
        assert!(eng.state().paper.open.is_empty());
    }

    #[test]
    fn test_negative_cumulative_blocks_live_entry() {
        let (mut eng, mut rx) = engine();
        let sym = "BTCUSDT";
        eng.state.paper.cumulative.insert(sym.to_string(), dec!(-5));

        // Entering edge with combined = -5 < 0: paper opens, live does not.
        eng.on_snapshot(&map_of(sym, snap(FsmState::BuyPosition, dec!(100))), T0 + 1_000);
        assert!(eng.state().paper.open.contains_key(sym));
        assert!(eng.state().live.open.is_empty());
        assert!(rx.try_recv().is_err());

        // Once unrealized offsets the cumulative exactly (combined == 0),
        // entry is permitted at a minute start.
        eng.on_snapshot(&map_of(sym, snap(FsmState::BuyPosition, dec!(100.005))), T0 + 60_000);
        assert!(eng.state().live.open.contains_key(sym));
    }

    #[test]
    fn test_reset_cumulative_and_crypto_reset() {
        let (mut eng, _rx) = engine();
        eng.state.paper.cumulative.insert("SBIN-EQ".to_string(), dec!(42));
        eng.reset_cumulative("SBIN-EQ");
        assert_eq!(eng.state().paper.cumulative_of("SBIN-EQ"), dec!(0));

        eng.on_snapshot(
            &map_of("BTCUSDT_LONG", snap(FsmState::BuyPosition, dec!(100))),
            T0 + 1_000,
        );
        assert!(!eng.state().paper.open.is_empty());
        eng.reset_crypto();
        assert!(eng.state().paper.open.is_empty());
        assert!(eng.state().live.open.is_empty());
        assert!(eng.state().last_ids.is_empty());
    }

    #[test]
    fn test_paper_open_edges_match_exit_rows() {
        let (mut eng, _rx) = engine();
        let sym = "BTCUSDT";

        for cycle in 0..3 {
            let t = T0 + cycle * 120_000;
            eng.on_snapshot(&map_of(sym, snap(FsmState::BuyPosition, dec!(100))), t + 1_000);
            eng.on_snapshot(
                &map_of(sym, snap(FsmState::NoPositionBlocked, dec!(101))),
                t + 2_000,
            );
        }
        // Three entries, three exits, nothing open.
        let exits = eng
            .state()
            .paper
            .rows
            .iter()
            .filter(|r| r.id.ends_with("-exit"))
            .count();
        assert_eq!(exits, 3);
        assert!(eng.state().paper.open.is_empty());
        // Cumulative equals the sum of realized P&Ls.
        assert_eq!(eng.state().paper.cumulative_of(sym), dec!(3000));
    }
}
