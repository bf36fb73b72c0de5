//! Main application orchestration.
//!
//! One cooperative event loop drives every reducer in a fixed order:
//! a webhook reaches the runners first, then all five signal trackers,
//! then any tracker control effects, and only then does the trade
//! engine observe the updated snapshot map. Ticks and prices flow
//! runner -> store -> engine. Persistence runs on a timer with per-
//! document debouncing and a synchronous flush at shutdown.

use crate::config::AppConfig;
use crate::error::AppResult;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tgate_catalog::InstrumentCatalog;
use tgate_core::{Clock, Symbol};
use tgate_feed::FeedEvent;
use tgate_fsm::{BrokerRunner, CryptoProfile, CryptoRunner, FsmMap, FsmStore};
use tgate_persistence::{Debouncer, SnapshotStore, FSM_DOC, SIGNAL_DOC, TRADE_DOC};
use tgate_signals::{FilterMode, ModeState, SignalTrackerSet, TrackerEffect};
use tgate_trade::{OrderIntent, TradeEngine, TradeState};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

/// External control inputs (reset endpoints, scheduler).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMsg {
    /// Drop one mode's signal table.
    ClearSignals(FilterMode),
    /// Drop every `BTC*` entry across FSM, signal, and trade state.
    ResetCrypto,
}

/// Main application.
pub struct Application {
    clock: Arc<dyn Clock>,
    store: Arc<FsmStore>,
    broker_runner: BrokerRunner,
    crypto_runners: Vec<CryptoRunner>,
    trackers: SignalTrackerSet,
    engine: TradeEngine,
    snapshots: SnapshotStore,
    debouncer: Debouncer,
    /// Raw webhook / price symbols routed to the crypto runners.
    crypto_symbols: HashSet<Symbol>,
    /// Dirt that survived a not-yet-due debounce window.
    pending_fsm: bool,
    pending_signals: bool,
    pending_trade: bool,
    persist_interval_ms: u64,
}

impl Application {
    pub fn new(
        config: &AppConfig,
        catalog: Arc<InstrumentCatalog>,
        clock: Arc<dyn Clock>,
        orders_tx: mpsc::Sender<OrderIntent>,
    ) -> Self {
        let store = Arc::new(FsmStore::new());
        let broker_runner = BrokerRunner::new(catalog.clone(), store.clone());
        let crypto_runners = vec![
            CryptoRunner::new(CryptoProfile::Long, store.clone()),
            CryptoRunner::new(CryptoProfile::Short, store.clone()),
            CryptoRunner::new(CryptoProfile::Combined, store.clone()),
        ];
        let trackers = SignalTrackerSet::new(catalog.clone());
        let engine = TradeEngine::new(
            catalog.clone(),
            config.capital,
            Decimal::from(config.exit_cost),
            orders_tx,
        );
        let snapshots = SnapshotStore::new(&config.data_dir);
        let crypto_symbols = catalog.crypto_names();

        Self {
            clock,
            store,
            broker_runner,
            crypto_runners,
            trackers,
            engine,
            snapshots,
            debouncer: Debouncer::default(),
            crypto_symbols,
            pending_fsm: false,
            pending_signals: false,
            pending_trade: false,
            persist_interval_ms: config.persist_interval_ms,
        }
    }

    /// Load persisted state into every component. Best-effort: missing
    /// or malformed documents leave the component empty.
    pub fn load_persisted(&mut self) {
        let now = self.clock.now_ms();

        let fsm_map: FsmMap = self.snapshots.load_map(FSM_DOC);
        if !fsm_map.is_empty() {
            info!(symbols = fsm_map.len(), "Restoring FSM snapshots");
            self.broker_runner.restore(&fsm_map);
            for runner in &mut self.crypto_runners {
                runner.restore(&fsm_map);
            }
            self.engine.seed_prev(&fsm_map);
            self.store.update(fsm_map, now);
            self.store.take_dirty();
        }

        let signal_map = self.snapshots.load_map(SIGNAL_DOC);
        if !signal_map.is_empty() {
            self.trackers.restore(signal_map);
        }

        if let Some(trade_state) = self.snapshots.load_value::<TradeState>(TRADE_DOC) {
            info!(
                paper_open = trade_state.paper.open.len(),
                live_open = trade_state.live.open.len(),
                "Restoring trade state"
            );
            self.engine.restore(trade_state);
            self.engine.take_dirty();
        }
    }

    /// Observable FSM snapshot stream.
    pub fn subscribe_fsm(&self) -> watch::Receiver<FsmMap> {
        self.store.subscribe()
    }

    /// Observable trade-state stream.
    pub fn subscribe_trades(&self) -> watch::Receiver<TradeState> {
        self.engine.subscribe()
    }

    /// Observable per-mode signal-state stream.
    pub fn subscribe_signals(&self, mode: FilterMode) -> watch::Receiver<ModeState> {
        self.trackers.tracker(mode).subscribe()
    }

    /// Apply a single bus event through the full dispatch order.
    pub fn handle_event(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::Webhook(stamped) => {
                let now = stamped.received_at_ms;
                let webhook = stamped.event;

                // Runners first, so the trackers and the engine see the
                // post-signal snapshot.
                self.broker_runner.handle_webhook(&webhook, now);
                if self.crypto_symbols.contains(&webhook.symbol) {
                    for runner in &mut self.crypto_runners {
                        runner.handle_webhook(&webhook, now);
                    }
                }

                // All five mode tables update before any downstream
                // consumer observes any of them.
                let effects = self.trackers.apply_webhook(&webhook, &self.store, now);
                self.pending_signals = true;
                self.route_effects(effects, now);

                self.engine.on_snapshot(&self.store.snapshot(), now);
            }
            FeedEvent::Tick(stamped) => {
                let now = stamped.received_at_ms;
                self.broker_runner.handle_tick(&stamped.event, now);
                self.engine.on_snapshot(&self.store.snapshot(), now);
            }
            FeedEvent::Price(stamped) => {
                let now = stamped.received_at_ms;
                if self.crypto_symbols.contains(&stamped.event.symbol) {
                    for runner in &mut self.crypto_runners {
                        runner.handle_price(&stamped.event, now);
                    }
                    self.engine.on_snapshot(&self.store.snapshot(), now);
                }
            }
        }
    }

    /// Route tracker control effects to the owning components.
    fn route_effects(&mut self, effects: Vec<TrackerEffect>, now_ms: i64) {
        for effect in effects {
            match effect {
                TrackerEffect::ResetCumulative { symbol } => {
                    self.engine.reset_cumulative(&symbol);
                }
                TrackerEffect::RearmFsm { symbol, threshold } => {
                    self.broker_runner.rearm(&symbol, threshold, now_ms);
                }
            }
        }
    }

    /// Apply a control input.
    pub fn handle_control(&mut self, msg: ControlMsg) {
        match msg {
            ControlMsg::ClearSignals(mode) => {
                self.trackers.clear(mode);
                self.pending_signals = true;
            }
            ControlMsg::ResetCrypto => {
                info!("Resetting crypto state");
                self.store.clear_prefix("BTC");
                self.broker_runner.clear_prefix("BTC");
                for runner in &mut self.crypto_runners {
                    runner.reset();
                }
                self.trackers.clear_prefix("BTC");
                self.engine.reset_crypto();
                self.pending_fsm = true;
                self.pending_signals = true;
                self.pending_trade = true;
            }
        }
    }

    /// Persist dirty documents, at most once per second each unless
    /// `flush` forces everything out (shutdown).
    pub fn persist_tick(&mut self, flush: bool) {
        let now = self.clock.now_ms();

        self.pending_fsm |= self.store.take_dirty();
        self.pending_trade |= self.engine.take_dirty();

        if self.pending_fsm && (flush || self.debouncer.ready(FSM_DOC, now)) {
            match self.snapshots.save_map(FSM_DOC, &self.store.snapshot()) {
                Ok(()) => {
                    self.debouncer.mark(FSM_DOC, now);
                    self.pending_fsm = false;
                }
                Err(e) => warn!(?e, "FSM snapshot persist failed, will retry"),
            }
        }

        if self.pending_signals && (flush || self.debouncer.ready(SIGNAL_DOC, now)) {
            match self.snapshots.save_map(SIGNAL_DOC, &self.trackers.snapshot()) {
                Ok(()) => {
                    self.debouncer.mark(SIGNAL_DOC, now);
                    self.pending_signals = false;
                }
                Err(e) => warn!(?e, "Signal state persist failed, will retry"),
            }
        }

        if self.pending_trade && (flush || self.debouncer.ready(TRADE_DOC, now)) {
            match self.snapshots.save_value(TRADE_DOC, self.engine.state()) {
                Ok(()) => {
                    self.debouncer.mark(TRADE_DOC, now);
                    self.pending_trade = false;
                }
                Err(e) => warn!(?e, "Trade state persist failed, will retry"),
            }
        }
    }

    /// Run the event loop until shutdown.
    pub async fn run(
        mut self,
        mut events_rx: mpsc::Receiver<FeedEvent>,
        mut control_rx: mpsc::Receiver<ControlMsg>,
    ) -> AppResult<()> {
        info!("Entering main event loop");
        let mut persist_interval =
            tokio::time::interval(Duration::from_millis(self.persist_interval_ms));

        loop {
            tokio::select! {
                Some(event) = events_rx.recv() => {
                    self.handle_event(event);
                }
                Some(msg) = control_rx.recv() => {
                    self.handle_control(msg);
                }
                _ = persist_interval.tick() => {
                    self.persist_tick(false);
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        // Synchronous flush of anything still pending.
        self.persist_tick(true);
        info!("Shutdown complete");
        Ok(())
    }
}
