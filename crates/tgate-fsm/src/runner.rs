//! FSM runners.
//!
//! A runner owns the machines for its symbols and is the only writer of
//! those entries in the shared store. The broker runner keys machines by
//! broker symbol and resolves ticks through the instrument catalog; the
//! crypto runners drive one synthetic symbol each off the exchange price
//! stream.

use crate::machine::{InstrumentFsm, TickOutcome};
use crate::store::FsmStore;
use std::collections::HashMap;
use std::sync::Arc;
use tgate_catalog::InstrumentCatalog;
use tgate_core::{
    BrokerTick, ExchangePrice, FsmSnapshot, Price, Side, Symbol, WebhookEvent, CRYPTO_COMBINED,
    CRYPTO_LONG, CRYPTO_SHORT,
};
use tgate_telemetry::LogThrottle;
use tracing::{debug, warn};

/// Interval for per-symbol "stuck" diagnostics.
const STUCK_LOG_INTERVAL_MS: i64 = 10_000;

/// Runner for catalogued broker instruments.
///
/// Accepts both signal directions, retains position state across
/// mid-position signals, and enters the side of the last signal.
pub struct BrokerRunner {
    catalog: Arc<InstrumentCatalog>,
    store: Arc<FsmStore>,
    fsms: HashMap<Symbol, InstrumentFsm>,
    stuck: LogThrottle,
}

impl BrokerRunner {
    pub fn new(catalog: Arc<InstrumentCatalog>, store: Arc<FsmStore>) -> Self {
        Self {
            catalog,
            store,
            fsms: HashMap::new(),
            stuck: LogThrottle::new(STUCK_LOG_INTERVAL_MS),
        }
    }

    /// Adopt persisted snapshots for catalogued broker symbols.
    pub fn restore(&mut self, snapshots: &HashMap<Symbol, FsmSnapshot>) {
        for (symbol, snap) in snapshots {
            if self.catalog.token_of(symbol).is_some() {
                self.fsms
                    .insert(symbol.clone(), InstrumentFsm::from_snapshot(snap));
            }
        }
    }

    /// Apply a webhook signal. Returns the canonical symbol when the
    /// signal was applied.
    pub fn handle_webhook(&mut self, event: &WebhookEvent, now_ms: i64) -> Option<Symbol> {
        let direction = event.direction()?;
        let symbol = self.catalog.resolve_symbol(&event.symbol);
        if self.catalog.token_of(&symbol).is_none() {
            if self.stuck.should_log(&symbol, now_ms) {
                debug!(symbol = %symbol, "Webhook for uncatalogued instrument dropped");
            }
            return None;
        }

        let last_price = self.store.last_price(&symbol);
        let fsm = self.fsms.entry(symbol.clone()).or_default();
        fsm.apply_signal(direction, event.stop_px, last_price, now_ms, true);

        self.publish(&symbol, now_ms);
        Some(symbol)
    }

    /// Apply a brokerage tick.
    pub fn handle_tick(&mut self, tick: &BrokerTick, now_ms: i64) {
        let Some(symbol) = self.catalog.symbol_of_token(tick.token) else {
            if self.stuck.should_log(&tick.token.to_string(), now_ms) {
                warn!(token = tick.token, "Tick for unknown token dropped");
            }
            return;
        };

        let fsm = self.fsms.entry(symbol.clone()).or_default();
        let entry = fsm.last_signal.unwrap_or(Side::Buy);
        let outcome = fsm.apply_tick(tick.last_price, now_ms, entry);

        if outcome == TickOutcome::MissingPrerequisite && self.stuck.should_log(&symbol, now_ms) {
            debug!(symbol = %symbol, "Tick before signal; waiting for threshold");
        }

        self.publish(&symbol, now_ms);
    }

    /// Re-arm a symbol at the given threshold (buy-sell-sell control
    /// message from the signal tracker).
    pub fn rearm(&mut self, symbol: &str, threshold: Price, now_ms: i64) {
        let fsm = self.fsms.entry(symbol.to_string()).or_default();
        fsm.apply_signal(Side::Buy, Some(threshold), None, now_ms, false);
        self.publish(symbol, now_ms);
    }

    /// Drop machines whose symbol starts with `prefix`.
    pub fn clear_prefix(&mut self, prefix: &str) {
        self.fsms.retain(|symbol, _| !symbol.starts_with(prefix));
    }

    fn publish(&self, symbol: &str, now_ms: i64) {
        if let Some(fsm) = self.fsms.get(symbol) {
            self.store
                .update([(symbol.to_string(), fsm.snapshot())], now_ms);
        }
    }
}

/// Which synthetic crypto symbol a runner drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoProfile {
    /// `BTCUSDT_LONG`: BUY signals only, enters long.
    Long,
    /// `BTCUSDT_SHORT`: SELL signals only, enters short.
    Short,
    /// `BTCUSDT`: both directions, generic long entry.
    Combined,
}

impl CryptoProfile {
    /// The synthetic symbol this profile writes.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Long => CRYPTO_LONG,
            Self::Short => CRYPTO_SHORT,
            Self::Combined => CRYPTO_COMBINED,
        }
    }

    /// Which signal directions the profile accepts.
    fn accepts(&self, side: Side) -> bool {
        match self {
            Self::Long => side == Side::Buy,
            Self::Short => side == Side::Sell,
            Self::Combined => true,
        }
    }

    /// Position state a favorable evaluation enters.
    fn entry_side(&self) -> Side {
        match self {
            Self::Short => Side::Sell,
            Self::Long | Self::Combined => Side::Buy,
        }
    }
}

/// Runner for one synthetic crypto symbol.
pub struct CryptoRunner {
    profile: CryptoProfile,
    store: Arc<FsmStore>,
    fsm: InstrumentFsm,
    stuck: LogThrottle,
}

impl CryptoRunner {
    pub fn new(profile: CryptoProfile, store: Arc<FsmStore>) -> Self {
        Self {
            profile,
            store,
            fsm: InstrumentFsm::default(),
            stuck: LogThrottle::new(STUCK_LOG_INTERVAL_MS),
        }
    }

    /// Adopt a persisted snapshot for this runner's symbol.
    pub fn restore(&mut self, snapshots: &HashMap<Symbol, FsmSnapshot>) {
        if let Some(snap) = snapshots.get(self.profile.symbol()) {
            self.fsm = InstrumentFsm::from_snapshot(snap);
        }
    }

    /// Apply a webhook signal addressed to the crypto feed.
    /// Returns true when the profile accepted the signal.
    pub fn handle_webhook(&mut self, event: &WebhookEvent, now_ms: i64) -> bool {
        let Some(direction) = event.direction() else {
            return false;
        };
        if !self.profile.accepts(direction) {
            return false;
        }

        let last_price = self
            .fsm
            .ltp
            .or_else(|| self.store.last_price(self.profile.symbol()));
        self.fsm
            .apply_signal(direction, event.stop_px, last_price, now_ms, false);
        self.publish(now_ms);
        true
    }

    /// Apply an exchange price update.
    pub fn handle_price(&mut self, price: &ExchangePrice, now_ms: i64) {
        let outcome = self
            .fsm
            .apply_tick(price.price, now_ms, self.profile.entry_side());

        if outcome == TickOutcome::MissingPrerequisite
            && self.stuck.should_log(self.profile.symbol(), now_ms)
        {
            debug!(symbol = %self.profile.symbol(), "Price before signal; waiting for threshold");
        }

        self.publish(now_ms);
    }

    /// Forget this runner's machine (crypto reset).
    pub fn reset(&mut self) {
        self.fsm = InstrumentFsm::default();
    }

    fn publish(&self, now_ms: i64) {
        self.store.update(
            [(self.profile.symbol().to_string(), self.fsm.snapshot())],
            now_ms,
        );
    }
}
