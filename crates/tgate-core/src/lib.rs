//! Core domain types for the tradegate decision engine.
//!
//! This crate provides the types shared by every component:
//! - `Price`: precision-safe last-traded-price / threshold values
//! - `Side`: signal and order direction
//! - `FsmState`, `FsmSnapshot`: the per-symbol position state machine surface
//! - Inbound event types (`WebhookEvent`, `BrokerTick`, `ExchangePrice`)
//! - `Clock`: wall-clock abstraction plus minute-boundary helpers

pub mod clock;
pub mod error;
pub mod event;
pub mod fsm;
pub mod price;
pub mod side;

pub use clock::{
    ist_time_string, is_minute_start, minute_index, next_minute_start_ms, second_of_minute, Clock,
    ManualClock, WallClock,
};
pub use error::{CoreError, CoreResult};
pub use event::{BrokerTick, ExchangePrice, Stamped, WebhookEvent};
pub use fsm::{FsmSnapshot, FsmState};
pub use price::Price;
pub use side::Side;

/// Canonical symbol key. Broker symbols come from the catalog; crypto
/// synthetic symbols are `BTCUSDT`, `BTCUSDT_LONG`, `BTCUSDT_SHORT`.
pub type Symbol = String;

/// Integer key identifying a broker instrument.
pub type Token = u32;

/// Synthetic symbol for the combined crypto runner.
pub const CRYPTO_COMBINED: &str = "BTCUSDT";
/// Synthetic symbol for the long-only crypto runner.
pub const CRYPTO_LONG: &str = "BTCUSDT_LONG";
/// Synthetic symbol for the short-only crypto runner.
pub const CRYPTO_SHORT: &str = "BTCUSDT_SHORT";
/// Suffix that inverts the P&L delta for short-side synthetic symbols.
pub const SHORT_SUFFIX: &str = "_SHORT";
