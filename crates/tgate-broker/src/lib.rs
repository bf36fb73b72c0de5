//! Outbound broker order sink.
//!
//! Translates live-trade order intents into broker HTTP requests.
//! Crypto symbols never leave the process; failures are logged and
//! never retried or rolled back.

pub mod client;
pub mod error;
pub mod order;

pub use client::BrokerSink;
pub use error::{BrokerError, BrokerResult};
pub use order::OrderRequest;
