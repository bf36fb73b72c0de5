//! Outbound order payload.

use serde::Serialize;
use tgate_catalog::InstrumentCatalog;
use tgate_trade::{OrderIntent, OrderKind};

/// Broker order request body.
///
/// CLOSE intents invert the transaction side so the order flattens the
/// live position.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub symbol: String,
    pub exchange: String,
    pub transaction_type: String,
    pub quantity: u64,
    pub product: String,
    pub validity: String,
    pub order_type: String,
    pub side_offset: f64,
    pub dry_run: bool,
}

impl OrderRequest {
    /// Build the broker payload for an intent.
    ///
    /// Returns `None` for crypto symbols (no outbound order) and for
    /// symbols the catalog cannot place on an exchange.
    pub fn from_intent(intent: &OrderIntent, catalog: &InstrumentCatalog) -> Option<Self> {
        if intent.symbol.starts_with("BTC") || catalog.is_crypto(&intent.symbol) {
            return None;
        }
        let exchange = catalog.exchange_of(&intent.symbol)?;

        let side = match intent.kind {
            OrderKind::Open => intent.side,
            OrderKind::Close => intent.side.opposite(),
        };

        Some(Self {
            symbol: intent.symbol.clone(),
            exchange: exchange.to_string(),
            transaction_type: side.to_string(),
            quantity: intent.quantity,
            product: "MIS".to_string(),
            validity: "DAY".to_string(),
            order_type: "LIMIT".to_string(),
            side_offset: 0.5,
            dry_run: false,
        })
    }
}
