//! Tolerant JSON parsers for the three inbound event kinds.
//!
//! Feeds disagree on number formatting (floats vs numeric strings), so
//! price fields accept both. Unknown extra fields are ignored.

use crate::error::{FeedError, FeedResult};
use serde_json::Value;
use tgate_core::{BrokerTick, ExchangePrice, Price, Token, WebhookEvent};

/// Extract a price from a JSON number or numeric string.
fn price_field(value: &Value) -> Option<Price> {
    match value {
        Value::Number(n) => n.as_f64().and_then(Price::from_f64),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Parse a TradingView-style webhook payload.
///
/// Requires a `symbol`; `stoppx`, `intent`, and `side` are optional and
/// any other fields are ignored.
pub fn parse_webhook(data: &Value) -> FeedResult<WebhookEvent> {
    let symbol = data
        .get("symbol")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| FeedError::Malformed("webhook without symbol".to_string()))?;

    Ok(WebhookEvent {
        symbol: symbol.to_string(),
        stop_px: data.get("stoppx").and_then(price_field),
        intent: data
            .get("intent")
            .and_then(Value::as_str)
            .map(str::to_string),
        side: data
            .get("side")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

/// Parse a brokerage tick. Requires `instrument_token` and `last_price`.
pub fn parse_tick(data: &Value) -> FeedResult<BrokerTick> {
    let token = data
        .get("instrument_token")
        .and_then(Value::as_u64)
        .ok_or_else(|| FeedError::Malformed("tick without instrument_token".to_string()))?;

    let last_price = data
        .get("last_price")
        .and_then(price_field)
        .ok_or_else(|| FeedError::Malformed("tick without last_price".to_string()))?;

    Ok(BrokerTick {
        token: token as Token,
        last_price,
    })
}

/// Parse a crypto exchange price update. Requires `symbol` and a numeric
/// `price`; `timestamp` may be a number or a numeric string.
pub fn parse_price(data: &Value) -> FeedResult<ExchangePrice> {
    let symbol = data
        .get("symbol")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| FeedError::Malformed("price without symbol".to_string()))?;

    let price = data
        .get("price")
        .and_then(price_field)
        .ok_or_else(|| FeedError::Malformed("price without number".to_string()))?;

    let timestamp_ms = data.get("timestamp").and_then(|v| match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    });

    Ok(ExchangePrice {
        symbol: symbol.to_string(),
        price,
        timestamp_ms,
    })
}
