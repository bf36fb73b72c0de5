//! Catalog load and lookup.

use crate::error::CatalogResult;
use serde::Deserialize;
use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;
use tgate_core::{Symbol, Token};
use tracing::{info, warn};

/// Raw catalog entry as it appears in the JSON document.
#[derive(Debug, Clone, Deserialize)]
pub struct RawInstrument {
    /// TradingView symbol (webhook key).
    #[serde(default)]
    pub tradingview: Option<String>,
    /// Broker symbol (order and tick key).
    #[serde(default)]
    pub broker_symbol: Option<String>,
    /// Broker instrument token.
    #[serde(default)]
    pub token: Option<Token>,
    /// Exchange segment (e.g. NSE, NFO).
    #[serde(default)]
    pub exchange: Option<String>,
    /// Lot size; entries without one trade in units of 1.
    #[serde(default)]
    pub lot: Option<u32>,
}

impl RawInstrument {
    /// Crypto entries are identified by their well-known names.
    fn is_crypto(&self) -> bool {
        self.tradingview.as_deref() == Some("BTCUSDT")
            || self.broker_symbol.as_deref() == Some("BTCUSD")
    }

    /// Canonical symbol: broker name first, TradingView name otherwise.
    fn canonical(&self) -> Option<&str> {
        self.broker_symbol
            .as_deref()
            .or(self.tradingview.as_deref())
    }
}

/// Immutable instrument catalog.
///
/// Lookup is many-to-one: both the TradingView and the broker symbol of
/// an entry resolve to the same token and lot size.
#[derive(Debug, Default)]
pub struct InstrumentCatalog {
    entries: Vec<RawInstrument>,
    /// tv symbol and broker symbol -> entry index.
    by_symbol: HashMap<Symbol, usize>,
    /// broker token -> entry index.
    by_token: HashMap<Token, usize>,
}

impl InstrumentCatalog {
    /// Build a catalog from parsed entries, preserving document order.
    pub fn from_entries(entries: Vec<RawInstrument>) -> Self {
        let mut by_symbol = HashMap::new();
        let mut by_token = HashMap::new();

        for (idx, entry) in entries.iter().enumerate() {
            if let Some(tv) = &entry.tradingview {
                by_symbol.entry(tv.clone()).or_insert(idx);
            }
            if let Some(broker) = &entry.broker_symbol {
                by_symbol.entry(broker.clone()).or_insert(idx);
            }
            if let Some(token) = entry.token {
                by_token.entry(token).or_insert(idx);
            }
        }

        Self {
            entries,
            by_symbol,
            by_token,
        }
    }

    /// Parse a catalog from a JSON array document.
    pub fn from_json(json: &str) -> CatalogResult<Self> {
        let entries: Vec<RawInstrument> = serde_json::from_str(json)?;
        Ok(Self::from_entries(entries))
    }

    /// Load a catalog file. Best-effort: a missing or malformed document
    /// yields an empty catalog and the system runs degraded.
    pub fn load_or_empty(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let loaded = std::fs::read_to_string(path)
            .map_err(crate::CatalogError::from)
            .and_then(|content| Self::from_json(&content));

        match loaded {
            Ok(catalog) => {
                info!(
                    path = %path.display(),
                    instruments = catalog.entries.len(),
                    "Loaded instrument catalog"
                );
                catalog
            }
            Err(e) => {
                warn!(path = %path.display(), ?e, "Catalog unavailable, starting empty");
                Self::default()
            }
        }
    }

    fn entry_of(&self, symbol: &str) -> Option<&RawInstrument> {
        self.by_symbol.get(symbol).map(|&idx| &self.entries[idx])
    }

    /// Resolve any known symbol (tv or broker) to its canonical form.
    /// Unknown symbols pass through unchanged.
    pub fn resolve_symbol(&self, raw: &str) -> Symbol {
        self.entry_of(raw)
            .and_then(RawInstrument::canonical)
            .unwrap_or(raw)
            .to_string()
    }

    /// Lot size of a symbol, if catalogued.
    pub fn lot_of(&self, symbol: &str) -> Option<u32> {
        self.entry_of(symbol).and_then(|e| e.lot)
    }

    /// Exchange segment of a symbol, if catalogued.
    pub fn exchange_of(&self, symbol: &str) -> Option<&str> {
        self.entry_of(symbol).and_then(|e| e.exchange.as_deref())
    }

    /// Broker token of a symbol, if catalogued.
    pub fn token_of(&self, symbol: &str) -> Option<Token> {
        self.entry_of(symbol).and_then(|e| e.token)
    }

    /// Canonical symbol for a broker token.
    pub fn symbol_of_token(&self, token: Token) -> Option<Symbol> {
        self.by_token
            .get(&token)
            .and_then(|&idx| self.entries[idx].canonical())
            .map(str::to_string)
    }

    /// Whether the symbol belongs to a crypto catalog entry.
    pub fn is_crypto(&self, symbol: &str) -> bool {
        self.entry_of(symbol).is_some_and(RawInstrument::is_crypto)
    }

    /// First `n` non-crypto canonical symbols in document order.
    pub fn broker_top_n(&self, n: usize) -> Vec<Symbol> {
        self.entries
            .iter()
            .filter(|e| !e.is_crypto())
            .filter_map(RawInstrument::canonical)
            .take(n)
            .map(str::to_string)
            .collect()
    }

    /// Union of tv and broker names across crypto entries.
    /// Defaults to `{BTCUSDT}` when the catalog has none.
    pub fn crypto_names(&self) -> HashSet<Symbol> {
        let mut names: HashSet<Symbol> = self
            .entries
            .iter()
            .filter(|e| e.is_crypto())
            .flat_map(|e| {
                e.tradingview
                    .iter()
                    .chain(e.broker_symbol.iter())
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();

        if names.is_empty() {
            names.insert(tgate_core::CRYPTO_COMBINED.to_string());
        }
        names
    }

    /// Number of catalogued instruments.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG_JSON: &str = r#"[
        {"tradingview": "RELIANCE", "broker_symbol": "RELIANCE-EQ", "token": 2885, "exchange": "NSE", "lot": 1},
        {"tradingview": "NIFTYBANK", "broker_symbol": "BANKNIFTY24FUT", "token": 26009, "exchange": "NFO", "lot": 15},
        {"tradingview": "BTCUSDT", "broker_symbol": "BTCUSD", "exchange": "CRYPTO"},
        {"tradingview": "TCS", "broker_symbol": "TCS-EQ", "token": 11536, "exchange": "NSE", "lot": 1},
        {"tradingview": "HDFCBANK", "broker_symbol": "HDFCBANK-EQ", "token": 1333, "exchange": "NSE", "lot": 1},
        {"tradingview": "INFY", "broker_symbol": "INFY-EQ", "token": 408065, "exchange": "NSE", "lot": 1},
        {"tradingview": "SBIN", "broker_symbol": "SBIN-EQ", "token": 779521, "exchange": "NSE", "lot": 1},
        {"tradingview": "ICICIBANK", "broker_symbol": "ICICIBANK-EQ", "token": 341249, "exchange": "NSE", "lot": 1}
    ]"#;

    fn catalog() -> InstrumentCatalog {
        InstrumentCatalog::from_json(CATALOG_JSON).unwrap()
    }

    #[test]
    fn test_many_to_one_resolution() {
        let cat = catalog();
        assert_eq!(cat.resolve_symbol("RELIANCE"), "RELIANCE-EQ");
        assert_eq!(cat.resolve_symbol("RELIANCE-EQ"), "RELIANCE-EQ");
        assert_eq!(cat.token_of("RELIANCE"), Some(2885));
        assert_eq!(cat.token_of("RELIANCE-EQ"), Some(2885));
        assert_eq!(cat.lot_of("NIFTYBANK"), Some(15));
        assert_eq!(cat.lot_of("BANKNIFTY24FUT"), Some(15));
    }

    #[test]
    fn test_unknown_symbol_passthrough() {
        let cat = catalog();
        assert_eq!(cat.resolve_symbol("UNKNOWN"), "UNKNOWN");
        assert_eq!(cat.lot_of("UNKNOWN"), None);
        assert_eq!(cat.exchange_of("UNKNOWN"), None);
    }

    #[test]
    fn test_token_lookup() {
        let cat = catalog();
        assert_eq!(cat.symbol_of_token(26009).as_deref(), Some("BANKNIFTY24FUT"));
        assert_eq!(cat.symbol_of_token(1), None);
    }

    #[test]
    fn test_broker_top_n_excludes_crypto() {
        let cat = catalog();
        let top = cat.broker_top_n(6);
        assert_eq!(
            top,
            vec![
                "RELIANCE-EQ",
                "BANKNIFTY24FUT",
                "TCS-EQ",
                "HDFCBANK-EQ",
                "INFY-EQ",
                "SBIN-EQ"
            ]
        );
        assert!(!top.contains(&"BTCUSD".to_string()));
    }

    #[test]
    fn test_crypto_names() {
        let cat = catalog();
        let names = cat.crypto_names();
        assert!(names.contains("BTCUSDT"));
        assert!(names.contains("BTCUSD"));
        assert!(cat.is_crypto("BTCUSDT"));
        assert!(cat.is_crypto("BTCUSD"));
        assert!(!cat.is_crypto("TCS"));
    }

    #[test]
    fn test_crypto_names_default() {
        let cat = InstrumentCatalog::from_json("[]").unwrap();
        let names = cat.crypto_names();
        assert_eq!(names.len(), 1);
        assert!(names.contains("BTCUSDT"));
    }

    #[test]
    fn test_malformed_catalog_yields_empty() {
        let cat = InstrumentCatalog::load_or_empty("/nonexistent/catalog.json");
        assert!(cat.is_empty());
        assert_eq!(cat.broker_top_n(6).len(), 0);
    }
}
