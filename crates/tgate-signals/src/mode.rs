//! Filter modes and their symbol scoping.

use crate::error::{SignalError, SignalResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tgate_catalog::InstrumentCatalog;
use tgate_core::{Symbol, CRYPTO_COMBINED, CRYPTO_LONG, CRYPTO_SHORT, Side};

/// Number of broker instruments tracked by the broker-6 mode.
pub const BROKER_MODE_SYMBOLS: usize = 6;

/// A named signal profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterMode {
    None,
    Broker6,
    Crypto,
    CryptoLong,
    CryptoShort,
}

impl FilterMode {
    /// Every mode, in fan-out order.
    pub const ALL: [FilterMode; 5] = [
        FilterMode::None,
        FilterMode::Broker6,
        FilterMode::Crypto,
        FilterMode::CryptoLong,
        FilterMode::CryptoShort,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Broker6 => "broker6",
            Self::Crypto => "crypto",
            Self::CryptoLong => "crypto-long",
            Self::CryptoShort => "crypto-short",
        }
    }

    pub fn from_name(name: &str) -> SignalResult<Self> {
        match name {
            "none" => Ok(Self::None),
            "broker6" => Ok(Self::Broker6),
            "crypto" => Ok(Self::Crypto),
            "crypto-long" => Ok(Self::CryptoLong),
            "crypto-short" => Ok(Self::CryptoShort),
            other => Err(SignalError::UnknownMode(other.to_string())),
        }
    }

    /// Canonicalize a raw webhook symbol to this mode's table key.
    pub fn map_symbol(&self, raw: &str, catalog: &InstrumentCatalog) -> Symbol {
        match self {
            Self::Broker6 => catalog.resolve_symbol(raw),
            Self::CryptoLong if is_crypto_alias(raw) => CRYPTO_LONG.to_string(),
            Self::CryptoShort if is_crypto_alias(raw) => CRYPTO_SHORT.to_string(),
            _ => raw.to_string(),
        }
    }

    /// Which signal directions this mode records.
    pub fn accepts(&self, side: Side) -> bool {
        match self {
            Self::CryptoLong => side == Side::Buy,
            Self::CryptoShort => side == Side::Sell,
            _ => true,
        }
    }

    /// Build this mode's allow-set from the catalog.
    pub fn allow_set(&self, catalog: &InstrumentCatalog) -> AllowSet {
        match self {
            Self::None => AllowSet::All,
            Self::Broker6 => AllowSet::Canonical(
                catalog
                    .broker_top_n(BROKER_MODE_SYMBOLS)
                    .into_iter()
                    .collect(),
            ),
            Self::Crypto | Self::CryptoLong | Self::CryptoShort => {
                AllowSet::Raw(catalog.crypto_names())
            }
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn is_crypto_alias(raw: &str) -> bool {
    raw == CRYPTO_COMBINED || raw == "BTCUSD"
}

/// Which symbols a mode records.
#[derive(Debug, Clone)]
pub enum AllowSet {
    /// Every symbol.
    All,
    /// Matched against the mode-mapped canonical symbol.
    Canonical(HashSet<Symbol>),
    /// Matched against the raw webhook symbol.
    Raw(HashSet<Symbol>),
}

impl AllowSet {
    pub fn allows(&self, raw: &str, mapped: &str) -> bool {
        match self {
            Self::All => true,
            Self::Canonical(set) => set.contains(mapped),
            Self::Raw(set) => set.contains(raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> InstrumentCatalog {
        InstrumentCatalog::from_json(
            r#"[
                {"tradingview": "RELIANCE", "broker_symbol": "RELIANCE-EQ", "token": 1, "exchange": "NSE", "lot": 1},
                {"tradingview": "TCS", "broker_symbol": "TCS-EQ", "token": 2, "exchange": "NSE", "lot": 1},
                {"tradingview": "BTCUSDT", "broker_symbol": "BTCUSD", "exchange": "CRYPTO"}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_mode_names_roundtrip() {
        for mode in FilterMode::ALL {
            assert_eq!(FilterMode::from_name(mode.name()).unwrap(), mode);
        }
        assert!(FilterMode::from_name("bogus").is_err());
    }

    #[test]
    fn test_symbol_mapping() {
        let cat = catalog();
        assert_eq!(FilterMode::Broker6.map_symbol("RELIANCE", &cat), "RELIANCE-EQ");
        assert_eq!(FilterMode::CryptoLong.map_symbol("BTCUSDT", &cat), CRYPTO_LONG);
        assert_eq!(FilterMode::CryptoLong.map_symbol("BTCUSD", &cat), CRYPTO_LONG);
        assert_eq!(FilterMode::CryptoShort.map_symbol("BTCUSDT", &cat), CRYPTO_SHORT);
        assert_eq!(FilterMode::None.map_symbol("RELIANCE", &cat), "RELIANCE");
        assert_eq!(FilterMode::Crypto.map_symbol("BTCUSDT", &cat), "BTCUSDT");
    }

    #[test]
    fn test_signal_filters() {
        assert!(FilterMode::CryptoLong.accepts(Side::Buy));
        assert!(!FilterMode::CryptoLong.accepts(Side::Sell));
        assert!(!FilterMode::CryptoShort.accepts(Side::Buy));
        assert!(FilterMode::CryptoShort.accepts(Side::Sell));
        assert!(FilterMode::Broker6.accepts(Side::Buy));
        assert!(FilterMode::Broker6.accepts(Side::Sell));
    }

    #[test]
    fn test_allow_sets() {
        let cat = catalog();

        let none = FilterMode::None.allow_set(&cat);
        assert!(none.allows("ANYTHING", "ANYTHING"));

        let broker = FilterMode::Broker6.allow_set(&cat);
        assert!(broker.allows("RELIANCE", "RELIANCE-EQ"));
        assert!(!broker.allows("BTCUSDT", "BTCUSD"));

        let crypto = FilterMode::Crypto.allow_set(&cat);
        assert!(crypto.allows("BTCUSDT", "BTCUSDT"));
        assert!(crypto.allows("BTCUSD", "BTCUSD"));
        assert!(!crypto.allows("RELIANCE", "RELIANCE-EQ"));
    }
}
