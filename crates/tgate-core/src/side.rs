//! Signal and order direction.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a signal or order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Returns the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    /// Parse a webhook direction token. `ENTRY` is an alias for `BUY`,
    /// `EXIT` for `SELL`; anything else (PING etc.) carries no direction.
    pub fn from_token(token: &str) -> Option<Self> {
        if token.eq_ignore_ascii_case("BUY") || token.eq_ignore_ascii_case("ENTRY") {
            Some(Self::Buy)
        } else if token.eq_ignore_ascii_case("SELL") || token.eq_ignore_ascii_case("EXIT") {
            Some(Self::Sell)
        } else {
            None
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}
