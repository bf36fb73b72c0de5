//! Trade engine error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TradeError {
    #[error("Order channel full, intent dropped: {0}")]
    OrderChannelFull(String),
}

pub type TradeResult<T> = Result<T, TradeError>;
