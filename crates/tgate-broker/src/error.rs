//! Broker sink error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Order rejected: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

pub type BrokerResult<T> = Result<T, BrokerError>;
