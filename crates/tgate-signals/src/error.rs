//! Signal tracker error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("Unknown filter mode: {0}")]
    UnknownMode(String),
}

pub type SignalResult<T> = Result<T, SignalError>;
