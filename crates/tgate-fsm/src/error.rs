//! FSM error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsmError {
    #[error("Unknown instrument token: {0}")]
    UnknownToken(u32),

    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),
}

pub type FsmResult<T> = Result<T, FsmError>;
