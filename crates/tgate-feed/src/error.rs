//! Feed error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Malformed input: {0}")]
    Malformed(String),

    #[error("Bus closed")]
    BusClosed,
}

pub type FeedResult<T> = Result<T, FeedError>;
