//! error types for the wta module

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // === validation errors (rejected at the boundary, never committed) ===
    #[error("invalid tickets quantity: {0}")]
    InvalidQuantity(u64),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid coin: {0}")]
    InvalidCoin(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("invalid ticket: {0}")]
    InvalidTicket(String),

    #[error("invalid draw: {0}")]
    InvalidDraw(String),

    #[error("invalid genesis: {0}")]
    InvalidGenesis(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("ticket id duplicated: {0}")]
    DuplicateTicketId(String),

    #[error("draw closed at {0}, waiting for the next draw to open")]
    DrawClosed(String),

    #[error("arithmetic overflow: {0}")]
    Overflow(String),

    // === funds ===
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    // === fatal errors (corrupted state or programming bug) ===
    #[error("storage error: {0}")]
    Store(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupted state: {0}")]
    Corrupted(String),
}

impl Error {
    /// Fatal errors must halt the enclosing block instead of being reported
    /// back to a transaction sender.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Store(_) | Error::Serialization(_) | Error::Corrupted(_)
        )
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
