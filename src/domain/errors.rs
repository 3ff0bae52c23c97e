// src/domain/errors.rs
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("Trading error: {0}")]
    Trading(#[from] TradingError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<String> for AppError {
    fn from(s: String) -> Self {
        AppError::Unknown(s)
    }
}

/// Failures of a remote venue call (orders, prices, accounts).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExchangeError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Order error: {0}")]
    Order(String),

    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("Account error: {0}")]
    Account(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Response parse error: {0}")]
    Parse(String),
}

impl ExchangeError {
    /// Whether a session refresh could make a retry succeed.
    pub fn is_auth(&self) -> bool {
        matches!(self, ExchangeError::Authentication(_))
    }
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt store {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Error, Debug)]
pub enum TradingError {
    #[error("Symbol resolution error: {0}")]
    Resolution(String),

    #[error("Order execution error: {0}")]
    OrderExecution(String),

    #[error("Invalid signal: {0}")]
    InvalidSignal(String),

    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;
pub type ExchangeResult<T> = Result<T, ExchangeError>;
pub type TradingResult<T> = Result<T, TradingError>;
pub type PersistenceResult<T> = Result<T, PersistenceError>;
