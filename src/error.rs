use thiserror::Error;

use crate::domain::error::DomainError;
use crate::domain::{OptionId, WagerId, WagerState};

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

/// Business-rule rejections raised by the wagering service.
///
/// Every variant except [`WagerError::Storage`] describes a request the
/// caller made that the rules do not allow. `Storage` wraps infrastructure
/// failures bubbling up from the persistence layer.
#[derive(Error, Debug)]
pub enum WagerError {
    #[error("validation failed: {reason}")]
    Validation { reason: String },

    #[error("group wager {wager_id} not found")]
    WagerNotFound { wager_id: WagerId },

    #[error("option {option_id} not found on group wager {wager_id}")]
    OptionNotFound {
        wager_id: WagerId,
        option_id: OptionId,
    },

    #[error("group wager {wager_id} is {state} and cannot be {operation}")]
    InvalidState {
        wager_id: WagerId,
        state: WagerState,
        operation: &'static str,
    },

    #[error("insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance { available: i64, requested: i64 },

    #[error("group wager {wager_id} is not accepting bets")]
    NotAcceptingBets { wager_id: WagerId },

    #[error(transparent)]
    Storage(#[from] Error),
}

impl WagerError {
    /// Whether this error is a rule rejection rather than an
    /// infrastructure failure. Rejections are answered to the caller;
    /// infrastructure failures are retried or alerted on.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        !matches!(self, WagerError::Storage(_))
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("{0} requires a guild-scoped unit of work")]
    Scope(&'static str),

    #[error("parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, Error>;
