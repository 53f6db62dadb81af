//! Error types
//!
//! `RoundError` covers every caller-facing rule violation of the round
//! state machine. It is always reported back to the caller and never
//! leaves a partial state change behind. `BotError` wraps it together with
//! the infrastructure failures (storage, transport, configuration).

use crate::types::UserId;
use thiserror::Error;

/// Rule violations of the betting round
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoundError {
    #[error("user is not registered, send /start first")]
    NotRegistered,

    #[error("betting is currently closed")]
    RoundClosed,

    #[error("all slots are taken")]
    SlotsFull,

    #[error("a bet has already been placed this round")]
    AlreadyBet,

    #[error("no bet has been placed")]
    NoBetPlaced,

    #[error("maximum payment attempts reached")]
    AttemptsExceeded,

    #[error("caller is not the operator")]
    Unauthorized,

    #[error("user {0} not found")]
    UserNotFound(UserId),

    #[error("user {0} is already approved")]
    AlreadyApproved(UserId),

    #[error("side must be heads or tails")]
    InvalidSide,

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Crate-wide error
#[derive(Debug, Error)]
pub enum BotError {
    #[error(transparent)]
    Round(#[from] RoundError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telegram API error: {0}")]
    Telegram(String),

    #[error("Delivery to {recipient} timed out")]
    Timeout { recipient: UserId },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BotError {
    /// The round rule that was violated, if this is a caller-facing error.
    pub fn as_round(&self) -> Option<&RoundError> {
        match self {
            BotError::Round(e) => Some(e),
            _ => None,
        }
    }
}

impl From<config::ConfigError> for BotError {
    fn from(e: config::ConfigError) -> Self {
        BotError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
