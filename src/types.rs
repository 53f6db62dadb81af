//! Core types shared by the round engine, storage and transport

use crate::error::RoundError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque chat-platform user id
pub type UserId = i64;

/// Hard cap on payment proofs a user may submit per bet
pub const MAX_PAYMENT_ATTEMPTS: u32 = 3;

/// Coin side a user bets on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Heads,
    Tails,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Heads, Side::Tails];

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Heads => "heads",
            Side::Tails => "tails",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Heads => write!(f, "HEADS"),
            Side::Tails => write!(f, "TAILS"),
        }
    }
}

impl FromStr for Side {
    type Err = RoundError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "heads" => Ok(Side::Heads),
            "tails" => Ok(Side::Tails),
            _ => Err(RoundError::InvalidSide),
        }
    }
}

/// Review state of a user's payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetStatus {
    /// Proof submitted, operator has not reviewed it yet
    Waiting,
    Approved,
    Disapproved,
}

impl BetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BetStatus::Waiting => "waiting",
            BetStatus::Approved => "approved",
            BetStatus::Disapproved => "disapproved",
        }
    }
}

impl fmt::Display for BetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BetStatus {
    type Err = RoundError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(BetStatus::Waiting),
            "approved" => Ok(BetStatus::Approved),
            "disapproved" => Ok(BetStatus::Disapproved),
            other => Err(RoundError::InvalidInput(format!("unknown status: {}", other))),
        }
    }
}

/// A registered participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,
    pub name: String,
    pub bet: Option<Side>,
    pub status: Option<BetStatus>,
    pub payment_attempts: u32,
    pub registered_at: DateTime<Utc>,
}

impl User {
    pub fn new(user_id: UserId, name: impl Into<String>) -> Self {
        Self {
            user_id,
            name: name.into(),
            bet: None,
            status: None,
            payment_attempts: 0,
            registered_at: Utc::now(),
        }
    }

    pub fn has_bet(&self) -> bool {
        self.bet.is_some()
    }

    pub fn is_approved(&self) -> bool {
        self.status == Some(BetStatus::Approved)
    }
}

/// Round-wide settings singleton
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSettings {
    pub betting_open: bool,
    pub total_slots: u32,
    /// Remaining approved-bet capacity, always within `0..=total_slots`
    pub available_slots: u32,
    pub next_betting_time: Option<String>,
    pub result_announcement_time: Option<String>,
}

impl RoundSettings {
    /// Fresh settings: betting closed, every slot free, nothing scheduled.
    pub fn with_capacity(total_slots: u32) -> Self {
        Self {
            betting_open: false,
            total_slots,
            available_slots: total_slots,
            next_betting_time: None,
            result_announcement_time: None,
        }
    }
}

/// Cumulative count of declared outcomes since the last reset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultTally {
    pub heads_wins: u32,
    pub tails_wins: u32,
}

impl ResultTally {
    pub fn record(&mut self, side: Side) {
        match side {
            Side::Heads => self.heads_wins += 1,
            Side::Tails => self.tails_wins += 1,
        }
    }

    pub fn wins(&self, side: Side) -> u32 {
        match side {
            Side::Heads => self.heads_wins,
            Side::Tails => self.tails_wins,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.heads_wins == 0 && self.tails_wins == 0
    }
}

/// Winners computed by the latest declaration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinnerSet {
    pub declared_side: Option<Side>,
    pub user_ids: Vec<UserId>,
}

impl WinnerSet {
    pub fn contains(&self, user_id: UserId) -> bool {
        self.user_ids.contains(&user_id)
    }

    pub fn is_empty(&self) -> bool {
        self.user_ids.is_empty()
    }
}

/// Authenticated sender of an inbound event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub name: String,
    /// Chat the event came from; replies go here
    pub chat_id: i64,
}

impl Caller {
    /// Caller in a private chat, where chat id and user id coincide.
    pub fn private(user_id: UserId, name: impl Into<String>) -> Self {
        Self {
            user_id,
            name: name.into(),
            chat_id: user_id,
        }
    }
}

/// Reference to the chat message carrying a payment screenshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentProof {
    pub chat_id: i64,
    pub message_id: i64,
}
