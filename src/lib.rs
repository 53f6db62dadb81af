//! Heads/Tails Betting Round Coordinator
//!
//! A Telegram bot that runs round-based coin-flip betting with manual
//! payment review.
//!
//! ## Architecture
//!
//! ```text
//! Telegram (getUpdates) → InboundEvent channel → CommandHandler → RoundEngine
//!                                                                  ↓        ↓
//!                                                   SettingsStore/UserLedger  NotificationFanout
//!                                                                  ↓        ↓
//!                                                        Store (SQLite)   Messenger (Bot API)
//! ```

pub mod config;
pub mod error;
pub mod monitor;
pub mod notify;
pub mod round;
pub mod storage;
pub mod telegram;
pub mod testing;
pub mod types;

#[cfg(test)]
mod types_tests;
