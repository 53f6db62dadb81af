//! Persistence
//!
//! The round engine only sees the `Store` trait: keyed user records plus
//! three singletons. Writes touching more than one record go through
//! `commit`, which implementations apply atomically.

mod memory;
mod sqlite;


pub use memory::MemoryStore;
pub use sqlite::Database;

use crate::error::Result;
use crate::types::{ResultTally, RoundSettings, User, UserId, WinnerSet};
use async_trait::async_trait;

/// A single record write
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    User(User),
    Settings(RoundSettings),
    Tally(ResultTally),
    Winners(WinnerSet),
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn get_user(&self, user_id: UserId) -> Result<Option<User>>;

    /// All users ordered by id
    async fn list_users(&self) -> Result<Vec<User>>;

    /// `None` until the first settings write
    async fn settings(&self) -> Result<Option<RoundSettings>>;

    async fn tally(&self) -> Result<Option<ResultTally>>;

    async fn winners(&self) -> Result<Option<WinnerSet>>;

    /// Apply every write or none of them.
    async fn commit(&self, writes: Vec<Write>) -> Result<()>;
}
