//! In-memory store, used by tests and `run --memory`

use super::{Store, Write};
use crate::error::Result;
use crate::types::{ResultTally, RoundSettings, User, UserId, WinnerSet};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
struct Records {
    users: BTreeMap<UserId, User>,
    settings: Option<RoundSettings>,
    tally: Option<ResultTally>,
    winners: Option<WinnerSet>,
}

/// Store backed by a single lock; a commit is one critical section.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<Records>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_user(&self, user_id: UserId) -> Result<Option<User>> {
        Ok(self.records.read().users.get(&user_id).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.records.read().users.values().cloned().collect())
    }

    async fn settings(&self) -> Result<Option<RoundSettings>> {
        Ok(self.records.read().settings.clone())
    }

    async fn tally(&self) -> Result<Option<ResultTally>> {
        Ok(self.records.read().tally)
    }

    async fn winners(&self) -> Result<Option<WinnerSet>> {
        Ok(self.records.read().winners.clone())
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<()> {
        let mut records = self.records.write();
        for write in writes {
            match write {
                Write::User(user) => {
                    records.users.insert(user.user_id, user);
                }
                Write::Settings(settings) => records.settings = Some(settings),
                Write::Tally(tally) => records.tally = Some(tally),
                Write::Winners(winners) => records.winners = Some(winners),
            }
        }
        Ok(())
    }
}
