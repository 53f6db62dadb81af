//! Round-wide singletons: settings, result tally and winner set

use crate::error::{Result, RoundError};
use crate::storage::Store;
use crate::types::{ResultTally, RoundSettings, WinnerSet};
use std::sync::Arc;

impl RoundSettings {
    /// Take one slot for an approved bet.
    pub fn claim_slot(&mut self) -> std::result::Result<(), RoundError> {
        if self.available_slots == 0 {
            return Err(RoundError::SlotsFull);
        }
        self.available_slots -= 1;
        Ok(())
    }

    pub fn restore_slots(&mut self) {
        self.available_slots = self.total_slots;
    }

    /// Change capacity, freeing every slot.
    pub fn resize(&mut self, total_slots: u32) {
        self.total_slots = total_slots;
        self.available_slots = total_slots;
    }

    pub fn has_free_slot(&self) -> bool {
        self.available_slots > 0
    }
}

/// Reads the singletons, filling in defaults for anything never written.
#[derive(Clone)]
pub struct SettingsStore {
    store: Arc<dyn Store>,
    default_total_slots: u32,
}

impl SettingsStore {
    pub fn new(store: Arc<dyn Store>, default_total_slots: u32) -> Self {
        Self {
            store,
            default_total_slots,
        }
    }

    pub async fn settings(&self) -> Result<RoundSettings> {
        Ok(self
            .store
            .settings()
            .await?
            .unwrap_or_else(|| RoundSettings::with_capacity(self.default_total_slots)))
    }

    pub async fn tally(&self) -> Result<ResultTally> {
        Ok(self.store.tally().await?.unwrap_or_default())
    }

    pub async fn winners(&self) -> Result<WinnerSet> {
        Ok(self.store.winners().await?.unwrap_or_default())
    }
}
