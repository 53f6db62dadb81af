//! Per-user records and their transitions
//!
//! The transitions on `User` are pure: they validate and mutate a single
//! record. Persisting the result is the engine's job.

use crate::error::{Result, RoundError};
use crate::storage::Store;
use crate::types::{BetStatus, Side, User, UserId, MAX_PAYMENT_ATTEMPTS};
use std::sync::Arc;

/// Accepted payment proof
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentReceipt {
    /// 1-based number of this submission
    pub attempt: u32,
    /// No further submissions will be accepted for this bet
    pub final_attempt: bool,
}

impl User {
    pub fn place_bet(&mut self, side: Side) -> std::result::Result<(), RoundError> {
        if self.bet.is_some() {
            return Err(RoundError::AlreadyBet);
        }
        self.bet = Some(side);
        Ok(())
    }

    pub fn record_payment(&mut self) -> std::result::Result<PaymentReceipt, RoundError> {
        if self.bet.is_none() {
            return Err(RoundError::NoBetPlaced);
        }
        if self.payment_attempts >= MAX_PAYMENT_ATTEMPTS {
            return Err(RoundError::AttemptsExceeded);
        }
        self.status = Some(BetStatus::Waiting);
        self.payment_attempts += 1;
        Ok(PaymentReceipt {
            attempt: self.payment_attempts,
            final_attempt: self.payment_attempts == MAX_PAYMENT_ATTEMPTS,
        })
    }

    /// Does not touch capacity; the caller claims the slot.
    pub fn approve(&mut self) -> std::result::Result<(), RoundError> {
        if self.bet.is_none() {
            return Err(RoundError::NoBetPlaced);
        }
        if self.is_approved() {
            return Err(RoundError::AlreadyApproved(self.user_id));
        }
        self.status = Some(BetStatus::Approved);
        self.payment_attempts = 0;
        Ok(())
    }

    pub fn disapprove(&mut self) {
        self.status = Some(BetStatus::Disapproved);
        self.payment_attempts = 0;
    }

    /// Forget this round's bet. Returns false if there was nothing to clear.
    pub fn clear(&mut self) -> bool {
        if self.bet.is_none() {
            return false;
        }
        self.bet = None;
        self.status = None;
        self.payment_attempts = 0;
        true
    }
}

/// Lookup side of the user records
#[derive(Clone)]
pub struct UserLedger {
    store: Arc<dyn Store>,
}

impl UserLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn get(&self, user_id: UserId) -> Result<Option<User>> {
        self.store.get_user(user_id).await
    }

    /// The caller's own record.
    pub async fn require(&self, user_id: UserId) -> Result<User> {
        self.get(user_id).await?.ok_or_else(|| RoundError::NotRegistered.into())
    }

    /// A record named by the operator.
    pub async fn find(&self, user_id: UserId) -> Result<User> {
        self.get(user_id).await?.ok_or_else(|| RoundError::UserNotFound(user_id).into())
    }

    pub async fn all(&self) -> Result<Vec<User>> {
        self.store.list_users().await
    }

    pub async fn filter(&self, keep: impl Fn(&User) -> bool) -> Result<Vec<User>> {
        Ok(self.all().await?.into_iter().filter(|u| keep(u)).collect())
    }

    pub async fn ids(&self) -> Result<Vec<UserId>> {
        Ok(self.all().await?.iter().map(|u| u.user_id).collect())
    }
}
