//! Round lifecycle and slot allocation
//!
//! `RoundEngine` owns every state transition of a betting round:
//!
//! ```text
//! register → place_bet → submit_payment (≤3) → approve / disapprove
//!                                                  ↓
//!                            declare → winners, slots restored
//!                                                  ↓
//!                                  reset_round → next round
//! ```
//!
//! Mutations are serialized behind a single write gate and persisted with
//! one `Store::commit` each, so a rejected command never leaves a partial
//! change and capacity can never be oversold. Notifications are sent after
//! the state change and are best-effort.

pub mod ledger;
pub mod settings;

#[cfg(test)]
mod tests;

pub use ledger::{PaymentReceipt, UserLedger};
pub use settings::SettingsStore;

use crate::config::Config;
use crate::error::{Result, RoundError};
use crate::notify::{messages, FanoutReport, Messenger, NotificationFanout};
use crate::storage::{Store, Write};
use crate::types::{
    BetStatus, Caller, PaymentProof, ResultTally, RoundSettings, Side, User, UserId, WinnerSet,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct Registration {
    pub user: User,
    pub newly_registered: bool,
}

#[derive(Debug, Clone)]
pub struct Approval {
    pub user: User,
    pub available_slots: u32,
    pub total_slots: u32,
}

#[derive(Debug, Clone)]
pub struct Declaration {
    pub side: Side,
    pub tally: ResultTally,
    pub winners: WinnerSet,
    pub report: FanoutReport,
}

#[derive(Debug, Clone)]
pub struct ResetSummary {
    pub users_cleared: usize,
    pub report: FanoutReport,
}

#[derive(Debug, Clone)]
pub struct BroadcastSummary {
    pub total_users: usize,
    pub report: FanoutReport,
}

/// Result of an operator setter: the new settings and who heard about it
#[derive(Debug, Clone)]
pub struct SettingChange {
    pub settings: RoundSettings,
    pub report: FanoutReport,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultsView {
    pub tally: ResultTally,
    pub announcement_time: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotCount {
    pub available: u32,
    pub total: u32,
}

#[derive(Debug, Clone)]
pub struct WinnerListing {
    pub side: Option<Side>,
    pub users: Vec<User>,
}

/// Read-only view of the whole round
#[derive(Debug, Clone, Serialize)]
pub struct RoundSnapshot {
    pub settings: RoundSettings,
    pub tally: ResultTally,
    pub winners: WinnerSet,
    pub registered_users: usize,
    pub bets_placed: usize,
    pub pending: usize,
    pub approved: usize,
}

pub struct RoundEngine {
    store: Arc<dyn Store>,
    settings: SettingsStore,
    ledger: UserLedger,
    messenger: Arc<dyn Messenger>,
    fanout: NotificationFanout,
    operator_id: UserId,
    payment_image: Option<String>,
    write_gate: Mutex<()>,
}

impl RoundEngine {
    pub fn new(
        store: Arc<dyn Store>,
        messenger: Arc<dyn Messenger>,
        operator_id: UserId,
        default_total_slots: u32,
    ) -> Self {
        Self {
            settings: SettingsStore::new(store.clone(), default_total_slots),
            ledger: UserLedger::new(store.clone()),
            store,
            messenger,
            fanout: NotificationFanout::default(),
            operator_id,
            payment_image: None,
            write_gate: Mutex::new(()),
        }
    }

    pub fn from_config(config: &Config, store: Arc<dyn Store>, messenger: Arc<dyn Messenger>) -> Self {
        Self::new(
            store,
            messenger,
            config.telegram.operator_id,
            config.round.default_total_slots,
        )
        .with_fanout(NotificationFanout::from_config(&config.notify))
        .with_payment_image(config.telegram.payment_image.clone())
    }

    pub fn with_fanout(mut self, fanout: NotificationFanout) -> Self {
        self.fanout = fanout;
        self
    }

    /// Photo sent with payment instructions; plain text is used without one.
    pub fn with_payment_image(mut self, image: Option<String>) -> Self {
        self.payment_image = image;
        self
    }

    pub fn operator_id(&self) -> UserId {
        self.operator_id
    }

    pub fn is_operator(&self, caller: &Caller) -> bool {
        caller.user_id == self.operator_id
    }

    pub fn ensure_operator(&self, caller: &Caller) -> Result<()> {
        if self.is_operator(caller) {
            Ok(())
        } else {
            tracing::warn!(user_id = caller.user_id, "Rejected operator command");
            Err(RoundError::Unauthorized.into())
        }
    }

    // ============ User operations ============

    /// Create the caller's record on first contact; later calls refresh the name.
    pub async fn register(&self, caller: &Caller) -> Result<Registration> {
        let _gate = self.write_gate.lock().await;

        match self.ledger.get(caller.user_id).await? {
            Some(mut user) => {
                if !caller.name.is_empty() && user.name != caller.name {
                    user.name = caller.name.clone();
                    self.store.commit(vec![Write::User(user.clone())]).await?;
                }
                Ok(Registration {
                    user,
                    newly_registered: false,
                })
            }
            None => {
                let user = User::new(caller.user_id, caller.name.clone());
                self.store.commit(vec![Write::User(user.clone())]).await?;
                tracing::info!(user_id = user.user_id, name = %user.name, "User registered");
                Ok(Registration {
                    user,
                    newly_registered: true,
                })
            }
        }
    }

    /// Whether the caller could bet right now, without choosing a side.
    pub async fn check_can_bet(&self, caller: &Caller) -> Result<RoundSettings> {
        let user = self.ledger.require(caller.user_id).await?;
        let settings = self.settings.settings().await?;
        check_bet_allowed(&user, &settings)?;
        Ok(settings)
    }

    /// Record the caller's side. Capacity is only taken on approval.
    pub async fn place_bet(&self, caller: &Caller, side: Side) -> Result<User> {
        let gate = self.write_gate.lock().await;

        let mut user = self.ledger.require(caller.user_id).await?;
        let settings = self.settings.settings().await?;
        check_bet_allowed(&user, &settings)?;
        user.place_bet(side)?;
        self.store.commit(vec![Write::User(user.clone())]).await?;
        drop(gate);

        tracing::info!(user_id = user.user_id, %side, "Bet placed");

        let caption = messages::payment_instructions(side);
        let sent = match &self.payment_image {
            Some(image) => self.messenger.send_photo(caller.chat_id, image, &caption).await,
            None => self.messenger.send_text(caller.chat_id, &caption).await,
        };
        if let Err(e) = sent {
            tracing::warn!(user_id = user.user_id, error = %e, "Failed to send payment instructions");
        }

        Ok(user)
    }

    /// Accept a payment screenshot and pass it on to the operator.
    pub async fn submit_payment(&self, caller: &Caller, proof: PaymentProof) -> Result<PaymentReceipt> {
        let gate = self.write_gate.lock().await;

        let mut user = self.ledger.require(caller.user_id).await?;
        let receipt = match user.record_payment() {
            Ok(receipt) => receipt,
            Err(e) => {
                tracing::warn!(user_id = user.user_id, reason = %e, "Payment proof rejected");
                return Err(e.into());
            }
        };
        self.store.commit(vec![Write::User(user.clone())]).await?;
        drop(gate);

        tracing::info!(
            user_id = user.user_id,
            attempt = receipt.attempt,
            final_attempt = receipt.final_attempt,
            "Payment proof received"
        );

        if let Err(e) = self
            .messenger
            .forward(self.operator_id, proof.chat_id, proof.message_id)
            .await
        {
            tracing::warn!(user_id = user.user_id, error = %e, "Failed to forward payment proof");
        }
        self.notify_user(self.operator_id, &messages::payment_summary(&user, receipt.attempt))
            .await;

        Ok(receipt)
    }

    pub async fn check_status(&self, caller: &Caller) -> Result<User> {
        self.ledger.require(caller.user_id).await
    }

    pub async fn list_results(&self) -> Result<ResultsView> {
        let tally = self.settings.tally().await?;
        let settings = self.settings.settings().await?;
        Ok(ResultsView {
            tally,
            announcement_time: settings.result_announcement_time,
        })
    }

    pub async fn next_round_time(&self) -> Result<Option<String>> {
        Ok(self.settings.settings().await?.next_betting_time)
    }

    pub async fn slot_count(&self) -> Result<SlotCount> {
        let settings = self.settings.settings().await?;
        Ok(SlotCount {
            available: settings.available_slots,
            total: settings.total_slots,
        })
    }

    // ============ Operator operations ============

    pub async fn approve(&self, caller: &Caller, target: UserId) -> Result<Approval> {
        self.ensure_operator(caller)?;
        let gate = self.write_gate.lock().await;

        let mut user = self.ledger.find(target).await?;
        let mut settings = self.settings.settings().await?;
        user.approve()?;
        settings.claim_slot()?;
        self.store
            .commit(vec![Write::User(user.clone()), Write::Settings(settings.clone())])
            .await?;
        drop(gate);

        tracing::info!(
            user_id = target,
            available_slots = settings.available_slots,
            total_slots = settings.total_slots,
            "Bet approved"
        );
        self.notify_user(target, &messages::bet_approved()).await;

        Ok(Approval {
            user,
            available_slots: settings.available_slots,
            total_slots: settings.total_slots,
        })
    }

    pub async fn disapprove(&self, caller: &Caller, target: UserId) -> Result<User> {
        self.ensure_operator(caller)?;
        let gate = self.write_gate.lock().await;

        let mut user = self.ledger.find(target).await?;
        user.disapprove();
        self.store.commit(vec![Write::User(user.clone())]).await?;
        drop(gate);

        tracing::info!(user_id = target, "Bet disapproved");
        self.notify_user(target, &messages::bet_disapproved()).await;

        Ok(user)
    }

    /// Users whose payment proof awaits review
    pub async fn list_pending(&self, caller: &Caller) -> Result<Vec<User>> {
        self.ensure_operator(caller)?;
        self.ledger
            .filter(|u| u.status == Some(BetStatus::Waiting))
            .await
    }

    /// Users with an approved bet
    pub async fn list_participants(&self, caller: &Caller) -> Result<Vec<User>> {
        self.ensure_operator(caller)?;
        self.ledger.filter(|u| u.has_bet() && u.is_approved()).await
    }

    pub async fn list_all_users(&self, caller: &Caller) -> Result<Vec<User>> {
        self.ensure_operator(caller)?;
        self.ledger.all().await
    }

    pub async fn list_winners(&self, caller: &Caller) -> Result<WinnerListing> {
        self.ensure_operator(caller)?;
        let winners = self.settings.winners().await?;
        let mut users = Vec::with_capacity(winners.user_ids.len());
        for user_id in &winners.user_ids {
            match self.ledger.get(*user_id).await? {
                Some(user) => users.push(user),
                None => tracing::warn!(user_id, "Winner has no user record"),
            }
        }
        Ok(WinnerListing {
            side: winners.declared_side,
            users,
        })
    }

    /// Declare the winning side.
    ///
    /// Runs entirely under the write gate. The bumped tally, the winner set
    /// (approved bets on `side`) and the restored capacity are committed
    /// together, then every registered user is told the result. Betting
    /// stays open or closed as it was, and bets are kept until `reset_round`.
    pub async fn declare(&self, caller: &Caller, side: &str) -> Result<Declaration> {
        self.ensure_operator(caller)?;
        let side: Side = side.parse()?;
        let _gate = self.write_gate.lock().await;

        let mut tally = self.settings.tally().await?;
        tally.record(side);

        let users = self.ledger.all().await?;
        let recipients: Vec<UserId> = users.iter().map(|u| u.user_id).collect();
        let winners = WinnerSet {
            declared_side: Some(side),
            user_ids: users
                .iter()
                .filter(|u| u.bet == Some(side) && u.is_approved())
                .map(|u| u.user_id)
                .collect(),
        };
        let mut settings = self.settings.settings().await?;
        settings.restore_slots();

        self.store
            .commit(vec![
                Write::Tally(tally),
                Write::Winners(winners.clone()),
                Write::Settings(settings),
            ])
            .await?;

        let report = self.deliver(&recipients, &messages::result_declared(side)).await;

        tracing::info!(
            %side,
            winners = winners.user_ids.len(),
            heads_wins = tally.heads_wins,
            tails_wins = tally.tails_wins,
            "Result declared"
        );

        Ok(Declaration {
            side,
            tally,
            winners,
            report,
        })
    }

    /// Clear every bet and the round results; user records are kept.
    pub async fn reset_round(&self, caller: &Caller) -> Result<ResetSummary> {
        self.ensure_operator(caller)?;
        let gate = self.write_gate.lock().await;

        let mut writes = Vec::new();
        for mut user in self.ledger.all().await? {
            if user.clear() {
                writes.push(Write::User(user));
            }
        }
        let users_cleared = writes.len();

        let mut settings = self.settings.settings().await?;
        settings.restore_slots();
        settings.next_betting_time = None;
        settings.result_announcement_time = None;
        writes.push(Write::Settings(settings));
        writes.push(Write::Tally(ResultTally::default()));
        writes.push(Write::Winners(WinnerSet::default()));

        let recipients = self.ledger.ids().await?;
        self.store.commit(writes).await?;
        drop(gate);

        tracing::info!(users_cleared, "Round reset");
        let report = self.deliver(&recipients, &messages::round_reset()).await;

        Ok(ResetSummary {
            users_cleared,
            report,
        })
    }

    pub async fn schedule(&self, caller: &Caller, time: &str) -> Result<SettingChange> {
        self.ensure_operator(caller)?;
        let time = non_blank(time, "next betting time")?;
        let notice = messages::schedule_notice(&time);
        self.update_settings(notice, |s| s.next_betting_time = Some(time))
            .await
    }

    pub async fn set_announcement(&self, caller: &Caller, time: &str) -> Result<SettingChange> {
        self.ensure_operator(caller)?;
        let time = non_blank(time, "announcement time")?;
        let notice = messages::announcement_notice(&time);
        self.update_settings(notice, |s| s.result_announcement_time = Some(time))
            .await
    }

    /// Set capacity and free every slot. Meant for use between rounds.
    pub async fn set_total_slots(&self, caller: &Caller, count: &str) -> Result<SettingChange> {
        self.ensure_operator(caller)?;
        let total: u32 = count.trim().parse().map_err(|_| {
            RoundError::InvalidInput(format!(
                "slot count must be a non-negative integer, got {:?}",
                count.trim()
            ))
        })?;
        self.update_settings(messages::slots_notice(total), |s| s.resize(total))
            .await
    }

    pub async fn open_betting(&self, caller: &Caller) -> Result<SettingChange> {
        self.ensure_operator(caller)?;
        self.update_settings(messages::betting_opened(), |s| s.betting_open = true)
            .await
    }

    pub async fn close_betting(&self, caller: &Caller) -> Result<SettingChange> {
        self.ensure_operator(caller)?;
        self.update_settings(messages::betting_closed(), |s| s.betting_open = false)
            .await
    }

    /// Send a free-form message to every user, then a summary to the operator.
    pub async fn broadcast(&self, caller: &Caller, message: &str) -> Result<BroadcastSummary> {
        self.ensure_operator(caller)?;
        let message = non_blank(message, "broadcast message")?;

        let recipients = self.ledger.ids().await?;
        let report = self
            .fanout
            .deliver(self.messenger.as_ref(), &recipients, &messages::broadcast(&message))
            .await;

        self.notify_user(
            self.operator_id,
            &messages::broadcast_summary(recipients.len(), &report, &message),
        )
        .await;

        Ok(BroadcastSummary {
            total_users: recipients.len(),
            report,
        })
    }

    // ============ Read-only views ============

    pub async fn settings(&self) -> Result<RoundSettings> {
        self.settings.settings().await
    }

    pub async fn winners(&self) -> Result<WinnerSet> {
        self.settings.winners().await
    }

    pub async fn snapshot(&self) -> Result<RoundSnapshot> {
        let users = self.ledger.all().await?;
        Ok(RoundSnapshot {
            settings: self.settings.settings().await?,
            tally: self.settings.tally().await?,
            winners: self.settings.winners().await?,
            registered_users: users.len(),
            bets_placed: users.iter().filter(|u| u.has_bet()).count(),
            pending: users
                .iter()
                .filter(|u| u.status == Some(BetStatus::Waiting))
                .count(),
            approved: users.iter().filter(|u| u.is_approved()).count(),
        })
    }

    // ============ Helpers ============

    async fn update_settings(
        &self,
        notice: String,
        change: impl FnOnce(&mut RoundSettings),
    ) -> Result<SettingChange> {
        let gate = self.write_gate.lock().await;
        let mut settings = self.settings.settings().await?;
        change(&mut settings);
        let recipients = self.ledger.ids().await?;
        self.store.commit(vec![Write::Settings(settings.clone())]).await?;
        drop(gate);

        tracing::info!(
            betting_open = settings.betting_open,
            total_slots = settings.total_slots,
            available_slots = settings.available_slots,
            next_betting_time = ?settings.next_betting_time,
            result_announcement_time = ?settings.result_announcement_time,
            "Round settings updated"
        );

        let report = self.deliver(&recipients, &notice).await;
        Ok(SettingChange { settings, report })
    }

    /// Best-effort fanout to recipients read under the gate.
    async fn deliver(&self, recipients: &[UserId], text: &str) -> FanoutReport {
        self.fanout
            .deliver(self.messenger.as_ref(), recipients, text)
            .await
    }

    async fn notify_user(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.messenger.send_text(chat_id, text).await {
            tracing::warn!(chat_id, error = %e, "Notification failed");
        }
    }
}

fn check_bet_allowed(user: &User, settings: &RoundSettings) -> std::result::Result<(), RoundError> {
    if !settings.betting_open {
        return Err(RoundError::RoundClosed);
    }
    if !settings.has_free_slot() {
        return Err(RoundError::SlotsFull);
    }
    if user.has_bet() {
        return Err(RoundError::AlreadyBet);
    }
    Ok(())
}

fn non_blank(text: &str, what: &str) -> std::result::Result<String, RoundError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(RoundError::InvalidInput(format!("{} is empty", what)));
    }
    Ok(text.to_string())
}
