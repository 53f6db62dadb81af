//! Turns inbound commands into round operations and replies

use super::{BotCommand, InboundEvent};
use crate::error::{BotError, Result, RoundError};
use crate::notify::{messages, Messenger};
use crate::round::RoundEngine;
use crate::types::{Caller, PaymentProof, Side, UserId};
use std::sync::Arc;

/// Command handler that processes commands from Telegram
pub struct CommandHandler {
    engine: Arc<RoundEngine>,
    messenger: Arc<dyn Messenger>,
}

impl CommandHandler {
    pub fn new(engine: Arc<RoundEngine>, messenger: Arc<dyn Messenger>) -> Self {
        Self { engine, messenger }
    }

    /// Handle one event. Rejections are answered in chat, never propagated.
    pub async fn handle(&self, event: InboundEvent) {
        let InboundEvent {
            caller,
            command,
            callback_id,
        } = event;

        if let Some(id) = callback_id {
            if let Err(e) = self.messenger.answer_callback(&id).await {
                tracing::warn!(callback_id = %id, error = %e, "Failed to answer callback");
            }
        }

        let name = command.name().to_string();
        if let Err(e) = self.dispatch(&caller, command).await {
            match e.as_round() {
                Some(rule) => {
                    tracing::warn!(user_id = caller.user_id, command = %name, reason = %rule, "Command rejected");
                    self.reply(&caller, &messages::rejection(rule)).await;
                }
                None => {
                    tracing::error!(user_id = caller.user_id, command = %name, error = %e, "Command failed");
                    self.reply(&caller, &messages::internal_error()).await;
                }
            }
        }
    }

    async fn dispatch(&self, caller: &Caller, command: BotCommand) -> Result<()> {
        match command {
            BotCommand::Start => {
                self.engine.register(caller).await?;
                self.reply(caller, &messages::welcome()).await;
            }
            BotCommand::Help => {
                self.reply(caller, &messages::help()).await;
            }
            BotCommand::Bet { side: None } => {
                self.engine.check_can_bet(caller).await?;
                self.messenger
                    .send_keyboard(caller.chat_id, &messages::choose_side(), &messages::side_buttons())
                    .await?;
            }
            BotCommand::Bet { side: Some(side) } | BotCommand::ChooseSide { side } => {
                self.engine.check_can_bet(caller).await?;
                let side: Side = side.parse()?;
                self.engine.place_bet(caller, side).await?;
            }
            BotCommand::PaymentProof { message_id } => {
                let proof = PaymentProof {
                    chat_id: caller.chat_id,
                    message_id,
                };
                let receipt = self.engine.submit_payment(caller, proof).await?;
                if receipt.final_attempt {
                    self.reply(caller, &messages::final_attempt_warning()).await;
                }
                self.reply(caller, &messages::payment_received()).await;
            }
            BotCommand::Status => {
                let user = self.engine.check_status(caller).await?;
                self.reply(caller, &messages::status(&user)).await;
            }
            BotCommand::Results => {
                let view = self.engine.list_results().await?;
                self.reply(caller, &messages::results(&view.tally, view.announcement_time.as_deref()))
                    .await;
            }
            BotCommand::NextBet => {
                let time = self.engine.next_round_time().await?;
                self.reply(caller, &messages::next_round(time.as_deref())).await;
            }
            BotCommand::Slots => {
                let slots = self.engine.slot_count().await?;
                self.reply(caller, &messages::slots(slots.available, slots.total)).await;
            }
            BotCommand::Approve { target } => {
                self.engine.ensure_operator(caller)?;
                let Some(target) = self.target_arg(caller, &target, "/approve").await? else {
                    return Ok(());
                };
                let approval = self.engine.approve(caller, target).await?;
                self.reply(
                    caller,
                    &messages::approved_ack(target, approval.available_slots, approval.total_slots),
                )
                .await;
            }
            BotCommand::Disapprove { target } => {
                self.engine.ensure_operator(caller)?;
                let Some(target) = self.target_arg(caller, &target, "/disapprove").await? else {
                    return Ok(());
                };
                self.engine.disapprove(caller, target).await?;
                self.reply(caller, &messages::disapproved_ack(target)).await;
            }
            BotCommand::Pending => {
                let users = self.engine.list_pending(caller).await?;
                self.reply(
                    caller,
                    &messages::user_list("Pending Confirmations", &users, "No pending confirmations."),
                )
                .await;
            }
            BotCommand::Declare { side } => {
                self.engine.ensure_operator(caller)?;
                if side.is_empty() {
                    self.reply(caller, &messages::usage("/declare <heads|tails>", "/declare heads"))
                        .await;
                    return Ok(());
                }
                let declaration = self.engine.declare(caller, &side).await?;
                self.reply(
                    caller,
                    &messages::declaration_ack(
                        declaration.side,
                        declaration.winners.user_ids.len(),
                        &declaration.report,
                    ),
                )
                .await;
            }
            BotCommand::Participants => {
                let users = self.engine.list_participants(caller).await?;
                self.reply(
                    caller,
                    &messages::user_list("Approved Participants", &users, "No approved participants yet."),
                )
                .await;
            }
            BotCommand::Winners => {
                let listing = self.engine.list_winners(caller).await?;
                self.reply(caller, &messages::winners(listing.side, &listing.users)).await;
            }
            BotCommand::Reset => {
                let summary = self.engine.reset_round(caller).await?;
                self.reply(caller, &messages::reset_ack(summary.users_cleared, &summary.report))
                    .await;
            }
            BotCommand::Schedule { time } => {
                self.engine.ensure_operator(caller)?;
                if time.is_empty() {
                    self.reply(caller, &messages::usage("/schedule <datetime>", "/schedule 2024-10-31 18:00"))
                        .await;
                    return Ok(());
                }
                let change = self.engine.schedule(caller, &time).await?;
                let what = format!(
                    "Next betting round scheduled for: <b>{}</b>",
                    messages::escape_html(change.settings.next_betting_time.as_deref().unwrap_or_default())
                );
                self.reply(caller, &messages::setting_ack(&what, &change.report)).await;
            }
            BotCommand::SetAnnouncement { time } => {
                self.engine.ensure_operator(caller)?;
                if time.is_empty() {
                    self.reply(
                        caller,
                        &messages::usage("/setannouncement <datetime>", "/setannouncement 2024-10-31 20:00"),
                    )
                    .await;
                    return Ok(());
                }
                let change = self.engine.set_announcement(caller, &time).await?;
                let what = format!(
                    "Results will be announced on: <b>{}</b>",
                    messages::escape_html(change.settings.result_announcement_time.as_deref().unwrap_or_default())
                );
                self.reply(caller, &messages::setting_ack(&what, &change.report)).await;
            }
            BotCommand::FixSlots { count } => {
                self.engine.ensure_operator(caller)?;
                if count.is_empty() {
                    self.reply(caller, &messages::usage("/fixslots <number>", "/fixslots 30")).await;
                    return Ok(());
                }
                let change = self.engine.set_total_slots(caller, &count).await?;
                let what = format!("Total slots set to {}", change.settings.total_slots);
                self.reply(caller, &messages::setting_ack(&what, &change.report)).await;
            }
            BotCommand::Broadcast { message } => {
                self.engine.ensure_operator(caller)?;
                if message.is_empty() {
                    self.reply(caller, &messages::usage("/broadcast <message>", "/broadcast Hello everyone!"))
                        .await;
                    return Ok(());
                }
                // The engine sends the delivery summary to the operator
                self.engine.broadcast(caller, &message).await?;
            }
            BotCommand::Open => {
                let change = self.engine.open_betting(caller).await?;
                self.reply(caller, &messages::setting_ack("Betting is now open", &change.report))
                    .await;
            }
            BotCommand::Close => {
                let change = self.engine.close_betting(caller).await?;
                self.reply(caller, &messages::setting_ack("Betting is now closed", &change.report))
                    .await;
            }
            BotCommand::ShowAll => {
                let users = self.engine.list_all_users(caller).await?;
                self.reply(
                    caller,
                    &messages::user_list("All Users", &users, "No users have started the bot yet."),
                )
                .await;
            }
            BotCommand::AdminView => {
                self.engine.ensure_operator(caller)?;
                self.reply(caller, &messages::admin_commands()).await;
            }
            BotCommand::Unknown { .. } => {
                self.reply(caller, &messages::unknown_command()).await;
            }
        }
        Ok(())
    }

    /// Parse a user id argument, replying with usage when it is missing.
    async fn target_arg(&self, caller: &Caller, raw: &str, command: &str) -> Result<Option<UserId>> {
        if raw.is_empty() {
            self.reply(
                caller,
                &messages::usage(&format!("{} <user_id>", command), &format!("{} 123456789", command)),
            )
            .await;
            return Ok(None);
        }
        let first = raw.split_whitespace().next().unwrap_or(raw);
        first
            .parse::<UserId>()
            .map(Some)
            .map_err(|_| BotError::from(RoundError::InvalidInput(format!("{:?} is not a user id", first))))
    }

    async fn reply(&self, caller: &Caller, text: &str) {
        if let Err(e) = self.messenger.send_text(caller.chat_id, text).await {
            tracing::warn!(chat_id = caller.chat_id, error = %e, "Failed to send reply");
        }
    }
}
