//! Telegram transport
//!
//! `TelegramBot` long-polls `getUpdates` and turns messages, payment
//! photos and inline button presses into `InboundEvent`s on a channel.
//! `CommandHandler` consumes them one at a time and drives the round
//! engine. Outbound traffic goes through `TelegramClient`.

pub mod api;
pub mod commands;
pub mod handler;


pub use api::TelegramClient;
pub use commands::{BotCommand, InboundEvent};
pub use handler::CommandHandler;

use crate::types::Caller;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

/// Telegram bot for receiving commands
pub struct TelegramBot {
    client: TelegramClient,
    poll_timeout_secs: u64,
    last_update_id: RwLock<i64>,
    event_tx: mpsc::Sender<InboundEvent>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramUpdate {
    update_id: i64,
    message: Option<TelegramMessage>,
    callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    message_id: i64,
    from: Option<TelegramUser>,
    chat: TelegramChat,
    text: Option<String>,
    photo: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct TelegramUser {
    id: i64,
    first_name: String,
    last_name: Option<String>,
}

impl TelegramUser {
    fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) => format!("{} {}", self.first_name, last),
            None => self.first_name.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    id: String,
    from: TelegramUser,
    message: Option<TelegramMessage>,
    data: Option<String>,
}

impl TelegramUpdate {
    pub fn update_id(&self) -> i64 {
        self.update_id
    }

    /// The event this update carries, if the bot cares about it.
    pub fn into_event(self) -> Option<InboundEvent> {
        if let Some(query) = self.callback_query {
            let chat_id = query
                .message
                .as_ref()
                .map(|m| m.chat.id)
                .unwrap_or(query.from.id);
            return Some(InboundEvent {
                caller: Caller {
                    user_id: query.from.id,
                    name: query.from.full_name(),
                    chat_id,
                },
                command: BotCommand::ChooseSide {
                    side: query.data.unwrap_or_default(),
                },
                callback_id: Some(query.id),
            });
        }

        let msg = self.message?;
        let from = msg.from?;
        let command = if msg.photo.as_ref().is_some_and(|p| !p.is_empty()) {
            BotCommand::PaymentProof {
                message_id: msg.message_id,
            }
        } else {
            BotCommand::parse(msg.text.as_deref()?)?
        };

        Some(InboundEvent {
            caller: Caller {
                user_id: from.id,
                name: from.full_name(),
                chat_id: msg.chat.id,
            },
            command,
            callback_id: None,
        })
    }
}

impl TelegramBot {
    pub fn new(client: TelegramClient, poll_timeout_secs: u64, event_tx: mpsc::Sender<InboundEvent>) -> Self {
        Self {
            client,
            poll_timeout_secs,
            last_update_id: RwLock::new(0),
            event_tx,
        }
    }

    /// Poll until the receiving side of the channel is dropped.
    pub async fn start_polling(self: Arc<Self>) {
        tracing::info!("Starting Telegram command listener...");

        loop {
            let offset = *self.last_update_id.read().await;
            match self.client.get_updates(offset, self.poll_timeout_secs).await {
                Ok(updates) => {
                    for update in updates {
                        // Advance first so a bad update is never redelivered
                        *self.last_update_id.write().await = update.update_id() + 1;

                        let Some(event) = update.into_event() else {
                            continue;
                        };
                        tracing::info!(
                            user_id = event.caller.user_id,
                            command = event.command.name(),
                            "Received command"
                        );
                        if self.event_tx.send(event).await.is_err() {
                            tracing::info!("Command channel closed, stopping listener");
                            return;
                        }
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to poll Telegram updates: {}", e);
                    tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;
                }
            }

            if self.event_tx.is_closed() {
                return;
            }
        }
    }
}
