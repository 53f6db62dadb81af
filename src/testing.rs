//! Test doubles shared by unit and integration tests

use crate::error::{BotError, Result};
use crate::notify::Messenger;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;

/// One outbound call captured by `RecordingMessenger`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text { chat_id: i64, text: String },
    Keyboard { chat_id: i64, text: String, buttons: Vec<(String, String)> },
    Photo { chat_id: i64, photo: String, caption: String },
    Forward { to_chat: i64, from_chat: i64, message_id: i64 },
    CallbackAnswer { callback_id: String },
}

impl Sent {
    pub fn chat_id(&self) -> Option<i64> {
        match self {
            Sent::Text { chat_id, .. } | Sent::Keyboard { chat_id, .. } | Sent::Photo { chat_id, .. } => Some(*chat_id),
            Sent::Forward { to_chat, .. } => Some(*to_chat),
            Sent::CallbackAnswer { .. } => None,
        }
    }
}

/// Messenger that records every call; chats marked as failing return an error.
#[derive(Debug, Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<Sent>>,
    failing: Mutex<HashSet<i64>>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every delivery to `chat_id` fail from now on.
    pub fn fail_for(&self, chat_id: i64) {
        self.failing.lock().insert(chat_id);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }

    /// Texts and captions delivered to one chat, in order.
    pub fn texts_to(&self, chat_id: i64) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter_map(|s| match s {
                Sent::Text { chat_id: c, text } | Sent::Keyboard { chat_id: c, text, .. } if *c == chat_id => {
                    Some(text.clone())
                }
                Sent::Photo { chat_id: c, caption, .. } if *c == chat_id => Some(caption.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn last_text_to(&self, chat_id: i64) -> Option<String> {
        self.texts_to(chat_id).pop()
    }

    fn record(&self, chat_id: Option<i64>, entry: Sent) -> Result<()> {
        if let Some(chat_id) = chat_id {
            if self.failing.lock().contains(&chat_id) {
                return Err(BotError::Telegram(format!("Bad Request: chat {} not found", chat_id)));
            }
        }
        self.sent.lock().push(entry);
        Ok(())
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()> {
        self.record(
            Some(chat_id),
            Sent::Text {
                chat_id,
                text: text.to_string(),
            },
        )
    }

    async fn send_keyboard(&self, chat_id: i64, text: &str, buttons: &[(String, String)]) -> Result<()> {
        self.record(
            Some(chat_id),
            Sent::Keyboard {
                chat_id,
                text: text.to_string(),
                buttons: buttons.to_vec(),
            },
        )
    }

    async fn send_photo(&self, chat_id: i64, photo: &str, caption: &str) -> Result<()> {
        self.record(
            Some(chat_id),
            Sent::Photo {
                chat_id,
                photo: photo.to_string(),
                caption: caption.to_string(),
            },
        )
    }

    async fn forward(&self, to_chat: i64, from_chat: i64, message_id: i64) -> Result<()> {
        self.record(
            Some(to_chat),
            Sent::Forward {
                to_chat,
                from_chat,
                message_id,
            },
        )
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<()> {
        self.record(
            None,
            Sent::CallbackAnswer {
                callback_id: callback_id.to_string(),
            },
        )
    }
}
