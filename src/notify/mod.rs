//! Outbound notifications
//!
//! `Messenger` is the seam to the chat platform. The round engine only
//! talks to users through it, either directly for one recipient or through
//! `NotificationFanout` for broadcasts.

pub mod fanout;
pub mod messages;

pub use fanout::{DeliveryFailure, FanoutReport, NotificationFanout};

use crate::error::Result;
use async_trait::async_trait;

/// Outbound half of the chat transport
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send an HTML-formatted text message.
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()>;

    /// Send text with one inline button per row, given as `(label, callback_data)`.
    async fn send_keyboard(&self, chat_id: i64, text: &str, buttons: &[(String, String)]) -> Result<()>;

    /// Send a photo (URL or platform file id) with an HTML caption.
    async fn send_photo(&self, chat_id: i64, photo: &str, caption: &str) -> Result<()>;

    async fn forward(&self, to_chat: i64, from_chat: i64, message_id: i64) -> Result<()>;

    /// Acknowledge an inline button press.
    async fn answer_callback(&self, callback_id: &str) -> Result<()>;
}
