//! Telegram Bot API client

use super::TelegramUpdate;
use crate::error::{BotError, Result};
use crate::notify::Messenger;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<Value>,
}

#[derive(Debug, Serialize)]
struct SendPhotoRequest<'a> {
    chat_id: i64,
    photo: &'a str,
    caption: &'a str,
    parse_mode: &'static str,
}

#[derive(Debug, Serialize)]
struct ForwardMessageRequest {
    chat_id: i64,
    from_chat_id: i64,
    message_id: i64,
}

#[derive(Debug, Clone)]
pub struct TelegramClient {
    http: Client,
    base_url: String,
}

impl TelegramClient {
    pub fn new(bot_token: &str) -> Self {
        Self::with_base_url(API_BASE, bot_token)
    }

    /// Client against another Bot API server (local server or test double).
    pub fn with_base_url(api_base: &str, bot_token: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: format!("{}/bot{}", api_base.trim_end_matches('/'), bot_token),
        }
    }

    pub(crate) fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    async fn call<B: Serialize + ?Sized, T: DeserializeOwned>(&self, method: &str, body: &B) -> Result<T> {
        let response: ApiResponse<T> = self
            .http
            .post(self.method_url(method))
            .json(body)
            .send()
            .await?
            .json()
            .await?;
        into_result(method, response)
    }

    /// Long-poll for updates starting at `offset`.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<TelegramUpdate>> {
        self.call(
            "getUpdates",
            &json!({
                "offset": offset,
                "timeout": timeout_secs,
                "allowed_updates": ["message", "callback_query"],
            }),
        )
        .await
    }
}

fn into_result<T>(method: &str, response: ApiResponse<T>) -> Result<T> {
    match (response.ok, response.result) {
        (true, Some(result)) => Ok(result),
        (true, None) => Err(BotError::Telegram(format!("{}: empty result", method))),
        (false, _) => Err(BotError::Telegram(format!(
            "{}: {}",
            method,
            response.description.unwrap_or_else(|| "unknown error".into())
        ))),
    }
}

/// `reply_markup` with one inline button per row.
pub fn inline_keyboard(buttons: &[(String, String)]) -> Value {
    let rows: Vec<Value> = buttons
        .iter()
        .map(|(label, data)| json!([{ "text": label, "callback_data": data }]))
        .collect();
    json!({ "inline_keyboard": rows })
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()> {
        let request = SendMessageRequest {
            chat_id,
            text,
            parse_mode: "HTML",
            reply_markup: None,
        };
        self.call::<_, Value>("sendMessage", &request).await?;
        Ok(())
    }

    async fn send_keyboard(&self, chat_id: i64, text: &str, buttons: &[(String, String)]) -> Result<()> {
        let request = SendMessageRequest {
            chat_id,
            text,
            parse_mode: "HTML",
            reply_markup: Some(inline_keyboard(buttons)),
        };
        self.call::<_, Value>("sendMessage", &request).await?;
        Ok(())
    }

    async fn send_photo(&self, chat_id: i64, photo: &str, caption: &str) -> Result<()> {
        let request = SendPhotoRequest {
            chat_id,
            photo,
            caption,
            parse_mode: "HTML",
        };
        self.call::<_, Value>("sendPhoto", &request).await?;
        Ok(())
    }

    async fn forward(&self, to_chat: i64, from_chat: i64, message_id: i64) -> Result<()> {
        let request = ForwardMessageRequest {
            chat_id: to_chat,
            from_chat_id: from_chat,
            message_id,
        };
        self.call::<_, Value>("forwardMessage", &request).await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<()> {
        self.call::<_, Value>("answerCallbackQuery", &json!({ "callback_query_id": callback_id }))
            .await?;
        Ok(())
    }
}
