//! Telegram Bot API client.
//!
//! Inbound delivery uses `getUpdates` long polling. Replies use `sendMessage`,
//! `editMessageText` and `answerCallbackQuery`. Webhook registration is exposed for the
//! `set-webhook` / `delete-webhook` admin commands.

use std::time::Duration;

use log::{debug, trace, warn};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::timeout;

use super::reply::{Keyboard, Outbound};
use super::transport::{ChatTransport, InboundEvent, Sender, TransportError};
use crate::config::BotConfig;
use crate::logutil::redact_token;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Bot API envelope: `{"ok": true, "result": ...}` or an error description.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<TelegramUser>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct TelegramUser {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: TelegramUser,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

impl From<&TelegramUser> for Sender {
    fn from(user: &TelegramUser) -> Self {
        Sender::new(user.username.as_deref(), &user.first_name)
    }
}

/// Decode an update into an [`InboundEvent`]. Updates without text or callback data
/// (stickers, joins, edits, ...) are skipped.
pub fn update_to_event(update: &Update) -> Option<InboundEvent> {
    if let Some(query) = &update.callback_query {
        let message = query.message.as_ref()?;
        return Some(InboundEvent::Callback {
            query_id: query.id.clone(),
            chat_id: message.chat.id,
            message_id: message.message_id,
            from: Sender::from(&query.from),
            data: query.data.clone()?,
        });
    }
    let message = update.message.as_ref()?;
    Some(InboundEvent::Text {
        chat_id: message.chat.id,
        from: Sender::from(message.from.as_ref()?),
        text: message.text.clone()?,
    })
}

/// Bot API `reply_markup` for a keyboard.
pub fn markup_json(keyboard: &Keyboard) -> Value {
    match keyboard {
        Keyboard::Commands(commands) => json!({
            "keyboard": commands.iter().map(|c| vec![json!({ "text": c })]).collect::<Vec<_>>(),
            "one_time_keyboard": true,
            "resize_keyboard": true,
        }),
        Keyboard::Inline(rows) => json!({
            "inline_keyboard": rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|b| json!({ "text": b.label, "callback_data": b.data }))
                        .collect::<Vec<_>>()
                })
                .collect::<Vec<_>>(),
        }),
    }
}

/// Request body for delivering an [`Outbound`]; returns the API method and payload.
pub fn outbound_request(outbound: &Outbound) -> (&'static str, Value) {
    match outbound {
        Outbound::Send {
            chat_id,
            text,
            keyboard,
        } => {
            let mut body = json!({ "chat_id": chat_id, "text": text });
            if let Some(kb) = keyboard {
                body["reply_markup"] = markup_json(kb);
            }
            ("sendMessage", body)
        }
        Outbound::Edit {
            chat_id,
            message_id,
            text,
            keyboard,
        } => {
            let mut body = json!({ "chat_id": chat_id, "message_id": message_id, "text": text });
            // Only inline keyboards can be attached to an edited message.
            if let Some(kb @ Keyboard::Inline(_)) = keyboard {
                body["reply_markup"] = markup_json(kb);
            }
            ("editMessageText", body)
        }
    }
}

/// Long-polling Bot API client.
pub struct TelegramClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
    poll_timeout_secs: u64,
    http_timeout_secs: u64,
    offset: i64,
}

impl TelegramClient {
    pub fn new(config: &BotConfig) -> Self {
        let api_base = config
            .api_base
            .as_deref()
            .unwrap_or(DEFAULT_API_BASE)
            .trim_end_matches('/');
        Self {
            client: reqwest::Client::new(),
            token: config.token.clone(),
            base_url: format!("{}/bot{}", api_base, config.token),
            poll_timeout_secs: config.poll_timeout_secs,
            http_timeout_secs: config.http_timeout_secs,
            offset: 0,
        }
    }

    async fn send_request<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, TransportError> {
        let response = timeout(Duration::from_secs(self.http_timeout_secs), request.send())
            .await
            .map_err(|_| TransportError::Timeout(self.http_timeout_secs))??;
        let parsed: ApiResponse<T> = response.json().await?;
        if !parsed.ok {
            return Err(TransportError::Api {
                code: parsed.error_code.unwrap_or_default(),
                description: parsed.description.unwrap_or_default(),
            });
        }
        parsed.result.ok_or_else(|| TransportError::Api {
            code: 0,
            description: "response carried no result".to_string(),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: &Value) -> Result<T, TransportError> {
        let url = format!("{}/{}", self.base_url, method);
        trace!("POST {}", redact_token(&url, &self.token));
        self.send_request(self.client.post(&url).json(body)).await
    }

    /// The bot's own handle, used to filter `/cmd@OtherBot` commands.
    pub async fn get_me(&self) -> Result<Option<String>, TransportError> {
        let me: TelegramUser = self.call("getMe", &json!({})).await?;
        Ok(me.username)
    }

    /// Point the Bot API at `url` for push delivery.
    pub async fn set_webhook(&self, url: &str) -> Result<bool, TransportError> {
        let request_url = format!("{}/setWebhook?url={}", self.base_url, urlencoding::encode(url));
        debug!("GET {}", redact_token(&request_url, &self.token));
        self.send_request(self.client.get(&request_url)).await
    }

    /// Remove any webhook so `getUpdates` polling works again.
    pub async fn delete_webhook(&self) -> Result<bool, TransportError> {
        self.call("deleteWebhook", &json!({})).await
    }
}

impl ChatTransport for TelegramClient {
    async fn next_events(&mut self) -> Result<Vec<InboundEvent>, TransportError> {
        let body = json!({
            "offset": self.offset,
            "timeout": self.poll_timeout_secs,
            "allowed_updates": ["message", "callback_query"],
        });
        let updates: Vec<Update> = self.call("getUpdates", &body).await?;
        let mut events = Vec::with_capacity(updates.len());
        for update in &updates {
            self.offset = self.offset.max(update.update_id + 1);
            match update_to_event(update) {
                Some(event) => events.push(event),
                None => trace!("skipping update {} without text or callback data", update.update_id),
            }
        }
        Ok(events)
    }

    async fn deliver(&mut self, outbound: &Outbound) -> Result<(), TransportError> {
        let (method, body) = outbound_request(outbound);
        let _: Value = self.call(method, &body).await?;
        Ok(())
    }

    async fn acknowledge(&mut self, query_id: &str) -> Result<(), TransportError> {
        let acked: bool = self
            .call("answerCallbackQuery", &json!({ "callback_query_id": query_id }))
            .await?;
        if !acked {
            warn!("callback query {} was not acknowledged", query_id);
        }
        Ok(())
    }
}
