//! Telegram Bot API gateway.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ChatId, Gateway, InlineKeyboard, MessageHandle, OutboundMessage};
use crate::error::ChannelError;

/// Default Bot API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Timeout for regular (non long-poll) API calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Telegram answers edits that change nothing with this description.
const NOT_MODIFIED: &str = "message is not modified";

/// Telegram Bot API client.
pub struct TelegramChannel {
    api_url: String,
    token: String,
    client: reqwest::Client,
}

impl TelegramChannel {
    /// Create a channel talking to the public Bot API.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_api_url(token, DEFAULT_API_URL)
    }

    /// Create a channel talking to a custom Bot API server.
    #[must_use]
    pub fn with_api_url(token: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Long-poll for updates with ids at or above `offset`.
    pub async fn get_updates(
        &self,
        offset: i64,
        poll_timeout: Duration,
    ) -> Result<Vec<Update>, ChannelError> {
        let body = GetUpdates {
            offset,
            timeout: poll_timeout.as_secs(),
            allowed_updates: &["message", "callback_query"],
        };
        self.call("getUpdates", &body, poll_timeout + REQUEST_TIMEOUT)
            .await
    }

    /// Dismiss the loading indicator of an inline button press.
    pub async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: Option<&str>,
    ) -> Result<(), ChannelError> {
        let body = AnswerCallbackQuery {
            callback_query_id,
            text,
        };
        let _: bool = self
            .call("answerCallbackQuery", &body, REQUEST_TIMEOUT)
            .await?;
        Ok(())
    }

    async fn call<B, T>(
        &self,
        method: &'static str,
        body: &B,
        timeout: Duration,
    ) -> Result<T, ChannelError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned + Send,
    {
        let url = format!("{}/bot{}/{method}", self.api_url, self.token);

        // The token is part of the URL, keep it out of error messages.
        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;

        let status = response.status();
        let reply: ApiResponse<T> = response
            .json()
            .await
            .map_err(reqwest::Error::without_url)?;

        if reply.ok {
            return reply
                .result
                .ok_or_else(|| ChannelError::Other(format!("{method} returned no result")));
        }

        if let Some(retry_after_secs) = reply.parameters.and_then(|p| p.retry_after) {
            warn!(channel = "telegram", method, retry_after_secs, "Rate limited");
            return Err(ChannelError::RateLimited { retry_after_secs });
        }

        Err(ChannelError::Api {
            method,
            code: reply.error_code.unwrap_or_else(|| i64::from(status.as_u16())),
            description: reply.description.unwrap_or_default(),
        })
    }
}

#[async_trait]
impl Gateway for TelegramChannel {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn send_message(
        &self,
        chat: &ChatId,
        message: &OutboundMessage,
    ) -> Result<MessageHandle, ChannelError> {
        let body = SendMessage {
            chat_id: chat,
            message_id: None,
            text: &message.text,
            parse_mode: "HTML",
            link_preview_options: LinkPreviewOptions { is_disabled: true },
            reply_markup: message.keyboard.as_ref(),
        };

        debug!(channel = "telegram", chat = %chat, "Sending message");
        let sent: Message = self.call("sendMessage", &body, REQUEST_TIMEOUT).await?;
        Ok(MessageHandle(sent.message_id))
    }

    async fn edit_message(
        &self,
        chat: &ChatId,
        handle: MessageHandle,
        message: &OutboundMessage,
    ) -> Result<(), ChannelError> {
        let body = SendMessage {
            chat_id: chat,
            message_id: Some(handle.0),
            text: &message.text,
            parse_mode: "HTML",
            link_preview_options: LinkPreviewOptions { is_disabled: true },
            reply_markup: message.keyboard.as_ref(),
        };

        debug!(channel = "telegram", chat = %chat, message = %handle, "Editing message");
        match self
            .call::<_, serde_json::Value>("editMessageText", &body, REQUEST_TIMEOUT)
            .await
        {
            Ok(_) => Ok(()),
            Err(ChannelError::Api { description, .. }) if description.contains(NOT_MODIFIED) => {
                debug!(channel = "telegram", message = %handle, "Message unchanged");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

// =============================================================================
// Telegram API types
// =============================================================================

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a ChatId,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_id: Option<i64>,
    text: &'a str,
    parse_mode: &'static str,
    link_preview_options: LinkPreviewOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a InlineKeyboard>,
}

#[derive(Debug, Serialize)]
struct LinkPreviewOptions {
    is_disabled: bool,
}

#[derive(Debug, Serialize)]
struct GetUpdates {
    offset: i64,
    timeout: u64,
    allowed_updates: &'static [&'static str],
}

#[derive(Debug, Serialize)]
struct AnswerCallbackQuery<'a> {
    callback_query_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

/// An incoming update.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

/// A chat message.
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
}

/// The chat a message belongs to.
#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// Sender of a message or button press.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub username: Option<String>,
}

impl User {
    /// `@username` when set, otherwise the first name.
    pub fn display_name(&self) -> String {
        self.username
            .as_ref()
            .map_or_else(|| self.first_name.clone(), |u| format!("@{u}"))
    }
}

/// An inline button press.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}
