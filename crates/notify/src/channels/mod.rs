//! Messaging gateway abstraction and its implementations.

pub mod telegram;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

/// Identifier of a chat the bot posts into (numeric id or `@channel` name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub String);

impl ChatId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is a numeric chat id. Inbound updates always carry one,
    /// so `@channel` names never match an incoming chat.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        self.0.parse::<i64>().is_ok()
    }
}

impl From<i64> for ChatId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for ChatId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle of a message previously sent through a gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageHandle(pub i64);

impl fmt::Display for MessageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single inline action button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

/// Rows of inline action buttons attached to a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InlineKeyboard {
    #[serde(rename = "inline_keyboard")]
    pub rows: Vec<Vec<InlineButton>>,
}

impl InlineKeyboard {
    /// Keyboard with a single button on a single row.
    pub fn single(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            rows: vec![vec![InlineButton {
                text: text.into(),
                callback_data: callback_data.into(),
            }]],
        }
    }
}

/// HTML formatted message body plus optional inline keyboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub text: String,
    pub keyboard: Option<InlineKeyboard>,
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }

    #[must_use]
    pub fn with_keyboard(mut self, keyboard: InlineKeyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

/// Transport used to create and update chat messages.
///
/// Implementations perform exactly one platform call per method and never
/// retry; callers decide what to do with failures.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Get the name of this gateway.
    fn name(&self) -> &'static str;

    /// Post a new message and return its handle.
    async fn send_message(
        &self,
        chat: &ChatId,
        message: &OutboundMessage,
    ) -> Result<MessageHandle, ChannelError>;

    /// Replace the text (and keyboard) of an existing message.
    async fn edit_message(
        &self,
        chat: &ChatId,
        handle: MessageHandle,
        message: &OutboundMessage,
    ) -> Result<(), ChannelError>;
}
