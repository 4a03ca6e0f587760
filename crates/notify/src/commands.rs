//! Operator commands and inline button callbacks.
//!
//! Handlers are registered by name (`/add`) or by callback data prefix
//! (`domain:del:`) and return a [`Reply`] that the registry delivers through
//! the gateway.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::channels::telegram::Update;
use crate::channels::{ChatId, Gateway, MessageHandle, OutboundMessage};
use crate::error::{ChannelError, CommandError};

/// An inbound command or button press, independent of the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A text message starting with `/`.
    Command {
        chat: ChatId,
        message: MessageHandle,
        text: String,
        from: Option<String>,
    },
    /// An inline button press.
    Callback {
        id: String,
        chat: ChatId,
        message: Option<MessageHandle>,
        data: String,
        from: Option<String>,
    },
}

impl Inbound {
    /// Extract the inbound part of a Telegram update, if any.
    #[must_use]
    pub fn from_update(update: Update) -> Option<Self> {
        if let Some(query) = update.callback_query {
            let message = query.message?;
            return Some(Self::Callback {
                id: query.id,
                chat: ChatId::from(message.chat.id),
                message: Some(MessageHandle(message.message_id)),
                data: query.data?,
                from: Some(query.from.display_name()),
            });
        }

        let message = update.message?;
        let text = message.text?;
        if !text.starts_with('/') {
            return None;
        }
        Some(Self::Command {
            chat: ChatId::from(message.chat.id),
            message: MessageHandle(message.message_id),
            text,
            from: message.from.map(|u| u.display_name()),
        })
    }

    #[must_use]
    pub fn chat(&self) -> &ChatId {
        match self {
            Self::Command { chat, .. } | Self::Callback { chat, .. } => chat,
        }
    }
}

/// What a handler received, with the command name or callback prefix removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundRequest {
    pub chat: ChatId,
    pub message: Option<MessageHandle>,
    pub args: String,
    pub from: Option<String>,
}

/// What to do after a handler ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Nothing to say.
    Silent,
    /// Post a new message into the originating chat.
    Send(OutboundMessage),
    /// Edit the message that carried the pressed button.
    Edit(OutboundMessage),
}

/// A command or callback handler.
#[async_trait]
pub trait InboundHandler: Send + Sync {
    async fn handle(&self, request: &InboundRequest) -> Result<Reply, CommandError>;
}

/// Routes inbound commands and callbacks to registered handlers.
#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<String, Arc<dyn InboundHandler>>,
    callbacks: Vec<(String, Arc<dyn InboundHandler>)>,
    allowed_chats: Option<HashSet<ChatId>>,
}

impl CommandRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Only accept commands from these chats; others are ignored.
    #[must_use]
    pub fn allow_chats(mut self, chats: impl IntoIterator<Item = ChatId>) -> Self {
        self.allowed_chats = Some(chats.into_iter().collect());
        self
    }

    /// Register a handler for `/name`.
    pub fn register_command(&mut self, name: &str, handler: Arc<dyn InboundHandler>) {
        let name = name.trim_start_matches('/').to_ascii_lowercase();
        debug!(command = %name, "Registered command");
        self.commands.insert(name, handler);
    }

    /// Register a handler for callback data starting with `prefix`.
    pub fn register_callback(&mut self, prefix: &str, handler: Arc<dyn InboundHandler>) {
        debug!(prefix, "Registered callback");
        self.callbacks.push((prefix.to_string(), handler));
    }

    /// Find the handler for an inbound event.
    #[must_use]
    pub fn resolve(&self, inbound: &Inbound) -> Option<(Arc<dyn InboundHandler>, InboundRequest)> {
        if let Some(allowed) = &self.allowed_chats {
            if !allowed.contains(inbound.chat()) {
                return None;
            }
        }

        match inbound {
            Inbound::Command {
                chat,
                message,
                text,
                from,
            } => {
                let (name, args) = parse_command(text)?;
                let handler = self.commands.get(&name)?;
                Some((
                    Arc::clone(handler),
                    InboundRequest {
                        chat: chat.clone(),
                        message: Some(*message),
                        args,
                        from: from.clone(),
                    },
                ))
            }
            Inbound::Callback {
                chat,
                message,
                data,
                from,
                ..
            } => self.callbacks.iter().find_map(|(prefix, handler)| {
                let args = data.strip_prefix(prefix.as_str())?;
                Some((
                    Arc::clone(handler),
                    InboundRequest {
                        chat: chat.clone(),
                        message: *message,
                        args: args.to_string(),
                        from: from.clone(),
                    },
                ))
            }),
        }
    }

    /// Run the matching handler and deliver its reply.
    ///
    /// Returns `Ok(false)` when nothing matched. Handler failures are reported
    /// back into the chat; only gateway failures are returned.
    pub async fn dispatch(
        &self,
        inbound: &Inbound,
        gateway: &dyn Gateway,
    ) -> Result<bool, ChannelError> {
        let Some((handler, request)) = self.resolve(inbound) else {
            debug!(chat = %inbound.chat(), "No handler for inbound event");
            return Ok(false);
        };

        let reply = match handler.handle(&request).await {
            Ok(reply) => reply,
            Err(CommandError::Usage(text)) => Reply::Send(OutboundMessage::text(format!("ℹ️ {text}"))),
            Err(e) => {
                warn!(chat = %request.chat, error = %e, "Command handler failed");
                Reply::Send(OutboundMessage::text(format!("⚠️ {e}")))
            }
        };

        match reply {
            Reply::Silent => {}
            Reply::Send(message) => {
                gateway.send_message(&request.chat, &message).await?;
            }
            Reply::Edit(message) => match request.message {
                Some(handle) => gateway.edit_message(&request.chat, handle, &message).await?,
                None => {
                    gateway.send_message(&request.chat, &message).await?;
                }
            },
        }

        info!(chat = %request.chat, from = ?request.from, "Inbound command handled");
        Ok(true)
    }
}

/// Split `/name@bot args` into a lowercase name and trimmed args.
fn parse_command(text: &str) -> Option<(String, String)> {
    let rest = text.trim().strip_prefix('/')?;
    let (head, args) = rest
        .split_once(char::is_whitespace)
        .map_or((rest, ""), |(head, args)| (head, args.trim()));
    let name = head.split('@').next().unwrap_or(head);
    if name.is_empty() {
        return None;
    }
    Some((name.to_ascii_lowercase(), args.to_string()))
}
