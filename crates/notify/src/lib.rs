//! Chat notifications for CI/CD and registration events.
//!
//! This crate relays deployment stage updates into Telegram, collapsing all
//! updates about the same commit into a single evolving message, and posts
//! registration notices.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use notify::{Channels, ChatId, Notifier, TelegramChannel};
//!
//! # async fn example(event: notify::DeploymentEvent) -> Result<(), notify::ChannelError> {
//! let gateway = Arc::new(TelegramChannel::new("123:token"));
//! let notifier = Notifier::new(gateway, Channels::single(ChatId::from(-100_123)));
//!
//! notifier.deployment(&event).await?;
//! notifier.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`Gateway`] trait defines the send/edit contract of a chat platform
//! - [`TelegramChannel`] implements it over the Bot API
//! - [`Aggregator`] owns the per-commit thread cache
//! - [`CommandRegistry`] and [`UpdatePoller`] route operator commands

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod aggregator;
pub mod channels;
pub mod commands;
pub mod error;
pub mod events;
pub mod poller;
pub mod render;
pub mod thread;

pub use aggregator::{Aggregator, Delivery, DEFAULT_TTL};
pub use channels::telegram::TelegramChannel;
pub use channels::{ChatId, Gateway, InlineButton, InlineKeyboard, MessageHandle, OutboundMessage};
pub use commands::{CommandRegistry, Inbound, InboundHandler, InboundRequest, Reply};
pub use error::{ChannelError, CommandError};
pub use events::{DeploymentEvent, RegistrationEvent, StageStatus};
pub use poller::UpdatePoller;

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

/// Chats each kind of notification goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channels {
    pub deployment: ChatId,
    pub registration: ChatId,
    pub domains: ChatId,
}

impl Channels {
    /// Route everything into one chat.
    #[must_use]
    pub fn single(chat: ChatId) -> Self {
        Self {
            deployment: chat.clone(),
            registration: chat.clone(),
            domains: chat,
        }
    }
}

/// Entry point for inbound deployment and registration events.
pub struct Notifier {
    gateway: Arc<dyn Gateway>,
    channels: Channels,
    aggregator: Aggregator,
}

impl Notifier {
    #[must_use]
    pub fn new(gateway: Arc<dyn Gateway>, channels: Channels) -> Self {
        Self::with_ttl(gateway, channels, DEFAULT_TTL)
    }

    #[must_use]
    pub fn with_ttl(gateway: Arc<dyn Gateway>, channels: Channels, ttl: Duration) -> Self {
        let aggregator =
            Aggregator::with_ttl(Arc::clone(&gateway), channels.deployment.clone(), ttl);
        info!(
            gateway = gateway.name(),
            ttl_secs = ttl.as_secs(),
            "Notifier initialized"
        );
        Self {
            gateway,
            channels,
            aggregator,
        }
    }

    #[must_use]
    pub fn channels(&self) -> &Channels {
        &self.channels
    }

    #[must_use]
    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// Relay a deployment stage update into its commit thread.
    pub async fn deployment(&self, event: &DeploymentEvent) -> Result<Delivery, ChannelError> {
        match self.aggregator.submit(event).await {
            Ok(delivery) => {
                info!(
                    repository = %event.repository,
                    commit = %event.commit,
                    stage = %event.stage,
                    status = %event.status,
                    delivery = ?delivery,
                    "Deployment update relayed"
                );
                Ok(delivery)
            }
            Err(e) => {
                error!(
                    commit = %event.commit,
                    stage = %event.stage,
                    error = %e,
                    "Failed to relay deployment update"
                );
                Err(e)
            }
        }
    }

    /// Post a registration notice as a new message.
    pub async fn registration(
        &self,
        event: &RegistrationEvent,
    ) -> Result<MessageHandle, ChannelError> {
        let message = OutboundMessage::text(render::registration(event));
        let handle = self
            .gateway
            .send_message(&self.channels.registration, &message)
            .await?;
        info!(fields = event.len(), message = %handle, "Registration relayed");
        Ok(handle)
    }

    /// Cancel pending thread timers and clear the cache.
    pub async fn shutdown(&self) {
        self.aggregator.shutdown().await;
    }
}
