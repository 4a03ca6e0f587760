//! Long-polling loop feeding Telegram updates into a [`CommandRegistry`].

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::channels::telegram::TelegramChannel;
use crate::commands::{CommandRegistry, Inbound};

/// Long-poll timeout passed to `getUpdates`.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(25);

/// Pause after a failed poll before trying again.
pub const RETRY_BACKOFF: Duration = Duration::from_secs(5);

/// Receives operator commands and button presses.
pub struct UpdatePoller {
    channel: Arc<TelegramChannel>,
    registry: Arc<CommandRegistry>,
    poll_timeout: Duration,
    backoff: Duration,
}

impl UpdatePoller {
    #[must_use]
    pub fn new(channel: Arc<TelegramChannel>, registry: Arc<CommandRegistry>) -> Self {
        Self {
            channel,
            registry,
            poll_timeout: POLL_TIMEOUT,
            backoff: RETRY_BACKOFF,
        }
    }

    #[must_use]
    pub fn with_timing(mut self, poll_timeout: Duration, backoff: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self.backoff = backoff;
        self
    }

    /// Poll until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        info!("Update poller started");
        let mut offset = 0;

        loop {
            let polled = tokio::select! {
                () = cancel.cancelled() => break,
                polled = self.channel.get_updates(offset, self.poll_timeout) => polled,
            };

            let updates = match polled {
                Ok(updates) => updates,
                Err(e) => {
                    warn!(error = %e, "Failed to fetch updates");
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(self.backoff) => continue,
                    }
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);
                if let Some(inbound) = Inbound::from_update(update) {
                    self.handle(inbound).await;
                }
            }
        }

        info!("Update poller stopped");
    }

    async fn handle(&self, inbound: Inbound) {
        if let Err(e) = self.registry.dispatch(&inbound, self.channel.as_ref()).await {
            warn!(chat = %inbound.chat(), error = %e, "Failed to deliver command reply");
        }

        if let Inbound::Callback { id, .. } = &inbound {
            if let Err(e) = self.channel.answer_callback_query(id, None).await {
                debug!(error = %e, "Failed to answer callback query");
            }
        }
    }
}
