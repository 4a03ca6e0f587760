//! Collapses deployment events sharing a correlation key into one message.
//!
//! The first event for a key sends a new message; later events edit it. A
//! thread expires after [`DEFAULT_TTL`] without activity, after which the key
//! starts a fresh message.
//!
//! Each key has its own async mutex so two submissions for the same key never
//! interleave across the gateway call, while different keys run independently.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::channels::{ChatId, Gateway, MessageHandle, OutboundMessage};
use crate::error::ChannelError;
use crate::events::DeploymentEvent;
use crate::thread::{NotificationThread, StageStatusLine};

/// Inactivity window after which a thread is forgotten.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

type Slots = Arc<Mutex<HashMap<String, Arc<Mutex<Slot>>>>>;

/// Outcome of a successful [`Aggregator::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// A new message was sent.
    Created(MessageHandle),
    /// An existing message was edited.
    Edited(MessageHandle),
}

impl Delivery {
    #[must_use]
    pub const fn handle(&self) -> MessageHandle {
        match self {
            Self::Created(handle) | Self::Edited(handle) => *handle,
        }
    }
}

#[derive(Default)]
struct Slot {
    entry: Option<Entry>,
}

struct Entry {
    thread: NotificationThread,
    expires_at: Instant,
    generation: u64,
    eviction: JoinHandle<()>,
}

/// Keyed cache of in-flight deployment threads.
pub struct Aggregator {
    gateway: Arc<dyn Gateway>,
    chat: ChatId,
    ttl: Duration,
    slots: Slots,
    generation: AtomicU64,
}

impl Aggregator {
    #[must_use]
    pub fn new(gateway: Arc<dyn Gateway>, chat: ChatId) -> Self {
        Self::with_ttl(gateway, chat, DEFAULT_TTL)
    }

    #[must_use]
    pub fn with_ttl(gateway: Arc<dyn Gateway>, chat: ChatId, ttl: Duration) -> Self {
        Self {
            gateway,
            chat,
            ttl,
            slots: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
        }
    }

    /// Relay one event: send for a new key, edit for a live one.
    ///
    /// Performs exactly one gateway call. Gateway errors are returned as-is.
    pub async fn submit(&self, event: &DeploymentEvent) -> Result<Delivery, ChannelError> {
        let key = event.key().to_string();
        let slot = self.slot(&key).await;

        let result = {
            let mut guard = slot.lock().await;
            self.apply(&key, &mut guard, event).await
        };

        self.release(&key, slot).await;
        result
    }

    /// Number of live (non-expired) threads.
    pub async fn active_threads(&self) -> usize {
        let slots: Vec<_> = self.slots.lock().await.values().cloned().collect();
        let now = Instant::now();
        let mut active = 0;
        for slot in slots {
            if slot
                .lock()
                .await
                .entry
                .as_ref()
                .is_some_and(|e| e.expires_at > now)
            {
                active += 1;
            }
        }
        active
    }

    /// Cancel every eviction timer and drop all threads.
    pub async fn shutdown(&self) {
        let drained: Vec<_> = self.slots.lock().await.drain().collect();
        let count = drained.len();
        for (_, slot) in drained {
            if let Some(entry) = slot.lock().await.entry.take() {
                entry.eviction.abort();
            }
        }
        info!(threads = count, "Deployment thread cache cleared");
    }

    async fn apply(
        &self,
        key: &str,
        slot: &mut Slot,
        event: &DeploymentEvent,
    ) -> Result<Delivery, ChannelError> {
        let now = Instant::now();

        // The timer may not have run yet; the expiry record is authoritative.
        if let Some(stale) = slot.entry.take_if(|e| e.expires_at <= now) {
            stale.eviction.abort();
            debug!(key, "Thread expired, starting a new one");
        }

        if let Some(entry) = slot.entry.as_mut() {
            entry.eviction.abort();
            entry.thread.upsert(StageStatusLine::from_event(event));
            let text = entry.thread.render();
            let handle = entry.thread.handle();

            entry.generation = self.next_generation();
            entry.expires_at = now + self.ttl;
            entry.eviction = self.arm(key.to_string(), entry.generation);

            debug!(key, message = %handle, stage = %event.stage, "Editing deployment thread");
            self.gateway
                .edit_message(&self.chat, handle, &OutboundMessage::text(text))
                .await?;
            return Ok(Delivery::Edited(handle));
        }

        let (text, line) = NotificationThread::initial_text(event);
        let handle = self
            .gateway
            .send_message(&self.chat, &OutboundMessage::text(text))
            .await?;

        let generation = self.next_generation();
        slot.entry = Some(Entry {
            thread: NotificationThread::new(handle, event, line),
            expires_at: Instant::now() + self.ttl,
            generation,
            eviction: self.arm(key.to_string(), generation),
        });

        debug!(key, message = %handle, "Started deployment thread");
        Ok(Delivery::Created(handle))
    }

    async fn slot(&self, key: &str) -> Arc<Mutex<Slot>> {
        let mut slots = self.slots.lock().await;
        Arc::clone(slots.entry(key.to_string()).or_default())
    }

    /// Drop an empty slot nobody else is waiting on.
    async fn release(&self, key: &str, slot: Arc<Mutex<Slot>>) {
        let mut slots = self.slots.lock().await;
        let Ok(guard) = slot.try_lock() else {
            return;
        };
        // One reference held by the map, one by us.
        if guard.entry.is_none() && Arc::strong_count(&slot) == 2 {
            drop(guard);
            slots.remove(key);
        }
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn arm(&self, key: String, generation: u64) -> JoinHandle<()> {
        let slots = Arc::clone(&self.slots);
        let ttl = self.ttl;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            evict(&slots, &key, generation).await;
        })
    }
}

async fn evict(slots: &Slots, key: &str, generation: u64) {
    let Some(slot) = slots.lock().await.get(key).cloned() else {
        return;
    };

    // Wait out readers such as `active_threads`. A submission that re-arms
    // this entry aborts us while we wait.
    {
        let mut guard = slot.lock().await;
        if guard
            .entry
            .as_ref()
            .is_some_and(|e| e.generation == generation)
        {
            guard.entry = None;
            debug!(key, "Deployment thread evicted");
        }
    }

    let mut map = slots.lock().await;
    let Ok(guard) = slot.try_lock() else {
        return;
    };
    // One reference held by the map, one by us.
    let unused = guard.entry.is_none()
        && Arc::strong_count(&slot) == 2
        && map.get(key).is_some_and(|current| Arc::ptr_eq(current, &slot));
    drop(guard);
    if unused {
        map.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct CountingGateway {
        sent: StdMutex<u32>,
    }

    #[async_trait]
    impl Gateway for CountingGateway {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn send_message(
            &self,
            _chat: &ChatId,
            _message: &OutboundMessage,
        ) -> Result<MessageHandle, ChannelError> {
            let mut sent = self.sent.lock().unwrap();
            *sent += 1;
            Ok(MessageHandle(i64::from(*sent)))
        }

        async fn edit_message(
            &self,
            _chat: &ChatId,
            _handle: MessageHandle,
            _message: &OutboundMessage,
        ) -> Result<(), ChannelError> {
            Ok(())
        }
    }

    fn event(commit: &str) -> DeploymentEvent {
        DeploymentEvent {
            repository: "o/r".to_string(),
            name: "ci".to_string(),
            branch: "main".to_string(),
            commit: commit.to_string(),
            by: "a".to_string(),
            stage: "build".to_string(),
            status: "running".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_timer_empties_the_cache() {
        let aggregator = Aggregator::with_ttl(
            Arc::new(CountingGateway::default()),
            ChatId::from("1"),
            Duration::from_secs(60),
        );
        aggregator.submit(&event("aaaaaaa")).await.unwrap();
        assert_eq!(aggregator.slots.lock().await.len(), 1);

        tokio::time::sleep(Duration::from_secs(61)).await;

        assert!(aggregator.slots.lock().await.is_empty());
        assert_eq!(aggregator.active_threads().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_waits_for_a_busy_slot() {
        let aggregator = Aggregator::with_ttl(
            Arc::new(CountingGateway::default()),
            ChatId::from("1"),
            Duration::from_secs(60),
        );
        aggregator.submit(&event("aaaaaaa")).await.unwrap();

        let slot = aggregator.slots.lock().await.get("aaaaaaa").cloned().unwrap();
        let guard = slot.lock().await;
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(aggregator.slots.lock().await.len(), 1);

        drop(guard);
        drop(slot);
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }

        assert!(aggregator.slots.lock().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_clears_cache() {
        let aggregator = Aggregator::new(Arc::new(CountingGateway::default()), ChatId::from("1"));
        aggregator.submit(&event("aaaaaaa")).await.unwrap();
        aggregator.submit(&event("bbbbbbb")).await.unwrap();
        assert_eq!(aggregator.active_threads().await, 2);

        aggregator.shutdown().await;
        assert_eq!(aggregator.active_threads().await, 0);
        assert!(aggregator.slots.lock().await.is_empty());
    }
}
