//! The sweep loop.
//!
//! Each sweep loads the domain set, probes every domain one after another and
//! alerts only on state changes. The next sweep starts a fixed delay after the
//! previous one finished, so sweeps never overlap.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use notify::{ChatId, Gateway};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::alerts;
use crate::probe::{Probe, ProbeOutcome};
use crate::state::{Alert, Liveness, LivenessTable, TransitionPolicy};
use crate::store::{DomainStore, StoreError};

/// Default pause between the end of one sweep and the start of the next.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for the liveness monitor
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Delay after a finished sweep
    pub interval: Duration,
    /// Alert on the very first successful probe of a domain
    pub announce_first_alive: bool,
    /// Failure reasons that never change state
    pub ignored_reasons: HashSet<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            announce_first_alive: false,
            ignored_reasons: HashSet::new(),
        }
    }
}

/// Errors that abort a sweep.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("failed to load domains: {0}")]
    Store(#[from] StoreError),
}

/// What one sweep did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// Domains probed
    pub checked: usize,
    /// Domains that answered
    pub reachable: usize,
    /// Alerts triggered, in probe order
    pub alerts: Vec<Alert>,
    /// Alerts the gateway failed to deliver
    pub undelivered: usize,
}

/// Probes the domain set and alerts on transitions.
pub struct LivenessMonitor {
    store: Arc<dyn DomainStore>,
    probe: Arc<dyn Probe>,
    gateway: Arc<dyn Gateway>,
    chat: ChatId,
    interval: Duration,
    policy: TransitionPolicy,
    table: Mutex<LivenessTable>,
}

impl LivenessMonitor {
    pub fn new(
        store: Arc<dyn DomainStore>,
        probe: Arc<dyn Probe>,
        gateway: Arc<dyn Gateway>,
        chat: ChatId,
        config: MonitorConfig,
    ) -> Self {
        Self {
            store,
            probe,
            gateway,
            chat,
            interval: config.interval,
            policy: TransitionPolicy {
                announce_first_alive: config.announce_first_alive,
                ignored_reasons: config.ignored_reasons,
            },
            table: Mutex::new(LivenessTable::new()),
        }
    }

    /// Current classification of a domain.
    pub async fn state(&self, url: &str) -> Liveness {
        self.table.lock().await.get(url)
    }

    /// Seed a classification, e.g. to resume from a known state.
    pub async fn set_state(&self, url: &str, state: Liveness) {
        self.table.lock().await.set(url, state);
    }

    /// Run one sweep over the current domain set.
    pub async fn sweep(&self) -> Result<SweepReport, MonitorError> {
        let domains = self.store.load().await?;
        debug!(count = domains.len(), "Sweeping domains");

        let mut report = SweepReport::default();
        for url in &domains {
            let outcome = self.probe.probe(url).await;
            report.checked += 1;

            match &outcome {
                ProbeOutcome::Reachable => report.reachable += 1,
                ProbeOutcome::Unreachable { reason } => {
                    debug!(url = %url, reason = %reason, "Domain unreachable");
                }
            }

            let alert = self
                .table
                .lock()
                .await
                .observe(url, &outcome, &self.policy);

            if let Some(alert) = alert {
                if !self.deliver(&alert).await {
                    report.undelivered += 1;
                }
                report.alerts.push(alert);
            }
        }

        Ok(report)
    }

    async fn deliver(&self, alert: &Alert) -> bool {
        match alert {
            Alert::Dead { url, reason } => warn!(url = %url, reason = %reason, "Domain is down"),
            Alert::Alive { url } => info!(url = %url, "Domain is back up"),
        }

        match self
            .gateway
            .send_message(&self.chat, &alerts::render(alert))
            .await
        {
            Ok(_) => true,
            Err(e) => {
                error!(url = %alert.url(), error = %e, "Failed to send liveness alert");
                false
            }
        }
    }

    /// Sweep until cancelled, pausing `interval` after each sweep.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "Liveness monitor started");

        loop {
            let sweep = tokio::select! {
                () = cancel.cancelled() => break,
                sweep = self.sweep() => sweep,
            };

            match sweep {
                Ok(report) => info!(
                    checked = report.checked,
                    reachable = report.reachable,
                    alerts = report.alerts.len(),
                    "Sweep finished"
                ),
                Err(e) => error!(error = %e, "Sweep aborted"),
            }

            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(self.interval) => {}
            }
        }

        info!("Liveness monitor stopped");
    }

    /// Start the sweep loop on the runtime.
    #[must_use]
    pub fn spawn(self: Arc<Self>) -> MonitorHandle {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(self.run(cancel.clone()));
        MonitorHandle { cancel, task }
    }
}

/// Handle to a spawned monitor loop.
pub struct MonitorHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Stop the loop and wait for it to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            error!(error = %e, "Liveness monitor task failed");
        }
    }
}
