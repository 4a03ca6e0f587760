//! Per-domain liveness classification and its transition table.

use std::collections::{HashMap, HashSet};

use crate::probe::ProbeOutcome;

/// Remembered classification of one domain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Liveness {
    #[default]
    Unknown,
    Alive,
    Dead,
}

/// Alert emitted on a state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alert {
    Alive { url: String },
    Dead { url: String, reason: String },
}

impl Alert {
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Alive { url } | Self::Dead { url, .. } => url,
        }
    }
}

/// Knobs of the transition table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionPolicy {
    /// Alert when a domain is first seen reachable.
    pub announce_first_alive: bool,
    /// Failure reasons that leave the state untouched.
    pub ignored_reasons: HashSet<String>,
}

/// Apply one probe outcome to a state.
///
/// | current | probe   | next  | alert  |
/// |---------|---------|-------|--------|
/// | Unknown | success | Alive | none*  |
/// | Unknown | failure | Dead  | none   |
/// | Alive   | success | Alive | none   |
/// | Alive   | failure | Dead  | dead   |
/// | Dead    | success | Alive | alive  |
/// | Dead    | failure | Dead  | none   |
///
/// *unless `announce_first_alive` is set.
#[must_use]
pub fn transition(
    current: Liveness,
    url: &str,
    outcome: &ProbeOutcome,
    policy: &TransitionPolicy,
) -> (Liveness, Option<Alert>) {
    match (current, outcome) {
        (_, ProbeOutcome::Unreachable { reason }) if policy.ignored_reasons.contains(reason) => {
            (current, None)
        }
        (Liveness::Unknown, ProbeOutcome::Reachable) => {
            let alert = policy.announce_first_alive.then(|| Alert::Alive {
                url: url.to_string(),
            });
            (Liveness::Alive, alert)
        }
        (Liveness::Unknown | Liveness::Dead, ProbeOutcome::Unreachable { .. }) => {
            (Liveness::Dead, None)
        }
        (Liveness::Alive, ProbeOutcome::Reachable) => (Liveness::Alive, None),
        (Liveness::Alive, ProbeOutcome::Unreachable { reason }) => (
            Liveness::Dead,
            Some(Alert::Dead {
                url: url.to_string(),
                reason: reason.clone(),
            }),
        ),
        (Liveness::Dead, ProbeOutcome::Reachable) => (
            Liveness::Alive,
            Some(Alert::Alive {
                url: url.to_string(),
            }),
        ),
    }
}

/// Monitor-local liveness of every domain seen so far.
///
/// Entries are never dropped when a domain leaves the store.
#[derive(Debug, Default)]
pub struct LivenessTable {
    states: HashMap<String, Liveness>,
}

impl LivenessTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, url: &str) -> Liveness {
        self.states.get(url).copied().unwrap_or_default()
    }

    /// Seed a state, e.g. when resuming from a known classification.
    pub fn set(&mut self, url: impl Into<String>, state: Liveness) {
        self.states.insert(url.into(), state);
    }

    /// Record a probe outcome and return the alert it triggers, if any.
    pub fn observe(
        &mut self,
        url: &str,
        outcome: &ProbeOutcome,
        policy: &TransitionPolicy,
    ) -> Option<Alert> {
        let current = self.get(url);
        let (next, alert) = transition(current, url, outcome, policy);
        if next != current {
            self.states.insert(url.to_string(), next);
        }
        alert
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
