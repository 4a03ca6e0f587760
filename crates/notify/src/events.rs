//! Inbound event types relayed into chat.

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A CI/CD pipeline stage changed status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentEvent {
    /// Repository in `owner/name` form
    pub repository: String,
    /// Job that produced the event
    pub name: String,
    /// Branch that triggered the job
    pub branch: String,
    /// Commit SHA, used as the correlation key
    pub commit: String,
    /// Commit author display name
    pub by: String,
    /// Pipeline stage label
    pub stage: String,
    /// Raw status string
    pub status: String,
}

impl DeploymentEvent {
    /// Correlation key grouping all updates about the same deployment.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.commit
    }

    #[must_use]
    pub fn stage_status(&self) -> StageStatus {
        StageStatus::parse(&self.status)
    }
}

/// Arbitrary key/value registration payload, rendered verbatim.
pub type RegistrationEvent = BTreeMap<String, String>;

/// Status of a pipeline stage.
///
/// Unknown strings are kept as [`StageStatus::Other`] and still render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageStatus {
    Success,
    Failed,
    Pending,
    Running,
    Canceled,
    Other(String),
}

impl StageStatus {
    /// Parse a status string. Matching is exact, so `"Success"` is `Other`.
    #[must_use]
    pub fn parse(status: &str) -> Self {
        match status {
            "success" => Self::Success,
            "failed" => Self::Failed,
            "pending" => Self::Pending,
            "running" => Self::Running,
            "canceled" => Self::Canceled,
            other => Self::Other(other.to_string()),
        }
    }

    #[must_use]
    pub const fn icon(&self) -> &'static str {
        match self {
            Self::Success => "✅",
            Self::Failed => "⚠️",
            Self::Pending | Self::Running => "🕑",
            Self::Canceled => "❌",
            Self::Other(_) => "❓",
        }
    }

    /// Display label. Fallback labels carry the raw (unescaped) status text.
    #[must_use]
    pub fn label(&self) -> Cow<'_, str> {
        match self {
            Self::Success => Cow::Borrowed("Success"),
            Self::Failed => Cow::Borrowed("Failed"),
            Self::Pending => Cow::Borrowed("Pending"),
            Self::Running => Cow::Borrowed("Running"),
            Self::Canceled => Cow::Borrowed("Canceled"),
            Self::Other(raw) => Cow::Borrowed(raw.as_str()),
        }
    }
}
