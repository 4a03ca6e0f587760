//! Reachability probes.

use std::error::Error as _;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;

/// Default time a single probe may take before it counts as a failure.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of probing one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Reachable,
    /// `reason` is a short machine-readable code such as `ECONNREFUSED`.
    Unreachable { reason: String },
}

impl ProbeOutcome {
    pub fn unreachable(reason: impl Into<String>) -> Self {
        Self::Unreachable {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub const fn is_reachable(&self) -> bool {
        matches!(self, Self::Reachable)
    }
}

/// Checks whether a URL answers.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, url: &str) -> ProbeOutcome;
}

/// Probe that issues a GET and treats any HTTP response as reachable.
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("inspector/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        match self.client.get(url).send().await {
            Ok(response) => {
                trace!(url, status = %response.status(), "Probe answered");
                ProbeOutcome::Reachable
            }
            Err(e) => {
                let reason = reason_code(&e);
                trace!(url, reason, error = %e, "Probe failed");
                ProbeOutcome::unreachable(reason)
            }
        }
    }
}

/// Map a request failure onto a stable reason code.
#[must_use]
pub fn reason_code(error: &reqwest::Error) -> &'static str {
    if error.is_timeout() {
        return "ETIMEDOUT";
    }
    if error.is_builder() {
        return "EINVALIDURL";
    }

    let mut source = error.source();
    while let Some(inner) = source {
        if let Some(io) = inner.downcast_ref::<io::Error>() {
            match io.kind() {
                io::ErrorKind::ConnectionRefused => return "ECONNREFUSED",
                io::ErrorKind::ConnectionReset => return "ECONNRESET",
                io::ErrorKind::ConnectionAborted => return "ECONNABORTED",
                io::ErrorKind::TimedOut => return "ETIMEDOUT",
                _ => {}
            }
        }

        if let Some(code) = message_code(&inner.to_string()) {
            return code;
        }

        source = inner.source();
    }

    if error.is_connect() {
        "ECONNECT"
    } else {
        "EFETCH"
    }
}

/// Classify an error message from the resolver or TLS stack.
///
/// Transient resolver failures (`EAI_AGAIN`) are kept apart from names that
/// do not resolve at all.
fn message_code(message: &str) -> Option<&'static str> {
    let text = message.to_ascii_lowercase();
    if text.contains("temporary failure in name resolution")
        || text.contains("eai_again")
        || text.contains("try again")
    {
        return Some("EAI_AGAIN");
    }
    if text.contains("dns error") || text.contains("failed to lookup address") {
        return Some("ENOTFOUND");
    }
    if text.contains("certificate") || text.contains("tls") {
        return Some("ECERT");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_code() {
        let cases = [
            (
                "dns error: failed to lookup address information: Temporary failure in name resolution",
                Some("EAI_AGAIN"),
            ),
            ("failed to lookup address information: Try again", Some("EAI_AGAIN")),
            (
                "dns error: failed to lookup address information: Name or service not known",
                Some("ENOTFOUND"),
            ),
            ("invalid peer certificate: UnknownIssuer", Some("ECERT")),
            ("connection closed before message completed", None),
        ];

        for (message, code) in cases {
            assert_eq!(message_code(message), code, "{message}");
        }
    }
}
