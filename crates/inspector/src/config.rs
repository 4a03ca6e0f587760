//! Service configuration from command line flags and environment variables.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use liveness::MonitorConfig;
use notify::{Channels, ChatId};

/// CI/CD notification relay and domain liveness monitor.
#[derive(Debug, Clone, Parser)]
#[command(name = "inspector")]
#[command(about = "Relay CI/CD events into Telegram and watch domain liveness")]
#[command(version)]
pub struct Config {
    /// Telegram bot token
    #[arg(long, env = "TELEGRAM_TOKEN", hide_env_values = true)]
    pub telegram_token: String,

    /// Chat receiving deployment threads
    #[arg(long, env = "TELEGRAM_CHAT_ID", allow_hyphen_values = true)]
    pub chat_id: String,

    /// Chat receiving registration notices (defaults to `--chat-id`)
    #[arg(long, env = "TELEGRAM_REGISTRATION_CHAT_ID", allow_hyphen_values = true)]
    pub registration_chat_id: Option<String>,

    /// Chat receiving domain alerts and accepting domain commands
    /// (defaults to `--chat-id`). Must be numeric for commands to be accepted.
    #[arg(long, env = "TELEGRAM_DOMAIN_CHAT_ID", allow_hyphen_values = true)]
    pub domain_chat_id: Option<String>,

    /// Bot API base URL
    #[arg(long, env = "TELEGRAM_API_URL", default_value = "https://api.telegram.org")]
    pub telegram_api_url: String,

    /// HTTP port
    #[arg(long, env = "INSPECTOR_PORT", default_value_t = 1488)]
    pub port: u16,

    /// JSON file holding the monitored domains
    #[arg(long, env = "DOMAINS_FILE", default_value = "domains.json")]
    pub domains_file: PathBuf,

    /// Pause between domain sweeps, in seconds
    #[arg(long, env = "DOMAIN_CHECK_INTERVAL_SECS", default_value_t = 60)]
    pub check_interval_secs: u64,

    /// Per-domain probe timeout, in seconds
    #[arg(long, env = "DOMAIN_PROBE_TIMEOUT_SECS", default_value_t = 10)]
    pub probe_timeout_secs: u64,

    /// Inactivity after which a deployment thread is forgotten, in seconds
    #[arg(long, env = "THREAD_TTL_SECS", default_value_t = 1800)]
    pub thread_ttl_secs: u64,

    /// Alert when a domain is first seen reachable
    #[arg(long, env = "ANNOUNCE_FIRST_ALIVE")]
    pub announce_first_alive: bool,

    /// Probe failure reasons that never change a domain's state
    #[arg(long, env = "IGNORED_PROBE_ERRORS", value_delimiter = ',')]
    pub ignored_probe_errors: Vec<String>,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

impl Config {
    /// Destination chat of each notification kind.
    #[must_use]
    pub fn channels(&self) -> Channels {
        let or_default = |chat: &Option<String>| {
            ChatId::new(chat.as_deref().unwrap_or(&self.chat_id))
        };
        Channels {
            deployment: ChatId::new(&self.chat_id),
            registration: or_default(&self.registration_chat_id),
            domains: or_default(&self.domain_chat_id),
        }
    }

    #[must_use]
    pub fn thread_ttl(&self) -> Duration {
        Duration::from_secs(self.thread_ttl_secs)
    }

    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    #[must_use]
    pub fn monitor_config(&self) -> MonitorConfig {
        let ignored_reasons: HashSet<String> = self
            .ignored_probe_errors
            .iter()
            .map(|reason| reason.trim().to_ascii_uppercase())
            .filter(|reason| !reason.is_empty())
            .collect();

        MonitorConfig {
            interval: Duration::from_secs(self.check_interval_secs),
            announce_first_alive: self.announce_first_alive,
            ignored_reasons,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Config {
        let args = ["inspector", "--telegram-token", "123:secret", "--chat-id", "-100"];
        Config::try_parse_from(args.iter().chain(extra)).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);
        assert_eq!(config.port, 1488);
        assert_eq!(config.domains_file, PathBuf::from("domains.json"));
        assert_eq!(config.thread_ttl(), Duration::from_secs(1800));
        assert_eq!(config.probe_timeout(), Duration::from_secs(10));

        let monitor = config.monitor_config();
        assert_eq!(monitor.interval, Duration::from_secs(60));
        assert!(!monitor.announce_first_alive);
        assert!(monitor.ignored_reasons.is_empty());
    }

    #[test]
    fn test_channels_fall_back_to_deployment_chat() {
        let channels = parse(&[]).channels();
        assert_eq!(channels, Channels::single(ChatId::from(-100)));

        let channels = parse(&["--domain-chat-id", "-300"]).channels();
        assert_eq!(channels.registration, ChatId::from(-100));
        assert_eq!(channels.domains, ChatId::from(-300));
    }

    #[test]
    fn test_ignored_reasons_are_normalized() {
        let config = parse(&["--ignored-probe-errors", "etimedout, ECERT,,"]);
        let reasons = config.monitor_config().ignored_reasons;
        assert_eq!(
            reasons,
            HashSet::from(["ETIMEDOUT".to_string(), "ECERT".to_string()])
        );
    }

    #[test]
    fn test_channel_name_is_not_numeric() {
        assert!(parse(&[]).channels().domains.is_numeric());
        let channels = parse(&["--domain-chat-id", "@ops_alerts"]).channels();
        assert!(!channels.domains.is_numeric());
    }

    #[test]
    fn test_token_is_required() {
        assert!(Config::try_parse_from(["inspector", "--chat-id", "1"]).is_err());
    }
}
