//! Operator control over the domain set: `/add`, `/delete`, `/domains` and
//! the "delete domain" button on dead alerts.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use notify::render::escape_html;
use notify::{CommandError, CommandRegistry, InboundHandler, InboundRequest, OutboundMessage, Reply};
use tokio::sync::Mutex;
use tracing::info;

use crate::alerts::{self, DELETE_CALLBACK_PREFIX};
use crate::store::{DomainStore, StoreError};

/// Result of a mutation of the domain set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Added(String),
    AlreadyPresent(String),
    Removed(String),
    NotFound(String),
}

/// Mutations of the domain set, serialized so concurrent commands never lose
/// each other's writes.
pub struct DomainCommands {
    store: Arc<dyn DomainStore>,
    edit: Mutex<()>,
}

impl DomainCommands {
    pub fn new(store: Arc<dyn DomainStore>) -> Self {
        Self {
            store,
            edit: Mutex::new(()),
        }
    }

    pub async fn add(&self, url: &str) -> Result<Change, StoreError> {
        let _edit = self.edit.lock().await;
        let mut domains = self.store.load().await?;
        if !domains.insert(url.to_string()) {
            return Ok(Change::AlreadyPresent(url.to_string()));
        }
        self.store.save(&domains).await?;
        info!(url, count = domains.len(), "Domain added");
        Ok(Change::Added(url.to_string()))
    }

    pub async fn delete(&self, url: &str) -> Result<Change, StoreError> {
        let _edit = self.edit.lock().await;
        let mut domains = self.store.load().await?;
        if !domains.remove(url) {
            return Ok(Change::NotFound(url.to_string()));
        }
        self.store.save(&domains).await?;
        info!(url, count = domains.len(), "Domain removed");
        Ok(Change::Removed(url.to_string()))
    }

    /// Delete the domain whose [`alerts::domain_key`] is `key`.
    pub async fn delete_by_key(&self, key: &str) -> Result<Change, StoreError> {
        let _edit = self.edit.lock().await;
        let mut domains = self.store.load().await?;
        let Some(url) = domains.iter().find(|url| alerts::domain_key(url) == key).cloned() else {
            return Ok(Change::NotFound(key.to_string()));
        };
        domains.remove(&url);
        self.store.save(&domains).await?;
        info!(url = %url, count = domains.len(), "Domain removed from alert");
        Ok(Change::Removed(url))
    }

    pub async fn list(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.store.load().await?.into_iter().collect())
    }

    /// Register every command and callback on `registry`.
    pub fn register(self: &Arc<Self>, registry: &mut CommandRegistry) {
        registry.register_command("add", Arc::new(AddDomain(Arc::clone(self))));
        registry.register_command("delete", Arc::new(DeleteDomain(Arc::clone(self))));
        registry.register_command("domains", Arc::new(ListDomains(Arc::clone(self))));
        registry.register_callback(
            DELETE_CALLBACK_PREFIX,
            Arc::new(DeleteFromAlert(Arc::clone(self))),
        );
    }
}

/// Validate an operator-supplied URL. Only http(s) URLs with a host pass.
pub fn parse_url(input: &str) -> Result<String, CommandError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CommandError::Usage(
            "usage: /add https://example.com".to_string(),
        ));
    }
    let parsed = reqwest::Url::parse(input)
        .map_err(|e| CommandError::Usage(format!("invalid URL {input}: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(CommandError::Usage(format!(
            "only http(s) URLs can be monitored, got {input}"
        )));
    }
    Ok(input.to_string())
}

fn code(url: &str) -> String {
    format!("<code>{}</code>", escape_html(url))
}

struct AddDomain(Arc<DomainCommands>);

#[async_trait]
impl InboundHandler for AddDomain {
    async fn handle(&self, request: &InboundRequest) -> Result<Reply, CommandError> {
        let url = parse_url(&request.args)?;
        let text = match self.0.add(&url).await.map_err(CommandError::failed)? {
            Change::AlreadyPresent(url) => format!("{} is already monitored", code(&url)),
            _ => format!("✅ Now monitoring {}", code(&url)),
        };
        Ok(Reply::Send(OutboundMessage::text(text)))
    }
}

struct DeleteDomain(Arc<DomainCommands>);

#[async_trait]
impl InboundHandler for DeleteDomain {
    async fn handle(&self, request: &InboundRequest) -> Result<Reply, CommandError> {
        let url = request.args.trim();
        if url.is_empty() {
            return Err(CommandError::Usage(
                "usage: /delete https://example.com".to_string(),
            ));
        }
        let text = match self.0.delete(url).await.map_err(CommandError::failed)? {
            Change::Removed(url) => format!("🗑 Stopped monitoring {}", code(&url)),
            _ => format!("{} is not monitored", code(url)),
        };
        Ok(Reply::Send(OutboundMessage::text(text)))
    }
}

struct ListDomains(Arc<DomainCommands>);

#[async_trait]
impl InboundHandler for ListDomains {
    async fn handle(&self, _request: &InboundRequest) -> Result<Reply, CommandError> {
        let domains = self.0.list().await.map_err(CommandError::failed)?;
        if domains.is_empty() {
            return Ok(Reply::Send(OutboundMessage::text("No domains are monitored")));
        }
        let mut text = format!("🌐 <b>Monitored domains</b> ({})\n", domains.len());
        for url in &domains {
            let _ = write!(text, "\n• {}", code(url));
        }
        Ok(Reply::Send(OutboundMessage::text(text)))
    }
}

struct DeleteFromAlert(Arc<DomainCommands>);

#[async_trait]
impl InboundHandler for DeleteFromAlert {
    async fn handle(&self, request: &InboundRequest) -> Result<Reply, CommandError> {
        match self
            .0
            .delete_by_key(&request.args)
            .await
            .map_err(CommandError::failed)?
        {
            Change::Removed(url) => Ok(Reply::Edit(alerts::removed(&url, request.from.as_deref()))),
            _ => Ok(Reply::Send(OutboundMessage::text(
                "That domain is no longer monitored",
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn commands(domains: &[&str]) -> Arc<DomainCommands> {
        Arc::new(DomainCommands::new(Arc::new(MemoryStore::new(
            domains.iter().copied(),
        ))))
    }

    #[test]
    fn test_parse_url() {
        assert_eq!(parse_url(" https://x.test ").unwrap(), "https://x.test");
        assert!(parse_url("ftp://x.test").is_err());
        assert!(parse_url("not a url").is_err());
        assert!(parse_url("").is_err());
    }

    #[tokio::test]
    async fn test_add_and_delete() {
        let commands = commands(&[]);
        assert_eq!(
            commands.add("https://x.test").await.unwrap(),
            Change::Added("https://x.test".to_string())
        );
        assert_eq!(
            commands.add("https://x.test").await.unwrap(),
            Change::AlreadyPresent("https://x.test".to_string())
        );
        assert_eq!(commands.list().await.unwrap(), ["https://x.test"]);

        assert_eq!(
            commands.delete("https://x.test").await.unwrap(),
            Change::Removed("https://x.test".to_string())
        );
        assert_eq!(
            commands.delete("https://x.test").await.unwrap(),
            Change::NotFound("https://x.test".to_string())
        );
    }

    #[tokio::test]
    async fn test_delete_by_key() {
        let commands = commands(&["https://x.test", "https://y.test"]);
        let key = alerts::domain_key("https://y.test");

        assert_eq!(
            commands.delete_by_key(&key).await.unwrap(),
            Change::Removed("https://y.test".to_string())
        );
        assert_eq!(commands.list().await.unwrap(), ["https://x.test"]);
        assert!(matches!(
            commands.delete_by_key(&key).await.unwrap(),
            Change::NotFound(_)
        ));
    }
}
