//! Chat messages for liveness alerts.

use notify::render::escape_html;
use notify::{InlineKeyboard, OutboundMessage};
use sha1::{Digest, Sha1};

use crate::state::Alert;

/// Callback data prefix of the "delete domain" button.
pub const DELETE_CALLBACK_PREFIX: &str = "domain:del:";

/// Hex digits of the URL digest carried in callback data.
const KEY_LEN: usize = 12;

/// Short stable key for a URL; Telegram caps callback data at 64 bytes.
#[must_use]
pub fn domain_key(url: &str) -> String {
    let digest = Sha1::digest(url.as_bytes());
    let mut key = hex::encode(digest);
    key.truncate(KEY_LEN);
    key
}

/// Render an alert; "dead" alerts carry a delete button.
#[must_use]
pub fn render(alert: &Alert) -> OutboundMessage {
    match alert {
        Alert::Dead { url, reason } => OutboundMessage::text(format!(
            "🔴 <b>Domain is down</b>\n\n<code>{}</code> stopped responding: <code>{}</code>",
            escape_html(url),
            escape_html(reason)
        ))
        .with_keyboard(InlineKeyboard::single(
            "🗑 Delete domain",
            format!("{DELETE_CALLBACK_PREFIX}{}", domain_key(url)),
        )),
        Alert::Alive { url } => OutboundMessage::text(format!(
            "🟢 <b>Domain is back up</b>\n\n<code>{}</code> responds again",
            escape_html(url)
        )),
    }
}

/// Replacement text of an alert after its domain was deleted.
#[must_use]
pub fn removed(url: &str, by: Option<&str>) -> OutboundMessage {
    let by = by.map(|who| format!(" by {}", escape_html(who))).unwrap_or_default();
    OutboundMessage::text(format!(
        "🗑 <b>Domain removed</b>\n\n<code>{}</code> is no longer monitored{by}",
        escape_html(url)
    ))
}
