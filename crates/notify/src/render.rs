//! HTML rendering of chat messages.

use std::fmt::Write as _;

use crate::events::{DeploymentEvent, RegistrationEvent, StageStatus};

/// Escape text for Telegram's HTML parse mode.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Header block of a deployment thread, without the trailing blank line.
#[must_use]
pub fn deployment_header(event: &DeploymentEvent) -> String {
    format!(
        "🔍 <b>New deployment detected in repository</b> <code>{}</code>\n\n\
         Triggered by <i>\"{}\"</i> in branch <code>{}</code> for commit <code>{}</code> by <b>{}</b>",
        escape_html(&event.repository),
        escape_html(&event.name),
        escape_html(&event.branch),
        escape_html(&event.commit),
        escape_html(&event.by),
    )
}

/// A single `• Status of job ...` line.
#[must_use]
pub fn stage_line(stage: &str, status: &StageStatus) -> String {
    format!(
        "• Status of job <code>{}</code> is <b>{}</b> {}",
        escape_html(stage),
        escape_html(&status.label()),
        status.icon()
    )
}

/// Registration notice listing every field in key order.
#[must_use]
pub fn registration(event: &RegistrationEvent) -> String {
    let mut text = String::from("📝 <b>New registration</b>\n");
    for (key, value) in event {
        let _ = write!(
            text,
            "\n<b>{}</b>: <code>{}</code>",
            escape_html(key),
            escape_html(value)
        );
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a < b && c > d"), "a &lt; b &amp;&amp; c &gt; d");
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_stage_line_known_status() {
        assert_eq!(
            stage_line("build", &StageStatus::Success),
            "• Status of job <code>build</code> is <b>Success</b> ✅"
        );
    }

    #[test]
    fn test_stage_line_fallback_is_escaped() {
        assert_eq!(
            stage_line("<deploy>", &StageStatus::parse("<weird>")),
            "• Status of job <code>&lt;deploy&gt;</code> is <b>&lt;weird&gt;</b> ❓"
        );
    }

    #[test]
    fn test_registration_lists_fields_sorted() {
        let event = RegistrationEvent::from([
            ("telegram".to_string(), "@johndoe".to_string()),
            ("name".to_string(), "John <Doe>".to_string()),
        ]);
        assert_eq!(
            registration(&event),
            "📝 <b>New registration</b>\n\n<b>name</b>: <code>John &lt;Doe&gt;</code>\n<b>telegram</b>: <code>@johndoe</code>"
        );
    }
}
