//! A deployment thread: one chat message that accumulates stage statuses.

use crate::channels::MessageHandle;
use crate::events::{DeploymentEvent, StageStatus};
use crate::render;

/// Latest known status of one pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageStatusLine {
    pub stage: String,
    pub status: StageStatus,
}

impl StageStatusLine {
    #[must_use]
    pub fn from_event(event: &DeploymentEvent) -> Self {
        Self {
            stage: event.stage.clone(),
            status: event.stage_status(),
        }
    }

    #[must_use]
    pub fn render(&self) -> String {
        render::stage_line(&self.stage, &self.status)
    }
}

/// Cached message context for one correlation key.
///
/// Stage labels are unique; lines keep first-seen order.
#[derive(Debug, Clone)]
pub struct NotificationThread {
    handle: MessageHandle,
    header: String,
    lines: Vec<StageStatusLine>,
}

impl NotificationThread {
    /// Build the text of a thread that has not been sent yet.
    #[must_use]
    pub fn initial_text(event: &DeploymentEvent) -> (String, StageStatusLine) {
        let header = render::deployment_header(event);
        let line = StageStatusLine::from_event(event);
        let text = format!("{header}\n\n{}", line.render());
        (text, line)
    }

    #[must_use]
    pub fn new(handle: MessageHandle, event: &DeploymentEvent, line: StageStatusLine) -> Self {
        Self {
            handle,
            header: render::deployment_header(event),
            lines: vec![line],
        }
    }

    #[must_use]
    pub const fn handle(&self) -> MessageHandle {
        self.handle
    }

    #[must_use]
    pub fn lines(&self) -> &[StageStatusLine] {
        &self.lines
    }

    /// Replace the line for `line.stage` in place, or append it.
    pub fn upsert(&mut self, line: StageStatusLine) {
        match self.lines.iter_mut().find(|l| l.stage == line.stage) {
            Some(existing) => existing.status = line.status,
            None => self.lines.push(line),
        }
    }

    /// Full message text: header, blank line, one line per stage.
    #[must_use]
    pub fn render(&self) -> String {
        let mut text = self.header.clone();
        text.push('\n');
        for line in &self.lines {
            text.push('\n');
            text.push_str(&line.render());
        }
        text
    }
}
