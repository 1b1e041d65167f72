//! Archive data models.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::host::{Identity, SenderId};

/// Display format for dates shown to users and in webhook messages.
const SHORT_DATE_FORMAT: &str = "%m/%d/%Y %-I:%M %p";

/// Submitted content was empty or whitespace-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("mail content is empty")]
pub struct EmptyContent;

/// One archived piece of mail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailRecord {
    /// Sender display name, captured at submission time.
    #[serde(rename = "Sender Name")]
    pub sender_name: String,
    /// Sender identifier.
    #[serde(rename = "Sender Id")]
    pub sender_id: SenderId,
    /// Submission time.
    #[serde(rename = "Timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "Content")]
    content: String,
}

impl MailRecord {
    /// Creates a record from a sender and raw content.
    ///
    /// The content is trimmed; the sender's display name is snapshotted.
    ///
    /// # Errors
    ///
    /// Returns [`EmptyContent`] if `content` is empty or whitespace-only.
    pub fn new(
        sender: &Identity,
        content: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, EmptyContent> {
        let content = content.trim();
        if content.is_empty() {
            return Err(EmptyContent);
        }

        Ok(Self {
            sender_name: sender.display_name.clone(),
            sender_id: sender.id,
            timestamp,
            content: content.to_string(),
        })
    }

    /// The trimmed, non-empty mail text.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Re-applies the content rules to a record read back from storage.
    ///
    /// Returns `None` if the stored content is blank.
    #[must_use]
    pub(crate) fn normalized(mut self) -> Option<Self> {
        self.content = self.content.trim().to_string();
        (!self.content.is_empty()).then_some(self)
    }
}

/// Formats a timestamp as a short date/time in `tz`, e.g. `03/05/2024 2:07 PM`.
#[must_use]
pub fn format_short_date<Tz>(timestamp: DateTime<Utc>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    timestamp
        .with_timezone(tz)
        .format(SHORT_DATE_FORMAT)
        .to_string()
}

/// On-disk archive document.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct ArchiveDocument {
    #[serde(rename = "Mails", default)]
    pub mails: Vec<MailRecord>,
}
