//! Localized user-facing messages.

use std::collections::HashMap;
use std::fmt;

use tracing::warn;

use crate::Result;

/// Identifies a user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKey {
    /// Caller lacks the permission for a command.
    NoPermission,
    /// The capture surface could not be created.
    MailboxCreateFail,
    /// Capture surface opened.
    MailboxOpenPrompt,
    /// The browse surface could not be created.
    MailArchiveCreateFail,
    /// Browse surface opened.
    MailArchiveOpenPrompt,
    /// Mail archived.
    MailSent,
    /// Capture closed with nothing written.
    EmptyNote,
    /// Alert to admins. `{0}` sender name, `{1}` browse command.
    NewMailAlert,
    /// Webhook body. `{0}` sender name, `{1}` sender id, `{2}` date, `{3}` content.
    WebhookMailAlert,
    /// Sender is still cooling down.
    MailCooldown,
}

impl MessageKey {
    /// Every message key.
    pub const ALL: [Self; 10] = [
        Self::NoPermission,
        Self::MailboxCreateFail,
        Self::MailboxOpenPrompt,
        Self::MailArchiveCreateFail,
        Self::MailArchiveOpenPrompt,
        Self::MailSent,
        Self::EmptyNote,
        Self::NewMailAlert,
        Self::WebhookMailAlert,
        Self::MailCooldown,
    ];

    /// Name used in language files.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::NoPermission => "NoPermission",
            Self::MailboxCreateFail => "MailboxCreateFail",
            Self::MailboxOpenPrompt => "MailboxOpenPrompt",
            Self::MailArchiveCreateFail => "MailArchiveCreateFail",
            Self::MailArchiveOpenPrompt => "MailArchiveOpenPrompt",
            Self::MailSent => "MailSent",
            Self::EmptyNote => "EmptyNote",
            Self::NewMailAlert => "NewMailAlert",
            Self::WebhookMailAlert => "WebhookMailAlert",
            Self::MailCooldown => "MailCooldown",
        }
    }

    /// Looks a key up by its language-file name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.name() == name)
    }

    /// English template.
    #[must_use]
    pub const fn english(self) -> &'static str {
        match self {
            Self::NoPermission => "You do not have permission to use this command.",
            Self::MailboxCreateFail => "Failed to create mailbox!",
            Self::MailboxOpenPrompt => "Place your note in the mailbox to send to admins.",
            Self::MailArchiveCreateFail => "Failed to create the mail archive container!",
            Self::MailArchiveOpenPrompt => {
                "Opening the mail archive. Feel free to read or take any notes."
            }
            Self::MailSent => "Thanks! Your note has been sent to the admins.",
            Self::EmptyNote => "Your note is empty. Please type something before sending.",
            Self::NewMailAlert => "New mail received from {0}. Use /{1} to view the archive.",
            Self::WebhookMailAlert => "From: {0} ({1})\nTime: {2}\n```{3}```",
            Self::MailCooldown => "Hold up! You cannot send another mail yet.",
        }
    }
}

/// Message templates with `{0}`-style positional placeholders.
#[derive(Debug, Clone)]
pub struct Catalog {
    templates: HashMap<MessageKey, String>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::english()
    }
}

impl Catalog {
    /// The built-in English catalog.
    #[must_use]
    pub fn english() -> Self {
        Self {
            templates: MessageKey::ALL
                .into_iter()
                .map(|key| (key, key.english().to_string()))
                .collect(),
        }
    }

    /// Overrides templates from a JSON object of `{"MessageKey": "template"}`.
    ///
    /// Unknown keys are skipped with a warning. Returns how many templates
    /// were replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if `json` is not an object of strings.
    pub fn merge_json(&mut self, json: &str) -> Result<usize> {
        let overrides: HashMap<String, String> = serde_json::from_str(json)?;
        let mut applied = 0;
        for (name, template) in overrides {
            if let Some(key) = MessageKey::from_name(&name) {
                self.templates.insert(key, template);
                applied += 1;
            } else {
                warn!("Ignoring unknown message key {:?}", name);
            }
        }
        Ok(applied)
    }

    /// Raw template for `key`.
    #[must_use]
    pub fn template(&self, key: MessageKey) -> &str {
        self.templates
            .get(&key)
            .map_or_else(|| key.english(), String::as_str)
    }

    /// Renders `key`, substituting `{n}` with `args[n]`.
    ///
    /// Placeholders without a matching argument are left as written.
    #[must_use]
    pub fn render(&self, key: MessageKey, args: &[&dyn fmt::Display]) -> String {
        let template = self.template(key);
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let placeholder = after.find('}').and_then(|close| {
                let index = after[..close].parse::<usize>().ok()?;
                args.get(index).map(|arg| (arg, close))
            });

            if let Some((arg, close)) = placeholder {
                out.push_str(&arg.to_string());
                rest = &after[close + 1..];
            } else {
                out.push('{');
                rest = after;
            }
        }

        out.push_str(rest);
        out
    }
}
