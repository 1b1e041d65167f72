//! Configuration loading, defaults and schema migration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{Error, Result};

/// Current configuration schema version.
pub const CURRENT_VERSION: &str = "1.0.0";

/// Subsystem configuration, stored as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Schema version the file was written with. Missing means "older than any".
    #[serde(rename = "Version", default)]
    pub version: String,

    /// Command that opens a capture surface.
    #[serde(rename = "Send Mail Chat Command")]
    pub send_mail_command: String,

    /// Command that opens the archive.
    #[serde(rename = "Open Mail Archive Chat Command")]
    pub open_archive_command: String,

    /// Maximum archived mail; zero or negative means unbounded.
    #[serde(rename = "Maximum Archive Capacity")]
    pub max_archive_capacity: i64,

    /// Seconds a sender must wait between submissions.
    #[serde(rename = "Mail Cooldown Seconds")]
    pub cooldown_seconds: f64,

    /// Outbound webhook; empty disables it.
    #[serde(rename = "Discord Webhook Url")]
    pub webhook_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION.to_string(),
            send_mail_command: "sendmail".to_string(),
            open_archive_command: "openmail".to_string(),
            max_archive_capacity: 48,
            cooldown_seconds: 60.0,
            webhook_url: String::new(),
        }
    }
}

impl Config {
    /// Loads the configuration at `path`, creating it with defaults if absent.
    ///
    /// Outdated files are migrated and written back.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or written, or if
    /// the resulting configuration is invalid.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            serde_json::from_str::<Self>(&contents)?
        } else {
            info!("No configuration at {:?}, writing defaults", path);
            Self::default()
        };

        config.migrate();
        config.validate()?;
        config.save(path)?;
        Ok(config)
    }

    /// Writes the configuration as pretty-printed JSON, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Brings an older schema up to [`CURRENT_VERSION`]. Returns true if anything changed.
    pub fn migrate(&mut self) -> bool {
        if parse_version(&self.version) >= parse_version(CURRENT_VERSION) {
            return false;
        }

        warn!("Config changes detected! Updating...");
        let from = std::mem::take(&mut self.version);
        if parse_version(&from) < (1, 0, 0) {
            *self = Self::default();
        }
        self.version = CURRENT_VERSION.to_string();
        warn!(
            "Config update complete! Updated from version {:?} to {}",
            from, CURRENT_VERSION
        );
        true
    }

    /// Checks values that would make the subsystem unusable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        let send = normalize_command(&self.send_mail_command);
        let open = normalize_command(&self.open_archive_command);
        if send.is_empty() {
            return Err(Error::Config("send mail command is empty".to_string()));
        }
        if open.is_empty() {
            return Err(Error::Config("open archive command is empty".to_string()));
        }
        if send.eq_ignore_ascii_case(open) {
            return Err(Error::Config(format!(
                "send and open commands are both {send:?}"
            )));
        }
        Ok(())
    }

    /// Archive capacity, `None` when unbounded.
    #[must_use]
    pub fn archive_capacity(&self) -> Option<usize> {
        usize::try_from(self.max_archive_capacity)
            .ok()
            .filter(|&capacity| capacity > 0)
    }

    /// Cooldown in seconds, clamped to a finite non-negative value.
    #[must_use]
    pub fn cooldown_secs(&self) -> f64 {
        if self.cooldown_seconds.is_finite() {
            self.cooldown_seconds.max(0.0)
        } else {
            0.0
        }
    }

    /// Webhook URL, `None` when disabled.
    #[must_use]
    pub fn webhook_url(&self) -> Option<&str> {
        Some(self.webhook_url.trim()).filter(|url| !url.is_empty())
    }

    /// Submit command name without a leading slash.
    #[must_use]
    pub fn send_command(&self) -> &str {
        normalize_command(&self.send_mail_command)
    }

    /// Browse command name without a leading slash.
    #[must_use]
    pub fn browse_command(&self) -> &str {
        normalize_command(&self.open_archive_command)
    }
}

pub(crate) fn normalize_command(name: &str) -> &str {
    name.trim().trim_start_matches('/')
}

/// Parses `major.minor.patch`; missing or malformed parts count as zero.
fn parse_version(version: &str) -> (u64, u64, u64) {
    let mut parts = version
        .trim()
        .split('.')
        .map(|part| part.trim().parse::<u64>().unwrap_or(0));
    (
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.send_command(), "sendmail");
        assert_eq!(config.browse_command(), "openmail");
        assert_eq!(config.archive_capacity(), Some(48));
        assert!((config.cooldown_secs() - 60.0).abs() < f64::EPSILON);
        assert_eq!(config.webhook_url(), None);
    }

    #[test]
    fn test_original_field_names() {
        let json = serde_json::to_value(Config::default()).unwrap();
        assert_eq!(json["Version"], "1.0.0");
        assert_eq!(json["Send Mail Chat Command"], "sendmail");
        assert_eq!(json["Open Mail Archive Chat Command"], "openmail");
        assert_eq!(json["Maximum Archive Capacity"], 48);
        assert_eq!(json["Mail Cooldown Seconds"], 60.0);
        assert_eq!(json["Discord Webhook Url"], "");
    }

    #[test]
    fn test_non_positive_capacity_is_unbounded() {
        let mut config = Config::default();
        config.max_archive_capacity = 0;
        assert_eq!(config.archive_capacity(), None);
        config.max_archive_capacity = -3;
        assert_eq!(config.archive_capacity(), None);
    }

    #[test]
    fn test_webhook_url_trimmed() {
        let mut config = Config::default();
        config.webhook_url = "   ".to_string();
        assert_eq!(config.webhook_url(), None);
        config.webhook_url = " https://example.test/hook ".to_string();
        assert_eq!(config.webhook_url(), Some("https://example.test/hook"));
    }

    #[test]
    fn test_migrate_versionless_resets_to_defaults() {
        let json = r#"{"Send Mail Chat Command": "mail", "Mail Cooldown Seconds": 5}"#;
        let mut config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.version, "");
        assert!(config.migrate());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_current_version_untouched() {
        let mut config: Config =
            serde_json::from_str(r#"{"Version": "1.0.0", "Send Mail Chat Command": "mail"}"#)
                .unwrap();
        assert!(!config.migrate());
        assert_eq!(config.send_command(), "mail");
        assert_eq!(config.browse_command(), "openmail");
    }

    #[test]
    fn test_validate_rejects_clashing_commands() {
        let mut config = Config::default();
        config.open_archive_command = "/SendMail".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
        config.open_archive_command = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modmail").join("config.json");

        let config = Config::load_or_create(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());

        let reloaded = Config::load_or_create(&path).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_load_or_create_migrates_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"Version": "0.9.0", "Maximum Archive Capacity": 3}"#).unwrap();

        let config = Config::load_or_create(&path).unwrap();
        assert_eq!(config.archive_capacity(), Some(48));

        let on_disk: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk["Version"], CURRENT_VERSION);
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("1.2.3"), (1, 2, 3));
        assert_eq!(parse_version("1.2"), (1, 2, 0));
        assert_eq!(parse_version(""), (0, 0, 0));
        assert_eq!(parse_version("x.1"), (0, 1, 0));
    }
}
