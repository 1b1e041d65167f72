//! Host collaborator contract.
//!
//! The host owns everything outside the mail subsystem: who is connected,
//! what they are allowed to do, how a message reaches them, and the
//! interactive surface a note is written into or an archive is browsed in.

use std::fmt;
use std::time::Duration;

use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};

use crate::archive::MailRecord;
use crate::archive::format_short_date;

/// Stable identifier of a user on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SenderId(pub u64);

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A connected user as the host currently knows them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    /// Stable identifier.
    pub id: SenderId,
    /// Display name at the time the identity was observed.
    pub display_name: String,
}

impl Identity {
    /// Creates a new identity.
    #[must_use]
    pub fn new(id: u64, display_name: impl Into<String>) -> Self {
        Self {
            id: SenderId(id),
            display_name: display_name.into(),
        }
    }
}

/// Capabilities checked against the host's permission system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    /// May submit mail.
    Use,
    /// May browse the archive and receives new mail alerts.
    Admin,
}

impl Permission {
    /// Every permission the subsystem checks, for host-side registration.
    pub const ALL: [Self; 2] = [Self::Use, Self::Admin];

    /// Canonical permission name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Use => "modmail.use",
            Self::Admin => "modmail.admin",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque handle of an interaction surface, assigned by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u64);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a surface is opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceMode {
    /// Single slot the user places one note into.
    Capture,
    /// Read-only view stocked with the archive.
    Browse,
}

/// Shape of a surface the workflow asks the host to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceSpec {
    /// Mode the surface is opened in.
    pub mode: SurfaceMode,
    /// Number of slots; `None` lets the host size it.
    pub slots: Option<usize>,
}

impl SurfaceSpec {
    /// A capture surface with room for exactly one note.
    #[must_use]
    pub const fn capture() -> Self {
        Self {
            mode: SurfaceMode::Capture,
            slots: Some(1),
        }
    }

    /// A browse surface sized by the host.
    #[must_use]
    pub const fn browse() -> Self {
        Self {
            mode: SurfaceMode::Browse,
            slots: None,
        }
    }
}

/// Read-only item placed into a browse surface, one per archived record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveItem {
    /// Short title, e.g. `From: Alice`.
    pub title: String,
    /// Full text: the content followed by a sender/date footer.
    pub text: String,
}

impl ArchiveItem {
    /// Builds the browse item for a record, dated in the host's local time zone.
    #[must_use]
    pub fn for_record(record: &MailRecord) -> Self {
        Self::for_record_in(record, &Local)
    }

    /// Builds the browse item for a record, dated in `tz`.
    #[must_use]
    pub fn for_record_in<Tz>(record: &MailRecord, tz: &Tz) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        let date = format_short_date(record.timestamp, tz);
        Self {
            title: format!("From: {}", record.sender_name),
            text: format!(
                "{}\n\n-- From {} ({}) on {date} --",
                record.content(),
                record.sender_name,
                record.sender_id
            ),
        }
    }
}

/// Errors reported by the host collaborator.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// The host could not create an interaction surface.
    #[error("Surface could not be created: {0}")]
    SurfaceUnavailable(String),

    /// The recipient is no longer connected.
    #[error("Recipient {0} is not connected")]
    NotConnected(SenderId),
}

/// Everything the workflow needs from the surrounding host.
///
/// Calls are made from a single logical worker; implementations do not need
/// internal locking for the workflow's sake.
pub trait Host {
    /// Returns true if `identity` holds `permission`.
    fn has_permission(&self, identity: &Identity, permission: Permission) -> bool;

    /// Identities currently connected to the host.
    fn online_identities(&self) -> Vec<Identity>;

    /// Sends a chat-style message to one recipient.
    ///
    /// # Errors
    ///
    /// Returns an error if the message could not be delivered.
    fn send_message(&mut self, recipient: &Identity, text: &str) -> Result<(), HostError>;

    /// Creates a new, not yet shown, interaction surface.
    ///
    /// # Errors
    ///
    /// Returns an error if the host cannot create the surface.
    fn create_surface(&mut self, spec: SurfaceSpec) -> Result<SurfaceId, HostError>;

    /// Places a read-only item into a surface. Returns false if it did not fit.
    fn place_item(&mut self, surface: SurfaceId, item: ArchiveItem) -> bool;

    /// Shows `surface` to `viewer` once `delay` has passed.
    fn open_surface(&mut self, surface: SurfaceId, viewer: &Identity, delay: Duration);

    /// Destroys a surface. Must tolerate surfaces that are already gone.
    fn destroy_surface(&mut self, surface: SurfaceId);
}
