//! Results of workflow operations.

use crate::archive::MailRecord;
use crate::host::SurfaceId;
use crate::notify::FanOutReport;

/// Result of a submit request.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// A capture surface was opened.
    Opened(SurfaceId),
    /// Caller lacks the `use` permission.
    NoPermission,
    /// Caller is still cooling down.
    CoolingDown {
        /// Seconds until the caller may submit again.
        remaining_secs: f64,
    },
    /// The host could not create a surface.
    SurfaceUnavailable,
}

/// Result of a browse request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowseOutcome {
    /// A browse surface was opened and stocked.
    Opened {
        /// Surface handle.
        surface: SurfaceId,
        /// Records placed into the surface.
        stocked: usize,
        /// Records that did not fit and were dropped.
        dropped: usize,
    },
    /// Caller lacks the `admin` permission.
    NoPermission,
    /// The host could not create a surface.
    SurfaceUnavailable,
}

/// Result of a configured chat command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// The submit command ran.
    Submit(SubmitOutcome),
    /// The browse command ran.
    Browse(BrowseOutcome),
}

/// Why a closed surface produced no record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// The identity that opened the surface is gone or did not close it.
    SenderGone,
    /// The slot was empty or held only whitespace.
    EmptyContent,
    /// Content was already taken from this surface.
    AlreadyHarvested,
    /// The owner disconnected while the surface was open.
    Disconnected,
    /// The subsystem shut down while the surface was open.
    Shutdown,
}

/// A record that made it into the archive.
#[derive(Debug)]
pub struct Archived {
    /// The stored record.
    pub record: MailRecord,
    /// Record evicted to make room, if any.
    pub evicted: Option<MailRecord>,
    /// Whether the archive was written through to storage.
    pub persisted: bool,
    /// Local admin alert counts.
    pub local: FanOutReport,
    /// Whether a background webhook post was started.
    pub webhook_dispatched: bool,
}

/// Result of a surface closing.
#[derive(Debug)]
pub enum CloseOutcome {
    /// Capture produced a record.
    Archived(Box<Archived>),
    /// Capture produced nothing.
    Discarded(DiscardReason),
    /// A browse surface closed.
    Browsed,
    /// The surface is not tracked (never ours, or already closed).
    Ignored,
}
