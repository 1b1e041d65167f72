//! # modmail-core
//!
//! Core logic for `ModMail`: letting users drop a short note for the
//! moderators of a community.
//!
//! This crate provides:
//! - **Archive** - bounded FIFO store of submitted mail, persisted to a blob store
//! - **Cooldowns** - per-sender rate limiting of mail submissions
//! - **Notifications** - in-app alerts for admins plus an optional outbound webhook
//! - **Workflow** - the capture/browse state machine driven by host events
//! - **Configuration** and **localized messages**
//!
//! Everything host-specific (connected users, permission checks, the
//! interactive surface a note is placed into) sits behind the [`Host`] trait.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod archive;
pub mod config;
pub mod cooldown;
mod error;
pub mod host;
pub mod lang;
pub mod notify;
pub mod workflow;

pub use archive::{
    ArchiveStore, BlobStore, EmptyContent, FileBlobStore, MailRecord, MemoryBlobStore,
};
pub use config::Config;
pub use cooldown::{Admission, RateLimiter};
pub use error::{Error, Result};
pub use host::{
    ArchiveItem, Host, HostError, Identity, Permission, SenderId, SurfaceId, SurfaceMode,
    SurfaceSpec,
};
pub use lang::{Catalog, MessageKey};
pub use notify::{
    Dispatcher, FanOutReport, ReqwestWebhook, WebhookDrain, WebhookError, WebhookResponse,
    WebhookSender, WebhookStatus,
};
pub use workflow::{
    Archived, BrowseOutcome, CloseOutcome, CommandOutcome, DiscardReason, SubmitOutcome, Workflow,
};
