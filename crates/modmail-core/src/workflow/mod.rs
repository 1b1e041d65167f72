//! Capture/browse workflow.
//!
//! Every request opens an interaction surface through the [`Host`] and is
//! correlated back by its [`SurfaceId`] when the host reports it closed. A
//! capture runs `Requested -> SurfaceOpen -> Closed -> {Archived | Discarded}`
//! (or is rejected up front); a browse runs `Requested -> SurfaceOpen -> Closed`
//! and never mutates anything.
//!
//! All methods take `&mut self` and are expected to be driven from a single
//! event loop. The only background work is the webhook post.

mod outcome;
mod surface;

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

pub use outcome::{
    Archived, BrowseOutcome, CloseOutcome, CommandOutcome, DiscardReason, SubmitOutcome,
};
pub use surface::{SurfaceContext, SurfaceRegistry};

use crate::archive::{ArchiveStore, MailRecord};
use crate::config::{Config, normalize_command};
use crate::cooldown::{Admission, RateLimiter};
use crate::host::{
    ArchiveItem, Host, Identity, Permission, SenderId, SurfaceId, SurfaceMode, SurfaceSpec,
};
use crate::lang::{Catalog, MessageKey};
use crate::notify::{Dispatcher, WebhookDrain, WebhookSender};

/// Delay before a capture surface is shown to its owner.
pub const CAPTURE_OPEN_DELAY: Duration = Duration::from_millis(1_500);

/// Delay before a browse surface is shown to its owner.
pub const BROWSE_OPEN_DELAY: Duration = Duration::from_millis(500);

/// Drives the archive, rate limiter and dispatcher from host events.
pub struct Workflow<H, W> {
    host: H,
    archive: ArchiveStore,
    limiter: RateLimiter,
    dispatcher: Dispatcher<W>,
    catalog: Catalog,
    config: Config,
    surfaces: SurfaceRegistry,
}

impl<H: Host, W: WebhookSender> Workflow<H, W> {
    /// Creates a workflow with the English message catalog.
    #[must_use]
    pub fn new(config: Config, host: H, archive: ArchiveStore, webhook: W) -> Self {
        Self {
            host,
            archive,
            limiter: RateLimiter::new(),
            dispatcher: Dispatcher::new(webhook),
            catalog: Catalog::english(),
            config,
            surfaces: SurfaceRegistry::default(),
        }
    }

    /// Replaces the message catalog.
    #[must_use]
    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Runs the configured command `name` (leading `/` optional, case-insensitive).
    ///
    /// Returns `None` if `name` is neither the submit nor the browse command.
    pub fn handle_command(
        &mut self,
        name: &str,
        identity: &Identity,
        now: DateTime<Utc>,
    ) -> Option<CommandOutcome> {
        let name = normalize_command(name);
        if name.eq_ignore_ascii_case(self.config.send_command()) {
            Some(CommandOutcome::Submit(self.submit(identity, now)))
        } else if name.eq_ignore_ascii_case(self.config.browse_command()) {
            Some(CommandOutcome::Browse(self.browse(identity)))
        } else {
            None
        }
    }

    /// Opens a capture surface for `identity` if permitted and not cooling down.
    ///
    /// The cooldown is consumed on admission, so opening and abandoning a
    /// capture still counts. It is only handed back if the host fails to
    /// create the surface.
    pub fn submit(&mut self, identity: &Identity, now: DateTime<Utc>) -> SubmitOutcome {
        if !self.host.has_permission(identity, Permission::Use) {
            self.reply(identity, MessageKey::NoPermission);
            return SubmitOutcome::NoPermission;
        }

        let previous = match self
            .limiter
            .try_admit(identity.id, now, self.config.cooldown_secs())
        {
            Admission::Admitted { previous } => previous,
            Admission::Rejected { remaining_secs } => {
                debug!(
                    "{} ({}) is cooling down for another {:.1}s",
                    identity.display_name, identity.id, remaining_secs
                );
                self.reply(identity, MessageKey::MailCooldown);
                return SubmitOutcome::CoolingDown { remaining_secs };
            }
        };

        let surface = match self.host.create_surface(SurfaceSpec::capture()) {
            Ok(surface) => surface,
            Err(e) => {
                warn!("Failed to create mailbox for {}: {}", identity.id, e);
                self.limiter.revert(identity.id, previous);
                self.reply(identity, MessageKey::MailboxCreateFail);
                return SubmitOutcome::SurfaceUnavailable;
            }
        };

        self.surfaces
            .insert(surface, SurfaceContext::capture(identity.id));
        self.host.open_surface(surface, identity, CAPTURE_OPEN_DELAY);
        self.reply(identity, MessageKey::MailboxOpenPrompt);
        debug!("Opened mailbox {} for {}", surface, identity.id);
        SubmitOutcome::Opened(surface)
    }

    /// Opens a browse surface stocked with every archived record.
    ///
    /// Records the surface cannot hold are dropped silently.
    pub fn browse(&mut self, identity: &Identity) -> BrowseOutcome {
        if !self.host.has_permission(identity, Permission::Admin) {
            self.reply(identity, MessageKey::NoPermission);
            return BrowseOutcome::NoPermission;
        }

        let surface = match self.host.create_surface(SurfaceSpec::browse()) {
            Ok(surface) => surface,
            Err(e) => {
                warn!("Failed to create mail archive for {}: {}", identity.id, e);
                self.reply(identity, MessageKey::MailArchiveCreateFail);
                return BrowseOutcome::SurfaceUnavailable;
            }
        };
        self.surfaces
            .insert(surface, SurfaceContext::browse(identity.id));

        let mut stocked = 0;
        let mut dropped = 0;
        for record in self.archive.snapshot() {
            if self.host.place_item(surface, ArchiveItem::for_record(&record)) {
                stocked += 1;
            } else {
                dropped += 1;
            }
        }
        if dropped > 0 {
            debug!("Dropped {} mail(s) that did not fit archive {}", dropped, surface);
        }

        self.host.open_surface(surface, identity, BROWSE_OPEN_DELAY);
        self.reply(identity, MessageKey::MailArchiveOpenPrompt);
        BrowseOutcome::Opened {
            surface,
            stocked,
            dropped,
        }
    }

    /// Handles the host reporting `surface` closed.
    ///
    /// `closer` is the identity that ended the interaction, if it is still
    /// valid; `content` is whatever was left in the capture slot. The surface
    /// is destroyed whatever the outcome. Untracked or already-closed surfaces
    /// are ignored.
    pub fn on_surface_closed(
        &mut self,
        surface: SurfaceId,
        closer: Option<&Identity>,
        content: Option<&str>,
        now: DateTime<Utc>,
    ) -> CloseOutcome {
        let Some(mut context) = self.surfaces.take(surface) else {
            debug!("Ignoring close of untracked surface {}", surface);
            return CloseOutcome::Ignored;
        };

        let outcome = match context.mode {
            SurfaceMode::Browse => CloseOutcome::Browsed,
            SurfaceMode::Capture => self.capture(&mut context, closer, content, now),
        };

        self.host.destroy_surface(surface);
        outcome
    }

    /// Destroys every surface owned by `sender`, discarding any pending capture.
    ///
    /// Returns the number of surfaces destroyed.
    pub fn on_identity_disconnected(&mut self, sender: SenderId) -> usize {
        let surfaces = self.surfaces.owned_by(sender);
        for &surface in &surfaces {
            self.surfaces.take(surface);
            self.host.destroy_surface(surface);
            debug!(
                "Discarded surface {} ({:?}): owner {} disconnected",
                surface,
                DiscardReason::Disconnected,
                sender
            );
        }
        surfaces.len()
    }

    /// Destroys every open surface and flushes the archive.
    pub fn shutdown(&mut self) {
        for surface in self.surfaces.drain() {
            self.host.destroy_surface(surface);
            debug!("Discarded surface {} ({:?})", surface, DiscardReason::Shutdown);
        }

        if let Err(e) = self.archive.persist() {
            warn!("Failed to flush mail archive on shutdown: {}", e);
        }
    }

    /// Waits up to `timeout` for background webhook posts to finish.
    ///
    /// Call after [`Self::shutdown`]; posts still running at the deadline are
    /// aborted and reported with a warning.
    pub async fn drain_webhooks(&mut self, timeout: Duration) -> WebhookDrain {
        self.dispatcher.drain(timeout).await
    }

    /// Host collaborator.
    #[must_use]
    pub const fn host(&self) -> &H {
        &self.host
    }

    /// Mutable host collaborator.
    pub const fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// The archive.
    #[must_use]
    pub const fn archive(&self) -> &ArchiveStore {
        &self.archive
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Open surfaces.
    #[must_use]
    pub const fn surfaces(&self) -> &SurfaceRegistry {
        &self.surfaces
    }

    fn capture(
        &mut self,
        context: &mut SurfaceContext,
        closer: Option<&Identity>,
        content: Option<&str>,
        now: DateTime<Utc>,
    ) -> CloseOutcome {
        let Some(sender) = closer.filter(|identity| identity.id == context.owner) else {
            debug!("Owner {} of mailbox is gone, discarding", context.owner);
            return CloseOutcome::Discarded(DiscardReason::SenderGone);
        };
        if !context.harvest() {
            return CloseOutcome::Discarded(DiscardReason::AlreadyHarvested);
        }

        let Ok(record) = MailRecord::new(sender, content.unwrap_or_default(), now) else {
            self.reply(sender, MessageKey::EmptyNote);
            return CloseOutcome::Discarded(DiscardReason::EmptyContent);
        };

        let appended = self.archive.append(record.clone());
        let persisted = match appended.persisted {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to persist mail archive: {}", e);
                false
            }
        };
        info!(
            "Archived mail from {} ({}), {} in archive",
            record.sender_name,
            record.sender_id,
            self.archive.len()
        );

        let webhook_dispatched = self
            .config
            .webhook_url()
            .is_some_and(|url| self.dispatcher.fan_out_webhook(&record, url, &self.catalog));

        self.reply(sender, MessageKey::MailSent);

        let admins: Vec<Identity> = self
            .host
            .online_identities()
            .into_iter()
            .filter(|identity| self.host.has_permission(identity, Permission::Admin))
            .collect();
        let host = &mut self.host;
        let local = self.dispatcher.fan_out_local(
            &record,
            &admins,
            &self.catalog,
            self.config.browse_command(),
            |to, text| host.send_message(to, text),
        );

        CloseOutcome::Archived(Box::new(Archived {
            record,
            evicted: appended.evicted,
            persisted,
            local,
            webhook_dispatched,
        }))
    }

    fn reply(&mut self, to: &Identity, key: MessageKey) {
        let text = self.catalog.render(key, &[]);
        if let Err(e) = self.host.send_message(to, &text) {
            debug!("Could not reply to {}: {}", to.id, e);
        }
    }
}

impl<H, W> std::fmt::Debug for Workflow<H, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("archive", &self.archive)
            .field("cooldowns", &self.limiter.len())
            .field("open_surfaces", &self.surfaces.len())
            .field("pending_webhooks", &self.dispatcher.pending())
            .finish_non_exhaustive()
    }
}
