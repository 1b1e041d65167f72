//! Console implementation of the host collaborator.
//!
//! Users, permissions and surfaces are simulated in memory; every message
//! and surface event is printed to stdout.

use std::collections::BTreeMap;
use std::time::Duration;

use modmail_core::{
    ArchiveItem, Host, HostError, Identity, Permission, SenderId, SurfaceId, SurfaceMode,
    SurfaceSpec,
};

/// A connected console user.
#[derive(Debug, Clone)]
struct User {
    identity: Identity,
    permissions: Vec<Permission>,
}

/// A surface the console is showing.
#[derive(Debug)]
struct Surface {
    mode: SurfaceMode,
    slots: Option<usize>,
    viewer: Option<SenderId>,
    items: Vec<ArchiveItem>,
    note: Option<String>,
}

/// In-memory host driven by console input.
#[derive(Debug, Default)]
pub struct ConsoleHost {
    users: BTreeMap<SenderId, User>,
    surfaces: BTreeMap<SurfaceId, Surface>,
    next_surface: u64,
}

impl ConsoleHost {
    /// Creates a host with nobody connected.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects (or reconnects) a user.
    pub fn join(&mut self, identity: Identity, permissions: Vec<Permission>) {
        println!("* {} ({}) joined", identity.display_name, identity.id);
        self.users.insert(
            identity.id,
            User {
                identity,
                permissions,
            },
        );
    }

    /// Disconnects a user, returning their identity if they were connected.
    pub fn leave(&mut self, id: SenderId) -> Option<Identity> {
        let user = self.users.remove(&id)?;
        println!("* {} ({}) left", user.identity.display_name, id);
        Some(user.identity)
    }

    /// Identity of a connected user.
    #[must_use]
    pub fn identity(&self, id: SenderId) -> Option<&Identity> {
        self.users.get(&id).map(|user| &user.identity)
    }

    /// Surface currently shown to `viewer`.
    #[must_use]
    pub fn surface_viewed_by(&self, viewer: SenderId) -> Option<SurfaceId> {
        self.surfaces
            .iter()
            .find(|(_, surface)| surface.viewer == Some(viewer))
            .map(|(&id, _)| id)
    }

    /// Puts a note into a capture surface, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns a message if the surface is not a capture surface.
    pub fn write_note(&mut self, surface: SurfaceId, text: String) -> Result<(), String> {
        match self.surfaces.get_mut(&surface) {
            Some(target) if target.mode == SurfaceMode::Capture => {
                target.note = Some(text);
                Ok(())
            }
            Some(_) => Err("the archive is read-only".to_string()),
            None => Err(format!("surface {surface} is gone")),
        }
    }

    /// Note left in a surface, if any.
    #[must_use]
    pub fn note(&self, surface: SurfaceId) -> Option<&str> {
        self.surfaces.get(&surface)?.note.as_deref()
    }

    /// Prints connected users and open surfaces.
    pub fn print_state(&self) {
        println!("users:");
        for user in self.users.values() {
            let permissions: Vec<_> = user.permissions.iter().map(|p| p.as_str()).collect();
            println!(
                "  {} {} [{}]",
                user.identity.id,
                user.identity.display_name,
                permissions.join(", ")
            );
        }
        println!("surfaces:");
        for (id, surface) in &self.surfaces {
            println!(
                "  {} {:?} viewer={:?} items={} note={:?}",
                id,
                surface.mode,
                surface.viewer.map(|v| v.0),
                surface.items.len(),
                surface.note
            );
        }
    }
}

impl Host for ConsoleHost {
    fn has_permission(&self, identity: &Identity, permission: Permission) -> bool {
        self.users
            .get(&identity.id)
            .is_some_and(|user| user.permissions.contains(&permission))
    }

    fn online_identities(&self) -> Vec<Identity> {
        self.users.values().map(|user| user.identity.clone()).collect()
    }

    fn send_message(&mut self, recipient: &Identity, text: &str) -> Result<(), HostError> {
        if !self.users.contains_key(&recipient.id) {
            return Err(HostError::NotConnected(recipient.id));
        }
        println!("[to {}] {}", recipient.display_name, text);
        Ok(())
    }

    fn create_surface(&mut self, spec: SurfaceSpec) -> Result<SurfaceId, HostError> {
        self.next_surface += 1;
        let id = SurfaceId(self.next_surface);
        self.surfaces.insert(
            id,
            Surface {
                mode: spec.mode,
                slots: spec.slots,
                viewer: None,
                items: Vec::new(),
                note: None,
            },
        );
        Ok(id)
    }

    fn place_item(&mut self, surface: SurfaceId, item: ArchiveItem) -> bool {
        let Some(target) = self.surfaces.get_mut(&surface) else {
            return false;
        };
        if target.slots.is_some_and(|slots| target.items.len() >= slots) {
            return false;
        }
        target.items.push(item);
        true
    }

    fn open_surface(&mut self, surface: SurfaceId, viewer: &Identity, delay: Duration) {
        let Some(target) = self.surfaces.get_mut(&surface) else {
            return;
        };
        target.viewer = Some(viewer.id);

        println!(
            "* {} opens {} ({:?}) after {:.1}s",
            viewer.display_name,
            surface,
            target.mode,
            delay.as_secs_f64()
        );
        for item in &target.items {
            println!("  -- {} --", item.title);
            for line in item.text.lines() {
                println!("  | {line}");
            }
        }
    }

    fn destroy_surface(&mut self, surface: SurfaceId) {
        if self.surfaces.remove(&surface).is_some() {
            println!("* surface {surface} destroyed");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_surface_holds_one_note() {
        let mut host = ConsoleHost::new();
        let alice = Identity::new(1, "Alice");
        host.join(alice.clone(), vec![Permission::Use]);

        let surface = host.create_surface(SurfaceSpec::capture()).unwrap();
        host.open_surface(surface, &alice, Duration::ZERO);
        assert_eq!(host.surface_viewed_by(alice.id), Some(surface));

        host.write_note(surface, "first".to_string()).unwrap();
        host.write_note(surface, "second".to_string()).unwrap();
        assert_eq!(host.note(surface), Some("second"));

        host.destroy_surface(surface);
        assert_eq!(host.surface_viewed_by(alice.id), None);
        assert!(host.write_note(surface, "late".to_string()).is_err());
    }

    #[test]
    fn test_browse_surface_is_read_only() {
        let mut host = ConsoleHost::new();
        let surface = host.create_surface(SurfaceSpec::browse()).unwrap();
        assert!(host.place_item(
            surface,
            ArchiveItem {
                title: "From: A".to_string(),
                text: "x".to_string(),
            }
        ));
        assert!(host.write_note(surface, "nope".to_string()).is_err());
    }

    #[test]
    fn test_messages_need_connection() {
        let mut host = ConsoleHost::new();
        let ghost = Identity::new(9, "Ghost");
        assert!(host.send_message(&ghost, "hi").is_err());
        assert!(!host.has_permission(&ghost, Permission::Use));
    }
}
