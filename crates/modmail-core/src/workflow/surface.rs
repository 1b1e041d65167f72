//! Correlation of open interaction surfaces to their workflow context.

use std::collections::HashMap;

use crate::host::{SenderId, SurfaceId, SurfaceMode};

/// What the workflow remembers about one open surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceContext {
    /// Mode the surface was opened in.
    pub mode: SurfaceMode,
    /// Identity the surface was opened for.
    pub owner: SenderId,
    harvested: bool,
}

impl SurfaceContext {
    /// Context for a capture surface.
    #[must_use]
    pub const fn capture(owner: SenderId) -> Self {
        Self {
            mode: SurfaceMode::Capture,
            owner,
            harvested: false,
        }
    }

    /// Context for a browse surface.
    #[must_use]
    pub const fn browse(owner: SenderId) -> Self {
        Self {
            mode: SurfaceMode::Browse,
            owner,
            harvested: false,
        }
    }

    /// Marks captured content as taken. Returns false if it already was.
    pub fn harvest(&mut self) -> bool {
        if self.mode != SurfaceMode::Capture || self.harvested {
            return false;
        }
        self.harvested = true;
        true
    }
}

/// Open surfaces keyed by their host handle.
#[derive(Debug, Default)]
pub struct SurfaceRegistry {
    open: HashMap<SurfaceId, SurfaceContext>,
}

impl SurfaceRegistry {
    /// Starts tracking a surface.
    pub fn insert(&mut self, surface: SurfaceId, context: SurfaceContext) {
        self.open.insert(surface, context);
    }

    /// Stops tracking a surface and returns its context, if it was tracked.
    pub fn take(&mut self, surface: SurfaceId) -> Option<SurfaceContext> {
        self.open.remove(&surface)
    }

    /// Context of a tracked surface.
    #[must_use]
    pub fn get(&self, surface: SurfaceId) -> Option<&SurfaceContext> {
        self.open.get(&surface)
    }

    /// Handles of every surface opened for `owner`.
    #[must_use]
    pub fn owned_by(&self, owner: SenderId) -> Vec<SurfaceId> {
        let mut surfaces: Vec<_> = self
            .open
            .iter()
            .filter(|(_, context)| context.owner == owner)
            .map(|(&surface, _)| surface)
            .collect();
        surfaces.sort_unstable();
        surfaces
    }

    /// Stops tracking every surface and returns their handles.
    pub fn drain(&mut self) -> Vec<SurfaceId> {
        let mut surfaces: Vec<_> = self.open.drain().map(|(surface, _)| surface).collect();
        surfaces.sort_unstable();
        surfaces
    }

    /// Number of open surfaces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.open.len()
    }

    /// Returns true if no surface is open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_harvest_once() {
        let mut context = SurfaceContext::capture(SenderId(1));
        assert!(context.harvest());
        assert!(!context.harvest());
    }

    #[test]
    fn test_browse_never_harvests() {
        let mut context = SurfaceContext::browse(SenderId(1));
        assert!(!context.harvest());
    }

    #[test]
    fn test_take_is_idempotent() {
        let mut registry = SurfaceRegistry::default();
        registry.insert(SurfaceId(5), SurfaceContext::capture(SenderId(1)));
        assert!(registry.take(SurfaceId(5)).is_some());
        assert!(registry.take(SurfaceId(5)).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_owned_by() {
        let mut registry = SurfaceRegistry::default();
        registry.insert(SurfaceId(3), SurfaceContext::capture(SenderId(1)));
        registry.insert(SurfaceId(1), SurfaceContext::browse(SenderId(1)));
        registry.insert(SurfaceId(2), SurfaceContext::capture(SenderId(2)));

        assert_eq!(registry.owned_by(SenderId(1)), [SurfaceId(1), SurfaceId(3)]);
        assert_eq!(registry.drain().len(), 3);
        assert!(registry.is_empty());
    }
}
