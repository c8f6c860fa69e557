//! Registry of open documents.
//!
//! Lets a detached view (a dashboard, a CLI command) reach the document that
//! is currently open without holding a direct reference to it. Registrations
//! are scoped: dropping the [`Registration`] guard unregisters the document.

use std::sync::{Arc, Mutex, PoisonError};

use crate::design::DesignId;
use crate::error::{CoreError, CoreResult};

#[derive(Debug)]
struct Entry<H> {
    design_id: DesignId,
    token: u64,
    handle: H,
}

#[derive(Debug)]
struct Inner<H> {
    entries: Vec<Entry<H>>,
    next_token: u64,
}

/// Shared registry mapping open design ids to handles.
#[derive(Debug)]
pub struct ActiveRegistry<H> {
    inner: Arc<Mutex<Inner<H>>>,
}

impl<H> Clone for ActiveRegistry<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H> Default for ActiveRegistry<H> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: Vec::new(),
                next_token: 1,
            })),
        }
    }
}

impl<H: Clone> ActiveRegistry<H> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle` for `design_id`, replacing any earlier registration.
    ///
    /// The newest registration becomes the active document.
    #[must_use = "dropping the registration unregisters the document"]
    pub fn register(&self, design_id: DesignId, handle: H) -> Registration<H> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let token = inner.next_token;
        inner.next_token += 1;
        inner.entries.retain(|e| e.design_id != design_id);
        inner.entries.push(Entry {
            design_id,
            token,
            handle,
        });
        tracing::debug!("Registered design {design_id} as active");
        Registration {
            registry: self.clone(),
            design_id,
            token,
        }
    }

    /// Remove `design_id`. Returns whether it was registered.
    pub fn unregister(&self, design_id: DesignId) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let before = inner.entries.len();
        inner.entries.retain(|e| e.design_id != design_id);
        before != inner.entries.len()
    }

    /// Handle registered for `design_id`.
    #[must_use]
    pub fn lookup(&self, design_id: DesignId) -> Option<H> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner
            .entries
            .iter()
            .find(|e| e.design_id == design_id)
            .map(|e| e.handle.clone())
    }

    /// The most recently registered document still open.
    #[must_use]
    pub fn active(&self) -> Option<(DesignId, H)> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner
            .entries
            .last()
            .map(|e| (e.design_id, e.handle.clone()))
    }

    /// The active document's handle, provided it is `design_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IdentityMismatch`] if another document (or none) is active.
    pub fn require_active(&self, design_id: DesignId) -> CoreResult<H> {
        match self.active() {
            Some((active, handle)) if active == design_id => Ok(handle),
            other => Err(CoreError::IdentityMismatch {
                requested: design_id.to_string(),
                active: other.map_or_else(|| "none".to_string(), |(id, _)| id.to_string()),
            }),
        }
    }

    /// Number of registered documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    /// Whether no document is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, design_id: DesignId, token: u64) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner
            .entries
            .retain(|e| !(e.design_id == design_id && e.token == token));
    }
}

/// Scope guard returned by [`ActiveRegistry::register`].
///
/// Unregisters on drop, unless the same design was re-registered since.
#[derive(Debug)]
pub struct Registration<H: Clone> {
    registry: ActiveRegistry<H>,
    design_id: DesignId,
    token: u64,
}

impl<H: Clone> Registration<H> {
    /// The registered design.
    #[must_use]
    pub fn design_id(&self) -> DesignId {
        self.design_id
    }
}

impl<H: Clone> Drop for Registration<H> {
    fn drop(&mut self) {
        self.registry.release(self.design_id, self.token);
        tracing::debug!("Released design {}", self.design_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_lookup_drop() {
        let registry: ActiveRegistry<&'static str> = ActiveRegistry::new();
        let id = DesignId::new();
        {
            let _guard = registry.register(id, "editor-a");
            assert_eq!(registry.lookup(id), Some("editor-a"));
            assert_eq!(registry.active().map(|(d, _)| d), Some(id));
        }
        assert!(registry.lookup(id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_require_active_detects_mismatch() {
        let registry = ActiveRegistry::new();
        let open = DesignId::new();
        let other = DesignId::new();
        let _guard = registry.register(open, 1u32);

        assert_eq!(registry.require_active(open).expect("active"), 1);
        let err = registry.require_active(other).expect_err("mismatch");
        assert!(matches!(err, CoreError::IdentityMismatch { .. }));
    }

    #[test]
    fn test_stale_guard_does_not_remove_newer_registration() {
        let registry = ActiveRegistry::new();
        let id = DesignId::new();
        let first = registry.register(id, 1u32);
        let _second = registry.register(id, 2u32);
        drop(first);
        assert_eq!(registry.lookup(id), Some(2));
    }

    #[test]
    fn test_explicit_unregister() {
        let registry = ActiveRegistry::new();
        let id = DesignId::new();
        let _guard = registry.register(id, ());
        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
        assert!(registry.require_active(id).is_err());
    }
}
