//! The editor service: a design, its selection, and the live surface.
//!
//! Every document mutation goes through [`Editor`], which re-reconciles the
//! surface afterwards. Surface gestures come back through
//! [`Editor::process_surface_events`]; the resulting patches use silent sets,
//! so they never produce further events.

use crate::bridge::{DocumentUpdate, InteractionBridge};
use crate::design::{Design, DesignId};
use crate::element::{DesignElement, ElementId, ElementPatch};
use crate::error::{CoreError, CoreResult};
use crate::surface::Surface;
use crate::sync::{LoadOutcome, Reconciliation, SceneSynchronizer};

/// An open design bound to a surface.
pub struct Editor<S: Surface> {
    design: Design,
    selected: Option<ElementId>,
    sync: SceneSynchronizer<S>,
    bridge: InteractionBridge,
}

impl<S: Surface> Editor<S> {
    /// Open a design on the synchronizer's surface.
    ///
    /// The surface is resized to the canvas and fully materialized. Images
    /// keep loading in the background until [`Editor::settle`] is awaited.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn open(design: Design, mut sync: SceneSynchronizer<S>) -> Self {
        sync.surface_mut().set_size(
            design.canvas_width.round().max(1.0) as u32,
            design.canvas_height.round().max(1.0) as u32,
        );
        sync.reconcile(&design.elements);
        tracing::debug!(
            "Opened design {:?} ({} elements)",
            design.id,
            design.element_count()
        );
        Self {
            design,
            selected: None,
            sync,
            bridge: InteractionBridge::new(),
        }
    }

    /// The current design.
    #[must_use]
    pub fn design(&self) -> &Design {
        &self.design
    }

    /// The design's store id.
    #[must_use]
    pub fn design_id(&self) -> Option<DesignId> {
        self.design.id
    }

    /// The selected element.
    #[must_use]
    pub fn selected(&self) -> Option<ElementId> {
        self.selected
    }

    /// The synchronizer.
    #[must_use]
    pub fn synchronizer(&self) -> &SceneSynchronizer<S> {
        &self.sync
    }

    /// Mutable synchronizer access.
    pub fn synchronizer_mut(&mut self) -> &mut SceneSynchronizer<S> {
        &mut self.sync
    }

    /// The surface.
    #[must_use]
    pub fn surface(&self) -> &S {
        self.sync.surface()
    }

    /// Mutable surface access, for user gestures.
    pub fn surface_mut(&mut self) -> &mut S {
        self.sync.surface_mut()
    }

    /// Add an element and select it.
    ///
    /// # Errors
    ///
    /// Returns an error if the id already exists.
    pub fn add_element(&mut self, element: DesignElement) -> CoreResult<ElementId> {
        let id = self.design.add_element(element)?;
        self.sync.reconcile(&self.design.elements);
        self.select(Some(id))?;
        Ok(id)
    }

    /// Apply a property-panel edit.
    ///
    /// # Errors
    ///
    /// Returns an error if the element is missing or the patch has the wrong type.
    pub fn update_element(&mut self, id: ElementId, patch: &ElementPatch) -> CoreResult<Reconciliation> {
        self.design.update_element(id, patch)?;
        Ok(self.sync.reconcile(&self.design.elements))
    }

    /// Delete an element.
    ///
    /// # Errors
    ///
    /// Returns an error if the element is missing.
    pub fn delete_element(&mut self, id: ElementId) -> CoreResult<DesignElement> {
        let removed = self.design.remove_element(id)?;
        if self.selected == Some(id) {
            self.selected = None;
        }
        self.sync.reconcile(&self.design.elements);
        Ok(removed)
    }

    /// Select an element, or clear the selection.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ElementNotFound`] if the element is not in the design.
    pub fn select(&mut self, id: Option<ElementId>) -> CoreResult<()> {
        if let Some(id) = id {
            if self.design.element(id).is_none() {
                return Err(CoreError::ElementNotFound(id.to_string()));
            }
        }
        self.selected = id;
        self.sync.select(id);
        Ok(())
    }

    /// Feed queued surface events through the bridge, in order.
    ///
    /// Returns the number of document updates applied.
    pub fn process_surface_events(&mut self) -> usize {
        let events = self.sync.surface_mut().drain_events();
        let mut applied = 0;

        for event in events {
            let Some(update) = self.bridge.translate(self.sync.surface_mut(), event) else {
                continue;
            };
            match update {
                DocumentUpdate::Select { id } => {
                    self.selected = id;
                }
                DocumentUpdate::Geometry { id, patch, phase } => {
                    if let Err(e) = self.design.update_element(id, &patch.into()) {
                        tracing::warn!("Dropping {phase:?} geometry update for {id}: {e}");
                        continue;
                    }
                    self.sync.reconcile(&self.design.elements);
                }
            }
            applied += 1;
        }
        applied
    }

    /// Wait for every pending image materialization.
    pub async fn settle(&mut self) -> Vec<LoadOutcome> {
        self.sync.settle().await
    }

    /// Rename the design.
    pub fn rename(&mut self, name: impl Into<String>) {
        self.design.name = name.into();
    }

    /// Close the editor, returning the design and the surface.
    pub fn close(self) -> (Design, S) {
        (self.design, self.sync.into_surface())
    }
}
