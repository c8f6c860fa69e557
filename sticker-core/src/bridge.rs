//! Interaction bridge: surface gestures back into document updates.

use serde::{Deserialize, Serialize};

use crate::element::{ElementId, GeometryPatch};
use crate::surface::{ObjectHandle, Surface, SurfaceEvent, SurfaceObject};

/// Whether a geometry update is a live tick or the end of a gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GesturePhase {
    /// Moving, scaling or rotating in progress.
    Continuous,
    /// The gesture finished.
    Final,
}

/// A mutation the document model should apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "update", rename_all = "snake_case")]
pub enum DocumentUpdate {
    /// The selected element changed.
    Select {
        /// Newly selected element, or `None` when cleared.
        id: Option<ElementId>,
    },
    /// An element's geometry changed on the surface.
    Geometry {
        /// Element that was transformed.
        id: ElementId,
        /// Rounded geometry values.
        patch: GeometryPatch,
        /// Live tick or gesture end.
        phase: GesturePhase,
    },
}

/// Translates [`SurfaceEvent`]s into [`DocumentUpdate`]s.
///
/// Stateless; events must be fed in the order the surface produced them.
#[derive(Debug, Clone, Copy, Default)]
pub struct InteractionBridge;

impl InteractionBridge {
    /// Create a bridge.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Translate one event.
    ///
    /// On [`SurfaceEvent::ObjectModified`] the object is re-asserted as the
    /// active selection, since the surface drops it when a transform ends.
    pub fn translate<S: Surface>(
        &self,
        surface: &mut S,
        event: SurfaceEvent,
    ) -> Option<DocumentUpdate> {
        match event {
            SurfaceEvent::SelectionCreated(handle) | SurfaceEvent::SelectionUpdated(handle) => {
                Some(DocumentUpdate::Select {
                    id: surface.object(handle).and_then(|o| o.tag),
                })
            }
            SurfaceEvent::SelectionCleared => Some(DocumentUpdate::Select { id: None }),
            SurfaceEvent::ObjectMoving(handle) => {
                Self::geometry(surface, handle, GesturePhase::Continuous, |o| GeometryPatch {
                    x: Some(o.left.round()),
                    y: Some(o.top.round()),
                    ..Default::default()
                })
            }
            SurfaceEvent::ObjectScaling(handle) => {
                Self::geometry(surface, handle, GesturePhase::Continuous, |o| {
                    let b = o.bounds();
                    GeometryPatch {
                        x: Some(b.x.round()),
                        y: Some(b.y.round()),
                        width: Some(b.width.round()),
                        height: Some(b.height.round()),
                        ..Default::default()
                    }
                })
            }
            SurfaceEvent::ObjectRotating(handle) => {
                Self::geometry(surface, handle, GesturePhase::Continuous, |o| GeometryPatch {
                    rotation: Some(o.angle.round()),
                    ..Default::default()
                })
            }
            SurfaceEvent::ObjectModified(handle) => {
                let update = Self::geometry(surface, handle, GesturePhase::Final, full_geometry);
                if update.is_some() && surface.set_active_object(handle).is_err() {
                    tracing::debug!("Modified object {handle} vanished before reselect");
                }
                update
            }
        }
    }

    fn geometry<S: Surface>(
        surface: &S,
        handle: ObjectHandle,
        phase: GesturePhase,
        extract: impl FnOnce(&SurfaceObject) -> GeometryPatch,
    ) -> Option<DocumentUpdate> {
        let object = surface.object(handle)?;
        let id = object.tag?;
        Some(DocumentUpdate::Geometry {
            id,
            patch: extract(object),
            phase,
        })
    }
}

fn full_geometry(object: &SurfaceObject) -> GeometryPatch {
    let b = object.bounds();
    GeometryPatch {
        x: Some(b.x.round()),
        y: Some(b.y.round()),
        width: Some(b.width.round()),
        height: Some(b.height.round()),
        rotation: Some(object.angle.round()),
        z_index: None,
    }
}
