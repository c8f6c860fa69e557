//! The rendering surface: a mutable, retained object graph.
//!
//! The [`Surface`] trait is the seam between the document model and whatever
//! graphics library owns the live objects. Surfaces distinguish two kinds of
//! mutation:
//!
//! - *silent sets* ([`Surface::set_silent`], [`Surface::add`], ...) used by the
//!   synchronizer, which never queue events, and
//! - *user edits* (the `user_*` methods on [`RetainedSurface`]), which queue
//!   [`SurfaceEvent`]s for the interaction bridge.
//!
//! ```text
//!  Design ──reconcile──▶ Surface ──events──▶ Bridge ──updates──▶ Design
//!            (silent)                                 (re-enters reconcile)
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::element::{Alignment, ElementId};
use crate::error::{CoreError, CoreResult};

/// Stable handle to a surface object. Handles are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectHandle(u64);

impl ObjectHandle {
    /// Raw handle value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "obj#{}", self.0)
    }
}

/// A text primitive.
#[derive(Debug, Clone, PartialEq)]
pub struct TextShape {
    /// Displayed text.
    pub text: String,
    /// Font size in pixels.
    pub font_size: f32,
    /// Font family.
    pub font_family: String,
    /// Fill color.
    pub fill: String,
    /// Bold weight.
    pub bold: bool,
    /// Italic style.
    pub italic: bool,
    /// Horizontal alignment within the box.
    pub align: Alignment,
    /// Box width before scaling.
    pub width: f32,
    /// Box height before scaling.
    pub height: f32,
}

/// A decoded raster image primitive.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageShape {
    /// URL the image was loaded from.
    pub src: String,
    /// Encoded image bytes.
    pub bytes: Arc<Vec<u8>>,
    /// MIME type of `bytes`.
    pub mime: String,
    /// Intrinsic width in pixels.
    pub natural_width: u32,
    /// Intrinsic height in pixels.
    pub natural_height: u32,
}

/// Dashed rectangle with centered explanatory text, shown when an image fails.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceholderShape {
    /// Rectangle width.
    pub width: f32,
    /// Rectangle height.
    pub height: f32,
    /// Border color.
    pub stroke: String,
    /// Dash pattern (on, off).
    pub dash: [f32; 2],
    /// Centered label.
    pub message: String,
    /// Label font size.
    pub font_size: f32,
}

/// Visual content of a surface object.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Text or date element.
    Text(TextShape),
    /// Loaded image.
    Image(ImageShape),
    /// Image error placeholder.
    Placeholder(PlaceholderShape),
}

impl Shape {
    /// Unscaled size of the shape.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn natural_size(&self) -> (f32, f32) {
        match self {
            Self::Text(t) => (t.width, t.height),
            Self::Image(i) => (i.natural_width as f32, i.natural_height as f32),
            Self::Placeholder(p) => (p.width, p.height),
        }
    }

    /// Short name for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Image(_) => "image",
            Self::Placeholder(_) => "placeholder",
        }
    }
}

/// Axis-aligned bounds before rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Scaled width.
    pub width: f32,
    /// Scaled height.
    pub height: f32,
}

/// One object on the surface.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceObject {
    /// Id of the element this object materializes.
    pub tag: Option<ElementId>,
    /// Left edge in page pixels.
    pub left: f32,
    /// Top edge in page pixels.
    pub top: f32,
    /// Rotation in degrees around the top-left corner.
    pub angle: f32,
    /// Horizontal scale applied to the natural size.
    pub scale_x: f32,
    /// Vertical scale applied to the natural size.
    pub scale_y: f32,
    /// Paint order.
    pub z_index: i32,
    /// Position of the element in its design's list; breaks `z_index` ties.
    pub stack_index: usize,
    /// Whether the user can select and transform the object.
    pub selectable: bool,
    /// Visual content.
    pub shape: Shape,
}

impl SurfaceObject {
    /// Create an unscaled object at the origin.
    #[must_use]
    pub fn new(shape: Shape) -> Self {
        Self {
            tag: None,
            left: 0.0,
            top: 0.0,
            angle: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            z_index: 0,
            stack_index: 0,
            selectable: true,
            shape,
        }
    }

    /// Sort key for painting, lowest first.
    #[must_use]
    pub const fn paint_key(&self) -> (i32, usize) {
        (self.z_index, self.stack_index)
    }

    /// Tag with an element id.
    #[must_use]
    pub fn tagged(mut self, id: ElementId) -> Self {
        self.tag = Some(id);
        self
    }

    /// Bounds after scaling, before rotation.
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        let (w, h) = self.shape.natural_size();
        Bounds {
            x: self.left,
            y: self.top,
            width: w * self.scale_x,
            height: h * self.scale_y,
        }
    }
}

/// A silent property update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectProps {
    /// New left edge.
    pub left: Option<f32>,
    /// New top edge.
    pub top: Option<f32>,
    /// New rotation.
    pub angle: Option<f32>,
    /// New horizontal scale.
    pub scale_x: Option<f32>,
    /// New vertical scale.
    pub scale_y: Option<f32>,
    /// New paint order.
    pub z_index: Option<i32>,
    /// New list position.
    pub stack_index: Option<usize>,
    /// Replacement content.
    pub shape: Option<Shape>,
}

impl ObjectProps {
    fn apply_to(self, object: &mut SurfaceObject) {
        if let Some(left) = self.left {
            object.left = left;
        }
        if let Some(top) = self.top {
            object.top = top;
        }
        if let Some(angle) = self.angle {
            object.angle = angle;
        }
        if let Some(scale_x) = self.scale_x {
            object.scale_x = scale_x;
        }
        if let Some(scale_y) = self.scale_y {
            object.scale_y = scale_y;
        }
        if let Some(z_index) = self.z_index {
            object.z_index = z_index;
        }
        if let Some(stack_index) = self.stack_index {
            object.stack_index = stack_index;
        }
        if let Some(shape) = self.shape {
            object.shape = shape;
        }
    }
}

/// Lifecycle events queued by user edits on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "handle", rename_all = "snake_case")]
pub enum SurfaceEvent {
    /// An object became selected while nothing was selected.
    SelectionCreated(ObjectHandle),
    /// The selection moved to another object.
    SelectionUpdated(ObjectHandle),
    /// The selection was cleared.
    SelectionCleared,
    /// Drag in progress.
    ObjectMoving(ObjectHandle),
    /// Scale in progress.
    ObjectScaling(ObjectHandle),
    /// Rotation in progress.
    ObjectRotating(ObjectHandle),
    /// A transform gesture finished.
    ObjectModified(ObjectHandle),
}

/// A retained-mode rendering surface.
///
/// All access happens on one thread; implementations need no locking.
pub trait Surface {
    /// Surface width in pixels.
    fn width(&self) -> u32;

    /// Surface height in pixels.
    fn height(&self) -> u32;

    /// Resize the surface.
    fn set_size(&mut self, width: u32, height: u32);

    /// Add an object and return its handle.
    fn add(&mut self, object: SurfaceObject) -> ObjectHandle;

    /// Remove an object. Clears the active selection if it pointed at it.
    fn remove(&mut self, handle: ObjectHandle) -> Option<SurfaceObject>;

    /// Remove every object and the active selection.
    fn clear(&mut self);

    /// Look up an object.
    fn object(&self, handle: ObjectHandle) -> Option<&SurfaceObject>;

    /// All handles in insertion order.
    fn handles(&self) -> Vec<ObjectHandle>;

    /// Number of objects.
    fn len(&self) -> usize {
        self.handles().len()
    }

    /// Whether the surface has no objects.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Handles of objects tagged with `id`.
    fn find_by_tag(&self, id: ElementId) -> Vec<ObjectHandle> {
        self.handles()
            .into_iter()
            .filter(|h| self.object(*h).and_then(|o| o.tag) == Some(id))
            .collect()
    }

    /// Update properties without emitting any event.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ObjectNotFound`] if the handle is unknown.
    fn set_silent(&mut self, handle: ObjectHandle, props: ObjectProps) -> CoreResult<()>;

    /// The currently selected object.
    fn active_object(&self) -> Option<ObjectHandle>;

    /// Programmatically select an object. Emits no event.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ObjectNotFound`] if the handle is unknown.
    fn set_active_object(&mut self, handle: ObjectHandle) -> CoreResult<()>;

    /// Programmatically clear the selection. Emits no event.
    fn discard_active_object(&mut self);

    /// Ask for a redraw.
    fn request_render(&mut self);

    /// Number of redraws requested so far.
    fn render_count(&self) -> u64;

    /// Take all queued events in the order they were produced.
    fn drain_events(&mut self) -> Vec<SurfaceEvent>;
}

/// In-memory [`Surface`] used by the editor, the exporter, and tests.
#[derive(Debug, Clone)]
pub struct RetainedSurface {
    width: u32,
    height: u32,
    objects: Vec<(ObjectHandle, SurfaceObject)>,
    next_handle: u64,
    active: Option<ObjectHandle>,
    renders: u64,
    events: Vec<SurfaceEvent>,
}

impl RetainedSurface {
    /// Create an empty surface.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            objects: Vec::new(),
            next_handle: 1,
            active: None,
            renders: 0,
            events: Vec::new(),
        }
    }

    fn object_mut(&mut self, handle: ObjectHandle) -> CoreResult<&mut SurfaceObject> {
        self.objects
            .iter_mut()
            .find(|(h, _)| *h == handle)
            .map(|(_, o)| o)
            .ok_or(CoreError::ObjectNotFound(handle.raw()))
    }

    /// User clicks an object.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is unknown.
    pub fn user_select(&mut self, handle: ObjectHandle) -> CoreResult<()> {
        if !self.object_mut(handle)?.selectable {
            return Ok(());
        }
        let event = if self.active.is_some() {
            SurfaceEvent::SelectionUpdated(handle)
        } else {
            SurfaceEvent::SelectionCreated(handle)
        };
        self.active = Some(handle);
        self.events.push(event);
        Ok(())
    }

    /// User clicks empty canvas.
    pub fn user_clear_selection(&mut self) {
        if self.active.take().is_some() {
            self.events.push(SurfaceEvent::SelectionCleared);
        }
    }

    /// User drags an object by a delta.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is unknown.
    pub fn user_move(&mut self, handle: ObjectHandle, dx: f32, dy: f32) -> CoreResult<()> {
        let object = self.object_mut(handle)?;
        object.left += dx;
        object.top += dy;
        self.events.push(SurfaceEvent::ObjectMoving(handle));
        Ok(())
    }

    /// User drags a scale handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is unknown.
    pub fn user_scale(&mut self, handle: ObjectHandle, scale_x: f32, scale_y: f32) -> CoreResult<()> {
        let object = self.object_mut(handle)?;
        object.scale_x = scale_x;
        object.scale_y = scale_y;
        self.events.push(SurfaceEvent::ObjectScaling(handle));
        Ok(())
    }

    /// User drags the rotation handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is unknown.
    pub fn user_rotate(&mut self, handle: ObjectHandle, angle: f32) -> CoreResult<()> {
        self.object_mut(handle)?.angle = angle;
        self.events.push(SurfaceEvent::ObjectRotating(handle));
        Ok(())
    }

    /// User releases the mouse after a transform.
    ///
    /// Like many canvas libraries, the surface drops its active-object
    /// reference when a transform completes.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is unknown.
    pub fn user_finish(&mut self, handle: ObjectHandle) -> CoreResult<()> {
        self.object_mut(handle)?;
        self.active = None;
        self.events.push(SurfaceEvent::ObjectModified(handle));
        Ok(())
    }

    /// Objects sorted for painting by [`SurfaceObject::paint_key`].
    ///
    /// Insertion order does not matter, so an image that finishes loading
    /// late still paints below the elements listed after it.
    #[must_use]
    pub fn paint_order(&self) -> Vec<&SurfaceObject> {
        let mut ordered: Vec<_> = self.objects.iter().map(|(_, o)| o).collect();
        ordered.sort_by_key(|o| o.paint_key());
        ordered
    }
}

impl Default for RetainedSurface {
    fn default() -> Self {
        Self::new(800, 600)
    }
}

impl Surface for RetainedSurface {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    fn add(&mut self, object: SurfaceObject) -> ObjectHandle {
        let handle = ObjectHandle(self.next_handle);
        self.next_handle += 1;
        tracing::trace!("add {} {handle} tag={:?}", object.shape.name(), object.tag);
        self.objects.push((handle, object));
        handle
    }

    fn remove(&mut self, handle: ObjectHandle) -> Option<SurfaceObject> {
        let index = self.objects.iter().position(|(h, _)| *h == handle)?;
        if self.active == Some(handle) {
            self.active = None;
        }
        Some(self.objects.remove(index).1)
    }

    fn clear(&mut self) {
        self.objects.clear();
        self.active = None;
    }

    fn object(&self, handle: ObjectHandle) -> Option<&SurfaceObject> {
        self.objects
            .iter()
            .find(|(h, _)| *h == handle)
            .map(|(_, o)| o)
    }

    fn handles(&self) -> Vec<ObjectHandle> {
        self.objects.iter().map(|(h, _)| *h).collect()
    }

    fn len(&self) -> usize {
        self.objects.len()
    }

    fn set_silent(&mut self, handle: ObjectHandle, props: ObjectProps) -> CoreResult<()> {
        props.apply_to(self.object_mut(handle)?);
        Ok(())
    }

    fn active_object(&self) -> Option<ObjectHandle> {
        self.active
    }

    fn set_active_object(&mut self, handle: ObjectHandle) -> CoreResult<()> {
        self.object_mut(handle)?;
        self.active = Some(handle);
        Ok(())
    }

    fn discard_active_object(&mut self) {
        self.active = None;
    }

    fn request_render(&mut self) {
        self.renders += 1;
    }

    fn render_count(&self) -> u64 {
        self.renders
    }

    fn drain_events(&mut self) -> Vec<SurfaceEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_object(text: &str) -> SurfaceObject {
        SurfaceObject::new(Shape::Text(TextShape {
            text: text.to_string(),
            font_size: 16.0,
            font_family: "Arial".to_string(),
            fill: "#000000".to_string(),
            bold: false,
            italic: false,
            align: Alignment::Left,
            width: 100.0,
            height: 20.0,
        }))
    }

    #[test]
    fn test_handles_are_not_reused() {
        let mut surface = RetainedSurface::new(400, 300);
        let a = surface.add(text_object("a"));
        surface.clear();
        let b = surface.add(text_object("b"));
        assert_ne!(a, b);
        assert_eq!(surface.len(), 1);
    }

    #[test]
    fn test_silent_set_emits_nothing() {
        let mut surface = RetainedSurface::new(400, 300);
        let h = surface.add(text_object("a"));
        surface
            .set_silent(
                h,
                ObjectProps {
                    left: Some(42.0),
                    ..Default::default()
                },
            )
            .expect("set");
        assert!(surface.drain_events().is_empty());
        assert!((surface.object(h).expect("exists").left - 42.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_user_gesture_events_in_order() {
        let mut surface = RetainedSurface::new(400, 300);
        let h = surface.add(text_object("a"));
        surface.user_select(h).expect("select");
        surface.user_move(h, 5.0, 5.0).expect("move");
        surface.user_finish(h).expect("finish");

        assert_eq!(
            surface.drain_events(),
            vec![
                SurfaceEvent::SelectionCreated(h),
                SurfaceEvent::ObjectMoving(h),
                SurfaceEvent::ObjectModified(h),
            ]
        );
        assert!(surface.active_object().is_none());
    }

    #[test]
    fn test_remove_clears_selection() {
        let mut surface = RetainedSurface::new(400, 300);
        let h = surface.add(text_object("a"));
        surface.set_active_object(h).expect("activate");
        surface.remove(h);
        assert!(surface.active_object().is_none());
        assert!(surface.set_active_object(h).is_err());
    }

    #[test]
    fn test_paint_order_ignores_insertion_order() {
        let mut surface = RetainedSurface::new(400, 300);
        let mut later = text_object("later");
        later.stack_index = 1;
        surface.add(later);
        surface.add(text_object("earlier"));
        let mut raised = text_object("raised");
        raised.z_index = 2;
        surface.add(raised);

        let texts: Vec<_> = surface
            .paint_order()
            .into_iter()
            .map(|o| match &o.shape {
                Shape::Text(t) => t.text.clone(),
                other => other.name().to_string(),
            })
            .collect();
        assert_eq!(texts, ["earlier", "later", "raised"]);
    }

    #[test]
    fn test_bounds_apply_scale() {
        let mut object = text_object("a");
        object.left = 10.0;
        object.scale_x = 2.0;
        let bounds = object.bounds();
        assert!((bounds.x - 10.0).abs() < f32::EPSILON);
        assert!((bounds.width - 200.0).abs() < f32::EPSILON);
        assert!((bounds.height - 20.0).abs() < f32::EPSILON);
    }
}
