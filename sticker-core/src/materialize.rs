//! Element materializers: build or update surface objects from elements.

use crate::date::Clock;
use crate::element::{DesignElement, ElementKind, TextStyle};
use crate::loader::LoadedImage;
use crate::surface::{
    ImageShape, ObjectProps, PlaceholderShape, Shape, SurfaceObject, TextShape,
};

/// Label shown inside an image error placeholder.
pub const PLACEHOLDER_MESSAGE: &str = "Image failed to load";

/// Border color of an image error placeholder.
pub const PLACEHOLDER_STROKE: &str = "#cc3333";

/// Font size of the placeholder label.
const PLACEHOLDER_FONT_SIZE: f32 = 12.0;

/// Result of materializing one element synchronously.
#[derive(Debug, Clone, PartialEq)]
pub enum Materialized {
    /// The object can be added right away.
    Ready(SurfaceObject),
    /// The element is an image that must be loaded first.
    NeedsLoad {
        /// URL to load.
        url: String,
    },
}

/// Materialize an element. Images resolve only when `cached` holds their bitmap.
#[must_use]
pub fn materialize(
    element: &DesignElement,
    clock: &dyn Clock,
    cached: Option<&LoadedImage>,
) -> Materialized {
    match &element.kind {
        ElementKind::Text(_) | ElementKind::Date(_) => {
            Materialized::Ready(place(element, 1.0, 1.0, text_shape(element, clock)))
        }
        ElementKind::Image(props) => match cached {
            Some(image) => Materialized::Ready(image_object(element, image)),
            None => Materialized::NeedsLoad {
                url: props.url.clone(),
            },
        },
    }
}

/// Build the surface object for a loaded image, scaled to fill the element box.
#[must_use]
pub fn image_object(element: &DesignElement, image: &LoadedImage) -> SurfaceObject {
    let (scale_x, scale_y) = fill_scale(element, image.width, image.height);
    let shape = Shape::Image(ImageShape {
        src: element.image_url().unwrap_or_default().to_string(),
        bytes: image.bytes.clone(),
        mime: image.mime.clone(),
        natural_width: image.width,
        natural_height: image.height,
    });
    place(element, scale_x, scale_y, shape)
}

/// Build the error placeholder for an image that could not be loaded.
///
/// The rectangle covers exactly the element's box and carries its id.
#[must_use]
pub fn placeholder_object(element: &DesignElement) -> SurfaceObject {
    place(
        element,
        1.0,
        1.0,
        Shape::Placeholder(placeholder_shape(element)),
    )
}

/// Compute the silent update that brings `object` in line with `element`.
///
/// The object keeps its identity; only geometry and content change.
#[must_use]
pub fn patch_props(
    element: &DesignElement,
    object: &SurfaceObject,
    clock: &dyn Clock,
) -> ObjectProps {
    let mut props = ObjectProps {
        left: Some(element.x),
        top: Some(element.y),
        angle: Some(element.rotation),
        z_index: Some(element.z_index),
        ..Default::default()
    };

    match &object.shape {
        Shape::Text(_) => {
            props.scale_x = Some(1.0);
            props.scale_y = Some(1.0);
            if !matches!(element.kind, ElementKind::Image(_)) {
                props.shape = Some(text_shape(element, clock));
            }
        }
        Shape::Image(image) => {
            let (sx, sy) = fill_scale(element, image.natural_width, image.natural_height);
            props.scale_x = Some(sx);
            props.scale_y = Some(sy);
        }
        Shape::Placeholder(_) => {
            props.scale_x = Some(1.0);
            props.scale_y = Some(1.0);
            props.shape = Some(Shape::Placeholder(placeholder_shape(element)));
        }
    }
    props
}

/// Text displayed for a text or date element. Dates are computed now.
#[must_use]
pub fn display_text(element: &DesignElement, clock: &dyn Clock) -> Option<String> {
    match &element.kind {
        ElementKind::Text(props) => Some(props.text.clone()),
        ElementKind::Date(props) => Some(props.format.render(clock.today())),
        ElementKind::Image(_) => None,
    }
}

fn text_shape(element: &DesignElement, clock: &dyn Clock) -> Shape {
    let default_style = TextStyle::default();
    let style = match &element.kind {
        ElementKind::Text(props) => &props.style,
        ElementKind::Date(props) => &props.style,
        ElementKind::Image(_) => &default_style,
    };
    Shape::Text(TextShape {
        text: display_text(element, clock).unwrap_or_default(),
        font_size: style.font_size,
        font_family: style.font_family.clone(),
        fill: style.color.clone(),
        bold: style.bold,
        italic: style.italic,
        align: style.alignment,
        width: element.width,
        height: element.height,
    })
}

fn placeholder_shape(element: &DesignElement) -> PlaceholderShape {
    PlaceholderShape {
        width: element.width,
        height: element.height,
        stroke: PLACEHOLDER_STROKE.to_string(),
        dash: [6.0, 4.0],
        message: PLACEHOLDER_MESSAGE.to_string(),
        font_size: PLACEHOLDER_FONT_SIZE,
    }
}

#[allow(clippy::cast_precision_loss)]
fn fill_scale(element: &DesignElement, natural_width: u32, natural_height: u32) -> (f32, f32) {
    let sx = if natural_width == 0 {
        1.0
    } else {
        element.width / natural_width as f32
    };
    let sy = if natural_height == 0 {
        1.0
    } else {
        element.height / natural_height as f32
    };
    (sx, sy)
}

fn place(element: &DesignElement, scale_x: f32, scale_y: f32, shape: Shape) -> SurfaceObject {
    SurfaceObject {
        tag: Some(element.id),
        left: element.x,
        top: element.y,
        angle: element.rotation,
        scale_x,
        scale_y,
        z_index: element.z_index,
        stack_index: 0,
        selectable: true,
        shape,
    }
}
