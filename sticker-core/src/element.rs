//! Design elements - the building blocks of a sticker design.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::date::DateFormat;
use crate::error::{CoreError, CoreResult};

/// Unique identifier for an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(Uuid);

impl ElementId {
    /// Create a new unique element ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parse an element ID from its string form.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid UUID.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Default for ElementId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ElementId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// The closed set of element types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    /// Free text.
    Text,
    /// Raster image loaded from a URL or data URI.
    Image,
    /// Date computed at materialization time.
    Date,
}

/// Horizontal text alignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    /// Left aligned.
    #[default]
    Left,
    /// Centered.
    Center,
    /// Right aligned.
    Right,
}

/// Default font size in pixels.
pub const DEFAULT_FONT_SIZE: f32 = 16.0;
/// Default font family.
pub const DEFAULT_FONT_FAMILY: &str = "Arial";
/// Default text color.
pub const DEFAULT_COLOR: &str = "#000000";

/// Typography shared by text and date elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextStyle {
    /// Font size in pixels.
    pub font_size: f32,
    /// Font family name.
    pub font_family: String,
    /// Fill color as hex.
    pub color: String,
    /// Bold weight.
    pub bold: bool,
    /// Italic style.
    pub italic: bool,
    /// Horizontal alignment.
    pub alignment: Alignment,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: DEFAULT_FONT_SIZE,
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            color: DEFAULT_COLOR.to_string(),
            bold: false,
            italic: false,
            alignment: Alignment::Left,
        }
    }
}

/// Properties of a text element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextProperties {
    /// Text content.
    pub text: String,
    /// Typography.
    #[serde(flatten)]
    pub style: TextStyle,
}

/// Properties of a date element. The displayed text is computed, never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DateProperties {
    /// Date pattern.
    pub format: DateFormat,
    /// Typography.
    #[serde(flatten)]
    pub style: TextStyle,
}

/// Properties of an image element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageProperties {
    /// Absolute URL or data URI.
    pub url: String,
}

/// The type-tagged content of an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "properties", rename_all = "lowercase")]
pub enum ElementKind {
    /// A text label.
    Text(TextProperties),
    /// A raster image.
    Image(ImageProperties),
    /// The current date in a chosen pattern.
    Date(DateProperties),
}

impl ElementKind {
    /// The element type this kind belongs to.
    #[must_use]
    pub const fn element_type(&self) -> ElementType {
        match self {
            Self::Text(_) => ElementType::Text,
            Self::Image(_) => ElementType::Image,
            Self::Date(_) => ElementType::Date,
        }
    }
}

/// Partial geometry update. `None` fields are left untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GeometryPatch {
    /// New left edge.
    pub x: Option<f32>,
    /// New top edge.
    pub y: Option<f32>,
    /// New width.
    pub width: Option<f32>,
    /// New height.
    pub height: Option<f32>,
    /// New rotation in degrees.
    pub rotation: Option<f32>,
    /// New paint order hint.
    pub z_index: Option<i32>,
}

impl GeometryPatch {
    /// Whether the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// An edit coming from the property panel or the interaction bridge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementPatch {
    /// Geometry changes.
    pub geometry: GeometryPatch,
    /// Replacement properties; must be of the element's own type.
    pub kind: Option<ElementKind>,
}

impl From<GeometryPatch> for ElementPatch {
    fn from(geometry: GeometryPatch) -> Self {
        Self {
            geometry,
            kind: None,
        }
    }
}

/// A design element with content and geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignElement {
    /// Unique identifier, immutable for the element's lifetime.
    pub id: ElementId,
    /// Type tag and properties.
    #[serde(flatten)]
    pub kind: ElementKind,
    /// Left edge in page pixels.
    pub x: f32,
    /// Top edge in page pixels.
    pub y: f32,
    /// Width in pixels.
    pub width: f32,
    /// Height in pixels.
    pub height: f32,
    /// Rotation in degrees.
    #[serde(default)]
    pub rotation: f32,
    /// Paint order hint; higher paints later.
    #[serde(default)]
    pub z_index: i32,
}

impl DesignElement {
    /// Create an element with a fresh id at the origin.
    #[must_use]
    pub fn new(kind: ElementKind, width: f32, height: f32) -> Self {
        Self {
            id: ElementId::new(),
            kind,
            x: 0.0,
            y: 0.0,
            width: width.max(0.0),
            height: height.max(0.0),
            rotation: 0.0,
            z_index: 0,
        }
    }

    /// Create a text element with default typography.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(
            ElementKind::Text(TextProperties {
                text: text.into(),
                style: TextStyle::default(),
            }),
            200.0,
            40.0,
        )
    }

    /// Create a date element in the given pattern.
    #[must_use]
    pub fn date(format: DateFormat) -> Self {
        Self::new(
            ElementKind::Date(DateProperties {
                format,
                style: TextStyle::default(),
            }),
            150.0,
            30.0,
        )
    }

    /// Create an image element.
    #[must_use]
    pub fn image(url: impl Into<String>) -> Self {
        Self::new(
            ElementKind::Image(ImageProperties { url: url.into() }),
            200.0,
            200.0,
        )
    }

    /// Set the position.
    #[must_use]
    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Set the size.
    #[must_use]
    pub fn sized(mut self, width: f32, height: f32) -> Self {
        self.width = width.max(0.0);
        self.height = height.max(0.0);
        self
    }

    /// Set the z-index.
    #[must_use]
    pub fn with_z_index(mut self, z_index: i32) -> Self {
        self.z_index = z_index;
        self
    }

    /// The element's fixed type.
    #[must_use]
    pub const fn element_type(&self) -> ElementType {
        self.kind.element_type()
    }

    /// Rotation normalized to `[0, 360)` for display.
    #[must_use]
    pub fn display_rotation(&self) -> f32 {
        self.rotation.rem_euclid(360.0)
    }

    /// Apply a patch in place.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeMismatch`] if the patch carries properties of
    /// another element type. Nothing is modified in that case.
    pub fn apply(&mut self, patch: &ElementPatch) -> CoreResult<()> {
        if let Some(kind) = &patch.kind {
            if kind.element_type() != self.element_type() {
                return Err(CoreError::TypeMismatch {
                    element: self.element_type(),
                    patch: kind.element_type(),
                });
            }
        }

        let g = &patch.geometry;
        if let Some(x) = g.x {
            self.x = x;
        }
        if let Some(y) = g.y {
            self.y = y;
        }
        if let Some(width) = g.width {
            self.width = width.max(0.0);
        }
        if let Some(height) = g.height {
            self.height = height.max(0.0);
        }
        if let Some(rotation) = g.rotation {
            self.rotation = rotation;
        }
        if let Some(z_index) = g.z_index {
            self.z_index = z_index;
        }
        if let Some(kind) = &patch.kind {
            self.kind = kind.clone();
        }
        Ok(())
    }

    /// The image URL, if this is an image element.
    #[must_use]
    pub fn image_url(&self) -> Option<&str> {
        match &self.kind {
            ElementKind::Image(props) => Some(props.url.as_str()),
            _ => None,
        }
    }
}
