//! Designs: a page of elements with fixed canvas dimensions.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::element::{DesignElement, ElementId, ElementPatch};
use crate::error::{CoreError, CoreResult};

/// Smallest canvas edge accepted by editing surfaces.
pub const CANVAS_MIN: f32 = 100.0;
/// Largest canvas edge accepted by editing surfaces.
pub const CANVAS_MAX: f32 = 2000.0;

/// Identifier assigned by the store on first insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DesignId(Uuid);

impl DesignId {
    /// Create a new unique design ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a design ID from its string form.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid UUID.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Default for DesignId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DesignId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for DesignId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A sticker design.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Design {
    /// Store-assigned id; absent until first persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<DesignId>,
    /// Display name.
    pub name: String,
    /// Page width in pixels.
    pub canvas_width: f32,
    /// Page height in pixels.
    pub canvas_height: f32,
    /// Elements; `z_index` governs paint order, not list order.
    #[serde(default)]
    pub elements: Vec<DesignElement>,
    /// Cached raster preview.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

impl Design {
    /// Create an empty, unsaved design.
    #[must_use]
    pub fn new(name: impl Into<String>, canvas_width: f32, canvas_height: f32) -> Self {
        Self {
            id: None,
            name: name.into(),
            canvas_width,
            canvas_height,
            elements: Vec::new(),
            thumbnail_url: None,
        }
    }

    /// Clamp a canvas edge to the range editing surfaces accept.
    #[must_use]
    pub fn clamp_canvas(edge: f32) -> f32 {
        edge.clamp(CANVAS_MIN, CANVAS_MAX)
    }

    /// Append an element.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DuplicateElement`] if the id is already present.
    pub fn add_element(&mut self, element: DesignElement) -> CoreResult<ElementId> {
        let id = element.id;
        if self.element(id).is_some() {
            return Err(CoreError::DuplicateElement(id.to_string()));
        }
        self.elements.push(element);
        Ok(id)
    }

    /// Remove an element.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ElementNotFound`] if the element is not present.
    pub fn remove_element(&mut self, id: ElementId) -> CoreResult<DesignElement> {
        let index = self
            .elements
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| CoreError::ElementNotFound(id.to_string()))?;
        Ok(self.elements.remove(index))
    }

    /// Get an element by id.
    #[must_use]
    pub fn element(&self, id: ElementId) -> Option<&DesignElement> {
        self.elements.iter().find(|e| e.id == id)
    }

    /// Get a mutable element by id.
    pub fn element_mut(&mut self, id: ElementId) -> Option<&mut DesignElement> {
        self.elements.iter_mut().find(|e| e.id == id)
    }

    /// Apply a patch to one element.
    ///
    /// # Errors
    ///
    /// Returns an error if the element is missing or the patch has the wrong type.
    pub fn update_element(&mut self, id: ElementId, patch: &ElementPatch) -> CoreResult<()> {
        self.element_mut(id)
            .ok_or_else(|| CoreError::ElementNotFound(id.to_string()))?
            .apply(patch)
    }

    /// The set of element ids.
    #[must_use]
    pub fn element_ids(&self) -> HashSet<ElementId> {
        self.elements.iter().map(|e| e.id).collect()
    }

    /// Elements sorted by `z_index`; ties keep list order.
    #[must_use]
    pub fn paint_order(&self) -> Vec<&DesignElement> {
        let mut ordered: Vec<_> = self.elements.iter().collect();
        ordered.sort_by_key(|e| e.z_index);
        ordered
    }

    /// A z-index that paints above every current element.
    #[must_use]
    pub fn next_z_index(&self) -> i32 {
        self.elements
            .iter()
            .map(|e| e.z_index)
            .max()
            .map_or(0, |z| z.saturating_add(1))
    }

    /// Number of elements.
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Serialize the design to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> CoreResult<String> {
        serde_json::to_string(self).map_err(CoreError::Serialization)
    }

    /// Deserialize a design from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or contains duplicate element ids.
    pub fn from_json(json: &str) -> CoreResult<Self> {
        let design: Self = serde_json::from_str(json)?;
        Self::validate_elements(&design.elements)?;
        Ok(design)
    }

    /// Check that every element id in `elements` is unique.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DuplicateElement`] naming the first repeated id.
    pub fn validate_elements(elements: &[DesignElement]) -> CoreResult<()> {
        let mut seen = HashSet::new();
        for element in elements {
            if !seen.insert(element.id) {
                return Err(CoreError::DuplicateElement(element.id.to_string()));
            }
        }
        Ok(())
    }
}
