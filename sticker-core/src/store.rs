//! Design storage.
//!
//! [`DesignStore`] is a small row store with the contract the editor needs:
//! `list` (newest first), `insert` (assigns the id), `update` (partial) and
//! `delete`. Rows live in memory and, when a data directory is configured, are
//! mirrored to one JSON file per design.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::design::{Design, DesignId};
use crate::element::DesignElement;
use crate::error::CoreError;

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested design does not exist.
    #[error("Design not found: {0}")]
    NotFound(String),
    /// An I/O error occurred during persistence.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// The design content is inconsistent, e.g. repeated element ids.
    #[error("Invalid design: {0}")]
    Invalid(#[from] CoreError),
}

/// A stored design row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignRecord {
    /// Store-assigned id.
    pub id: DesignId,
    /// Display name.
    pub name: String,
    /// Page width in pixels.
    pub canvas_width: f32,
    /// Page height in pixels.
    pub canvas_height: f32,
    /// Serialized element list.
    pub elements: Vec<DesignElement>,
    /// Cached preview.
    pub thumbnail_url: Option<String>,
    /// Set on insert.
    pub created_at: DateTime<Utc>,
    /// Set on every write.
    pub updated_at: DateTime<Utc>,
}

impl DesignRecord {
    /// Convert the row into a design.
    #[must_use]
    pub fn to_design(&self) -> Design {
        Design {
            id: Some(self.id),
            name: self.name.clone(),
            canvas_width: self.canvas_width,
            canvas_height: self.canvas_height,
            elements: self.elements.clone(),
            thumbnail_url: self.thumbnail_url.clone(),
        }
    }
}

/// Partial update of a stored design. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignPatch {
    /// New name.
    pub name: Option<String>,
    /// New page width.
    pub canvas_width: Option<f32>,
    /// New page height.
    pub canvas_height: Option<f32>,
    /// Replacement element list.
    pub elements: Option<Vec<DesignElement>>,
    /// New preview.
    pub thumbnail_url: Option<String>,
}

impl From<&Design> for DesignPatch {
    fn from(design: &Design) -> Self {
        Self {
            name: Some(design.name.clone()),
            canvas_width: Some(design.canvas_width),
            canvas_height: Some(design.canvas_height),
            elements: Some(design.elements.clone()),
            thumbnail_url: design.thumbnail_url.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct Rows {
    records: HashMap<DesignId, DesignRecord>,
    last_stamp: Option<DateTime<Utc>>,
}

impl Rows {
    /// Strictly increasing timestamps, so newest-first ordering is total.
    fn stamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_stamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_stamp = Some(stamp);
        stamp
    }
}

/// Thread-safe design store with optional filesystem persistence.
#[derive(Debug, Clone, Default)]
pub struct DesignStore {
    rows: Arc<RwLock<Rows>>,
    data_dir: Option<PathBuf>,
}

impl DesignStore {
    /// Create an in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store persisted to `data_dir`, loading any existing rows.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be created or read.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)?;
        let store = Self {
            rows: Arc::new(RwLock::new(Rows::default())),
            data_dir: Some(data_dir),
        };
        store.load_all()?;
        Ok(store)
    }

    /// All designs, most recently updated first.
    #[must_use]
    pub fn list(&self) -> Vec<DesignRecord> {
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        let mut records: Vec<_> = rows.records.values().cloned().collect();
        records.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        records
    }

    /// Get one design.
    #[must_use]
    pub fn get(&self, id: DesignId) -> Option<DesignRecord> {
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        rows.records.get(&id).cloned()
    }

    /// Insert a design and assign its id. An id already set on `design` is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] if element ids repeat, or an error if
    /// persisting the row fails.
    pub fn insert(&self, design: &Design) -> Result<DesignRecord, StoreError> {
        Design::validate_elements(&design.elements)?;
        let record = {
            let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
            let stamp = rows.stamp();
            let record = DesignRecord {
                id: DesignId::new(),
                name: design.name.clone(),
                canvas_width: design.canvas_width,
                canvas_height: design.canvas_height,
                elements: design.elements.clone(),
                thumbnail_url: design.thumbnail_url.clone(),
                created_at: stamp,
                updated_at: stamp,
            };
            rows.records.insert(record.id, record.clone());
            record
        };
        self.persist(&record)?;
        tracing::info!("Inserted design {} ({})", record.id, record.name);
        Ok(record)
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the design does not exist,
    /// [`StoreError::Invalid`] if the new elements repeat an id, or an error if
    /// persisting fails.
    pub fn update(&self, id: DesignId, patch: DesignPatch) -> Result<DesignRecord, StoreError> {
        if let Some(elements) = &patch.elements {
            Design::validate_elements(elements)?;
        }
        let record = {
            let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
            let stamp = rows.stamp();
            let record = rows
                .records
                .get_mut(&id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            if let Some(name) = patch.name {
                record.name = name;
            }
            if let Some(width) = patch.canvas_width {
                record.canvas_width = width;
            }
            if let Some(height) = patch.canvas_height {
                record.canvas_height = height;
            }
            if let Some(elements) = patch.elements {
                record.elements = elements;
            }
            if let Some(thumbnail) = patch.thumbnail_url {
                record.thumbnail_url = Some(thumbnail);
            }
            record.updated_at = stamp;
            record.clone()
        };
        self.persist(&record)?;
        Ok(record)
    }

    /// Insert an unsaved design or update a saved one.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn save(&self, design: &Design) -> Result<DesignRecord, StoreError> {
        match design.id {
            Some(id) if self.get(id).is_some() => self.update(id, DesignPatch::from(design)),
            _ => self.insert(design),
        }
    }

    /// Delete a design.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the design does not exist, or an
    /// error if the file cannot be removed.
    pub fn delete(&self, id: DesignId) -> Result<(), StoreError> {
        {
            let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
            rows.records
                .remove(&id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        }
        if let Some(path) = self.record_path(id) {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        tracing::info!("Deleted design {id}");
        Ok(())
    }

    /// Number of stored designs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Load every `*.json` row from the data directory into memory.
    ///
    /// Unreadable files are skipped with a warning. Returns the number loaded.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be read.
    pub fn load_all(&self) -> Result<usize, StoreError> {
        let Some(dir) = self.data_dir.as_deref() else {
            return Ok(0);
        };
        let mut loaded = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_record(&path) {
                Ok(record) => loaded.push(record),
                Err(e) => tracing::warn!("Skipping {}: {e}", path.display()),
            }
        }

        let count = loaded.len();
        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        for record in loaded {
            if rows.last_stamp.map_or(true, |last| record.updated_at > last) {
                rows.last_stamp = Some(record.updated_at);
            }
            rows.records.insert(record.id, record);
        }
        tracing::debug!("Loaded {count} designs from {}", dir.display());
        Ok(count)
    }

    fn record_path(&self, id: DesignId) -> Option<PathBuf> {
        self.data_dir
            .as_ref()
            .map(|dir| dir.join(format!("{id}.json")))
    }

    fn persist(&self, record: &DesignRecord) -> Result<(), StoreError> {
        let Some(path) = self.record_path(record.id) else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(record)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        std::fs::write(&path, json)?;
        Ok(())
    }
}

fn read_record(path: &Path) -> Result<DesignRecord, StoreError> {
    let contents = std::fs::read_to_string(path)?;
    let record: DesignRecord =
        serde_json::from_str(&contents).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Design::validate_elements(&record.elements)?;
    Ok(record)
}
