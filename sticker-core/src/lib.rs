//! # Sticker Studio Core
//!
//! Document model and live-surface synchronization for the sticker designer.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────┐
//! │                      Editor                        │
//! ├───────────────────────────────────────────────────┤
//! │  Design (elements)   ──reconcile──▶  Surface       │
//! │        ▲                              │            │
//! │        └──── InteractionBridge ◀── events          │
//! ├───────────────────────────────────────────────────┤
//! │  Materializers │ Image load chain │ Image cache    │
//! ├───────────────────────────────────────────────────┤
//! │  DesignStore   │ ActiveRegistry   │ Notifier       │
//! └───────────────────────────────────────────────────┘
//! ```
//!
//! The document is the source of truth. The surface is a projection that the
//! [`SceneSynchronizer`] either patches in place or rebuilds; user gestures on
//! the surface flow back as [`DocumentUpdate`]s.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bridge;
pub mod cache;
pub mod date;
pub mod design;
pub mod editor;
pub mod element;
pub mod error;
pub mod loader;
pub mod materialize;
pub mod notify;
pub mod registry;
pub mod store;
pub mod surface;
pub mod sync;

pub use bridge::{DocumentUpdate, GesturePhase, InteractionBridge};
pub use cache::{CacheStats, ImageCache, ImageCacheConfig};
pub use date::{Clock, DateFormat, FixedClock, SystemClock};
pub use design::{Design, DesignId, CANVAS_MAX, CANVAS_MIN};
pub use editor::Editor;
pub use element::{
    Alignment, DateProperties, DesignElement, ElementId, ElementKind, ElementPatch, ElementType,
    GeometryPatch, ImageProperties, TextProperties, TextStyle,
};
pub use error::{CoreError, CoreResult};
pub use loader::{
    load_image_chain, ChainFailure, FetchError, ImageFetcher, ImageLoadConfig, LoadStrategy,
    LoadedImage,
};
pub use materialize::{Materialized, PLACEHOLDER_MESSAGE};
pub use notify::{Notice, NoticeLevel, Notifier, RecordingNotifier, TracingNotifier};
pub use registry::{ActiveRegistry, Registration};
pub use store::{DesignPatch, DesignRecord, DesignStore, StoreError};
pub use surface::{
    Bounds, ImageShape, ObjectHandle, ObjectProps, PlaceholderShape, RetainedSurface, Shape,
    Surface, SurfaceEvent, SurfaceObject, TextShape,
};
pub use sync::{LoadOutcome, Reconciliation, SceneSynchronizer, SyncConfig};

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
