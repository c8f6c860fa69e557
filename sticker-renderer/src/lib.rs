//! # Sticker Studio Renderer
//!
//! Turns a live design surface into print-accurate output.
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌──────────┐   ┌─────────────────────┐
//! │ Quiesce  │──▶│ Rasterize  │──▶│ Paginate │──▶│ Deliver             │
//! │ settle + │   │ SVG →      │   │ 1 page,  │   │ print window, or    │
//! │ redraw   │   │ resvg PNG  │   │ printpdf │   │ download fallback   │
//! └──────────┘   └────────────┘   └──────────┘   └─────────────────────┘
//! ```
//!
//! Thumbnails reuse Quiesce and Rasterize and return a PNG data URI. The
//! [`HttpImageFetcher`] implements the image load chain's single attempt.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod deliver;
pub mod error;
pub mod export;
pub mod fetch;
pub mod image;
pub mod pdf;
pub mod pipeline;

pub use deliver::{BlobRegistry, PrintHost, PrintRefused, PrintWindow, SystemPrintHost};
pub use error::{RenderError, RenderResult};
pub use export::{Raster, SurfaceRasterizer};
pub use fetch::{HttpFetcherConfig, HttpImageFetcher};
pub use pdf::{paginate, Orientation, PdfArtifact};
pub use pipeline::{
    Delivery, ExportConfig, ExportError, ExportOutcome, ExportPipeline, ExportRequest,
    SharedEditor,
};
