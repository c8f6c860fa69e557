//! Renderer error types.

use thiserror::Error;

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors that can occur while rasterizing, paginating or delivering.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The rasterizer produced no usable image data.
    #[error("Rasterization produced an empty image ({width}x{height}, {bytes} bytes)")]
    EmptyRaster {
        /// Pixel width of the result.
        width: u32,
        /// Pixel height of the result.
        height: u32,
        /// Encoded length.
        bytes: usize,
    },

    /// SVG or PNG stage failed.
    #[error("Export failed: {0}")]
    Export(String),

    /// PDF assembly failed.
    #[error("PDF generation failed: {0}")]
    Pdf(String),

    /// Image or data URI could not be decoded.
    #[error("Failed to load resource: {0}")]
    Resource(String),

    /// The print command failed.
    #[error("Print failed: {0}")]
    Print(String),

    /// Filesystem error during delivery.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
