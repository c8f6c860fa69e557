//! Single-page PDF assembly.
//!
//! The page is sized to the canvas (pixels converted to millimetres at the
//! configured DPI) and the raster is placed at the origin so it exactly
//! covers the page.

use crate::error::{RenderError, RenderResult};
use crate::export::Raster;

/// Millimetres per inch.
const MM_PER_INCH: f32 = 25.4;

/// Page orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Height at least as large as width.
    Portrait,
    /// Width strictly larger than height.
    Landscape,
}

impl Orientation {
    /// Orientation for a page of the given size.
    #[must_use]
    pub fn for_size(width: f32, height: f32) -> Self {
        if width > height {
            Self::Landscape
        } else {
            Self::Portrait
        }
    }
}

/// A finished PDF document.
#[derive(Debug, Clone)]
pub struct PdfArtifact {
    /// Encoded PDF.
    pub bytes: Vec<u8>,
    /// Page width in canvas pixels.
    pub page_width_px: f32,
    /// Page height in canvas pixels.
    pub page_height_px: f32,
    /// Page width in millimetres.
    pub page_width_mm: f32,
    /// Page height in millimetres.
    pub page_height_mm: f32,
    /// Chosen orientation.
    pub orientation: Orientation,
}

/// Convert pixels to millimetres at `dpi`.
#[must_use]
pub fn px_to_mm(px: f32, dpi: f32) -> f32 {
    px / dpi * MM_PER_INCH
}

/// Build a one-page PDF holding `raster` at full bleed.
///
/// # Errors
///
/// Returns [`RenderError::Pdf`] if the canvas size or DPI is not positive, or
/// if embedding or saving fails.
#[allow(clippy::cast_precision_loss)]
pub fn paginate(
    raster: &Raster,
    canvas_width: f32,
    canvas_height: f32,
    dpi: f32,
) -> RenderResult<PdfArtifact> {
    if canvas_width <= 0.0 || canvas_height <= 0.0 || dpi <= 0.0 {
        return Err(RenderError::Pdf(format!(
            "invalid page {canvas_width}x{canvas_height} at {dpi} dpi"
        )));
    }
    if raster.width == 0 || raster.height == 0 {
        return Err(RenderError::EmptyRaster {
            width: raster.width,
            height: raster.height,
            bytes: raster.png.len(),
        });
    }

    let orientation = Orientation::for_size(canvas_width, canvas_height);
    let page_width_mm = px_to_mm(canvas_width, dpi);
    let page_height_mm = px_to_mm(canvas_height, dpi);

    let (doc, page1, layer1) = printpdf::PdfDocument::new(
        "Sticker Export",
        printpdf::Mm(page_width_mm),
        printpdf::Mm(page_height_mm),
        "Layer 1",
    );
    let current_layer = doc.get_page(page1).get_layer(layer1);

    // Decode PNG using printpdf's bundled image crate for compatibility
    let dynamic_image = printpdf::image_crate::load_from_memory(&raster.png)
        .map_err(|e| RenderError::Pdf(format!("Failed to decode PNG for PDF: {e}")))?;
    let pdf_image = printpdf::Image::from_dynamic_image(&dynamic_image);

    // The image DPI maps raster pixels onto the page width; a raster drawn
    // at a multiplier other than 1 keeps the same physical size.
    let image_dpi = dpi * raster.width as f32 / canvas_width;
    let width_at_dpi = px_to_mm(raster.width as f32, image_dpi);
    let height_at_dpi = px_to_mm(raster.height as f32, image_dpi);
    let scale_y = page_height_mm / height_at_dpi;
    let scale_x = page_width_mm / width_at_dpi;

    let transform = printpdf::ImageTransform {
        translate_x: Some(printpdf::Mm(0.0)),
        translate_y: Some(printpdf::Mm(0.0)),
        scale_x: Some(scale_x),
        scale_y: Some(scale_y),
        dpi: Some(image_dpi),
        ..Default::default()
    };
    pdf_image.add_to_layer(current_layer, transform);

    let bytes = doc
        .save_to_bytes()
        .map_err(|e| RenderError::Pdf(format!("PDF save failed: {e}")))?;

    tracing::debug!(
        "Paginated {}x{} raster onto {page_width_mm:.1}x{page_height_mm:.1}mm {orientation:?} page",
        raster.width,
        raster.height
    );
    Ok(PdfArtifact {
        bytes,
        page_width_px: canvas_width,
        page_height_px: canvas_height,
        page_width_mm,
        page_height_mm,
        orientation,
    })
}
