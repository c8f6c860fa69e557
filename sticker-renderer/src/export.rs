//! Surface rasterization.
//!
//! Renders a [`Surface`] to PNG using an SVG intermediate representation and
//! the resvg/tiny-skia rasterization pipeline. Objects are drawn in paint
//! order, each inside a group carrying its translation, rotation (around the
//! top-left corner) and scale.

use std::fmt::Write;
use std::sync::Arc;

use base64::Engine;
use sticker_core::{Alignment, Shape, Surface, SurfaceObject};

use crate::error::{RenderError, RenderResult};

/// A PNG is at least its signature plus a complete IHDR chunk.
const MIN_PNG_BYTES: usize = 33;

/// Line height as a multiple of font size.
const LINE_HEIGHT: f32 = 1.2;

/// A rasterized surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    /// PNG-encoded pixels.
    pub png: Vec<u8>,
    /// Pixel width.
    pub width: u32,
    /// Pixel height.
    pub height: u32,
}

/// Renders surfaces to SVG and PNG.
#[derive(Clone)]
pub struct SurfaceRasterizer {
    fontdb: Arc<usvg::fontdb::Database>,
    background: [u8; 4],
}

impl std::fmt::Debug for SurfaceRasterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceRasterizer")
            .field("faces", &self.fontdb.len())
            .field("background", &self.background)
            .finish()
    }
}

impl Default for SurfaceRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SurfaceRasterizer {
    /// Create a rasterizer with the system fonts loaded and a white background.
    #[must_use]
    pub fn new() -> Self {
        let mut fontdb = usvg::fontdb::Database::new();
        fontdb.load_system_fonts();
        tracing::debug!("Loaded {} font faces", fontdb.len());
        Self {
            fontdb: Arc::new(fontdb),
            background: [255, 255, 255, 255],
        }
    }

    /// Set the background color as RGBA bytes.
    #[must_use]
    pub fn with_background(mut self, background: [u8; 4]) -> Self {
        self.background = background;
        self
    }

    /// Rasterize the surface at `multiplier` times its pixel size.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::EmptyRaster`] if the surface has no area or the
    /// encoded result is implausibly short, or an export error if SVG parsing
    /// or PNG encoding fails.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn rasterize<S: Surface>(&self, surface: &S, multiplier: f32) -> RenderResult<Raster> {
        let multiplier = if multiplier.is_finite() && multiplier > 0.0 {
            multiplier
        } else {
            1.0
        };
        let out_w = (surface.width() as f32 * multiplier).round() as u32;
        let out_h = (surface.height() as f32 * multiplier).round() as u32;
        if out_w == 0 || out_h == 0 {
            return Err(RenderError::EmptyRaster {
                width: out_w,
                height: out_h,
                bytes: 0,
            });
        }

        let svg = self.render_to_svg(surface, out_w, out_h);
        let pixmap = self.rasterize_svg(&svg)?;
        let png = pixmap
            .encode_png()
            .map_err(|e| RenderError::Export(format!("PNG encoding failed: {e}")))?;

        if png.len() < MIN_PNG_BYTES || pixmap.width() == 0 || pixmap.height() == 0 {
            return Err(RenderError::EmptyRaster {
                width: pixmap.width(),
                height: pixmap.height(),
                bytes: png.len(),
            });
        }

        tracing::debug!(
            "Rasterized {} objects to {}x{} ({} bytes)",
            surface.len(),
            pixmap.width(),
            pixmap.height(),
            png.len()
        );
        Ok(Raster {
            png,
            width: pixmap.width(),
            height: pixmap.height(),
        })
    }

    /// Render the surface to an SVG document of `out_w`x`out_h` pixels.
    #[must_use]
    pub fn render_to_svg<S: Surface>(&self, surface: &S, out_w: u32, out_h: u32) -> String {
        let mut svg = String::with_capacity(4096);
        let _ = write!(
            svg,
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{out_w}\" height=\"{out_h}\" viewBox=\"0 0 {} {}\">",
            surface.width(),
            surface.height(),
        );

        let bg = &self.background;
        let bg_alpha = f32::from(bg[3]) / 255.0;
        let _ = write!(
            svg,
            "<rect width=\"100%\" height=\"100%\" fill=\"rgba({},{},{},{})\"/>",
            bg[0], bg[1], bg[2], bg_alpha,
        );

        let mut objects: Vec<&SurfaceObject> = surface
            .handles()
            .into_iter()
            .filter_map(|h| surface.object(h))
            .collect();
        objects.sort_by_key(|o| o.paint_key());

        for object in objects {
            render_object_svg(&mut svg, object);
        }

        svg.push_str("</svg>");
        svg
    }

    /// Rasterize an SVG string to a tiny-skia Pixmap.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn rasterize_svg(&self, svg_string: &str) -> RenderResult<tiny_skia::Pixmap> {
        let mut opt = usvg::Options::default();
        opt.fontdb = Arc::clone(&self.fontdb);
        let tree = usvg::Tree::from_str(svg_string, &opt)
            .map_err(|e| RenderError::Export(format!("SVG parsing failed: {e}")))?;

        let px_w = tree.size().width().round() as u32;
        let px_h = tree.size().height().round() as u32;

        let mut pixmap = tiny_skia::Pixmap::new(px_w, px_h).ok_or(RenderError::EmptyRaster {
            width: px_w,
            height: px_h,
            bytes: 0,
        })?;

        resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

        Ok(pixmap)
    }
}

/// Render one surface object to SVG.
fn render_object_svg(svg: &mut String, object: &SurfaceObject) {
    let _ = write!(
        svg,
        "<g transform=\"translate({} {}) rotate({}) scale({} {})\">",
        object.left, object.top, object.angle, object.scale_x, object.scale_y,
    );

    match &object.shape {
        Shape::Text(text) => {
            let (anchor_x, anchor) = match text.align {
                Alignment::Left => (0.0, "start"),
                Alignment::Center => (text.width / 2.0, "middle"),
                Alignment::Right => (text.width, "end"),
            };
            let _ = write!(
                svg,
                "<text font-size=\"{}\" font-family=\"{}, sans-serif\" fill=\"{}\" font-weight=\"{}\" font-style=\"{}\" text-anchor=\"{anchor}\">",
                text.font_size,
                escape_xml(&text.font_family),
                escape_xml(&text.fill),
                if text.bold { "bold" } else { "normal" },
                if text.italic { "italic" } else { "normal" },
            );
            for (idx, line) in text.text.lines().enumerate() {
                let dy = if idx == 0 {
                    text.font_size
                } else {
                    text.font_size * LINE_HEIGHT
                };
                let _ = write!(
                    svg,
                    "<tspan x=\"{anchor_x}\" dy=\"{dy}\">{}</tspan>",
                    escape_xml(line),
                );
            }
            svg.push_str("</text>");
        }

        Shape::Image(image) => {
            let encoded = base64::engine::general_purpose::STANDARD.encode(image.bytes.as_slice());
            let _ = write!(
                svg,
                "<image width=\"{}\" height=\"{}\" preserveAspectRatio=\"none\" href=\"data:{};base64,{encoded}\"/>",
                image.natural_width,
                image.natural_height,
                escape_xml(&image.mime),
            );
        }

        Shape::Placeholder(placeholder) => {
            let _ = write!(
                svg,
                "<rect width=\"{}\" height=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"2\" stroke-dasharray=\"{} {}\"/>",
                placeholder.width,
                placeholder.height,
                escape_xml(&placeholder.stroke),
                placeholder.dash[0],
                placeholder.dash[1],
            );
            let _ = write!(
                svg,
                "<text x=\"{}\" y=\"{}\" font-size=\"{}\" fill=\"{}\" text-anchor=\"middle\" dominant-baseline=\"middle\" font-family=\"sans-serif\">{}</text>",
                placeholder.width / 2.0,
                placeholder.height / 2.0,
                placeholder.font_size,
                escape_xml(&placeholder.stroke),
                escape_xml(&placeholder.message),
            );
        }
    }

    svg.push_str("</g>");
}

/// Escape special XML characters.
fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
