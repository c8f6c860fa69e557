//! Image utilities: format sniffing, data URIs, decoding and preview fitting.

use std::io::Cursor;
use std::sync::Arc;

use base64::Engine;
use sticker_core::LoadedImage;

use crate::error::{RenderError, RenderResult};

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// PNG with alpha support.
    Png,
    /// JPEG (no alpha).
    Jpeg,
    /// WebP (alpha support).
    WebP,
    /// GIF (first frame only).
    Gif,
    /// Unknown/other format.
    Unknown,
}

impl ImageFormat {
    /// Detect format from MIME type.
    #[must_use]
    pub fn from_mime(mime: &str) -> Self {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence.to_lowercase().as_str() {
            "image/png" => Self::Png,
            "image/jpeg" | "image/jpg" => Self::Jpeg,
            "image/webp" => Self::WebP,
            "image/gif" => Self::Gif,
            _ => Self::Unknown,
        }
    }

    /// Detect format from magic bytes.
    #[must_use]
    pub fn from_magic_bytes(data: &[u8]) -> Self {
        if data.len() < 4 {
            return Self::Unknown;
        }

        // PNG: 89 50 4E 47
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
            return Self::Png;
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Self::Jpeg;
        }

        if data.starts_with(b"GIF8") {
            return Self::Gif;
        }

        // WebP: RIFF....WEBP
        if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            return Self::WebP;
        }

        Self::Unknown
    }

    /// Canonical MIME type, `application/octet-stream` when unknown.
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
            Self::Gif => "image/gif",
            Self::Unknown => "application/octet-stream",
        }
    }
}

/// Payload of a `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    /// Declared media type (`text/plain` if omitted).
    pub mime: String,
    /// Decoded payload.
    pub bytes: Vec<u8>,
}

/// Parse a data URI such as `data:image/png;base64,iVBORw0KGgo...`.
///
/// # Errors
///
/// Returns an error if the URI is malformed or its payload cannot be decoded.
pub fn parse_data_uri(uri: &str) -> RenderResult<DataUri> {
    let uri_data = uri
        .trim_start()
        .strip_prefix("data:")
        .ok_or_else(|| RenderError::Resource("Not a data URI".to_string()))?;

    let (metadata, encoded_data) = uri_data
        .split_once(',')
        .ok_or_else(|| RenderError::Resource("Invalid data URI: missing comma".to_string()))?;

    let is_base64 = metadata.ends_with(";base64");
    let mime = metadata.trim_end_matches(";base64");
    let mime = if mime.is_empty() { "text/plain" } else { mime };

    let bytes = if is_base64 {
        base64::engine::general_purpose::STANDARD
            .decode(encoded_data.trim())
            .map_err(|e| RenderError::Resource(format!("Failed to decode base64: {e}")))?
    } else {
        percent_decode(encoded_data)?
    };

    Ok(DataUri {
        mime: mime.to_string(),
        bytes,
    })
}

fn percent_decode(input: &str) -> RenderResult<Vec<u8>> {
    let bytes = input.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' {
            let byte = input
                .get(i + 1..i + 3)
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                .ok_or_else(|| RenderError::Resource("Invalid URL encoding".to_string()))?;
            result.push(byte);
            i += 3;
        } else {
            result.push(bytes[i]);
            i += 1;
        }
    }

    Ok(result)
}

/// Decode encoded image bytes and describe them for the surface.
///
/// The MIME type comes from `declared_mime` when it names an image type,
/// otherwise from the magic bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not a decodable image.
pub fn decode_image(bytes: Vec<u8>, declared_mime: Option<&str>) -> RenderResult<LoadedImage> {
    let img = image::load_from_memory(&bytes)
        .map_err(|e| RenderError::Resource(format!("Failed to decode image: {e}")))?;

    let format = match declared_mime.map(ImageFormat::from_mime) {
        Some(ImageFormat::Unknown) | None => ImageFormat::from_magic_bytes(&bytes),
        Some(format) => format,
    };

    Ok(LoadedImage {
        bytes: Arc::new(bytes),
        mime: format.mime().to_string(),
        width: img.width(),
        height: img.height(),
    })
}

/// Scale a PNG to fit within `max_width`x`max_height`, preserving aspect ratio.
///
/// # Errors
///
/// Returns an error if the PNG cannot be decoded or re-encoded.
pub fn fit_png(png: &[u8], max_width: u32, max_height: u32) -> RenderResult<Vec<u8>> {
    let img = image::load_from_memory(png)
        .map_err(|e| RenderError::Resource(format!("Failed to decode raster: {e}")))?;

    let thumbnail = img.thumbnail(max_width.max(1), max_height.max(1));

    let mut buf = Cursor::new(Vec::new());
    thumbnail
        .write_to(&mut buf, image::ImageFormat::Png)
        .map_err(|e| RenderError::Export(format!("PNG encoding failed: {e}")))?;
    Ok(buf.into_inner())
}

/// Encode PNG bytes as a `data:image/png;base64,` URI.
#[must_use]
pub fn png_data_uri(png: &[u8]) -> String {
    format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(png)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1x1 red pixel
    const PNG_1X1: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8DwHwAFBQIAX8jx0gAAAABJRU5ErkJggg==";

    fn solid_png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, image::ImageFormat::Png)
            .expect("encode");
        buf.into_inner()
    }

    #[test]
    fn test_format_detection_from_mime() {
        assert_eq!(ImageFormat::from_mime("image/png"), ImageFormat::Png);
        assert_eq!(ImageFormat::from_mime("IMAGE/JPEG"), ImageFormat::Jpeg);
        assert_eq!(
            ImageFormat::from_mime("image/webp; charset=binary"),
            ImageFormat::WebP
        );
        assert_eq!(ImageFormat::from_mime("text/html"), ImageFormat::Unknown);
    }

    #[test]
    fn test_format_detection_from_magic_bytes() {
        assert_eq!(
            ImageFormat::from_magic_bytes(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]),
            ImageFormat::Png
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&[0xFF, 0xD8, 0xFF, 0xE0]),
            ImageFormat::Jpeg
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(b"RIFF\x00\x00\x00\x00WEBP"),
            ImageFormat::WebP
        );
        assert_eq!(ImageFormat::from_magic_bytes(b"GIF89a"), ImageFormat::Gif);
        assert_eq!(ImageFormat::from_magic_bytes(&[1, 2]), ImageFormat::Unknown);
    }

    #[test]
    fn test_data_uri_parsing() {
        let data = parse_data_uri(&format!("data:image/png;base64,{PNG_1X1}")).expect("parse");
        assert_eq!(data.mime, "image/png");

        let image = decode_image(data.bytes, Some(&data.mime)).expect("decode");
        assert_eq!((image.width, image.height), (1, 1));
        assert_eq!(image.mime, "image/png");
    }

    #[test]
    fn test_percent_encoded_data_uri() {
        let data = parse_data_uri("data:,Hello%2C%20World").expect("parse");
        assert_eq!(data.mime, "text/plain");
        assert_eq!(data.bytes, b"Hello, World");
    }

    #[test]
    fn test_invalid_data_uri() {
        assert!(parse_data_uri("not a data uri").is_err());
        assert!(parse_data_uri("data:image/png").is_err());
        assert!(parse_data_uri("data:,bad%zz").is_err());
    }

    #[test]
    fn test_decode_sniffs_mime_when_header_is_generic() {
        let image =
            decode_image(solid_png(4, 2), Some("application/octet-stream")).expect("decode");
        assert_eq!(image.mime, "image/png");
        assert_eq!((image.width, image.height), (4, 2));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_image(b"<html></html>".to_vec(), Some("image/png")).is_err());
    }

    #[test]
    fn test_fit_png_preserves_aspect() {
        let fitted = fit_png(&solid_png(842, 595), 300, 300).expect("fit");
        let img = image::load_from_memory(&fitted).expect("decode");
        assert_eq!(img.width(), 300);
        assert!(img.height() < 300);
        assert!(img.height() >= 211 && img.height() <= 213);
    }

    #[test]
    fn test_png_data_uri_prefix() {
        let uri = png_data_uri(&solid_png(1, 1));
        assert!(uri.starts_with("data:image/png;base64,iVBOR"));
    }
}
