//! Raster surface produced by the rasterizer, with browser-style encoding.

use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use log::debug;
use tiny_skia::Pixmap;

use crate::{Error, Result};

pub const MIME_PNG: &str = "image/png";
pub const MIME_JPEG: &str = "image/jpeg";

/// Largest edge a canvas may have.
pub const MAX_DIMENSION: u32 = 32_767;
/// Largest pixel count a canvas may have.
pub const MAX_AREA: u64 = 268_435_456;

/// Encoder quality used when the requested one is outside `[0, 1]`.
pub const DEFAULT_QUALITY: f32 = 0.92;

/// What a failed `toDataURL` returns.
pub const EMPTY_DATA_URL: &str = "data:,";

/// Encoded image bytes with their MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    bytes: Vec<u8>,
    mime_type: String,
}

impl Blob {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// A premultiplied RGBA surface.
#[derive(Debug, Clone)]
pub struct Canvas {
    pixmap: Pixmap,
}

impl Canvas {
    /// Allocate a transparent canvas. `None` for empty or oversized surfaces.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return None;
        }
        if u64::from(width) * u64::from(height) > MAX_AREA {
            return None;
        }
        Pixmap::new(width, height).map(|pixmap| Self { pixmap })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn pixmap_mut(&mut self) -> &mut Pixmap {
        &mut self.pixmap
    }

    /// Straight (non-premultiplied) RGBA pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let px = self.pixmap.pixel(x, y)?.demultiply();
        Some([px.red(), px.green(), px.blue(), px.alpha()])
    }

    /// Straight RGBA rows, the layout `getImageData` returns.
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.pixmap
            .pixels()
            .iter()
            .flat_map(|p| {
                let c = p.demultiply();
                [c.red(), c.green(), c.blue(), c.alpha()]
            })
            .collect()
    }

    /// RGB rows with alpha flattened onto black.
    fn to_rgb8(&self) -> Vec<u8> {
        // Premultiplied channels already are the color composited onto black.
        self.pixmap
            .pixels()
            .iter()
            .flat_map(|p| [p.red(), p.green(), p.blue()])
            .collect()
    }

    /// Encode as `mime` (`image/png` or `image/jpeg`, anything else falls
    /// back to PNG). `quality` only affects JPEG.
    pub fn to_blob(&self, mime: &str, quality: f32) -> Result<Blob> {
        let mut bytes = Vec::new();
        let mime = if mime.eq_ignore_ascii_case(MIME_JPEG) {
            let encoder = JpegEncoder::new_with_quality(&mut bytes, jpeg_quality(quality));
            encoder.write_image(&self.to_rgb8(), self.width(), self.height(), ExtendedColorType::Rgb8)?;
            MIME_JPEG
        } else {
            let encoder = PngEncoder::new(&mut bytes);
            encoder.write_image(&self.to_rgba8(), self.width(), self.height(), ExtendedColorType::Rgba8)?;
            MIME_PNG
        };
        if bytes.is_empty() {
            return Err(Error::BlobError(format!("{mime} encoder produced no data")));
        }
        Ok(Blob::new(bytes, mime))
    }

    /// Encode as a base64 `data:` URL, or `"data:,"` when encoding fails.
    pub fn to_data_url(&self, mime: &str, quality: f32) -> String {
        match self.to_blob(mime, quality) {
            Ok(blob) => blob_to_data_url(&blob),
            Err(err) => {
                debug!("data URL encoding failed: {err}");
                EMPTY_DATA_URL.to_string()
            }
        }
    }
}

pub fn blob_to_data_url(blob: &Blob) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(blob.bytes());
    format!("data:{};base64,{encoded}", blob.mime_type())
}

fn jpeg_quality(quality: f32) -> u8 {
    let quality = if (0.0..=1.0).contains(&quality) {
        quality
    } else {
        DEFAULT_QUALITY
    };
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiny_skia::Color;

    fn red_canvas() -> Canvas {
        let mut canvas = Canvas::new(4, 3).unwrap();
        canvas.pixmap_mut().fill(Color::from_rgba8(255, 0, 0, 255));
        canvas
    }

    #[test]
    fn rejects_empty_and_oversized_surfaces() {
        assert!(Canvas::new(0, 10).is_none());
        assert!(Canvas::new(MAX_DIMENSION + 1, 1).is_none());
        assert!(Canvas::new(20_000, 20_000).is_none());
        assert!(Canvas::new(1, 1).is_some());
    }

    #[test]
    fn png_blob_round_trips_pixels() {
        let blob = red_canvas().to_blob(MIME_PNG, 0.5).unwrap();
        assert_eq!(blob.mime_type(), "image/png");
        let decoded = image::load_from_memory(blob.bytes()).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (4, 3));
        assert_eq!(decoded.get_pixel(2, 1).0, [255, 0, 0, 255]);

        let size = blob.size();
        assert_eq!(blob.into_bytes().len(), size);
    }

    #[test]
    fn jpeg_flattens_onto_black() {
        let mut canvas = Canvas::new(8, 8).unwrap();
        canvas.pixmap_mut().fill(Color::from_rgba8(255, 255, 255, 0));
        let blob = canvas.to_blob(MIME_JPEG, 1.0).unwrap();
        assert_eq!(blob.mime_type(), "image/jpeg");
        let decoded = image::load_from_memory(blob.bytes()).unwrap().to_rgb8();
        assert!(decoded.get_pixel(4, 4).0.iter().all(|&c| c < 8));
    }

    #[test]
    fn unknown_mime_falls_back_to_png() {
        let blob = red_canvas().to_blob("image/webp", 1.0).unwrap();
        assert_eq!(blob.mime_type(), MIME_PNG);
    }

    #[test]
    fn data_url_matches_blob() {
        let canvas = red_canvas();
        let url = canvas.to_data_url(MIME_JPEG, 0.8);
        assert!(url.starts_with("data:image/jpeg;base64,"));
        let blob = canvas.to_blob(MIME_JPEG, 0.8).unwrap();
        assert_eq!(url, blob_to_data_url(&blob));
    }

    #[test]
    fn out_of_range_quality_uses_default() {
        assert_eq!(jpeg_quality(2.0), 92);
        assert_eq!(jpeg_quality(-1.0), 92);
        assert_eq!(jpeg_quality(0.0), 1);
        assert_eq!(jpeg_quality(0.5), 50);
    }
}
