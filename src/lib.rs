//! Stage scene export
//!
//! Rasterizes the editor's render card (uploaded image, background, borders,
//! shadows, overlays and frame) into a PNG or JPEG, the way the browser
//! export does: wait for images, stamp a watermark, snapshot a normalized
//! clone, paint it and encode.
//!
//! # Features
//!
//! - **Color normalization**: `oklch()` and friends are rewritten to `rgb()`
//!   before a legacy-only rasterizer sees them
//! - **Image readiness**: exports never sample half-loaded images, and
//!   never hang on broken ones
//! - **Watermark**: DOM, snapshot and canvas paths, any of which suffices
//! - **Pluggable rasterizer**: the [`Rasterize`] trait sits at the seam
//!
//! # Example
//!
//! ```no_run
//! use stage_export::{export_element, Document, ExportFormat, ExportOptions};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut doc = Document::parse_html(
//!     r#"<div id="image-render-card" style="background: #222">scene</div>"#,
//!     None,
//! )?;
//! let options = ExportOptions {
//!     format: ExportFormat::Png,
//!     quality: 1.0,
//!     scale: 2.0,
//!     export_width: 800,
//!     export_height: 600,
//! };
//! let result = export_element(&mut doc, "image-render-card", &options).await?;
//! assert!(result.data_url.starts_with("data:image/png"));
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub mod assets;
pub mod css;
pub mod dom;
pub mod error;
pub mod export;
pub mod rendering;

pub use dom::{Document, NodeId};
pub use error::{Error, Result};
pub use export::readiness::ReadinessReport;
pub use export::watermark::{WatermarkConfig, WatermarkPosition};
pub use export::{export_element, Exporter, EXPORT_TARGET_ID};
pub use rendering::{Blob, Canvas, RasterOptions, Rasterize, Rasterizer};

/// Output image format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Png,
    Jpg,
}

impl ExportFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Png => rendering::canvas::MIME_PNG,
            ExportFormat::Jpg => rendering::canvas::MIME_JPEG,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpg => "jpg",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(ExportFormat::Png),
            "jpg" | "jpeg" => Ok(ExportFormat::Jpg),
            other => Err(Error::ConfigError(format!("unknown export format '{other}'"))),
        }
    }
}

/// Options for one export call.
///
/// # Examples
///
/// ```
/// let opts = stage_export::ExportOptions::default();
/// assert!(opts.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExportOptions {
    pub format: ExportFormat,
    /// Encoder quality in `[0, 1]`. Passed through unchanged; PNG ignores it.
    pub quality: f32,
    /// Device pixels per CSS px.
    pub scale: f32,
    /// Size of the exported surface in CSS px.
    pub export_width: u32,
    pub export_height: u32,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            format: ExportFormat::Png,
            quality: 1.0,
            scale: 1.0,
            export_width: 1920,
            export_height: 1080,
        }
    }
}

impl ExportOptions {
    /// Reject options no export could satisfy.
    pub fn validate(&self) -> Result<()> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(Error::ConfigError(format!("scale must be positive, got {}", self.scale)));
        }
        if self.export_width == 0 || self.export_height == 0 {
            return Err(Error::ConfigError(format!(
                "export size must be non-zero, got {}x{}",
                self.export_width, self.export_height
            )));
        }
        Ok(())
    }
}

/// Encoded output of one export. Both fields come from the same canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportResult {
    /// `data:<mime>;base64,...`
    pub data_url: String,
    pub blob: Blob,
}

/// Pipeline tunables.
///
/// Every field has a default, and JSON config files may set any subset:
/// - `settle_delay_ms` (200): pause before the target is looked up
/// - `watermark_delay_ms` (100): pause between watermark insertion and capture
/// - `image_timeout_ms` (10000): ceiling for the image readiness gate
/// - `raster_image_timeout_ms` (15000): ceiling for each image the rasterizer loads
///
/// # Examples
///
/// ```
/// let cfg = stage_export::ExportConfig::from_json(r#"{"settle_delay_ms": 0}"#).unwrap();
/// assert_eq!(cfg.image_timeout_ms, 10_000);
/// assert_eq!(cfg.watermark.text, "stage");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub settle_delay_ms: u64,
    pub watermark_delay_ms: u64,
    pub image_timeout_ms: u64,
    pub raster_image_timeout_ms: u64,
    pub watermark: WatermarkConfig,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 200,
            watermark_delay_ms: 100,
            image_timeout_ms: 10_000,
            raster_image_timeout_ms: 15_000,
            watermark: WatermarkConfig::default(),
        }
    }
}

impl ExportConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::ConfigError(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn watermark_delay(&self) -> Duration {
        Duration::from_millis(self.watermark_delay_ms)
    }

    pub fn image_timeout(&self) -> Duration {
        Duration::from_millis(self.image_timeout_ms)
    }

    pub fn raster_image_timeout(&self) -> Duration {
        Duration::from_millis(self.raster_image_timeout_ms)
    }
}
