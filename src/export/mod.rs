//! The export pipeline: settle, gate on images, watermark, rasterize a
//! normalized snapshot, stamp the canvas and encode.

pub mod normalize;
pub mod readiness;
pub mod surface;
pub mod watermark;

use log::{debug, error, info};

use crate::dom::{Document, NodeId};
use crate::rendering::{Canvas, OnClone, RasterOptions, Rasterize, Rasterizer};
use crate::{Error, ExportConfig, ExportOptions, ExportResult, Result};

use self::watermark::WatermarkConfig;

/// Element id the editor renders its scene into.
pub const EXPORT_TARGET_ID: &str = "image-render-card";

/// Runs exports against a document with one rasterizer and config.
#[derive(Debug, Clone, Default)]
pub struct Exporter<R = Rasterizer> {
    config: ExportConfig,
    rasterizer: R,
}

impl Exporter<Rasterizer> {
    pub fn new(config: ExportConfig) -> Self {
        Self {
            config,
            rasterizer: Rasterizer::new(),
        }
    }
}

impl<R: Rasterize> Exporter<R> {
    pub fn with_rasterizer(config: ExportConfig, rasterizer: R) -> Self {
        Self { config, rasterizer }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Export the element with id `element_id` as an encoded image.
    ///
    /// Only the watermark node is ever added to `document`, and it is gone
    /// again when this returns, whatever the outcome.
    pub async fn export_element(
        &self,
        document: &mut Document,
        element_id: &str,
        options: &ExportOptions,
    ) -> Result<ExportResult> {
        options.validate()?;
        tokio::time::sleep(self.config.settle_delay()).await;

        let target = document
            .get_element_by_id(element_id)
            .ok_or_else(|| Error::ElementNotFound(element_id.to_string()))?;

        let report = readiness::wait_for_images(document, target, self.config.image_timeout()).await;
        debug!("image readiness: {report:?}");

        let watermark = self.config.watermark.clone();
        let surface = (options.export_width as f32, options.export_height as f32);
        let handle = watermark::add_watermark_to_element(document, target, &watermark, surface);
        tokio::time::sleep(self.config.watermark_delay()).await;

        let snapshot = SnapshotPass {
            element_id: element_id.to_string(),
            width: options.export_width,
            height: options.export_height,
            watermark: watermark.clone(),
        };
        let on_clone: OnClone<'_> = Box::new(move |clone, cloned| snapshot.run(clone, cloned));
        let rendered = self
            .rasterizer
            .rasterize(document, target, self.raster_options(options), on_clone)
            .await;
        handle.remove(document);

        let mut canvas = rendered?.ok_or(Error::CanvasUnavailable)?;
        info!(
            "canvas created: {}x{} (scale {})",
            canvas.width(),
            canvas.height(),
            options.scale
        );

        match watermark::add_watermark_to_canvas(&mut canvas, &watermark) {
            Ok(()) => debug!("watermark added to canvas"),
            Err(err) => error!("error adding watermark to canvas: {err}"),
        }

        encode(canvas, options).await
    }

    fn raster_options(&self, options: &ExportOptions) -> RasterOptions {
        RasterOptions {
            background_color: None,
            scale: options.scale,
            use_cors: true,
            allow_taint: true,
            width: Some(options.export_width),
            height: Some(options.export_height),
            window_width: Some(options.export_width),
            window_height: Some(options.export_height),
            logging: false,
            image_timeout: self.config.raster_image_timeout(),
            remove_container: true,
        }
    }
}

/// Export with the default config and rasterizer.
pub async fn export_element(
    document: &mut Document,
    element_id: &str,
    options: &ExportOptions,
) -> Result<ExportResult> {
    Exporter::new(ExportConfig::default())
        .export_element(document, element_id, options)
        .await
}

/// Everything the snapshot callback needs, owned so it can move into it.
struct SnapshotPass {
    element_id: String,
    width: u32,
    height: u32,
    watermark: WatermarkConfig,
}

impl SnapshotPass {
    /// Runs on the rasterizer's clone only.
    fn run(self, doc: &mut Document, cloned: NodeId) {
        let overrides = normalize::inject_rgb_overrides(doc);
        let target = doc.get_element_by_id(&self.element_id).unwrap_or(cloned);
        let viewport = (self.width as f32, self.height as f32);

        surface::setup_export_element(doc, target, self.width, self.height);
        for img in doc.elements_by_tag(target, "img") {
            normalize::preserve_image_styles(doc, img, viewport);
        }
        let mut rewritten = normalize::convert_svg_styles(doc, target);
        for node in doc.descendant_elements(target) {
            let is_img = doc.element(node).is_some_and(|e| e.tag() == "img");
            rewritten += if is_img {
                normalize::convert_image_styles(doc, node)
            } else {
                normalize::convert_styles_to_rgb(doc, node)
            };
        }
        rewritten += normalize::convert_styles_to_rgb(doc, target);
        debug!("snapshot normalized: {overrides} custom properties, {rewritten} declarations");

        if watermark::ensure_watermark_in_clone(doc, target, &self.watermark, viewport) {
            debug!("watermark was missing from the snapshot");
        }
    }
}

/// Encode the canvas as a blob and a data URL of the same format.
async fn encode(canvas: Canvas, options: &ExportOptions) -> Result<ExportResult> {
    let mime = options.format.mime_type();
    let quality = options.quality;
    let (blob, data_url) = tokio::task::spawn_blocking(move || {
        let blob = canvas.to_blob(mime, quality);
        let data_url = canvas.to_data_url(mime, quality);
        (blob, data_url)
    })
    .await
    .map_err(|e| Error::BlobError(format!("encoding task failed: {e}")))?;

    let blob = blob.map_err(|e| match e {
        Error::BlobError(_) => e,
        other => Error::BlobError(other.to_string()),
    })?;
    if data_url.is_empty() || data_url == crate::rendering::canvas::EMPTY_DATA_URL {
        return Err(Error::DataUrlError);
    }
    Ok(ExportResult { data_url, blob })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExportFormat;
    use futures::future::BoxFuture;

    const SCENE: &str = r#"<html><body>
      <div id="image-render-card" style="width: 100%; height: 50vh; background: #202020">
        <p style="color: oklch(0.9 0 0)">caption</p>
      </div>
    </body></html>"#;

    fn quick() -> Exporter {
        Exporter::new(ExportConfig {
            settle_delay_ms: 0,
            watermark_delay_ms: 0,
            ..Default::default()
        })
    }

    fn options() -> ExportOptions {
        ExportOptions {
            format: ExportFormat::Png,
            quality: 1.0,
            scale: 1.0,
            export_width: 120,
            export_height: 80,
        }
    }

    struct NoCanvas;

    impl Rasterize for NoCanvas {
        fn rasterize<'a>(
            &'a self,
            _document: &'a Document,
            _target: NodeId,
            _options: RasterOptions,
            _on_clone: OnClone<'a>,
        ) -> BoxFuture<'a, Result<Option<Canvas>>> {
            Box::pin(async { Ok(None) })
        }
    }

    struct Failing;

    impl Rasterize for Failing {
        fn rasterize<'a>(
            &'a self,
            _document: &'a Document,
            _target: NodeId,
            _options: RasterOptions,
            _on_clone: OnClone<'a>,
        ) -> BoxFuture<'a, Result<Option<Canvas>>> {
            Box::pin(async { Err(Error::RenderError("boom".into())) })
        }
    }

    #[tokio::test]
    async fn exports_at_requested_size() {
        let mut doc = Document::parse_html(SCENE, None).unwrap();
        let result = quick().export_element(&mut doc, EXPORT_TARGET_ID, &options()).await.unwrap();
        assert!(result.data_url.starts_with("data:image/png;base64,"));
        let decoded = image::load_from_memory(result.blob.bytes()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (120, 80));
        assert!(doc.get_element_by_id(watermark::WATERMARK_ID).is_none());
    }

    #[tokio::test]
    async fn snapshot_normalizes_the_clone_only() {
        let mut doc = Document::parse_html(SCENE, None).unwrap();
        let before = doc.clone();
        quick().export_element(&mut doc, EXPORT_TARGET_ID, &options()).await.unwrap();
        let card = doc.get_element_by_id(EXPORT_TARGET_ID).unwrap();
        let card_before = before.get_element_by_id(EXPORT_TARGET_ID).unwrap();
        assert_eq!(doc.element(card).unwrap().style(), before.element(card_before).unwrap().style());
        assert_eq!(doc.children(card), before.children(card_before));
    }

    #[tokio::test]
    async fn missing_canvas_is_an_error_and_cleans_up() {
        let mut doc = Document::parse_html(SCENE, None).unwrap();
        let exporter = Exporter::with_rasterizer(quick().config().clone(), NoCanvas);
        let err = exporter.export_element(&mut doc, EXPORT_TARGET_ID, &options()).await.unwrap_err();
        assert!(matches!(err, Error::CanvasUnavailable));
        assert!(doc.get_element_by_id(watermark::WATERMARK_ID).is_none());
    }

    #[tokio::test]
    async fn rasterizer_failure_still_removes_watermark() {
        let mut doc = Document::parse_html(SCENE, None).unwrap();
        let exporter = Exporter::with_rasterizer(quick().config().clone(), Failing);
        let err = exporter.export_element(&mut doc, EXPORT_TARGET_ID, &options()).await.unwrap_err();
        assert!(matches!(err, Error::RenderError(_)));
        assert!(doc.get_element_by_id(watermark::WATERMARK_ID).is_none());
    }

    #[tokio::test]
    async fn unknown_target_is_not_found() {
        let mut doc = Document::parse_html(SCENE, None).unwrap();
        let err = quick().export_element(&mut doc, "nope", &options()).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn invalid_options_fail_before_work() {
        let mut doc = Document::parse_html(SCENE, None).unwrap();
        let bad = ExportOptions { scale: 0.0, ..options() };
        let err = quick().export_element(&mut doc, EXPORT_TARGET_ID, &bad).await.unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }
}
